//! Request correlation ids.
//!
//! Each request gets an id that is recorded on the tracing span, tagged on
//! the Sentry scope, stored in request extensions, and echoed back as
//! `x-request-id`. An id supplied by an upstream proxy is reused when it is
//! short printable ASCII; anything else is replaced.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_INBOUND_LEN: usize = 128;

/// The correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Reuse `inbound` if it is acceptable, otherwise mint a UUID v4.
    #[must_use]
    pub fn from_inbound(inbound: Option<&HeaderValue>) -> Self {
        inbound
            .and_then(|value| value.to_str().ok())
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_INBOUND_LEN
                    && id.bytes().all(|b| b.is_ascii_graphic())
            })
            .map_or_else(|| Self(Uuid::new_v4().to_string()), |id| Self(id.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a [`RequestId`] to the request and its response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_inbound(request.headers().get(REQUEST_ID_HEADER));

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", request_id.as_str());
    });

    request.extensions_mut().insert(request_id.clone());
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(|| Self::from_inbound(None)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_id_is_reused() {
        let inbound = HeaderValue::from_static("cf-7a1b2c");
        assert_eq!(RequestId::from_inbound(Some(&inbound)).as_str(), "cf-7a1b2c");
    }

    #[test]
    fn test_unusable_inbound_id_is_replaced() {
        let spaced = HeaderValue::from_static("has spaces");
        let replaced = RequestId::from_inbound(Some(&spaced));
        assert_ne!(replaced.as_str(), "has spaces");
        assert!(Uuid::parse_str(replaced.as_str()).is_ok());

        let long = HeaderValue::from_str(&"x".repeat(MAX_INBOUND_LEN + 1)).unwrap();
        assert!(Uuid::parse_str(RequestId::from_inbound(Some(&long)).as_str()).is_ok());
    }

    #[test]
    fn test_missing_id_is_generated() {
        let a = RequestId::from_inbound(None);
        let b = RequestId::from_inbound(None);
        assert_ne!(a, b);
    }
}
