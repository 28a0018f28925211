//! Cross-origin policy.
//!
//! Only origins on the allow-list receive `Access-Control-*` headers, and
//! they receive them with credentials enabled. Preflights never reach the
//! router: they are answered here with `204 No Content`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
        },
    },
    response::{IntoResponse, Response},
};

use super::{Flow, PolicyConfig, RequestHead, Stage};
use crate::error::AppError;

/// Methods advertised to allowed origins.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";

/// Request headers advertised to allowed origins.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";

/// Applies the origin allow-list.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    policy: Arc<PolicyConfig>,
}

impl OriginPolicy {
    #[must_use]
    pub const fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }

    /// The origin to echo back, if it is allowed.
    fn allowed<'h>(&self, origin: Option<&'h HeaderValue>) -> Option<&'h HeaderValue> {
        origin.filter(|value| {
            value
                .to_str()
                .is_ok_and(|origin| self.policy.origins.contains(origin))
        })
    }
}

#[async_trait]
impl Stage for OriginPolicy {
    fn name(&self) -> &'static str {
        "origin-policy"
    }

    async fn handle(&self, request: Request) -> Result<Flow, AppError> {
        if request.method() == Method::OPTIONS {
            return Ok(Flow::Respond(StatusCode::NO_CONTENT.into_response()));
        }
        Ok(Flow::Continue(request))
    }

    fn finish(&self, head: &RequestHead, response: &mut Response) {
        let headers = response.headers_mut();
        headers.append(VARY, HeaderValue::from_static("origin"));

        match self.allowed(head.origin.as_ref()) {
            Some(origin) => grant(headers, origin.clone()),
            None => {
                if let Some(origin) = &head.origin {
                    tracing::debug!(origin = ?origin, "Origin not allowed; omitting CORS headers");
                }
                revoke(headers);
            }
        }
    }
}

fn grant(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

// A handler must not be able to widen the policy for an unknown origin.
fn revoke(headers: &mut HeaderMap) {
    headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
    headers.remove(ACCESS_CONTROL_ALLOW_CREDENTIALS);
    headers.remove(ACCESS_CONTROL_ALLOW_METHODS);
    headers.remove(ACCESS_CONTROL_ALLOW_HEADERS);
}
