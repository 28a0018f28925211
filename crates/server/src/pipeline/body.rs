//! Body and cookie ingestion.
//!
//! Buffers the request body up to the configured limit, parses it according
//! to its content type, and attaches the result to the request as an
//! [`Ingested`] extension. The buffered bytes are put back so anything
//! downstream can still read the raw body.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{
        HeaderMap,
        header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE},
        request::Parts,
    },
};
use bytes::Bytes;
use cookie::Cookie;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Flow, PolicyConfig, Stage};
use crate::error::AppError;

/// A parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestedBody {
    /// `application/json`.
    Json(Value),
    /// `application/x-www-form-urlencoded`, flat, last value wins.
    Form(BTreeMap<String, String>),
    /// Any other content type.
    Raw(Bytes),
    /// No body at all.
    Empty,
}

/// Request cookies by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(BTreeMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header. Malformed pairs are skipped; values are
    /// percent-decoded and stripped of surrounding quotes.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse_encoded)
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_owned(), cookie.value_trimmed().to_owned()))
            .collect();

        Self(cookies)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything `BodyIngest` learned about a request.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub body: IngestedBody,
    pub cookies: Cookies,
}

/// Parses bodies and cookies into [`Ingested`].
#[derive(Debug, Clone)]
pub struct BodyIngest {
    policy: Arc<PolicyConfig>,
}

impl BodyIngest {
    #[must_use]
    pub const fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for BodyIngest {
    fn name(&self) -> &'static str {
        "body-ingest"
    }

    async fn handle(&self, request: Request) -> Result<Flow, AppError> {
        let limit = self.policy.body_limit;
        let (mut parts, body) = request.into_parts();

        if declared_length(&parts.headers).is_some_and(|len| len > limit) {
            return Err(AppError::PayloadTooLarge);
        }

        let bytes = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|err| {
                if err.downcast_ref::<LengthLimitError>().is_some() {
                    AppError::PayloadTooLarge
                } else {
                    AppError::BadRequest(format!("failed to read body: {err}"))
                }
            })?
            .to_bytes();

        let ingested = Ingested {
            body: parse_body(content_type(&parts.headers).as_deref(), &bytes)?,
            cookies: Cookies::from_headers(&parts.headers),
        };
        parts.extensions.insert(ingested);

        Ok(Flow::Continue(Request::from_parts(parts, Body::from(bytes))))
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Media type without parameters, lowercased: `application/json; charset=utf-8`
/// becomes `application/json`.
fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    Some(essence.to_ascii_lowercase())
}

fn parse_body(content_type: Option<&str>, bytes: &Bytes) -> Result<IngestedBody, AppError> {
    if bytes.is_empty() {
        return Ok(IngestedBody::Empty);
    }

    match content_type {
        Some(ct) if ct == "application/json" || ct.ends_with("+json") => {
            serde_json::from_slice(bytes)
                .map(IngestedBody::Json)
                .map_err(|e| AppError::BadRequest(format!("malformed JSON body: {e}")))
        }
        Some("application/x-www-form-urlencoded") => Ok(IngestedBody::Form(
            url::form_urlencoded::parse(bytes).into_owned().collect(),
        )),
        _ => Ok(IngestedBody::Raw(bytes.clone())),
    }
}

impl<S> FromRequestParts<S> for Ingested
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::Internal("request body was not ingested; pipeline misconfigured".to_string())
        })
    }
}

impl<S> FromRequestParts<S> for Cookies
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Ingested>()
            .map_or_else(|| Self::from_headers(&parts.headers), |i| i.cookies.clone()))
    }
}

/// Typed view of an ingested JSON or form body.
///
/// An empty body deserializes as an empty object so optional-field payloads
/// can report which fields are missing.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequestParts<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ingested { body, .. } = Ingested::from_request_parts(parts, state).await?;

        let value = match body {
            IngestedBody::Json(value) => value,
            IngestedBody::Form(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
            IngestedBody::Empty => Value::Object(serde_json::Map::new()),
            IngestedBody::Raw(_) => {
                return Err(AppError::BadRequest("unsupported content type".to_string()));
            }
        };

        serde_json::from_value(value)
            .map(Payload)
            .map_err(|e| AppError::BadRequest(format!("unexpected body shape: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use serde::Deserialize;

    use super::*;

    fn stage(limit: usize) -> BodyIngest {
        BodyIngest::new(Arc::new(PolicyConfig::storefront(limit)))
    }

    fn post(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method("POST").uri("/api/products");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn ingest(limit: usize, request: Request) -> Result<Request, AppError> {
        match stage(limit).handle(request).await? {
            Flow::Continue(request) => Ok(request),
            Flow::Respond(_) => panic!("body ingest never answers directly"),
        }
    }

    fn ingested(request: &Request) -> &Ingested {
        request.extensions().get::<Ingested>().unwrap()
    }

    #[tokio::test]
    async fn test_json_body_is_parsed() {
        let request = ingest(1024, post(Some("application/json"), r#"{"name":"Figure"}"#))
            .await
            .unwrap();

        assert_eq!(
            ingested(&request).body,
            IngestedBody::Json(serde_json::json!({"name": "Figure"}))
        );
    }

    #[tokio::test]
    async fn test_json_with_charset_parameter() {
        let request = ingest(
            1024,
            post(Some("Application/JSON; charset=utf-8"), r#"{"a":1}"#),
        )
        .await
        .unwrap();

        assert!(matches!(ingested(&request).body, IngestedBody::Json(_)));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = ingest(1024, post(Some("application/json"), r#"{"name":"#))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.public_message(), "Bad request");
    }

    #[tokio::test]
    async fn test_form_body_last_value_wins() {
        let request = ingest(
            1024,
            post(
                Some("application/x-www-form-urlencoded"),
                "name=First&price=9.99&name=Second&tags%5B%5D=a",
            ),
        )
        .await
        .unwrap();

        let IngestedBody::Form(fields) = &ingested(&request).body else {
            panic!("expected form body");
        };
        assert_eq!(fields["name"], "Second");
        assert_eq!(fields["price"], "9.99");
        // No nested expansion: the bracketed key is kept literally.
        assert_eq!(fields["tags[]"], "a");
    }

    #[tokio::test]
    async fn test_empty_and_raw_bodies() {
        let request = ingest(1024, post(Some("application/json"), "")).await.unwrap();
        assert_eq!(ingested(&request).body, IngestedBody::Empty);

        let request = ingest(1024, post(Some("text/plain"), "hello")).await.unwrap();
        assert_eq!(
            ingested(&request).body,
            IngestedBody::Raw(Bytes::from_static(b"hello"))
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let err = ingest(8, post(Some("text/plain"), "0123456789"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_rejected_early() {
        let mut request = post(Some("text/plain"), "tiny");
        request
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("999999"));

        let err = ingest(1024, request).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn test_body_is_readable_after_ingest() {
        let request = ingest(1024, post(Some("application/json"), r#"{"a":1}"#))
            .await
            .unwrap();

        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_cookie_parsing_skips_malformed_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("storegate_session=abc; junk; =nameless; theme=dark%20mode"),
        );
        headers.append(COOKIE, HeaderValue::from_static("lang=\"en\""));

        let cookies = Cookies::from_headers(&headers);

        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("storegate_session"), Some("abc"));
        assert_eq!(cookies.get("theme"), Some("dark mode"));
        assert_eq!(cookies.get("lang"), Some("en"));
        assert_eq!(cookies.get("junk"), None);
    }

    #[test]
    fn test_cookie_values_keep_stray_percent_and_equals() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1%ZZ; b=x=y"));

        let cookies = Cookies::from_headers(&headers);

        assert_eq!(cookies.get("a"), Some("1%ZZ"));
        assert_eq!(cookies.get("b"), Some("x=y"));
    }

    #[derive(Debug, Deserialize)]
    struct Login {
        email: Option<String>,
        password: Option<String>,
    }

    async fn payload(request: Request) -> Result<Payload<Login>, AppError> {
        let request = ingest(1024, request).await?;
        let (mut parts, _) = request.into_parts();
        Payload::<Login>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_payload_from_json_and_form() {
        let Payload(from_json) = payload(post(
            Some("application/json"),
            r#"{"email":"a@b.co","password":"pw"}"#,
        ))
        .await
        .unwrap();
        assert_eq!(from_json.email.as_deref(), Some("a@b.co"));

        let Payload(from_form) = payload(post(
            Some("application/x-www-form-urlencoded"),
            "email=a%40b.co&password=pw",
        ))
        .await
        .unwrap();
        assert_eq!(from_form.email.as_deref(), Some("a@b.co"));
        assert_eq!(from_form.password.as_deref(), Some("pw"));
    }

    #[tokio::test]
    async fn test_payload_from_empty_body_has_no_fields() {
        let Payload(login) = payload(post(None, "")).await.unwrap();
        assert!(login.email.is_none());
        assert!(login.password.is_none());
    }

    #[tokio::test]
    async fn test_payload_rejects_raw_body() {
        let err = payload(post(Some("text/plain"), "email=x")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
