//! Security headers stage.
//!
//! Every response leaving the pipeline carries the storefront CSP,
//! `X-Content-Type-Options: nosniff` and the [`HARDENING_HEADERS`], and never
//! names the server software.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{CONTENT_SECURITY_POLICY, SERVER, X_CONTENT_TYPE_OPTIONS},
    },
    response::Response,
};

use storegate_core::PolicyError;

use super::{Flow, PolicyConfig, RequestHead, Stage};
use crate::error::AppError;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Fixed headers set on every response alongside the CSP.
///
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `Strict-Transport-Security` - HTTPS only for a year, subdomains included
/// - `Referrer-Policy: no-referrer` - Zero referrer leakage
/// - `Cross-Origin-Opener-Policy` / `Cross-Origin-Resource-Policy` - Process and resource isolation
/// - `Origin-Agent-Cluster: ?1` - Origin-keyed agent cluster
/// - `X-DNS-Prefetch-Control: off` - Prevent DNS prefetch leakage
/// - `X-Download-Options: noopen` - No in-context opening of downloads
/// - `X-Permitted-Cross-Domain-Policies: none` - No Flash/PDF cross-domain policy files
/// - `X-XSS-Protection: 0` - Disable the legacy XSS auditor
pub const HARDENING_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Applies the response header policy.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    csp: HeaderValue,
}

impl HeaderPolicy {
    /// Render the CSP once; it is identical for every response.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidCspToken`] if the rendered policy is not
    /// a valid header value.
    pub fn new(policy: &PolicyConfig) -> Result<Self, PolicyError> {
        let rendered = policy.csp.header_value();
        let csp = HeaderValue::from_str(&rendered)
            .map_err(|_| PolicyError::InvalidCspToken(rendered.clone()))?;
        Ok(Self { csp })
    }
}

#[async_trait]
impl Stage for HeaderPolicy {
    fn name(&self) -> &'static str {
        "header-policy"
    }

    async fn handle(&self, request: Request) -> Result<Flow, AppError> {
        Ok(Flow::Continue(request))
    }

    fn finish(&self, _head: &RequestHead, response: &mut Response) {
        let headers = response.headers_mut();

        headers.insert(CONTENT_SECURITY_POLICY, self.csp.clone());
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        for &(name, value) in HARDENING_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        // No server fingerprinting
        headers.remove(SERVER);
        headers.remove(X_POWERED_BY);
    }
}
