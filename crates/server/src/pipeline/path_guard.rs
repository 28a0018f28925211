//! Hidden-path denial.
//!
//! Requests for dotfiles at the web root or for version-control metadata are
//! answered with `403 Access Denied` before any other stage or route sees
//! them. The check runs on the path as received and again after
//! percent-decoding, so `/%2Egit/config` is denied like `/.git/config`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;

use super::{Flow, PolicyConfig, Stage};
use crate::error::AppError;

/// Denies requests whose path matches the hidden-path pattern.
#[derive(Debug, Clone)]
pub struct PathGuard {
    policy: Arc<PolicyConfig>,
}

impl PathGuard {
    #[must_use]
    pub const fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }

    /// Whether `raw_path` is hidden, either as received or once decoded.
    #[must_use]
    pub fn is_hidden(&self, raw_path: &str) -> bool {
        let pattern = &self.policy.hidden_paths;
        if pattern.is_match(raw_path) {
            return true;
        }
        match urlencoding::decode(raw_path) {
            Ok(decoded) => decoded != raw_path && pattern.is_match(&decoded),
            // Not valid UTF-8 once decoded; nothing routable lives there.
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Stage for PathGuard {
    fn name(&self) -> &'static str {
        "path-guard"
    }

    async fn handle(&self, request: Request) -> Result<Flow, AppError> {
        let path = request.uri().path();
        if self.is_hidden(path) {
            tracing::warn!(path = %path, method = %request.method(), "Denied hidden path");
            return Err(AppError::Forbidden);
        }
        Ok(Flow::Continue(request))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn guard() -> PathGuard {
        PathGuard::new(Arc::new(PolicyConfig::storefront(1024)))
    }

    #[test]
    fn test_dotfiles_at_root_are_hidden() {
        let guard = guard();
        assert!(guard.is_hidden("/.env"));
        assert!(guard.is_hidden("/.well-known/security.txt"));
        assert!(guard.is_hidden("/.DS_Store"));
    }

    #[test]
    fn test_vcs_metadata_anywhere_is_hidden() {
        let guard = guard();
        assert!(guard.is_hidden("/.git/config"));
        assert!(guard.is_hidden("/assets/.git/HEAD"));
        assert!(guard.is_hidden("/static/_darcs/prefs"));
        assert!(guard.is_hidden("/x/.hg/store"));
        assert!(guard.is_hidden("/BitKeeper/etc"));
        assert!(guard.is_hidden("/a/.bzr"));
    }

    #[test]
    fn test_ordinary_paths_pass() {
        let guard = guard();
        assert!(!guard.is_hidden("/"));
        assert!(!guard.is_hidden("/api/products"));
        assert!(!guard.is_hidden("/assets/index-4f2a.js"));
        assert!(!guard.is_hidden("/products/gitter"));
    }

    #[test]
    fn test_percent_encoded_paths_are_decoded() {
        let guard = guard();
        assert!(guard.is_hidden("/%2Egit/config"));
        assert!(guard.is_hidden("/assets/%2ehg/x"));
        assert!(!guard.is_hidden("/search%20results"));
    }

    #[tokio::test]
    async fn test_handle_rejects_with_forbidden() {
        let request = Request::builder()
            .uri("/.git/HEAD")
            .body(Body::empty())
            .unwrap();

        let result = guard().handle(request).await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_handle_passes_ordinary_request() {
        let request = Request::builder()
            .uri("/api/products")
            .body(Body::empty())
            .unwrap();

        let result = guard().handle(request).await.unwrap();

        assert!(matches!(result, Flow::Continue(_)));
    }
}
