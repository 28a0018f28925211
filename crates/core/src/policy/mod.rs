//! Ingress policy values.
//!
//! Each value here is constructed once at startup and never mutated; the
//! server's pipeline stages hold them behind an `Arc`. Swapping a value in a
//! test is how alternate policies are exercised.

pub mod csp;
pub mod hidden_path;
pub mod origin;

pub use csp::ContentSecurityPolicy;
pub use hidden_path::HiddenPathPattern;
pub use origin::OriginAllowList;

use thiserror::Error;

/// Errors raised while constructing a policy value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// An origin allow-list must name at least one origin.
    #[error("origin allow-list cannot be empty")]
    EmptyAllowList,

    /// The origin is not a bare `scheme://host[:port]` value.
    #[error("invalid origin {0:?}: expected scheme://host[:port] without path")]
    InvalidOrigin(String),

    /// Wildcards cannot be combined with credentialed CORS.
    #[error("wildcard origin is not allowed in a credentialed allow-list")]
    WildcardOrigin,

    /// A hidden-path pattern needs at least one protected name.
    #[error("hidden-path pattern needs at least one directory name")]
    EmptyPattern,

    /// The generated pattern failed to compile.
    #[error("invalid hidden-path pattern: {0}")]
    InvalidPattern(String),

    /// A CSP directive name or source contains characters that would break the header.
    #[error("invalid CSP token {0:?}")]
    InvalidCspToken(String),
}
