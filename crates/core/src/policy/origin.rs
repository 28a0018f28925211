//! Exact-match CORS origin allow-list.

use url::Url;

use super::PolicyError;

/// Frontend development server, the only origin allowed by default.
pub const DEV_FRONTEND_ORIGIN: &str = "http://localhost:5173";

/// An ordered, non-empty set of origins permitted to make credentialed
/// cross-origin requests.
///
/// Matching is byte-exact: `http://localhost:5173` does not match
/// `http://LOCALHOST:5173` or `http://localhost:5173/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: Vec<String>,
}

impl OriginAllowList {
    /// Build an allow-list, dropping duplicates while keeping first-seen order.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::EmptyAllowList`] if no origin is given
    /// - [`PolicyError::WildcardOrigin`] for `*`
    /// - [`PolicyError::InvalidOrigin`] for anything other than a serialized `http`/`https` origin
    pub fn new<I, S>(origins: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for origin in origins {
            let origin = origin.into();
            validate_origin(&origin)?;
            if !list.contains(&origin) {
                list.push(origin);
            }
        }

        if list.is_empty() {
            return Err(PolicyError::EmptyAllowList);
        }

        Ok(Self { origins: list })
    }

    /// Whether `origin` is allowed.
    #[must_use]
    pub fn contains(&self, origin: &str) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
    }

    /// Number of allowed origins (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl Default for OriginAllowList {
    fn default() -> Self {
        Self {
            origins: vec![DEV_FRONTEND_ORIGIN.to_owned()],
        }
    }
}

fn validate_origin(origin: &str) -> Result<(), PolicyError> {
    if origin == "*" {
        return Err(PolicyError::WildcardOrigin);
    }

    let invalid = || PolicyError::InvalidOrigin(origin.to_owned());
    let url = Url::parse(origin).map_err(|_| invalid())?;

    // Must round-trip: no path, no default port, lowercase host.
    if !matches!(url.scheme(), "http" | "https") || url.origin().ascii_serialization() != origin {
        return Err(invalid());
    }

    Ok(())
}
