//! Content-Security-Policy directive lists.

use super::PolicyError;

/// An ordered list of CSP directives rendered into a single header value.
///
/// Directive order is preserved so the header is byte-stable across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<(String, Vec<String>)>,
}

/// Trusted stylesheet origin for web fonts.
pub const FONT_STYLESHEET_ORIGIN: &str = "https://fonts.googleapis.com";

/// Trusted origin for product imagery.
pub const PRODUCT_IMAGE_ORIGIN: &str = "https://smiski.com/e/products/";

impl ContentSecurityPolicy {
    /// Start an empty policy.
    #[must_use]
    pub const fn builder() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// Append a directive with its source list.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidCspToken`] if the name or any source
    /// contains `;`, `,`, or a control character.
    pub fn directive<I, S>(mut self, name: &str, sources: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_token(name)?;
        let sources = sources
            .into_iter()
            .map(Into::into)
            .map(|source| check_token(&source).map(|()| source))
            .collect::<Result<Vec<_>, _>>()?;
        self.directives.push((name.to_owned(), sources));
        Ok(self)
    }

    /// The storefront policy: self-hosted scripts with `strict-dynamic`,
    /// Google Fonts stylesheets, inline data images plus the product CDN, no
    /// framing, and forms posting only back to this origin.
    #[must_use]
    pub fn storefront() -> Self {
        let d = |name: &str, sources: &[&str]| {
            (
                name.to_owned(),
                sources.iter().map(|s| (*s).to_owned()).collect(),
            )
        };
        Self {
            directives: vec![
                d("default-src", &["'self'"]),
                d("script-src", &["'self'", "'strict-dynamic'"]),
                d("style-src", &["'self'", FONT_STYLESHEET_ORIGIN]),
                d("img-src", &["'self'", "data:", PRODUCT_IMAGE_ORIGIN]),
                d("frame-ancestors", &["'none'"]),
                d("form-action", &["'self'"]),
            ],
        }
    }

    /// Sources listed for a directive, if present.
    #[must_use]
    pub fn sources(&self, name: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(directive, _)| directive == name)
            .map(|(_, sources)| sources.as_slice())
    }

    /// Render the header value, e.g. `default-src 'self'; frame-ancestors 'none'`.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.clone()
                } else {
                    format!("{name} {}", sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for ContentSecurityPolicy {
    fn default() -> Self {
        Self::storefront()
    }
}

fn check_token(token: &str) -> Result<(), PolicyError> {
    if token.is_empty() || token.chars().any(|c| c == ';' || c == ',' || c.is_control()) {
        return Err(PolicyError::InvalidCspToken(token.to_owned()));
    }
    Ok(())
}
