//! Session token type and its cookie.
//!
//! Sessions are opaque random tokens kept in the `sessions` table and carried
//! by the client in an `HttpOnly` cookie.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::{Cookie, CookieBuilder, SameSite, time::Duration};
use rand::RngCore;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "storegate_session";

/// Session lifetime in seconds (7 days).
pub const SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// An opaque session token (256-bit, base64url without padding).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a new random token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a token presented by a client if it has the generated shape.
    #[must_use]
    pub fn from_cookie(value: &str) -> Option<Self> {
        let well_formed = value.len() == 43
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        well_formed.then(|| Self(value.to_owned()))
    }

    /// The token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cookie that hands `token` to the client for [`SESSION_TTL_SECONDS`].
///
/// `secure` adds the `Secure` attribute; set it in production.
#[must_use]
pub fn session_cookie(token: &SessionToken, secure: bool) -> Cookie<'static> {
    session_cookie_builder(token.as_str().to_owned(), secure)
        .max_age(Duration::seconds(SESSION_TTL_SECONDS))
        .build()
}

/// Cookie that tells the client to drop its session cookie.
#[must_use]
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = session_cookie_builder(String::new(), secure).build();
    cookie.make_removal();
    cookie
}

fn session_cookie_builder(value: String, secure: bool) -> CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE_NAME, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}
