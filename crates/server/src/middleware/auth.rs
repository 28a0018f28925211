//! Session extractors.
//!
//! The session token travels in the `storegate_session` cookie, which
//! `BodyIngest` has already parsed into [`Cookies`].

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::models::{SESSION_COOKIE_NAME, SessionToken, User};
use crate::pipeline::Cookies;
use crate::routes::envelope::ApiError;
use crate::services::AuthService;
use crate::state::AppState;

/// The well-formed session token presented by the client, if any.
///
/// Does not touch the database.
#[derive(Debug, Clone)]
pub struct PresentedSession(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for PresentedSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(cookies) = Cookies::from_request_parts(parts, state).await;
        Ok(Self(
            cookies
                .get(SESSION_COOKIE_NAME)
                .and_then(SessionToken::from_cookie),
        ))
    }
}

/// Extractor that requires a signed-in user.
///
/// Rejects with `401` in the API envelope when the cookie is absent,
/// malformed, unknown, or expired.
///
/// ```rust,ignore
/// async fn handler(RequireUser { user, .. }: RequireUser) -> impl IntoResponse {
///     user.name
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireUser {
    pub user: User,
    pub token: SessionToken,
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(PresentedSession(token)) = PresentedSession::from_request_parts(parts, state).await;
        let token = token.ok_or(AppError::Unauthorized)?;

        let pool = state.database().pool()?;
        let user = AuthService::new(pool)
            .current_user(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(Self { user, token })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::header::COOKIE;

    use super::*;

    async fn presented(cookie: Option<&str>) -> Option<SessionToken> {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let (mut parts, _) = builder.body(Body::empty()).unwrap().into_parts();
        let Ok(PresentedSession(token)) = PresentedSession::from_request_parts(&mut parts, &()).await;
        token
    }

    #[tokio::test]
    async fn test_session_cookie_is_read() {
        let token = SessionToken::generate();
        let cookie = format!("theme=dark; {SESSION_COOKIE_NAME}={}", token.as_str());
        assert_eq!(presented(Some(&cookie)).await, Some(token));
    }

    #[tokio::test]
    async fn test_malformed_or_missing_cookie_is_none() {
        assert_eq!(presented(None).await, None);
        assert_eq!(
            presented(Some(&format!("{SESSION_COOKIE_NAME}=nope"))).await,
            None
        );
    }

    #[tokio::test]
    async fn test_require_user_without_cookie_is_unauthorized() {
        let state = AppState::new(crate::config::ServerConfig::for_root("."));
        let (mut parts, _) = Request::builder()
            .uri("/api/auth/me")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = RequireUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();

        assert!(matches!(err.0, AppError::Unauthorized));
    }
}
