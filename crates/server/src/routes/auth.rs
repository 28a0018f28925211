//! Account route handlers.
//!
//! Mounted at the root for exactly these paths:
//!
//! ```text
//! POST /api/auth/signup  - create account, start session
//! POST /api/auth/login   - verify password, start session
//! POST /api/auth/logout  - end session, clear cookie
//! GET  /api/auth/me      - current user
//! ```

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use cookie::Cookie;
use serde::Deserialize;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{PresentedSession, RequireUser};
use crate::models::{PublicUser, removal_cookie, session_cookie};
use crate::pipeline::Payload;
use crate::routes::envelope::{ApiResult, Envelope};
use crate::services::AuthService;
use crate::state::AppState;

/// Paths owned by this router; nothing else under `/api/auth` is claimed.
pub const PATHS: &[&str] = &[
    "/api/auth/signup",
    "/api/auth/login",
    "/api/auth/logout",
    "/api/auth/me",
];

/// Create the account router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Signup form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Create an account and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    Payload(form): Payload<SignupForm>,
) -> ApiResult<impl IntoResponse> {
    let (Some(name), Some(email), Some(password)) = (form.name, form.email, form.password) else {
        return Err(AppError::Validation("Please provide all fields".to_string()).into());
    };

    let pool = state.database().pool()?;
    let (user, token) = AuthService::new(pool)
        .signup(&name, &email, &password)
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    let cookie = set_cookie(&session_cookie(
        &token,
        state.config().environment.is_production(),
    ))?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Envelope::created(PublicUser::from(&user)),
    ))
}

/// Verify credentials and sign in.
pub async fn login(
    State(state): State<AppState>,
    Payload(form): Payload<LoginForm>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(password)) = (form.email, form.password) else {
        return Err(AppError::Validation("Please provide all fields".to_string()).into());
    };

    let pool = state.database().pool()?;
    let (user, token) = AuthService::new(pool).login(&email, &password).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    let cookie = set_cookie(&session_cookie(
        &token,
        state.config().environment.is_production(),
    ))?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Envelope::ok(PublicUser::from(&user)),
    ))
}

/// End the current session. Succeeds even without one.
pub async fn logout(
    State(state): State<AppState>,
    PresentedSession(token): PresentedSession,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = token {
        let pool = state.database().pool()?;
        AuthService::new(pool).logout(&token).await?;
    }

    clear_sentry_user();
    let cookie = set_cookie(&removal_cookie(state.config().environment.is_production()))?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Envelope::ok(serde_json::Value::Null),
    ))
}

/// The signed-in user.
pub async fn me(RequireUser { user, .. }: RequireUser) -> Envelope<PublicUser> {
    Envelope::ok(PublicUser::from(&user))
}

/// Render `cookie` as a `Set-Cookie` header value.
fn set_cookie(cookie: &Cookie<'_>) -> Result<HeaderValue, AppError> {
    HeaderValue::try_from(cookie.encoded().to_string())
        .map_err(|e| AppError::Internal(format!("session cookie is not a valid header: {e}")))
}
