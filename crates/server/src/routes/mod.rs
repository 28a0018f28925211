//! Request routing.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                - Liveness
//! GET    /health/ready          - Readiness (503 until the database connects)
//!
//! # Auth (root-mounted, exact paths only)
//! POST   /api/auth/signup
//! POST   /api/auth/login
//! POST   /api/auth/logout
//! GET    /api/auth/me
//!
//! # Products (nested)
//! GET    /api/products
//! POST   /api/products
//! PUT    /api/products/{id}
//! DELETE /api/products/{id}
//!
//! # Everything else
//! GET    /sitemap.xml, /robots.txt, and (production) assets + SPA entry
//! ```
//!
//! Dispatch walks [`Mounts`] in order and hands the request to the first
//! mount whose rule claims the path. A root-mounted router therefore only
//! shadows the exact paths it lists. Requests no mount claims go to the
//! [`StaticGateway`].

pub mod auth;
pub mod envelope;
pub mod health;
pub mod products;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    response::Response,
};
use tower::ServiceExt;

use crate::error::AppError;
use crate::state::AppState;
use crate::static_files::StaticGateway;

/// Which paths a mount claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountRule {
    /// Exactly these paths.
    Exact(&'static [&'static str]),
    /// The prefix itself and everything below it (`/p`, `/p/...`), but not `/pfoo`.
    Prefix(&'static str),
}

impl MountRule {
    #[must_use]
    pub fn matches(self, path: &str) -> bool {
        match self {
            Self::Exact(paths) => paths.contains(&path),
            Self::Prefix(prefix) => path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

/// A named router and the paths it owns.
#[derive(Clone)]
pub struct Mount {
    name: &'static str,
    rule: MountRule,
    router: Router,
}

impl Mount {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// The ordered mount list. Earlier mounts win.
#[derive(Clone, Default)]
pub struct Mounts {
    mounts: Vec<Mount>,
}

impl Mounts {
    /// Health, then auth at the root, then products under `/api/products`.
    #[must_use]
    pub fn standard(state: &AppState) -> Self {
        Self::default()
            .mount(
                "health",
                MountRule::Exact(health::PATHS),
                health::routes().with_state(state.clone()),
            )
            .mount(
                "auth",
                MountRule::Exact(auth::PATHS),
                auth::routes().with_state(state.clone()),
            )
            .mount(
                "products",
                MountRule::Prefix(products::PREFIX),
                Router::new()
                    .nest(products::PREFIX, products::routes())
                    .with_state(state.clone()),
            )
    }

    /// Append a mount. Paths the rule claims but the router does not route
    /// get a 404 from the mount itself.
    #[must_use]
    pub fn mount(mut self, name: &'static str, rule: MountRule, router: Router) -> Self {
        self.mounts.push(Mount {
            name,
            rule,
            router: router.fallback(route_not_found),
        });
        self
    }

    /// Mount names in precedence order.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.mounts.iter().map(Mount::name).collect()
    }

    /// The first mount claiming `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|mount| mount.rule.matches(path))
    }
}

impl std::fmt::Debug for Mounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.order()).finish()
    }
}

/// Innermost service: mounted routers first, then static files.
#[derive(Clone)]
pub struct Dispatcher {
    mounts: Arc<Mounts>,
    gateway: Arc<StaticGateway>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(mounts: Mounts, gateway: StaticGateway) -> Self {
        Self {
            mounts: Arc::new(mounts),
            gateway: Arc::new(gateway),
        }
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        match self.mounts.resolve(request.uri().path()) {
            Some(mount) => {
                tracing::trace!(mount = mount.name, "Dispatching to mount");
                mount
                    .router
                    .clone()
                    .oneshot(request)
                    .await
                    .unwrap_or_else(|never| match never {})
            }
            None => self.gateway.serve(request).await,
        }
    }

    /// Wrap as a router whose every request is dispatched.
    #[must_use]
    pub fn into_router(self) -> Router {
        Router::new().fallback(dispatch).with_state(self)
    }
}

async fn dispatch(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route".to_string())
}
