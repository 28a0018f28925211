//! Request-ingress pipeline.
//!
//! Every request passes through an explicit, ordered list of stages before it
//! reaches the router:
//!
//! 1. [`HeaderPolicy`] - CSP, nosniff, server-identity suppression
//! 2. [`PathGuard`] - 403 for dotfiles and VCS metadata
//! 3. [`OriginPolicy`] - CORS allow-list, preflight short-circuit
//! 4. [`BodyIngest`] - JSON / form / cookie parsing
//!
//! The driver calls each stage's [`Stage::handle`] in order. A stage either
//! passes the request on or answers it; an `Err` is rendered by
//! [`AppError`]'s `IntoResponse` so every failure gets the same generic
//! treatment. On the way out, [`Stage::finish`] runs in reverse order for
//! every stage that was entered, which is how a 403 from `PathGuard` still
//! carries the headers `HeaderPolicy` guarantees.

pub mod body;
pub mod headers;
pub mod origin;
pub mod path_guard;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use storegate_core::{ContentSecurityPolicy, HiddenPathPattern, OriginAllowList, PolicyError};

use crate::error::AppError;

pub use body::{BodyIngest, Cookies, Ingested, IngestedBody, Payload};
pub use headers::HeaderPolicy;
pub use origin::OriginPolicy;
pub use path_guard::PathGuard;

/// What a stage decided about a request.
pub enum Flow {
    /// Hand the (possibly enriched) request to the next stage.
    Continue(Request),
    /// Answer now; no later stage or route runs.
    Respond(Response),
}

/// The parts of the inbound request that stages need after the request
/// itself has been handed downstream.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Path exactly as received, before any decoding.
    pub raw_path: String,
    pub origin: Option<HeaderValue>,
}

impl RequestHead {
    #[must_use]
    pub fn of(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            raw_path: request.uri().path().to_owned(),
            origin: request.headers().get(header::ORIGIN).cloned(),
        }
    }
}

/// One cross-cutting policy in the ingress pipeline.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs and in ordering assertions.
    fn name(&self) -> &'static str;

    /// Inspect the request and decide whether it continues.
    async fn handle(&self, request: Request) -> Result<Flow, AppError>;

    /// Adjust the outbound response. Runs for every response to a request
    /// this stage handled, including ones produced by earlier failures.
    fn finish(&self, _head: &RequestHead, _response: &mut Response) {}
}

/// Immutable policy values shared by every stage.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub csp: ContentSecurityPolicy,
    pub origins: OriginAllowList,
    pub hidden_paths: HiddenPathPattern,
    /// Largest request body `BodyIngest` will buffer.
    pub body_limit: usize,
}

impl PolicyConfig {
    /// The storefront policy with the given body limit.
    #[must_use]
    pub fn storefront(body_limit: usize) -> Self {
        Self {
            csp: ContentSecurityPolicy::storefront(),
            origins: OriginAllowList::default(),
            hidden_paths: HiddenPathPattern::default(),
            body_limit,
        }
    }

    /// Replace the origin allow-list.
    #[must_use]
    pub fn with_origins(mut self, origins: OriginAllowList) -> Self {
        self.origins = origins;
        self
    }
}

/// Ordered stage list plus the driver loop.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// A pipeline over exactly these stages, in this order.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// HeaderPolicy → PathGuard → OriginPolicy → BodyIngest.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if the CSP cannot be encoded as a header value.
    pub fn standard(policy: &Arc<PolicyConfig>) -> Result<Self, PolicyError> {
        Ok(Self::new(vec![
            Arc::new(HeaderPolicy::new(policy)?),
            Arc::new(PathGuard::new(Arc::clone(policy))),
            Arc::new(OriginPolicy::new(Arc::clone(policy))),
            Arc::new(BodyIngest::new(Arc::clone(policy))),
        ]))
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Drive `request` through every stage, then `downstream`, then every
    /// entered stage's `finish` in reverse.
    pub async fn run<F, Fut>(&self, request: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let head = RequestHead::of(&request);
        let (entered, outcome) = self.enter(request).await;

        let mut response = match outcome {
            Ok(request) => downstream(request).await,
            Err(response) => response,
        };

        for stage in self.stages.iter().take(entered).rev() {
            stage.finish(&head, &mut response);
        }

        response
    }

    async fn enter(&self, mut request: Request) -> (usize, Result<Request, Response>) {
        for (index, stage) in self.stages.iter().enumerate() {
            match stage.handle(request).await {
                Ok(Flow::Continue(next)) => request = next,
                Ok(Flow::Respond(response)) => {
                    tracing::debug!(stage = stage.name(), status = %response.status(), "Stage answered request");
                    return (index + 1, Err(response));
                }
                Err(err) => {
                    tracing::debug!(stage = stage.name(), error = %err, "Stage rejected request");
                    return (index + 1, Err(err.into_response()));
                }
            }
        }
        (self.stages.len(), Ok(request))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Axum middleware that runs the pipeline around the rest of the stack.
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    pipeline.run(request, |request| next.run(request)).await
}
