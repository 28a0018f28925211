//! Assembly of the full HTTP stack.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Request, header::X_CONTENT_TYPE_OPTIONS},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use storegate_core::PolicyError;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::pipeline::{Pipeline, pipeline_middleware};
use crate::routes::{Dispatcher, Mounts};
use crate::state::AppState;
use crate::static_files::StaticGateway;

/// The application with the standard mounts.
///
/// # Errors
///
/// Returns [`PolicyError`] if the configured policy cannot be applied.
pub fn app(state: &AppState) -> Result<Router, PolicyError> {
    app_with_mounts(state, Mounts::standard(state))
}

/// The application over an explicit mount list.
///
/// # Errors
///
/// Returns [`PolicyError`] if the configured policy cannot be applied.
#[allow(deprecated)]
pub fn app_with_mounts(state: &AppState, mounts: Mounts) -> Result<Router, PolicyError> {
    let pipeline = Arc::new(Pipeline::standard(state.policy())?);
    tracing::debug!(stages = ?pipeline.stage_names(), mounts = ?mounts.order(), "Building router");

    let dispatcher = Dispatcher::new(mounts, StaticGateway::from_config(state.config()));

    Ok(dispatcher
        .into_router()
        .layer(CatchPanicLayer::custom(handle_panic))
        // Inside the pipeline so a 408 still gets the policy headers.
        .layer(TimeoutLayer::new(state.config().request_timeout))
        .layer(from_fn_with_state(pipeline, pipeline_middleware))
        // Re-asserted for anything answered outside the pipeline.
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        ))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}
