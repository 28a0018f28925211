//! Middleware and extractors outside the ingress pipeline.
//!
//! # Layer Order (outermost first)
//!
//! 1. Sentry layers (added by the binary)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (correlation id on span, Sentry scope, response)
//! 4. `nosniff` re-assertion (covers responses built outside the pipeline)
//! 5. Ingress pipeline (see [`crate::pipeline`])
//! 6. `TimeoutLayer` (408)
//! 7. `CatchPanicLayer` (generic 500)
//! 8. Dispatcher (mounted routers, then static gateway)

pub mod auth;
pub mod request_id;

pub use auth::{PresentedSession, RequireUser};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
