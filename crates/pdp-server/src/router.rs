//! Axum router wiring for both planes.
//!
//! Request plane: `/v1/decide` (behind the tracing interceptor) + `/healthz`.
//! Control plane: `/v1/policy` submit/status + ops endpoints. Never traced.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::obs::trace::{self, SharedInterceptor};
use crate::ops;
use crate::transport::{control, control::ControlState, decision, decision::DecisionState};

pub fn build_request_router(state: DecisionState, interceptor: SharedInterceptor) -> Router {
    Router::new()
        .route("/v1/decide", post(decision::decide))
        // route_layer: only the routes above are intercepted
        .route_layer(middleware::from_fn_with_state(interceptor, trace::intercept))
        .route("/healthz", get(ops::healthz))
        .with_state(state)
}

pub fn build_control_router(state: ControlState) -> Router {
    Router::new()
        .route("/v1/policy", post(control::submit).get(control::status))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
