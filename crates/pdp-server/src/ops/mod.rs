//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness (both planes)
//! - `/readyz`  : readiness (503 when draining, control plane)
//! - `/metrics` : Prometheus text format (control plane)

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::transport::control::ControlState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(st): State<ControlState>) -> impl IntoResponse {
    if st.metrics.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(st): State<ControlState>) -> Response {
    let extra = [
        ("pdp_policy_version", st.store.version()),
        ("pdp_update_queue_depth", st.queue.len() as u64),
    ];
    let body = st.metrics.render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
