//! Control service (control plane).
//!
//! `POST /v1/policy` validates the request shape, queues it and acknowledges
//! immediately: 202 means "accepted for processing", not "applied". Malformed
//! requests are rejected here and never reach the queue.
//!
//! `GET /v1/policy` reports the active policy and the last asynchronous update
//! outcomes recorded by the worker.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use pdp_core::error::PdpError;
use pdp_core::protocol::{PolicyUpdateRequest, UpdateAck};
use pdp_core::Evaluable;
use serde::Serialize;

use crate::obs::metrics::PdpMetrics;
use crate::policy::PolicyStore;
use crate::update::{AppliedUpdate, FailedUpdate, UpdateQueue, UpdateStatus};

use super::ApiError;

#[derive(Clone)]
pub struct ControlState {
    pub queue: Arc<UpdateQueue>,
    pub store: Arc<PolicyStore>,
    pub status: Arc<UpdateStatus>,
    pub metrics: Arc<PdpMetrics>,
}

pub async fn submit(
    State(st): State<ControlState>,
    body: Result<Json<PolicyUpdateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UpdateAck>), ApiError> {
    let (id, source) = body
        .map_err(|e| PdpError::BadRequest(format!("invalid control request: {e}")))
        .and_then(|Json(raw)| raw.validate())
        .map_err(|e| {
            st.metrics.updates.inc(&[("outcome", "rejected")]);
            tracing::warn!(error = %e, "control request rejected");
            e
        })?;

    let described = source.describe();
    let seq = st.queue.enqueue(id.clone(), source)?;

    st.metrics.updates.inc(&[("outcome", "accepted")]);
    tracing::info!(seq, update = %id, source = %described, "policy update accepted");

    Ok((StatusCode::ACCEPTED, Json(UpdateAck::accepted(seq, id))))
}

#[derive(Debug, Serialize)]
pub struct PolicyStatus {
    pub policy: String,
    pub source: String,
    pub version: u64,
    pub queue_depth: usize,
    pub accepted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<AppliedUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failed: Option<FailedUpdate>,
}

pub async fn status(State(st): State<ControlState>) -> Json<PolicyStatus> {
    let active = st.store.get();
    Json(PolicyStatus {
        policy: active.handle.id().to_string(),
        source: active.source.clone(),
        version: active.version,
        queue_depth: st.queue.len(),
        accepted: st.queue.accepted(),
        last_applied: st.status.last_applied(),
        last_failed: st.status.last_failed(),
    })
}
