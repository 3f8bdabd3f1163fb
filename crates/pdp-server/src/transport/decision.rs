//! Decision service (request plane).
//!
//! Reads the active policy once per call and hands the request to it. No
//! mutation, no lock held beyond `PolicyStore::get`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use pdp_core::error::PdpError;
use pdp_core::protocol::{DecisionRequest, DecisionResponse};
use pdp_core::Evaluable;

use crate::obs::metrics::PdpMetrics;
use crate::obs::trace::TraceContext;
use crate::policy::PolicyStore;

use super::ApiError;

/// Handles the decision handler needs, nothing more.
#[derive(Clone)]
pub struct DecisionState {
    pub store: Arc<PolicyStore>,
    pub metrics: Arc<PdpMetrics>,
}

/// Holds one slot of `pdp_decisions_inflight`; released on drop, so an
/// unwinding policy cannot leak the gauge.
struct Inflight<'a>(&'a PdpMetrics);

impl<'a> Inflight<'a> {
    fn enter(metrics: &'a PdpMetrics) -> Self {
        metrics.decisions_inflight.inc(&[]);
        Self(metrics)
    }
}

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        self.0.decisions_inflight.dec(&[]);
    }
}

pub async fn decide(
    State(st): State<DecisionState>,
    trace: Option<Extension<TraceContext>>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        st.metrics.decision_errors.inc(&[("code", "BAD_REQUEST")]);
        PdpError::BadRequest(format!("invalid decision request: {e}"))
    })?;

    let started = Instant::now();
    let active = st.store.get();
    let res = {
        let _inflight = Inflight::enter(&st.metrics);
        active.handle.decide(&req)
    };
    st.metrics.decision_duration.observe(&[], started.elapsed());

    let trace_id = trace.as_ref().map(|Extension(t)| t.trace_id.as_str());
    match res {
        Ok(resp) => {
            st.metrics.decisions.inc(&[("effect", resp.effect.as_str())]);
            tracing::debug!(
                policy = %resp.policy,
                version = active.version,
                effect = %resp.effect,
                trace_id = trace_id.unwrap_or(""),
                "decision"
            );
            Ok(Json(resp))
        }
        Err(e) => {
            st.metrics
                .decision_errors
                .inc(&[("code", e.client_code().as_str())]);
            tracing::warn!(
                policy = %active.handle.id(),
                version = active.version,
                error = %e,
                trace_id = trace_id.unwrap_or(""),
                "decision failed"
            );
            Err(e.into())
        }
    }
}
