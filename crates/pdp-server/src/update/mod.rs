//! Policy update pipeline: queue (control plane side) and worker (store side).

pub mod queue;
pub mod worker;

use std::sync::Mutex;

use serde::Serialize;

pub use queue::{UpdateCommand, UpdateQueue, UpdateReceiver};
pub use worker::UpdateWorker;

#[derive(Debug, Clone, Serialize)]
pub struct AppliedUpdate {
    pub seq: u64,
    pub id: String,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpdate {
    pub seq: u64,
    pub id: String,
    pub error: String,
}

/// Last asynchronous outcomes, written by the worker, read by the control plane.
#[derive(Debug, Default)]
pub struct UpdateStatus {
    applied: Mutex<Option<AppliedUpdate>>,
    failed: Mutex<Option<FailedUpdate>>,
}

impl UpdateStatus {
    pub fn record_applied(&self, update: AppliedUpdate) {
        *self.applied.lock().unwrap_or_else(|e| e.into_inner()) = Some(update);
    }

    pub fn record_failed(&self, update: FailedUpdate) {
        *self.failed.lock().unwrap_or_else(|e| e.into_inner()) = Some(update);
    }

    pub fn last_applied(&self) -> Option<AppliedUpdate> {
        self.applied.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_failed(&self) -> Option<FailedUpdate> {
        self.failed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
