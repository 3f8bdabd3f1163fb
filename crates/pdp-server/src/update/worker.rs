//! UpdateWorker: the single consumer of the update queue.
//!
//! Each command is compiled on the blocking pool and, on success, published to
//! the store. A failing command is logged and dropped; the active policy stays
//! as it was and the loop moves on.

use std::path::PathBuf;
use std::sync::Arc;

use pdp_core::error::{PdpError, Result};
use pdp_core::{Evaluable, PolicyEngine};
use tokio::sync::oneshot;

use crate::obs::metrics::PdpMetrics;
use crate::policy::{read_definition, PolicyStore};

use super::{AppliedUpdate, FailedUpdate, UpdateCommand, UpdateReceiver, UpdateStatus};

pub struct UpdateWorker {
    rx: UpdateReceiver,
    store: Arc<PolicyStore>,
    engine: Arc<dyn PolicyEngine>,
    root: PathBuf,
    status: Arc<UpdateStatus>,
    metrics: Arc<PdpMetrics>,
}

impl UpdateWorker {
    pub fn new(
        rx: UpdateReceiver,
        store: Arc<PolicyStore>,
        engine: Arc<dyn PolicyEngine>,
        root: PathBuf,
        status: Arc<UpdateStatus>,
        metrics: Arc<PdpMetrics>,
    ) -> Self {
        Self {
            rx,
            store,
            engine,
            root,
            status,
            metrics,
        }
    }

    /// Run until `shutdown` fires (or its sender is dropped). On shutdown the
    /// queue is closed and every command already accepted is still applied.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        tracing::info!("update worker started");
        loop {
            tokio::select! {
                biased;
                maybe = self.rx.recv() => {
                    match maybe {
                        Some(cmd) => self.process(cmd).await,
                        None => break,
                    }
                }
                _ = &mut shutdown => {
                    self.rx.close();
                    while let Some(cmd) = self.rx.recv().await {
                        self.process(cmd).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("update worker stopped");
    }

    /// Loop body: apply one command and record the outcome. A failure ends
    /// here; the loop always moves on to the next command.
    async fn process(&self, cmd: UpdateCommand) {
        match self.apply(&cmd).await {
            Ok(version) => {
                self.metrics.updates.inc(&[("outcome", "applied")]);
                self.status.record_applied(AppliedUpdate {
                    seq: cmd.seq,
                    id: cmd.id.clone(),
                    version,
                });
                tracing::info!(
                    seq = cmd.seq,
                    update = %cmd.id,
                    version,
                    waited_ms = cmd.received_at.elapsed().as_millis() as u64,
                    "policy update applied"
                );
            }
            Err(e) => {
                self.metrics.updates.inc(&[("outcome", "failed")]);
                self.status.record_failed(FailedUpdate {
                    seq: cmd.seq,
                    id: cmd.id.clone(),
                    error: e.to_string(),
                });
                tracing::error!(
                    seq = cmd.seq,
                    update = %cmd.id,
                    source = %cmd.source.describe(),
                    error = %e,
                    "policy update discarded"
                );
            }
        }
    }

    /// Compile one command and publish it on success. Returns the new store
    /// version; on error the store is untouched.
    pub async fn apply(&self, cmd: &UpdateCommand) -> Result<u64> {
        let engine = Arc::clone(&self.engine);
        let root = self.root.clone();
        let source = cmd.source.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let def = read_definition(&root, &source)?;
            engine.compile(&def, &root)
        })
        .await
        .map_err(|e| PdpError::Internal(format!("compile task failed: {e}")))??;

        tracing::debug!(seq = cmd.seq, policy = %handle.id(), "policy compiled");
        Ok(self
            .store
            .swap(handle, format!("update {} (seq {})", cmd.id, cmd.seq)))
    }
}
