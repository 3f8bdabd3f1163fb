//! Shared fixtures: a temp policy root with an always-permit policy `a` and an
//! always-deny policy `b`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pdp_core::rules::RuleEngine;
use pdp_core::PolicyEngine;
use pdp_server::obs::metrics::PdpMetrics;
use pdp_server::policy::{self, PolicyStore};
use pdp_server::update::{UpdateQueue, UpdateStatus, UpdateWorker};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const POLICY_A: &str = "id: a\ndefault: permit\n";
pub const POLICY_B: &str = "id: b\ndefault: deny\n";
pub const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

pub fn policy_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.yaml"), POLICY_A).unwrap();
    fs::write(dir.path().join("b.yaml"), POLICY_B).unwrap();
    dir
}

pub fn path_str(dir: &Path, file: &str) -> String {
    dir.join(file).to_string_lossy().into_owned()
}

/// Store + queue + running worker, without any transport.
pub struct Pipeline {
    pub dir: TempDir,
    pub store: Arc<PolicyStore>,
    pub queue: Arc<UpdateQueue>,
    pub status: Arc<UpdateStatus>,
    pub metrics: Arc<PdpMetrics>,
    stop: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Must be called inside a tokio runtime.
    pub fn start() -> Self {
        let dir = policy_root();
        let engine: Arc<dyn PolicyEngine> = Arc::new(RuleEngine::new());
        let initial =
            policy::load_from_file(&*engine, &path_str(dir.path(), "a.yaml"), dir.path()).unwrap();

        let store = Arc::new(PolicyStore::new(initial, "a.yaml"));
        let status = Arc::new(UpdateStatus::default());
        let metrics = Arc::new(PdpMetrics::default());
        let (queue, rx) = UpdateQueue::channel();

        let worker = UpdateWorker::new(
            rx,
            Arc::clone(&store),
            engine,
            dir.path().to_path_buf(),
            Arc::clone(&status),
            Arc::clone(&metrics),
        );
        let (stop, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(worker.run(stop_rx));

        Self {
            dir,
            store,
            queue: Arc::new(queue),
            status,
            metrics,
            stop: Some(stop),
            worker: Some(worker),
        }
    }

    /// Stop the worker after it has drained the queue.
    pub async fn drain(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker.await.unwrap();
        }
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
