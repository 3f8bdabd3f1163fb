//! Server aggregate and lifecycle.
//!
//! `Server` is built step by step (root, policy, request port, control port)
//! and nothing accepts connections until [`Server::start`]. Components get only
//! the handles they use: the request plane sees the store, the control plane
//! sees the queue, the worker owns the receiver.
//!
//! Shutdown order: mark draining, stop the control plane, let the worker apply
//! everything already accepted, then stop the request plane.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use pdp_core::error::{PdpError, Result};
use pdp_core::rules::RuleEngine;
use pdp_core::{Evaluable, PolicyEngine};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::PdpConfig;
use crate::obs::metrics::PdpMetrics;
use crate::obs::trace::{self, SharedInterceptor};
use crate::policy::{self, PolicyStore};
use crate::router::{build_control_router, build_request_router};
use crate::transport::control::ControlState;
use crate::transport::decision::DecisionState;
use crate::transport::Transport;
use crate::update::{UpdateQueue, UpdateReceiver, UpdateStatus, UpdateWorker};

pub struct Server {
    root: PathBuf,
    engine: Arc<dyn PolicyEngine>,
    store: Option<Arc<PolicyStore>>,
    queue: Arc<UpdateQueue>,
    receiver: UpdateReceiver,
    status: Arc<UpdateStatus>,
    metrics: Arc<PdpMetrics>,
    requests: Option<Transport>,
    control: Option<Transport>,
}

impl Server {
    /// `root` resolves relative policy resources and must be a directory.
    pub fn new(root: impl Into<PathBuf>, engine: Arc<dyn PolicyEngine>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PdpError::BadRequest(format!(
                "policy root is not a directory: {}",
                root.display()
            )));
        }

        let (queue, receiver) = UpdateQueue::channel();
        Ok(Self {
            root,
            engine,
            store: None,
            queue: Arc::new(queue),
            receiver,
            status: Arc::new(UpdateStatus::default()),
            metrics: Arc::new(PdpMetrics::default()),
            requests: None,
            control: None,
        })
    }

    /// Compile the initial policy. Fails on an empty path or compile error.
    pub fn load_policy(&mut self, path: &str) -> Result<()> {
        tracing::info!(policy = %path, "loading policy");
        let handle = policy::load_from_file(&*self.engine, path, &self.root)
            .map_err(|e| {
                tracing::error!(policy = %path, error = %e, "failed to load policy");
                e
            })?;

        tracing::info!(policy = %path, id = %handle.id(), "policy loaded");
        match self.store.clone() {
            Some(store) => {
                store.swap(handle, path);
            }
            None => self.store = Some(Arc::new(PolicyStore::new(handle, path))),
        }
        Ok(())
    }

    pub async fn listen_requests(&mut self, addr: &str) -> Result<SocketAddr> {
        let t = Transport::bind("request", addr).await.map_err(|e| {
            tracing::error!(address = %addr, error = %e, "failed to open service port");
            e
        })?;
        let local = t.local_addr();
        self.requests = Some(t);
        Ok(local)
    }

    pub async fn listen_control(&mut self, addr: &str) -> Result<SocketAddr> {
        let t = Transport::bind("control", addr).await.map_err(|e| {
            tracing::error!(address = %addr, error = %e, "failed to open control port");
            e
        })?;
        let local = t.local_addr();
        self.control = Some(t);
        Ok(local)
    }

    pub fn store(&self) -> Option<Arc<PolicyStore>> {
        self.store.clone()
    }

    /// Spawn the worker and both transports.
    pub fn start(self, interceptor: SharedInterceptor) -> Result<RunningServer> {
        let store = self
            .store
            .ok_or_else(|| PdpError::Internal("start called before load_policy".into()))?;
        let requests = self
            .requests
            .ok_or_else(|| PdpError::Internal("start called before listen_requests".into()))?;
        let control = self
            .control
            .ok_or_else(|| PdpError::Internal("start called before listen_control".into()))?;

        let request_addr = requests.local_addr();
        let control_addr = control.local_addr();

        let (worker_stop, worker_rx) = oneshot::channel();
        let worker = UpdateWorker::new(
            self.receiver,
            Arc::clone(&store),
            self.engine,
            self.root,
            Arc::clone(&self.status),
            Arc::clone(&self.metrics),
        );
        let worker_task = tokio::spawn(worker.run(worker_rx));

        tracing::info!("creating control protocol handler");
        let (control_stop, control_rx) = oneshot::channel();
        let control_router = build_control_router(ControlState {
            queue: Arc::clone(&self.queue),
            store: Arc::clone(&store),
            status: Arc::clone(&self.status),
            metrics: Arc::clone(&self.metrics),
        });
        let control_task = control.spawn(control_router, control_rx);

        tracing::info!(traced = interceptor.enabled(), "creating service protocol handler");
        let (request_stop, request_rx) = oneshot::channel();
        let request_router = build_request_router(
            DecisionState {
                store: Arc::clone(&store),
                metrics: Arc::clone(&self.metrics),
            },
            interceptor,
        );
        let request_task = requests.spawn(request_router, request_rx);

        Ok(RunningServer {
            request_addr,
            control_addr,
            store,
            queue: self.queue,
            status: self.status,
            metrics: self.metrics,
            control_stop: Some(control_stop),
            control_task: Some(control_task),
            worker_stop,
            worker_task,
            request_stop: Some(request_stop),
            request_task: Some(request_task),
        })
    }

    /// Start, wait for `shutdown`, then stop in order.
    pub async fn serve(
        self,
        interceptor: SharedInterceptor,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let running = self.start(interceptor)?;
        shutdown.await;
        running.shutdown().await
    }
}

pub struct RunningServer {
    request_addr: SocketAddr,
    control_addr: SocketAddr,
    store: Arc<PolicyStore>,
    queue: Arc<UpdateQueue>,
    status: Arc<UpdateStatus>,
    metrics: Arc<PdpMetrics>,
    control_stop: Option<oneshot::Sender<()>>,
    control_task: Option<JoinHandle<()>>,
    worker_stop: oneshot::Sender<()>,
    worker_task: JoinHandle<()>,
    request_stop: Option<oneshot::Sender<()>>,
    request_task: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn request_addr(&self) -> SocketAddr {
        self.request_addr
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn store(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.store)
    }

    pub fn queue(&self) -> Arc<UpdateQueue> {
        Arc::clone(&self.queue)
    }

    pub fn status(&self) -> Arc<UpdateStatus> {
        Arc::clone(&self.status)
    }

    pub fn metrics(&self) -> Arc<PdpMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop only the control plane. The request plane keeps serving.
    pub async fn stop_control(&mut self) {
        if let Some(tx) = self.control_stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.control_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "control transport task failed");
            }
        }
    }

    /// Stop only the request plane. The control plane keeps accepting and
    /// the worker keeps applying updates.
    pub async fn stop_requests(&mut self) {
        if let Some(tx) = self.request_stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.request_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "request transport task failed");
            }
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        tracing::info!("shutting down");
        self.metrics.set_draining();

        self.stop_control().await;

        let _ = self.worker_stop.send(());
        self.worker_task
            .await
            .map_err(|e| PdpError::Internal(format!("update worker failed: {e}")))?;

        if let Some(tx) = self.request_stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.request_task.take() {
            task.await
                .map_err(|e| PdpError::Internal(format!("request transport failed: {e}")))?;
        }

        tracing::info!(version = self.store.version(), "shutdown complete");
        Ok(())
    }
}

/// Full startup sequence from config. Every step is fatal except tracing.
pub async fn run(cfg: PdpConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
    let engine: Arc<dyn PolicyEngine> = Arc::new(RuleEngine::new());

    let mut server = Server::new(&cfg.server.root, engine)?;
    server.load_policy(&cfg.server.policy)?;
    server.listen_requests(&cfg.server.service_listen).await?;
    server.listen_control(&cfg.server.control_listen).await?;

    let interceptor = match trace::init(cfg.tracing.as_ref()).await {
        Ok(i) => {
            tracing::info!("tracing enabled");
            i
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not initialize tracing");
            trace::disabled()
        }
    };

    server.serve(interceptor, shutdown).await
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
