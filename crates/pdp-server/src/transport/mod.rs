//! Transports: one bound listener plus one axum server per plane.
//!
//! The request plane and the control plane each own their listener and serve
//! task; stopping or losing one never touches the other.

pub mod control;
pub mod decision;
pub mod error;

use std::net::SocketAddr;

use axum::Router;
use pdp_core::error::{PdpError, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use error::ApiError;

/// A bound, not yet serving, listener.
#[derive(Debug)]
pub struct Transport {
    plane: &'static str,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Transport {
    pub async fn bind(plane: &'static str, addr: &str) -> Result<Self> {
        tracing::info!(plane, address = %addr, "opening port");
        let bind_err = |reason: String| PdpError::Bind {
            addr: addr.to_string(),
            reason,
        };

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| bind_err(e.to_string()))?;
        let local_addr = listener.local_addr().map_err(|e| bind_err(e.to_string()))?;

        Ok(Self {
            plane,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve `router` until `stop` fires; in-flight calls finish first.
    pub fn spawn(self, router: Router, stop: oneshot::Receiver<()>) -> JoinHandle<()> {
        let Transport {
            plane,
            listener,
            local_addr,
        } = self;

        tokio::spawn(async move {
            tracing::info!(plane, %local_addr, "serving");
            let res = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.await;
                })
                .await;
            match res {
                Ok(()) => tracing::info!(plane, "transport stopped"),
                Err(e) => tracing::error!(plane, error = %e, "transport failed"),
            }
        })
    }
}
