//! Observability: logging setup, in-process metrics, request-plane tracing.
//!
//! Metrics are stored as atomics and rendered by the control plane `/metrics`
//! handler. Tracing spans are opt-in per call (see [`trace`]).

pub mod metrics;
pub mod trace;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber. `RUST_LOG` wins over `level`.
/// A second call is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).try_init();
}
