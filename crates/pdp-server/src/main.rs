//! PDP server binary.
//!
//! Usage: `pdp-server [config.yaml]` (falls back to `PDP_CONFIG`, then
//! `pdpserver.yaml`). Exits 1 if config, policy load, or either bind fails.

use std::process::ExitCode;

use pdp_server::{config, obs, run, shutdown_signal};

#[tokio::main]
async fn main() -> ExitCode {
    let path = config::resolve_path(std::env::args().nth(1));
    let cfg = config::load_from_file(&path);

    let level = cfg
        .as_ref()
        .map(|c| c.server.log_level.as_str())
        .unwrap_or("info");
    obs::init_logging(level);

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(config = %path, error = %e, "failed to load config");
            return ExitCode::from(1);
        }
    };

    tracing::info!(config = %path, "starting PDP server");
    match run(cfg, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "PDP server failed");
            ExitCode::from(1)
        }
    }
}
