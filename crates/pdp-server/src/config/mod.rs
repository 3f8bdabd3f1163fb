//! Server config loader (strict parsing).

pub mod schema;

use std::fs;

use pdp_core::error::{PdpError, Result};

pub use schema::{PdpConfig, ServerSection, TracingSection};

/// Default config file when neither a CLI argument nor `PDP_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "pdpserver.yaml";

/// Config path: first CLI argument, else `PDP_CONFIG`, else the default.
pub fn resolve_path(arg: Option<String>) -> String {
    arg.or_else(|| std::env::var("PDP_CONFIG").ok())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_from_file(path: &str) -> Result<PdpConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PdpError::Internal(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PdpConfig> {
    let cfg: PdpConfig = serde_yaml::from_str(s)
        .map_err(|e| PdpError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
