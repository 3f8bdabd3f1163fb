use std::net::SocketAddr;

use pdp_core::error::{PdpError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdpConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    /// Optional; any problem here degrades to untraced service.
    #[serde(default)]
    pub tracing: Option<TracingSection>,
}

impl PdpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PdpError::UnsupportedVersion);
        }

        self.server.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Root for resolving relative policy resources.
    #[serde(default = "default_root")]
    pub root: String,

    /// Initial policy file. Empty fails at startup, not at parse time.
    #[serde(default)]
    pub policy: String,

    #[serde(default = "default_service_listen")]
    pub service_listen: String,

    #[serde(default = "default_control_listen")]
    pub control_listen: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            policy: String::new(),
            service_listen: default_service_listen(),
            control_listen: default_control_listen(),
            log_level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        let service = parse_addr("server.service_listen", &self.service_listen)?;
        let control = parse_addr("server.control_listen", &self.control_listen)?;
        // port 0 binds an ephemeral port per listener, never a conflict
        if service == control && service.port() != 0 {
            return Err(PdpError::BadRequest(
                "server.service_listen and server.control_listen must differ".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(PdpError::BadRequest(format!(
                "server.log_level must be one of {}",
                LOG_LEVELS.join("|")
            )));
        }
        Ok(())
    }
}

fn parse_addr(field: &str, raw: &str) -> Result<SocketAddr> {
    raw.parse()
        .map_err(|_| PdpError::BadRequest(format!("{field} must be a valid SocketAddr: {raw}")))
}

fn default_root() -> String {
    ".".into()
}
fn default_service_listen() -> String {
    "0.0.0.0:5555".into()
}
fn default_control_listen() -> String {
    "0.0.0.0:5554".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingSection {
    /// "log" or "zipkin".
    #[serde(default)]
    pub backend: String,

    #[serde(default)]
    pub endpoint: Option<String>,
}
