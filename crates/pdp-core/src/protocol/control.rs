//! Control-plane messages and synchronous shape validation.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{PdpError, Result};

/// Raw policy update body as received on the control plane.
///
/// Exactly one of `policy` (inline definition) or `path` (file under the
/// server root) must be set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyUpdateRequest {
    pub id: String,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Where a policy definition comes from.
#[derive(Debug, Clone)]
pub enum PolicySource {
    Inline(Bytes),
    /// Path relative to the server root directory.
    File(PathBuf),
}

impl PolicySource {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            PolicySource::Inline(b) => format!("inline ({} bytes)", b.len()),
            PolicySource::File(p) => format!("file {}", p.display()),
        }
    }
}

impl PolicyUpdateRequest {
    /// Check the minimal shape of the request and extract its source.
    pub fn validate(self) -> Result<(String, PolicySource)> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(PdpError::BadRequest("id must not be empty".into()));
        }

        let source = match (self.policy, self.path) {
            (Some(_), Some(_)) => {
                return Err(PdpError::BadRequest(
                    "exactly one of policy or path must be set".into(),
                ))
            }
            (None, None) => {
                return Err(PdpError::BadRequest("policy or path is required".into()))
            }
            (Some(def), None) => {
                if def.trim().is_empty() {
                    return Err(PdpError::BadRequest("policy must not be empty".into()));
                }
                PolicySource::Inline(Bytes::from(def))
            }
            (None, Some(path)) => PolicySource::File(validate_relative_path(&path)?),
        };

        Ok((id.to_string(), source))
    }
}

/// Accept only plain relative paths so control callers cannot reach outside the root.
fn validate_relative_path(raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(PdpError::BadRequest("path must not be empty".into()));
    }
    let p = Path::new(raw);
    for c in p.components() {
        match c {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(PdpError::BadRequest(format!(
                    "path must be relative to the policy root: {raw}"
                )))
            }
        }
    }
    Ok(p.to_path_buf())
}

/// Acknowledgement returned once an update is queued (not yet applied).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAck {
    pub status: String,
    pub seq: u64,
    pub id: String,
}

impl UpdateAck {
    pub fn accepted(seq: u64, id: String) -> Self {
        Self {
            status: "accepted".into(),
            seq,
            id,
        }
    }
}
