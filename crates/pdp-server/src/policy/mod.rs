//! Policy state: the active-policy store and definition loading.
//!
//! Definitions are read and compiled outside the store; only finished handles
//! are published.

pub mod store;

use std::fs;
use std::path::Path;

use bytes::Bytes;
use pdp_core::error::{PdpError, Result};
use pdp_core::protocol::PolicySource;
use pdp_core::{PolicyEngine, PolicyHandle};

pub use store::{ActivePolicy, PolicyStore};

/// Read the raw definition for an update. File sources resolve under `root`.
pub fn read_definition(root: &Path, source: &PolicySource) -> Result<Bytes> {
    match source {
        PolicySource::Inline(b) => Ok(b.clone()),
        PolicySource::File(rel) => {
            let full = root.join(rel);
            fs::read(&full).map(Bytes::from).map_err(|e| {
                PdpError::InvalidPolicy(format!("read {} failed: {e}", full.display()))
            })
        }
    }
}

/// Compile the startup policy from `path` (as given, not root-relative).
pub fn load_from_file(engine: &dyn PolicyEngine, path: &str, root: &Path) -> Result<PolicyHandle> {
    if path.trim().is_empty() {
        return Err(PdpError::BadRequest("policy path must not be empty".into()));
    }
    let def = fs::read(path)
        .map_err(|e| PdpError::InvalidPolicy(format!("read {path} failed: {e}")))?;
    engine.compile(&def, root)
}
