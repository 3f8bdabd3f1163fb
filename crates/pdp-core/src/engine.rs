//! Policy-engine seam.
//!
//! The serving core only needs two capabilities from a policy language:
//! compile a definition into an opaque evaluable object, and decide a request
//! against such an object. Handles are immutable; a new policy is a new handle.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{DecisionRequest, DecisionResponse};

/// A compiled, immutable policy.
pub trait Evaluable: Send + Sync {
    /// Policy identifier as declared by its definition.
    fn id(&self) -> &str;

    /// Decide a request. Fails with `PdpError::Evaluation`.
    fn decide(&self, req: &DecisionRequest) -> Result<DecisionResponse>;
}

/// Shared handle to a compiled policy.
pub type PolicyHandle = Arc<dyn Evaluable>;

/// Compiles policy definitions.
///
/// `root` resolves relative resources referenced by the definition.
/// Fails with `PdpError::InvalidPolicy`.
pub trait PolicyEngine: Send + Sync {
    fn compile(&self, definition: &[u8], root: &Path) -> Result<PolicyHandle>;
}
