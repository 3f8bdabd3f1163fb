//! Active policy store with atomic hot-swap.
//!
//! Readers clone an `Arc` under the shared lock; the writer only assigns under
//! the exclusive lock. Compilation never happens while the lock is held.

use std::sync::{Arc, RwLock};

use pdp_core::{Evaluable, PolicyHandle};

/// Published policy: compiled handle plus bookkeeping.
pub struct ActivePolicy {
    /// 1 for the initial load, +1 per successful swap.
    pub version: u64,
    /// Where the definition came from (path or update id).
    pub source: String,
    pub handle: PolicyHandle,
}

impl std::fmt::Debug for ActivePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePolicy")
            .field("version", &self.version)
            .field("source", &self.source)
            .field("policy", &self.handle.id())
            .finish()
    }
}

pub struct PolicyStore {
    current: RwLock<Arc<ActivePolicy>>,
}

impl PolicyStore {
    /// Build a store around an already compiled policy (version 1).
    pub fn new(handle: PolicyHandle, source: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Arc::new(ActivePolicy {
                version: 1,
                source: source.into(),
                handle,
            })),
        }
    }

    /// Current policy. Never absent.
    pub fn get(&self) -> Arc<ActivePolicy> {
        // The guarded value is a single Arc; a poisoned lock still holds a whole one.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Publish a compiled policy and return its version.
    pub fn swap(&self, handle: PolicyHandle, source: impl Into<String>) -> u64 {
        let source = source.into();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let version = guard.version + 1;
        *guard = Arc::new(ActivePolicy {
            version,
            source,
            handle,
        });
        version
    }

    pub fn version(&self) -> u64 {
        self.get().version
    }
}
