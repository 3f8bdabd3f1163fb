//! PDP core: transport-agnostic decision types, the policy-engine seam, and
//! the shared error surface.
//!
//! The serving crate only ever talks to policies through [`engine::PolicyEngine`]
//! and [`engine::Evaluable`]. [`rules`] is the built-in engine behind that seam.
//! No transport or async runtime dependencies.
//!
//! # Panic policy
//! `unwrap`, `expect` and `panic!` are denied via clippy lints. Compile and
//! evaluation failures are `PdpError` values; a malformed policy or request
//! never takes the server down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod engine;
pub mod error;
pub mod protocol;
pub mod rules;

/// Shared result type.
pub use error::{PdpError, Result};
pub use engine::{Evaluable, PolicyEngine, PolicyHandle};
