//! Top-level facade crate for the PDP server.
//!
//! Re-exports core types and the server library so users can depend on a single crate.

pub mod core {
    pub use pdp_core::*;
}

pub mod server {
    pub use pdp_server::*;
}
