//! PDP server library entry.
//!
//! This crate wires the policy store, the update queue and worker, and the two
//! transports (request plane, control plane) into a serving core. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod config;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod server;
pub mod transport;
pub mod update;

pub use server::{run, shutdown_signal, RunningServer, Server};
