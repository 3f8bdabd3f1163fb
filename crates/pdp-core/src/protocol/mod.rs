//! Wire messages for the two planes.
//!
//! - Decision plane: `DecisionRequest` in, `DecisionResponse` out.
//! - Control plane: `PolicyUpdateRequest` in, `UpdateAck` out.
//!
//! Shape validation lives next to the types so both the server and any client
//! tooling reject the same malformed input.

pub mod control;
pub mod decision;

pub use control::{PolicySource, PolicyUpdateRequest, UpdateAck};
pub use decision::{AttributeValue, DecisionRequest, DecisionResponse, Effect};
