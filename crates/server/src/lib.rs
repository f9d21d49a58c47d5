//! HTTP surface of the streamgate gateway.
//!
//! The binary wires configuration into these modules; the library target
//! exists so integration tests can build the router in-process.

pub mod api;
pub mod metrics;
pub mod state;
