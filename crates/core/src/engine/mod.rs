//! Content engines.
//!
//! A `ContentEngine` turns a magnet pointer into a swarm session that can
//! serve byte ranges of individual files. `ContentHandleRegistry` sits in
//! front of the engine so every request for the same content shares one
//! session.

mod librqbit;
mod registry;
mod types;

pub use self::librqbit::LibrqbitEngine;
pub use registry::{ContentHandle, ContentHandleRegistry, HandleState};
pub use types::*;
