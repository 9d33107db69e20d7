#![forbid(unsafe_code)]

//! Delegated-PoS producer registry and arbiter state machine.
//!
//! All mutations flow through the [`kestrel_api::History`] journal, so any
//! block can be rolled back deterministically. The live state doubles as the
//! snapshot payload: it encodes canonically and restores byte-exactly.

pub mod checkpoint;
pub mod state;

pub use checkpoint::ArbitersCheckpoint;
pub use state::{ArbiterState, Producer};
