#![forbid(unsafe_code)]

//! Priority-ordered snapshot manager.
//!
//! Subsystems register a [`kestrel_api::Checkpoint`] implementation; the
//! manager fans settled blocks and rollbacks out in ascending priority
//! order, persists periodic snapshots through per-key background file
//! workers, and restores them on startup. Snapshot bytes are opaque to the
//! manager; only the owning subsystem knows the encoding.

pub mod channel;
pub mod manager;

pub use channel::{FileChannel, DEFAULT_CHECKPOINT, MAX_CHECKPOINT_FILES_COUNT};
pub use manager::{Config, Manager};
