#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # kestrel core types
//!
//! This crate is the foundational library for the kestrel node, containing
//! all consensus-critical data structures: fixed-width hashes, the fixed-point
//! coin amount, the block/transaction model with its tagged payload union,
//! the little-endian wire codec, chain parameters and the error taxonomy.
//!
//! ## Architectural role
//!
//! As the base crate, `kestrel-types` has minimal dependencies and is itself
//! a dependency for every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like [`block::Block`], [`tx::Transaction`] and
//! [`amount::Amount`].

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::RuleError> = std::result::Result<T, E>;

/// Signed fixed-point coin amount with 8 decimal places.
pub mod amount;
/// Merge-mining proof tying a kestrel header to a parent-chain header.
pub mod auxpow;
/// Block, header and confirmed-block containers.
pub mod block;
/// The canonical, deterministic binary codec for snapshot state.
pub mod codec;
/// Compact-target encoding and big-integer target math.
pub mod compact;
/// Error types used across the workspace.
pub mod error;
/// Fixed-width hash identifiers.
pub mod hash;
/// Merkle root computation over transaction hashes.
pub mod merkle;
/// Chain parameters and height thresholds.
pub mod params;
/// Transaction payload variants and output payloads.
pub mod payload;
/// Transaction, input, output and witness program structures.
pub mod tx;
/// The little-endian variable-length wire codec.
pub mod wire;

pub use amount::Amount;
pub use hash::{Hash168, Hash256};
