//! The canonical, deterministic binary codec for snapshot state.
//!
//! Checkpoint snapshots are opaque bytes to the manager that stores them, but
//! they must be byte-stable: the same state always encodes to the same bytes
//! so that snapshot round-trips and cross-node comparisons are exact. SCALE
//! provides that determinism; centralizing the wrappers here keeps every
//! subsystem on the same encoding.
//!
//! Consensus wire objects (blocks, transactions, payloads) do NOT go through
//! this module; their format is fixed by [`crate::wire`].

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on any decoding error, including trailing bytes, so malformed
/// snapshot files are rejected instead of partially applied.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}
