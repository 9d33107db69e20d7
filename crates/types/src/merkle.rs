//! Merkle root computation over transaction hashes.

use crate::hash::Hash256;
use crate::wire::invalid_data;
use std::io;

/// Computes the merkle root of an ordered list of transaction hashes.
///
/// Pairs are combined with double SHA-256 of the concatenated child hashes;
/// a level with an odd node count duplicates its last node. A single hash is
/// its own root. An empty list has no root and is an error.
pub fn merkle_root(hashes: &[Hash256]) -> io::Result<Hash256> {
    if hashes.is_empty() {
        return Err(invalid_data("merkle root of empty hash list"));
    }

    let mut level: Vec<Hash256> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            // last() is non-empty here
            let last = *level.last().unwrap_or(&Hash256::ZERO);
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut data = [0u8; 64];
                data[..32].copy_from_slice(pair[0].as_bytes());
                data[32..].copy_from_slice(pair[1].as_bytes());
                Hash256::double_sha256(&data)
            })
            .collect();
    }
    Ok(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash256 {
        let mut raw = [0u8; 32];
        raw[0] = n;
        Hash256(raw)
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(merkle_root(&[]).is_err());
    }

    #[test]
    fn single_hash_is_its_own_root() {
        assert_eq!(merkle_root(&[h(7)]).unwrap(), h(7));
    }

    #[test]
    fn odd_level_duplicates_last() {
        // Root of [a, b, b] equals root of [a, b] paired with hash(b ∥ b).
        let three = merkle_root(&[h(1), h(2), h(3)]).unwrap();
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(h(3).as_bytes());
        data[32..].copy_from_slice(h(3).as_bytes());
        let dup = Hash256::double_sha256(&data);
        let mut level2 = [0u8; 64];
        let left = merkle_root(&[h(1), h(2)]).unwrap();
        level2[..32].copy_from_slice(left.as_bytes());
        level2[32..].copy_from_slice(dup.as_bytes());
        assert_eq!(three, Hash256::double_sha256(&level2));
    }

    #[test]
    fn order_changes_the_root() {
        let a = merkle_root(&[h(1), h(2)]).unwrap();
        let b = merkle_root(&[h(2), h(1)]).unwrap();
        assert_ne!(a, b);
    }
}
