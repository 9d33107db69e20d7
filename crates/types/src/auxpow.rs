//! Merge-mining proof tying a kestrel header to a parent-chain header.
//!
//! The parent chain does the actual hashing work; a kestrel header is valid
//! when the parent header's PoW hash meets the kestrel target and the proof
//! commits to the kestrel block hash under the declared chain id. The parent
//! hashing algorithm itself is a pure function of the serialized parent
//! header and is treated as given.

use crate::hash::Hash256;
use crate::wire::{ReadExt, Serializable, WriteExt};
use std::io::{self, Read, Write};

/// The 80-byte style header of the parent chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParentHeader {
    /// Parent chain header version.
    pub version: u32,
    /// Previous parent-chain block.
    pub prev_hash: Hash256,
    /// Parent-chain merkle root; commits to the aux chain work.
    pub merkle_root: Hash256,
    /// Parent-chain timestamp.
    pub timestamp: u32,
    /// Parent-chain compact target.
    pub bits: u32,
    /// Parent-chain nonce.
    pub nonce: u32,
}

impl ParentHeader {
    /// The parent header's PoW hash, the subject of the target comparison.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        let _ = self.serialize(&mut buf);
        Hash256::double_sha256(&buf)
    }
}

impl Serializable for ParentHeader {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32(self.version)?;
        self.prev_hash.serialize(w)?;
        self.merkle_root.serialize(w)?;
        w.write_u32(self.timestamp)?;
        w.write_u32(self.bits)?;
        w.write_u32(self.nonce)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(ParentHeader {
            version: r.read_u32()?,
            prev_hash: Hash256::deserialize(r)?,
            merkle_root: Hash256::deserialize(r)?,
            timestamp: r.read_u32()?,
            bits: r.read_u32()?,
            nonce: r.read_u32()?,
        })
    }
}

/// The merge-mining proof carried in every kestrel header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuxPow {
    /// Chain id the miner declared when embedding the commitment.
    pub chain_id: u32,
    /// The kestrel block hash the parent work commits to.
    pub aux_block_hash: Hash256,
    /// Merkle path from the commitment to the parent merkle root.
    pub aux_merkle_branch: Vec<Hash256>,
    /// Position of the commitment within the aux tree.
    pub aux_merkle_index: u32,
    /// The parent header carrying the proof of work.
    pub parent_header: ParentHeader,
}

impl AuxPow {
    /// Self-consistency of the proof: the declared chain id matches and the
    /// commitment is to `block_hash`.
    pub fn check(&self, block_hash: &Hash256, chain_id: u32) -> bool {
        self.chain_id == chain_id && self.aux_block_hash == *block_hash
    }

    /// The hash the PoW target comparison runs against.
    pub fn parent_header_hash(&self) -> Hash256 {
        self.parent_header.hash()
    }
}

impl Serializable for AuxPow {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32(self.chain_id)?;
        self.aux_block_hash.serialize(w)?;
        Hash256::write_var_list(w, &self.aux_merkle_branch)?;
        w.write_u32(self.aux_merkle_index)?;
        self.parent_header.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(AuxPow {
            chain_id: r.read_u32()?,
            aux_block_hash: Hash256::deserialize(r)?,
            aux_merkle_branch: Hash256::read_var_list(r)?,
            aux_merkle_index: r.read_u32()?,
            parent_header: ParentHeader::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_requires_matching_chain_id_and_commitment() {
        let block_hash = Hash256::double_sha256(b"block");
        let pow = AuxPow {
            chain_id: 6,
            aux_block_hash: block_hash,
            ..Default::default()
        };
        assert!(pow.check(&block_hash, 6));
        assert!(!pow.check(&block_hash, 7));
        assert!(!pow.check(&Hash256::ZERO, 6));
    }

    #[test]
    fn roundtrip() {
        let pow = AuxPow {
            chain_id: 6,
            aux_block_hash: Hash256::double_sha256(b"x"),
            aux_merkle_branch: vec![Hash256::double_sha256(b"y")],
            aux_merkle_index: 1,
            parent_header: ParentHeader {
                version: 2,
                timestamp: 1234,
                bits: 0x1d00_ffff,
                nonce: 42,
                ..Default::default()
            },
        };
        let bytes = crate::wire::to_bytes(&pow).unwrap();
        let back: AuxPow = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(back, pow);
    }
}
