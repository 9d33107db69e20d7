//! Block, header and confirmed-block containers.

use crate::auxpow::AuxPow;
use crate::hash::Hash256;
use crate::tx::Transaction;
use crate::wire::{invalid_data, ReadExt, Serializable, WriteExt};
use std::io::{self, Read, Write};

/// A block header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    /// Header format version.
    pub version: u32,
    /// Hash of the previous block.
    pub prev_hash: Hash256,
    /// Merkle root over the block's transaction hashes.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u32,
    /// Compact PoW target.
    pub bits: u32,
    /// Miner nonce.
    pub nonce: u32,
    /// Block height.
    pub height: u32,
    /// Merge-mining proof.
    pub aux_pow: AuxPow,
}

impl Header {
    /// Serializes the base header without the merge-mining proof; this is
    /// the form that is hashed.
    pub fn serialize_base<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32(self.version)?;
        self.prev_hash.serialize(w)?;
        self.merkle_root.serialize(w)?;
        w.write_u32(self.timestamp)?;
        w.write_u32(self.bits)?;
        w.write_u32(self.nonce)?;
        w.write_u32(self.height)
    }

    /// The block identity: double SHA-256 of the base header.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        let _ = self.serialize_base(&mut buf);
        Hash256::double_sha256(&buf)
    }
}

impl Serializable for Header {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.serialize_base(w)?;
        self.aux_pow.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let version = r.read_u32()?;
        let prev_hash = Hash256::deserialize(r)?;
        let merkle_root = Hash256::deserialize(r)?;
        let timestamp = r.read_u32()?;
        let bits = r.read_u32()?;
        let nonce = r.read_u32()?;
        let height = r.read_u32()?;
        let aux_pow = AuxPow::deserialize(r)?;
        Ok(Header {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
            height,
            aux_pow,
        })
    }
}

/// A full block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block's transactions; the first must be the coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block height shorthand.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// The block identity.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }
}

impl Serializable for Block {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.serialize(w)?;
        w.write_var_uint(self.transactions.len() as u64)?;
        for tx in &self.transactions {
            tx.serialize(w)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let header = Header::deserialize(r)?;
        let count = r.read_var_uint()? as usize;
        if count > crate::tx::MAX_TX_LIST_LEN {
            return Err(invalid_data("block transaction list too long"));
        }
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            transactions.push(Transaction::deserialize(r)?);
        }
        Ok(Block {
            header,
            transactions,
        })
    }
}

/// An arbiter confirmation attached to a block by the DPoS layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Confirm {
    /// Hash of the confirmed block.
    pub block_hash: Hash256,
    /// Node key of the sponsoring arbiter.
    pub sponsor: Vec<u8>,
    /// View the confirmation was reached in.
    pub view_offset: u32,
}

impl Serializable for Confirm {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.block_hash.serialize(w)?;
        w.write_var_bytes(&self.sponsor)?;
        w.write_u32(self.view_offset)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Confirm {
            block_hash: Hash256::deserialize(r)?,
            sponsor: r.read_var_bytes(crate::payload::MAX_OWNER_KEY_LEN, "sponsor")?,
            view_offset: r.read_u32()?,
        })
    }
}

/// A block together with its optional arbiter confirmation, the unit that
/// flows to state listeners.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DposBlock {
    /// The settled block.
    pub block: Block,
    /// Whether a confirmation accompanies the block.
    pub have_confirm: bool,
    /// The confirmation, present when `have_confirm`.
    pub confirm: Option<Confirm>,
}

impl DposBlock {
    /// Wraps a bare block with no confirmation.
    pub fn unconfirmed(block: Block) -> DposBlock {
        DposBlock {
            block,
            have_confirm: false,
            confirm: None,
        }
    }

    /// Wraps a block with its confirmation.
    pub fn confirmed(block: Block, confirm: Confirm) -> DposBlock {
        DposBlock {
            block,
            have_confirm: true,
            confirm: Some(confirm),
        }
    }

    /// Block height shorthand.
    pub fn height(&self) -> u32 {
        self.block.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::TxType;

    #[test]
    fn header_hash_excludes_aux_pow() {
        let mut header = Header {
            height: 10,
            timestamp: 1_600_000_000,
            bits: 0x1d00_ffff,
            ..Default::default()
        };
        let h = header.hash();
        header.aux_pow.chain_id = 99;
        assert_eq!(header.hash(), h);
    }

    #[test]
    fn block_roundtrip() {
        let block = Block {
            header: Header {
                height: 7,
                ..Default::default()
            },
            transactions: vec![Transaction::new(TxType::CoinBase)],
        };
        let bytes = crate::wire::to_bytes(&block).unwrap();
        let back: Block = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(back, block);
    }
}
