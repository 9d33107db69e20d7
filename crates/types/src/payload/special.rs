//! Coinbase, sidechain and arbiter-layer "special" payloads.

use super::{MAX_EVIDENCE_LEN, MAX_OWNER_KEY_LEN, MAX_STRING_LEN};
use crate::hash::Hash256;
use crate::wire::{invalid_data, ReadExt, Serializable, VersionedSerializable, WriteExt};
use std::io::{self, Read, Write};

/// Most sidechain withdrawal hashes per transaction.
pub const MAX_SIDECHAIN_HASHES: usize = 1 << 16;
/// Most arbiter keys in a next-turn announcement.
pub const MAX_ARBITER_KEYS: usize = 1 << 12;

/// Coinbase marker payload carrying arbitrary miner content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoinBase {
    /// Miner-chosen content bytes.
    pub content: Vec<u8>,
}

impl VersionedSerializable for CoinBase {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.content)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CoinBase {
            content: r.read_var_bytes(MAX_STRING_LEN, "coinbase content")?,
        })
    }
}

/// Empty payload of a plain value transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferAsset;

impl VersionedSerializable for TransferAsset {
    fn serialize<W: Write>(&self, _w: &mut W, _version: u8) -> io::Result<()> {
        Ok(())
    }

    fn deserialize<R: Read>(_r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(TransferAsset)
    }
}

/// Withdrawal of coins locked on a sidechain back to the main chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WithdrawFromSideChain {
    /// Height of the sidechain block carrying the burn.
    pub block_height: u32,
    /// Genesis block address identifying the sidechain.
    pub genesis_block_address: String,
    /// The sidechain transaction hashes being redeemed; each may be
    /// redeemed once per chain.
    pub side_chain_transaction_hashes: Vec<Hash256>,
}

impl VersionedSerializable for WithdrawFromSideChain {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u32(self.block_height)?;
        w.write_var_string(&self.genesis_block_address)?;
        Hash256::write_var_list(w, &self.side_chain_transaction_hashes)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let block_height = r.read_u32()?;
        let genesis_block_address = r.read_var_string(MAX_STRING_LEN, "genesis address")?;
        let hashes = Hash256::read_var_list(r)?;
        if hashes.len() > MAX_SIDECHAIN_HASHES {
            return Err(invalid_data("too many sidechain tx hashes"));
        }
        Ok(WithdrawFromSideChain {
            block_height,
            genesis_block_address,
            side_chain_transaction_hashes: hashes,
        })
    }
}

/// Records the sponsor of the previous block's confirm.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSponsor {
    /// Node public key of the sponsoring arbiter.
    pub sponsor: Vec<u8>,
}

impl VersionedSerializable for RecordSponsor {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.sponsor)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(RecordSponsor {
            sponsor: r.read_var_bytes(MAX_OWNER_KEY_LEN, "sponsor")?,
        })
    }
}

/// Evidence of an arbiter signing two conflicting blocks at one height.
///
/// The evidence blobs are verified upstream (out of scope here); the state
/// machine treats them as opaque but binding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IllegalBlockEvidence {
    /// Coin type discriminator (main chain = 0).
    pub coin_type: u32,
    /// Height both offending blocks claim.
    pub block_height: u32,
    /// First signed block evidence.
    pub evidence: Vec<u8>,
    /// Conflicting signed block evidence.
    pub compare_evidence: Vec<u8>,
}

impl IllegalBlockEvidence {
    /// Node keys of the offending arbiters, recovered from the evidence.
    ///
    /// The payload arrives verified; signer recovery already happened, so
    /// the keys ride in the evidence blob prefix written by the verifier.
    pub fn offending_keys(&self) -> Vec<Vec<u8>> {
        // One length-prefixed key list at the head of the verified blob.
        let mut cursor = std::io::Cursor::new(&self.evidence);
        let count = match cursor.read_var_uint() {
            Ok(c) => c.min(MAX_ARBITER_KEYS as u64),
            Err(_) => return Vec::new(),
        };
        let mut keys = Vec::new();
        for _ in 0..count {
            match cursor.read_var_bytes(MAX_OWNER_KEY_LEN, "offender key") {
                Ok(k) => keys.push(k),
                Err(_) => break,
            }
        }
        keys
    }
}

impl VersionedSerializable for IllegalBlockEvidence {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u32(self.coin_type)?;
        w.write_u32(self.block_height)?;
        w.write_var_bytes(&self.evidence)?;
        w.write_var_bytes(&self.compare_evidence)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(IllegalBlockEvidence {
            coin_type: r.read_u32()?,
            block_height: r.read_u32()?,
            evidence: r.read_var_bytes(MAX_EVIDENCE_LEN, "evidence")?,
            compare_evidence: r.read_var_bytes(MAX_EVIDENCE_LEN, "compare evidence")?,
        })
    }
}

/// Evidence of an arbiter signing conflicting sidechain blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SidechainIllegalData {
    /// Sidechain misbehavior kind tag.
    pub illegal_type: u8,
    /// Sidechain height the conflict happened at.
    pub height: u32,
    /// Node key of the offending signer.
    pub illegal_signer: Vec<u8>,
    /// Opaque verified evidence blob.
    pub evidence: Vec<u8>,
    /// Conflicting evidence blob.
    pub compare_evidence: Vec<u8>,
}

impl VersionedSerializable for SidechainIllegalData {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u8(self.illegal_type)?;
        w.write_u32(self.height)?;
        w.write_var_bytes(&self.illegal_signer)?;
        w.write_var_bytes(&self.evidence)?;
        w.write_var_bytes(&self.compare_evidence)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(SidechainIllegalData {
            illegal_type: r.read_u8()?,
            height: r.read_u32()?,
            illegal_signer: r.read_var_bytes(MAX_OWNER_KEY_LEN, "illegal signer")?,
            evidence: r.read_var_bytes(MAX_EVIDENCE_LEN, "evidence")?,
            compare_evidence: r.read_var_bytes(MAX_EVIDENCE_LEN, "compare evidence")?,
        })
    }
}

/// Emergency demotion of unresponsive arbiters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InactiveArbitrators {
    /// Node key of the arbiter sponsoring the demotion.
    pub sponsor: Vec<u8>,
    /// Node keys of the arbiters being demoted.
    pub arbitrators: Vec<Vec<u8>>,
    /// Height at which inactivity was observed.
    pub block_height: u32,
}

impl VersionedSerializable for InactiveArbitrators {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_var_bytes(&self.sponsor)?;
        w.write_var_uint(self.arbitrators.len() as u64)?;
        for key in &self.arbitrators {
            w.write_var_bytes(key)?;
        }
        w.write_u32(self.block_height)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let sponsor = r.read_var_bytes(MAX_OWNER_KEY_LEN, "sponsor")?;
        let count = r.read_var_uint()? as usize;
        if count > MAX_ARBITER_KEYS {
            return Err(invalid_data("too many inactive arbiters"));
        }
        let mut arbitrators = Vec::with_capacity(count);
        for _ in 0..count {
            arbitrators.push(r.read_var_bytes(MAX_OWNER_KEY_LEN, "arbiter key")?);
        }
        Ok(InactiveArbitrators {
            sponsor,
            arbitrators,
            block_height: r.read_u32()?,
        })
    }
}

/// Announcement of the next round's arbiter set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NextTurnDposInfo {
    /// First height the announced set produces at.
    pub working_height: u32,
    /// Council-operated arbiter node keys.
    pub crc_public_keys: Vec<Vec<u8>>,
    /// Elected producer node keys.
    pub dpos_public_keys: Vec<Vec<u8>>,
}

fn write_key_list<W: Write>(w: &mut W, keys: &[Vec<u8>]) -> io::Result<()> {
    w.write_var_uint(keys.len() as u64)?;
    for key in keys {
        w.write_var_bytes(key)?;
    }
    Ok(())
}

fn read_key_list<R: Read>(r: &mut R, label: &str) -> io::Result<Vec<Vec<u8>>> {
    let count = r.read_var_uint()? as usize;
    if count > MAX_ARBITER_KEYS {
        return Err(invalid_data(format!("{}: too many keys", label)));
    }
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(r.read_var_bytes(MAX_OWNER_KEY_LEN, label)?);
    }
    Ok(keys)
}

impl VersionedSerializable for NextTurnDposInfo {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u32(self.working_height)?;
        write_key_list(w, &self.crc_public_keys)?;
        write_key_list(w, &self.dpos_public_keys)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(NextTurnDposInfo {
            working_height: r.read_u32()?,
            crc_public_keys: read_key_list(r, "crc keys")?,
            dpos_public_keys: read_key_list(r, "dpos keys")?,
        })
    }
}

/// Confirmed results of custom-id auctions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomIdResult {
    /// First height the results take effect at.
    pub working_height: u32,
    /// Winning proposal hashes.
    pub results: Vec<Hash256>,
}

impl VersionedSerializable for CustomIdResult {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u32(self.working_height)?;
        Hash256::write_var_list(w, &self.results)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CustomIdResult {
            working_height: r.read_u32()?,
            results: Hash256::read_var_list(r)?,
        })
    }
}

/// Why the chain is reverting from arbiter confirmation to raw PoW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RevertType {
    /// No confirmed block arrived within the no-block window.
    #[default]
    NoBlock = 0x00,
    /// Not enough active producers to form a rotation.
    NoProducers = 0x01,
}

/// Switches consensus to PoW-revert mode at a working height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevertToPow {
    /// The trigger for the revert.
    pub revert_type: RevertType,
    /// First height produced under PoW rules.
    pub working_height: u32,
}

impl VersionedSerializable for RevertToPow {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u8(self.revert_type as u8)?;
        w.write_u32(self.working_height)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let tag = r.read_u8()?;
        let revert_type = match tag {
            0x00 => RevertType::NoBlock,
            0x01 => RevertType::NoProducers,
            _ => return Err(invalid_data(format!("unknown revert type {:#04x}", tag))),
        };
        Ok(RevertToPow {
            revert_type,
            working_height: r.read_u32()?,
        })
    }
}

/// Marker payload of the committee's periodic treasury appropriation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrcAppropriation;

impl VersionedSerializable for CrcAppropriation {
    fn serialize<W: Write>(&self, _w: &mut W, _version: u8) -> io::Result<()> {
        Ok(())
    }

    fn deserialize<R: Read>(_r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CrcAppropriation)
    }
}

/// Marker payload moving coins into the stake pool for voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeVotes;

impl VersionedSerializable for ExchangeVotes {
    fn serialize<W: Write>(&self, _w: &mut W, _version: u8) -> io::Result<()> {
        Ok(())
    }

    fn deserialize<R: Read>(_r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(ExchangeVotes)
    }
}

/// Mints an NFT out of an existing v2 stake vote.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateNft {
    /// The refer-key hash of the vote being tokenized.
    pub id: Hash256,
    /// Issuer address string.
    pub issuer: String,
    /// Genesis hash of the sidechain hosting the token.
    pub genesis_block_hash: Hash256,
}

impl VersionedSerializable for CreateNft {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        self.id.serialize(w)?;
        w.write_var_string(&self.issuer)?;
        self.genesis_block_hash.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CreateNft {
            id: Hash256::deserialize(r)?,
            issuer: r.read_var_string(MAX_STRING_LEN, "issuer")?,
            genesis_block_hash: Hash256::deserialize(r)?,
        })
    }
}
