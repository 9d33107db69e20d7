//! Council proposal payloads and the proposal vote result alphabet.

use super::{MAX_OWNER_KEY_LEN, MAX_SIGNATURE_LEN};
use crate::amount::Amount;
use crate::hash::{Hash168, Hash256};
use crate::wire::{invalid_data, ReadExt, Serializable, VersionedSerializable, WriteExt};
use parity_scale_codec::{Decode, Encode};
use std::io::{self, Read, Write};

/// Most budget stages a proposal may carry.
pub const MAX_BUDGETS: usize = 128;

/// A council member's verdict on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[repr(u8)]
pub enum VoteResult {
    /// In favor.
    #[default]
    Approve = 0x00,
    /// Against.
    Reject = 0x01,
    /// No position.
    Abstain = 0x02,
}

impl VoteResult {
    /// Decodes a wire tag.
    pub fn from_u8(tag: u8) -> Option<VoteResult> {
        Some(match tag {
            0x00 => VoteResult::Approve,
            0x01 => VoteResult::Reject,
            0x02 => VoteResult::Abstain,
            _ => return None,
        })
    }
}

/// One funding stage of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct Budget {
    /// Stage kind: 0 imprest, 1 normal payment, 2 final payment.
    pub budget_type: u8,
    /// Stage index within the proposal.
    pub stage: u8,
    /// Amount committed for the stage.
    pub amount: Amount,
}

impl Serializable for Budget {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.budget_type)?;
        w.write_u8(self.stage)?;
        self.amount.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Budget {
            budget_type: r.read_u8()?,
            stage: r.read_u8()?,
            amount: Amount::deserialize(r)?,
        })
    }
}

/// A council funding proposal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct CrcProposal {
    /// Proposal kind tag (normal, ELIP, …); opaque to the state machine.
    pub proposal_type: u16,
    /// The proposer's owner key.
    pub owner_key: Vec<u8>,
    /// Hash of the off-chain draft document.
    pub draft_hash: Hash256,
    /// Funding stages.
    pub budgets: Vec<Budget>,
    /// Program hash receiving stage payments.
    pub recipient: Hash168,
    /// Proposer signature over the unsigned serialization.
    pub signature: Vec<u8>,
    /// DID of the council member sponsoring the proposal.
    pub cr_council_member_did: Hash168,
    /// Sponsoring member's signature.
    pub cr_council_member_signature: Vec<u8>,
}

impl CrcProposal {
    /// Serializes the proposer-signed fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        w.write_u16(self.proposal_type)?;
        w.write_var_bytes(&self.owner_key)?;
        self.draft_hash.serialize(w)?;
        w.write_var_uint(self.budgets.len() as u64)?;
        for b in &self.budgets {
            b.serialize(w)?;
        }
        self.recipient.serialize(w)
    }

    /// The byte string the proposer signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }

    /// The proposal's chain identity: double SHA-256 of the unsigned form.
    pub fn hash(&self, version: u8) -> Hash256 {
        Hash256::double_sha256(&self.data_for_signing(version))
    }

    /// Sum of all budget stages.
    pub fn total_budget(&self) -> Amount {
        self.budgets.iter().map(|b| b.amount).sum()
    }
}

impl VersionedSerializable for CrcProposal {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        w.write_var_bytes(&self.signature)?;
        self.cr_council_member_did.serialize(w)?;
        w.write_var_bytes(&self.cr_council_member_signature)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let proposal_type = r.read_u16()?;
        let owner_key = r.read_var_bytes(MAX_OWNER_KEY_LEN, "owner key")?;
        let draft_hash = Hash256::deserialize(r)?;
        let count = r.read_var_uint()? as usize;
        if count > MAX_BUDGETS {
            return Err(invalid_data(format!("too many budgets: {}", count)));
        }
        let mut budgets = Vec::with_capacity(count);
        for _ in 0..count {
            budgets.push(Budget::deserialize(r)?);
        }
        let recipient = Hash168::deserialize(r)?;
        let signature = r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?;
        let cr_council_member_did = Hash168::deserialize(r)?;
        let cr_council_member_signature =
            r.read_var_bytes(MAX_SIGNATURE_LEN, "member signature")?;
        Ok(CrcProposal {
            proposal_type,
            owner_key,
            draft_hash,
            budgets,
            recipient,
            signature,
            cr_council_member_did,
            cr_council_member_signature,
        })
    }
}

/// A council member's on-chain review of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrcProposalReview {
    /// The reviewed proposal.
    pub proposal_hash: Hash256,
    /// The member's verdict.
    pub vote_result: VoteResult,
    /// Hash of the off-chain opinion document.
    pub opinion_hash: Hash256,
    /// Reviewing member's DID.
    pub did: Hash168,
    /// Member signature over the unsigned serialization.
    pub signature: Vec<u8>,
}

impl CrcProposalReview {
    /// Serializes the signed-over fields only.
    pub fn serialize_unsigned<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        self.proposal_hash.serialize(w)?;
        w.write_u8(self.vote_result as u8)?;
        self.opinion_hash.serialize(w)?;
        self.did.serialize(w)
    }

    /// The byte string the member signs.
    pub fn data_for_signing(&self, version: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.serialize_unsigned(&mut buf, version);
        buf
    }
}

impl VersionedSerializable for CrcProposalReview {
    fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        self.serialize_unsigned(w, version)?;
        w.write_var_bytes(&self.signature)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        let proposal_hash = Hash256::deserialize(r)?;
        let tag = r.read_u8()?;
        let vote_result = VoteResult::from_u8(tag)
            .ok_or_else(|| invalid_data(format!("unknown vote result {:#04x}", tag)))?;
        let opinion_hash = Hash256::deserialize(r)?;
        let did = Hash168::deserialize(r)?;
        let signature = r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?;
        Ok(CrcProposalReview {
            proposal_hash,
            vote_result,
            opinion_hash,
            did,
            signature,
        })
    }
}

/// Progress report for an approved proposal stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrcProposalTracking {
    /// The tracked proposal.
    pub proposal_hash: Hash256,
    /// Hash of the off-chain tracking document.
    pub message_hash: Hash256,
    /// Stage being reported.
    pub stage: u8,
    /// Owner signature.
    pub owner_signature: Vec<u8>,
}

impl VersionedSerializable for CrcProposalTracking {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        self.proposal_hash.serialize(w)?;
        self.message_hash.serialize(w)?;
        w.write_u8(self.stage)?;
        w.write_var_bytes(&self.owner_signature)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CrcProposalTracking {
            proposal_hash: Hash256::deserialize(r)?,
            message_hash: Hash256::deserialize(r)?,
            stage: r.read_u8()?,
            owner_signature: r.read_var_bytes(MAX_SIGNATURE_LEN, "owner signature")?,
        })
    }
}

/// Withdrawal of an approved stage payment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrcProposalWithdraw {
    /// The proposal being drawn against.
    pub proposal_hash: Hash256,
    /// The proposer's owner key.
    pub owner_key: Vec<u8>,
    /// Recipient of the withdrawn amount.
    pub recipient: Hash168,
    /// Amount withdrawn.
    pub amount: Amount,
    /// Owner signature.
    pub signature: Vec<u8>,
}

impl VersionedSerializable for CrcProposalWithdraw {
    fn serialize<W: Write>(&self, w: &mut W, _version: u8) -> io::Result<()> {
        self.proposal_hash.serialize(w)?;
        w.write_var_bytes(&self.owner_key)?;
        self.recipient.serialize(w)?;
        self.amount.serialize(w)?;
        w.write_var_bytes(&self.signature)
    }

    fn deserialize<R: Read>(r: &mut R, _version: u8) -> io::Result<Self> {
        Ok(CrcProposalWithdraw {
            proposal_hash: Hash256::deserialize(r)?,
            owner_key: r.read_var_bytes(MAX_OWNER_KEY_LEN, "owner key")?,
            recipient: Hash168::deserialize(r)?,
            amount: Amount::deserialize(r)?,
            signature: r.read_var_bytes(MAX_SIGNATURE_LEN, "signature")?,
        })
    }
}
