//! Vote and stake output payloads.

use super::MAX_OWNER_KEY_LEN;
use crate::amount::Amount;
use crate::hash::Hash168;
use crate::wire::{invalid_data, ReadExt, Serializable, WriteExt};
use std::io::{self, Read, Write};

/// Vote output version that adds council-related content kinds and
/// per-candidate vote amounts.
pub const VOTE_PRODUCER_AND_CR_VERSION: u8 = 0x01;

/// Most contents in one vote output.
pub const MAX_VOTE_CONTENTS: usize = 16;
/// Most candidates in one vote content.
pub const MAX_CANDIDATE_VOTES: usize = 256;

/// What a vote content elects or rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum VoteKind {
    /// Votes for DPoS producers.
    Delegate = 0x00,
    /// Votes for council candidates.
    Crc = 0x01,
    /// Reject votes against an approved proposal.
    CrcProposal = 0x02,
    /// Impeachment votes against a sitting council member.
    CrcImpeachment = 0x03,
}

impl VoteKind {
    /// Decodes a wire tag.
    pub fn from_u8(tag: u8) -> Option<VoteKind> {
        Some(match tag {
            0x00 => VoteKind::Delegate,
            0x01 => VoteKind::Crc,
            0x02 => VoteKind::CrcProposal,
            0x03 => VoteKind::CrcImpeachment,
            _ => return None,
        })
    }

    /// True for the council-related kinds the committee consumes.
    pub fn is_cr_related(self) -> bool {
        matches!(
            self,
            VoteKind::Crc | VoteKind::CrcProposal | VoteKind::CrcImpeachment
        )
    }
}

/// Votes granted to a single candidate.
///
/// `candidate` is kind-dependent: a producer node key for [`VoteKind::Delegate`],
/// a CID for [`VoteKind::Crc`] / [`VoteKind::CrcImpeachment`], a proposal
/// hash for [`VoteKind::CrcProposal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVotes {
    /// Kind-dependent candidate identity bytes.
    pub candidate: Vec<u8>,
    /// Amount of votes granted.
    pub votes: Amount,
}

impl Serializable for CandidateVotes {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_var_bytes(&self.candidate)?;
        self.votes.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(CandidateVotes {
            candidate: r.read_var_bytes(MAX_OWNER_KEY_LEN, "candidate")?,
            votes: Amount::deserialize(r)?,
        })
    }
}

impl CandidateVotes {
    /// Candidate bytes as a program hash, when the kind expects one.
    pub fn candidate_as_hash168(&self) -> Option<Hash168> {
        Hash168::from_slice(&self.candidate)
    }
}

/// One content of a vote output: a kind and its candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteContent {
    /// What the votes target.
    pub vote_type: VoteKind,
    /// The voted candidates.
    pub candidate_votes: Vec<CandidateVotes>,
}

impl Serializable for VoteContent {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.vote_type as u8)?;
        w.write_var_uint(self.candidate_votes.len() as u64)?;
        for cv in &self.candidate_votes {
            cv.serialize(w)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let tag = r.read_u8()?;
        let vote_type = VoteKind::from_u8(tag)
            .ok_or_else(|| invalid_data(format!("unknown vote kind {:#04x}", tag)))?;
        let count = r.read_var_uint()? as usize;
        if count > MAX_CANDIDATE_VOTES {
            return Err(invalid_data("too many candidate votes"));
        }
        let mut candidate_votes = Vec::with_capacity(count);
        for _ in 0..count {
            candidate_votes.push(CandidateVotes::deserialize(r)?);
        }
        Ok(VoteContent {
            vote_type,
            candidate_votes,
        })
    }
}

/// Payload of a vote output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoteOutput {
    /// Vote payload version.
    pub version: u8,
    /// The vote contents.
    pub contents: Vec<VoteContent>,
}

impl VoteOutput {
    /// Structural validity: non-empty contents, positive vote amounts, no
    /// duplicate candidate within a content.
    pub fn validate(&self) -> io::Result<()> {
        if self.contents.is_empty() {
            return Err(invalid_data("vote output with no contents"));
        }
        for content in &self.contents {
            if content.candidate_votes.is_empty() {
                return Err(invalid_data("vote content with no candidates"));
            }
            let mut seen: Vec<&[u8]> = Vec::with_capacity(content.candidate_votes.len());
            for cv in &content.candidate_votes {
                if self.version >= VOTE_PRODUCER_AND_CR_VERSION && !cv.votes.is_positive() {
                    return Err(invalid_data("non-positive candidate votes"));
                }
                if seen.contains(&cv.candidate.as_slice()) {
                    return Err(invalid_data("duplicate candidate in vote content"));
                }
                seen.push(&cv.candidate);
            }
        }
        Ok(())
    }
}

impl Serializable for VoteOutput {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.version)?;
        w.write_var_uint(self.contents.len() as u64)?;
        for content in &self.contents {
            content.serialize(w)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        let version = r.read_u8()?;
        let count = r.read_var_uint()? as usize;
        if count > MAX_VOTE_CONTENTS {
            return Err(invalid_data("too many vote contents"));
        }
        let mut contents = Vec::with_capacity(count);
        for _ in 0..count {
            contents.push(VoteContent::deserialize(r)?);
        }
        Ok(VoteOutput { version, contents })
    }
}

/// Payload of a stake output produced by an exchange-votes transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExchangeVotesOutput {
    /// Stake payload version.
    pub version: u8,
    /// The staker's own stake address the pooled coins are credited to.
    pub stake_address: Hash168,
}

impl ExchangeVotesOutput {
    /// Structural validity: the stake address must be set.
    pub fn validate(&self) -> io::Result<()> {
        if self.stake_address == Hash168::ZERO {
            return Err(invalid_data("stake output without stake address"));
        }
        Ok(())
    }
}

impl Serializable for ExchangeVotesOutput {
    fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.version)?;
        self.stake_address.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(ExchangeVotesOutput {
            version: r.read_u8()?,
            stake_address: Hash168::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote_output() -> VoteOutput {
        VoteOutput {
            version: VOTE_PRODUCER_AND_CR_VERSION,
            contents: vec![VoteContent {
                vote_type: VoteKind::Crc,
                candidate_votes: vec![CandidateVotes {
                    candidate: vec![5; 21],
                    votes: Amount::from_coins(10),
                }],
            }],
        }
    }

    #[test]
    fn roundtrip() {
        let v = vote_output();
        let bytes = crate::wire::to_bytes(&v).unwrap();
        let back: VoteOutput = crate::wire::from_bytes(&bytes).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn duplicate_candidate_rejected() {
        let mut v = vote_output();
        let dup = v.contents[0].candidate_votes[0].clone();
        v.contents[0].candidate_votes.push(dup);
        assert!(v.validate().is_err());
    }

    #[test]
    fn non_positive_votes_rejected_at_cr_version() {
        let mut v = vote_output();
        v.contents[0].candidate_votes[0].votes = Amount::ZERO;
        assert!(v.validate().is_err());
    }

    #[test]
    fn cr_related_kinds() {
        assert!(VoteKind::Crc.is_cr_related());
        assert!(VoteKind::CrcImpeachment.is_cr_related());
        assert!(!VoteKind::Delegate.is_cr_related());
    }
}
