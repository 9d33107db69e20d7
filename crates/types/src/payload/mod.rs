//! Transaction payload variants and output payloads.
//!
//! Every transaction type carries exactly one payload variant; the closed
//! [`Payload`] union replaces the original node's interface-and-type-switch
//! polymorphism. Each variant defines its versioned wire encoding and, where
//! it is signed, the unsigned `data_for_signing` form.

mod cr;
mod producer;
mod proposal;
mod special;
mod vote;

pub use cr::{CrInfo, UnregisterCr};
pub use producer::{ProcessProducer, ProducerInfo};
pub use proposal::{
    Budget, CrcProposal, CrcProposalReview, CrcProposalTracking, CrcProposalWithdraw, VoteResult,
};
pub use special::{
    CoinBase, CrcAppropriation, CreateNft, CustomIdResult, ExchangeVotes, IllegalBlockEvidence,
    InactiveArbitrators, NextTurnDposInfo, RecordSponsor, RevertToPow, RevertType,
    SidechainIllegalData, TransferAsset, WithdrawFromSideChain,
};
pub use vote::{
    CandidateVotes, ExchangeVotesOutput, VoteContent, VoteKind, VoteOutput,
    VOTE_PRODUCER_AND_CR_VERSION,
};

use crate::wire::{invalid_data, ReadExt, Serializable, VersionedSerializable};
use std::io::{self, Read, Write};

/// Longest accepted owner key (a public key or a multi-sign code).
pub const MAX_OWNER_KEY_LEN: usize = 1024;
/// Longest accepted signature blob.
pub const MAX_SIGNATURE_LEN: usize = 72;
/// Longest accepted nickname / url / address strings.
pub const MAX_STRING_LEN: usize = 4096;
/// Longest accepted opaque evidence blob.
pub const MAX_EVIDENCE_LEN: usize = 1 << 20;

/// Payload version that switches `ProcessProducer` to Schnorr witnesses.
pub const PROCESS_PRODUCER_SCHNORR_VERSION: u8 = 0x01;
/// Payload version that switches `ProcessProducer` to multi-code witnesses.
pub const PROCESS_MULTI_CODE_VERSION: u8 = 0x02;

/// Transaction type tag, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TxType {
    CoinBase = 0x00,
    TransferAsset = 0x02,
    WithdrawFromSideChain = 0x07,
    RegisterProducer = 0x09,
    CancelProducer = 0x0a,
    UpdateProducer = 0x0b,
    ReturnDepositCoin = 0x0c,
    IllegalBlockEvidence = 0x10,
    SidechainIllegalEvidence = 0x11,
    InactiveArbitrators = 0x12,
    NextTurnDposInfo = 0x14,
    RecordSponsor = 0x16,
    RegisterCr = 0x21,
    UnregisterCr = 0x22,
    UpdateCr = 0x23,
    ReturnCrDepositCoin = 0x24,
    CrcProposal = 0x25,
    CrcProposalReview = 0x26,
    CrcProposalTracking = 0x27,
    CrcAppropriation = 0x28,
    CrcProposalWithdraw = 0x29,
    CustomIdResult = 0x2b,
    RevertToPow = 0x41,
    ExchangeVotes = 0x61,
    CreateNft = 0x71,
}

impl TxType {
    /// Decodes a wire tag.
    pub fn from_u8(tag: u8) -> Option<TxType> {
        use TxType::*;
        Some(match tag {
            0x00 => CoinBase,
            0x02 => TransferAsset,
            0x07 => WithdrawFromSideChain,
            0x09 => RegisterProducer,
            0x0a => CancelProducer,
            0x0b => UpdateProducer,
            0x0c => ReturnDepositCoin,
            0x10 => IllegalBlockEvidence,
            0x11 => SidechainIllegalEvidence,
            0x12 => InactiveArbitrators,
            0x14 => NextTurnDposInfo,
            0x16 => RecordSponsor,
            0x21 => RegisterCr,
            0x22 => UnregisterCr,
            0x23 => UpdateCr,
            0x24 => ReturnCrDepositCoin,
            0x25 => CrcProposal,
            0x26 => CrcProposalReview,
            0x27 => CrcProposalTracking,
            0x28 => CrcAppropriation,
            0x29 => CrcProposalWithdraw,
            0x2b => CustomIdResult,
            0x41 => RevertToPow,
            0x61 => ExchangeVotes,
            0x71 => CreateNft,
            _ => return None,
        })
    }

    /// Human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        use TxType::*;
        match self {
            CoinBase => "CoinBase",
            TransferAsset => "TransferAsset",
            WithdrawFromSideChain => "WithdrawFromSideChain",
            RegisterProducer => "RegisterProducer",
            CancelProducer => "CancelProducer",
            UpdateProducer => "UpdateProducer",
            ReturnDepositCoin => "ReturnDepositCoin",
            IllegalBlockEvidence => "IllegalBlockEvidence",
            SidechainIllegalEvidence => "SidechainIllegalEvidence",
            InactiveArbitrators => "InactiveArbitrators",
            NextTurnDposInfo => "NextTurnDPOSInfo",
            RecordSponsor => "RecordSponsor",
            RegisterCr => "RegisterCR",
            UnregisterCr => "UnregisterCR",
            UpdateCr => "UpdateCR",
            ReturnCrDepositCoin => "ReturnCRDepositCoin",
            CrcProposal => "CRCProposal",
            CrcProposalReview => "CRCProposalReview",
            CrcProposalTracking => "CRCProposalTracking",
            CrcAppropriation => "CRCAppropriation",
            CrcProposalWithdraw => "CRCProposalWithdraw",
            CustomIdResult => "CustomIDResult",
            RevertToPow => "RevertToPOW",
            ExchangeVotes => "ExchangeVotes",
            CreateNft => "CreateNFT",
        }
    }
}

/// The closed union of transaction payloads, tagged by [`TxType`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Payload {
    CoinBase(CoinBase),
    TransferAsset(TransferAsset),
    WithdrawFromSideChain(WithdrawFromSideChain),
    ProducerInfo(ProducerInfo),
    ProcessProducer(ProcessProducer),
    ReturnDepositCoin,
    IllegalBlockEvidence(IllegalBlockEvidence),
    SidechainIllegalData(SidechainIllegalData),
    InactiveArbitrators(InactiveArbitrators),
    NextTurnDposInfo(NextTurnDposInfo),
    RecordSponsor(RecordSponsor),
    CrInfo(CrInfo),
    UnregisterCr(UnregisterCr),
    ReturnCrDepositCoin,
    CrcProposal(CrcProposal),
    CrcProposalReview(CrcProposalReview),
    CrcProposalTracking(CrcProposalTracking),
    CrcAppropriation(CrcAppropriation),
    CrcProposalWithdraw(CrcProposalWithdraw),
    CustomIdResult(CustomIdResult),
    RevertToPow(RevertToPow),
    ExchangeVotes(ExchangeVotes),
    CreateNft(CreateNft),
}

impl Payload {
    /// Writes the payload at `version`.
    pub fn serialize<W: Write>(&self, w: &mut W, version: u8) -> io::Result<()> {
        match self {
            Payload::CoinBase(p) => p.serialize(w, version),
            Payload::TransferAsset(p) => p.serialize(w, version),
            Payload::WithdrawFromSideChain(p) => p.serialize(w, version),
            Payload::ProducerInfo(p) => p.serialize(w, version),
            Payload::ProcessProducer(p) => p.serialize(w, version),
            Payload::ReturnDepositCoin | Payload::ReturnCrDepositCoin => Ok(()),
            Payload::IllegalBlockEvidence(p) => p.serialize(w, version),
            Payload::SidechainIllegalData(p) => p.serialize(w, version),
            Payload::InactiveArbitrators(p) => p.serialize(w, version),
            Payload::NextTurnDposInfo(p) => p.serialize(w, version),
            Payload::RecordSponsor(p) => p.serialize(w, version),
            Payload::CrInfo(p) => p.serialize(w, version),
            Payload::UnregisterCr(p) => p.serialize(w, version),
            Payload::CrcProposal(p) => p.serialize(w, version),
            Payload::CrcProposalReview(p) => p.serialize(w, version),
            Payload::CrcProposalTracking(p) => p.serialize(w, version),
            Payload::CrcAppropriation(p) => p.serialize(w, version),
            Payload::CrcProposalWithdraw(p) => p.serialize(w, version),
            Payload::CustomIdResult(p) => p.serialize(w, version),
            Payload::RevertToPow(p) => p.serialize(w, version),
            Payload::ExchangeVotes(p) => p.serialize(w, version),
            Payload::CreateNft(p) => p.serialize(w, version),
        }
    }

    /// Reads the payload variant selected by `tx_type` at `version`.
    pub fn deserialize<R: Read>(tx_type: TxType, r: &mut R, version: u8) -> io::Result<Payload> {
        Ok(match tx_type {
            TxType::CoinBase => Payload::CoinBase(CoinBase::deserialize(r, version)?),
            TxType::TransferAsset => {
                Payload::TransferAsset(TransferAsset::deserialize(r, version)?)
            }
            TxType::WithdrawFromSideChain => {
                Payload::WithdrawFromSideChain(WithdrawFromSideChain::deserialize(r, version)?)
            }
            TxType::RegisterProducer | TxType::UpdateProducer => {
                Payload::ProducerInfo(ProducerInfo::deserialize(r, version)?)
            }
            TxType::CancelProducer => {
                Payload::ProcessProducer(ProcessProducer::deserialize(r, version)?)
            }
            TxType::ReturnDepositCoin => Payload::ReturnDepositCoin,
            TxType::IllegalBlockEvidence => {
                Payload::IllegalBlockEvidence(IllegalBlockEvidence::deserialize(r, version)?)
            }
            TxType::SidechainIllegalEvidence => {
                Payload::SidechainIllegalData(SidechainIllegalData::deserialize(r, version)?)
            }
            TxType::InactiveArbitrators => {
                Payload::InactiveArbitrators(InactiveArbitrators::deserialize(r, version)?)
            }
            TxType::NextTurnDposInfo => {
                Payload::NextTurnDposInfo(NextTurnDposInfo::deserialize(r, version)?)
            }
            TxType::RecordSponsor => Payload::RecordSponsor(RecordSponsor::deserialize(r, version)?),
            TxType::RegisterCr | TxType::UpdateCr => {
                Payload::CrInfo(CrInfo::deserialize(r, version)?)
            }
            TxType::UnregisterCr => Payload::UnregisterCr(UnregisterCr::deserialize(r, version)?),
            TxType::ReturnCrDepositCoin => Payload::ReturnCrDepositCoin,
            TxType::CrcProposal => Payload::CrcProposal(CrcProposal::deserialize(r, version)?),
            TxType::CrcProposalReview => {
                Payload::CrcProposalReview(CrcProposalReview::deserialize(r, version)?)
            }
            TxType::CrcProposalTracking => {
                Payload::CrcProposalTracking(CrcProposalTracking::deserialize(r, version)?)
            }
            TxType::CrcAppropriation => {
                Payload::CrcAppropriation(CrcAppropriation::deserialize(r, version)?)
            }
            TxType::CrcProposalWithdraw => {
                Payload::CrcProposalWithdraw(CrcProposalWithdraw::deserialize(r, version)?)
            }
            TxType::CustomIdResult => {
                Payload::CustomIdResult(CustomIdResult::deserialize(r, version)?)
            }
            TxType::RevertToPow => Payload::RevertToPow(RevertToPow::deserialize(r, version)?),
            TxType::ExchangeVotes => Payload::ExchangeVotes(ExchangeVotes::deserialize(r, version)?),
            TxType::CreateNft => Payload::CreateNft(CreateNft::deserialize(r, version)?),
        })
    }

    /// The default (empty) payload for a transaction type, used by builders.
    pub fn default_for(tx_type: TxType) -> Payload {
        match tx_type {
            TxType::CoinBase => Payload::CoinBase(CoinBase::default()),
            TxType::TransferAsset => Payload::TransferAsset(TransferAsset),
            TxType::WithdrawFromSideChain => {
                Payload::WithdrawFromSideChain(WithdrawFromSideChain::default())
            }
            TxType::RegisterProducer | TxType::UpdateProducer => {
                Payload::ProducerInfo(ProducerInfo::default())
            }
            TxType::CancelProducer => Payload::ProcessProducer(ProcessProducer::default()),
            TxType::ReturnDepositCoin => Payload::ReturnDepositCoin,
            TxType::IllegalBlockEvidence => {
                Payload::IllegalBlockEvidence(IllegalBlockEvidence::default())
            }
            TxType::SidechainIllegalEvidence => {
                Payload::SidechainIllegalData(SidechainIllegalData::default())
            }
            TxType::InactiveArbitrators => {
                Payload::InactiveArbitrators(InactiveArbitrators::default())
            }
            TxType::NextTurnDposInfo => Payload::NextTurnDposInfo(NextTurnDposInfo::default()),
            TxType::RecordSponsor => Payload::RecordSponsor(RecordSponsor::default()),
            TxType::RegisterCr | TxType::UpdateCr => Payload::CrInfo(CrInfo::default()),
            TxType::UnregisterCr => Payload::UnregisterCr(UnregisterCr::default()),
            TxType::ReturnCrDepositCoin => Payload::ReturnCrDepositCoin,
            TxType::CrcProposal => Payload::CrcProposal(CrcProposal::default()),
            TxType::CrcProposalReview => Payload::CrcProposalReview(CrcProposalReview::default()),
            TxType::CrcProposalTracking => {
                Payload::CrcProposalTracking(CrcProposalTracking::default())
            }
            TxType::CrcAppropriation => Payload::CrcAppropriation(CrcAppropriation),
            TxType::CrcProposalWithdraw => {
                Payload::CrcProposalWithdraw(CrcProposalWithdraw::default())
            }
            TxType::CustomIdResult => Payload::CustomIdResult(CustomIdResult::default()),
            TxType::RevertToPow => Payload::RevertToPow(RevertToPow::default()),
            TxType::ExchangeVotes => Payload::ExchangeVotes(ExchangeVotes),
            TxType::CreateNft => Payload::CreateNft(CreateNft::default()),
        }
    }
}

/// Output type tag, present for transaction versions ≥ 0x09.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OutputType {
    /// A plain value transfer output.
    #[default]
    None = 0x00,
    /// An output carrying vote contents.
    Vote = 0x01,
    /// An output moving coins into the stake pool.
    Stake = 0x02,
}

impl OutputType {
    /// Decodes a wire tag.
    pub fn from_u8(tag: u8) -> Option<OutputType> {
        Some(match tag {
            0x00 => OutputType::None,
            0x01 => OutputType::Vote,
            0x02 => OutputType::Stake,
            _ => return None,
        })
    }
}

/// Output payload matching the output's [`OutputType`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputPayload {
    /// No payload.
    #[default]
    None,
    /// Vote contents.
    Vote(VoteOutput),
    /// Stake-pool transfer details.
    Stake(ExchangeVotesOutput),
}

impl OutputPayload {
    /// Writes the payload for its output type.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            OutputPayload::None => Ok(()),
            OutputPayload::Vote(v) => v.serialize(w),
            OutputPayload::Stake(s) => s.serialize(w),
        }
    }

    /// Reads the payload variant selected by `output_type`.
    pub fn deserialize<R: Read>(output_type: OutputType, r: &mut R) -> io::Result<OutputPayload> {
        Ok(match output_type {
            OutputType::None => OutputPayload::None,
            OutputType::Vote => OutputPayload::Vote(VoteOutput::deserialize(r)?),
            OutputType::Stake => OutputPayload::Stake(ExchangeVotesOutput::deserialize(r)?),
        })
    }

    /// Structural validity of the payload itself.
    pub fn validate(&self) -> io::Result<()> {
        match self {
            OutputPayload::None => Ok(()),
            OutputPayload::Vote(v) => v.validate(),
            OutputPayload::Stake(s) => s.validate(),
        }
    }
}

/// Reads a one-byte tx type tag.
pub fn read_tx_type<R: Read>(r: &mut R) -> io::Result<TxType> {
    let tag = r.read_u8()?;
    TxType::from_u8(tag).ok_or_else(|| invalid_data(format!("unknown tx type {:#04x}", tag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_type_tags_roundtrip() {
        for t in [
            TxType::CoinBase,
            TxType::RegisterProducer,
            TxType::CrcProposal,
            TxType::CreateNft,
        ] {
            assert_eq!(TxType::from_u8(t as u8), Some(t));
        }
        assert_eq!(TxType::from_u8(0xee), None);
    }

    #[test]
    fn default_payload_matches_type() {
        let p = Payload::default_for(TxType::CancelProducer);
        assert!(matches!(p, Payload::ProcessProducer(_)));
    }
}
