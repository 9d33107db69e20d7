//! Per-transaction-type validation rules.
//!
//! Each transaction type implements [`TxRules`], dispatched from
//! [`rules_for`] by the type tag. The hooks mirror the stages the validator
//! runs for every non-coinbase transaction: payload variant check, height
//! gating, attribute/program shape, then the stateful policy check.

use kestrel_api::views::{CommitteeView, ProducersView};
use kestrel_api::{ArbitersView, ConsensusAlgorithm, SignatureVerifier, UtxoView};
use kestrel_types::amount::Amount;
use kestrel_types::error::RuleError;
use kestrel_types::params::ChainParams;
use kestrel_types::payload::{
    OutputType, Payload, TxType, VoteKind, PROCESS_PRODUCER_SCHNORR_VERSION,
    VOTE_PRODUCER_AND_CR_VERSION,
};
use kestrel_types::tx::{
    is_valid_attribute_usage, Transaction, MIN_PROGRAM_CODE_SIZE, TX_VERSION_09,
};

/// Everything a transaction rule may consult.
pub struct TxRuleContext<'a> {
    /// Height of the block carrying the transaction.
    pub height: u32,
    /// Chain parameters.
    pub params: &'a ChainParams,
    /// Arbiter-layer view.
    pub arbiters: &'a dyn ArbitersView,
    /// Producer registry view.
    pub producers: &'a dyn ProducersView,
    /// Committee view.
    pub committee: &'a dyn CommitteeView,
    /// UTXO lookups.
    pub utxo: &'a dyn UtxoView,
    /// Signature verification seam.
    pub sig: &'a dyn SignatureVerifier,
    /// Budget total already committed by earlier proposals in this block.
    pub proposals_used_amount: Amount,
}

impl TxRuleContext<'_> {
    fn in_pow_mode(&self) -> bool {
        self.arbiters.consensus_algorithm() == ConsensusAlgorithm::Pow
    }
}

/// Validation hooks one transaction type implements.
pub trait TxRules: Send + Sync {
    /// The payload variant must match the type tag.
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError>;

    /// Height and version gating; defaults to no gate.
    fn height_version_check(&self, _tx: &Transaction, _ctx: &TxRuleContext) -> Result<(), RuleError> {
        Ok(())
    }

    /// Attribute and witness-program shape; defaults to the standard shape.
    fn check_attributes_and_programs(
        &self,
        tx: &Transaction,
        _ctx: &TxRuleContext,
    ) -> Result<(), RuleError> {
        check_standard_attributes_and_programs(tx, true)
    }

    /// Stateful policy checks against the injected views; defaults to none.
    fn special_context_check(&self, _tx: &Transaction, _ctx: &TxRuleContext) -> Result<(), RuleError> {
        Ok(())
    }

    /// Whether this type may appear while consensus is PoW-reverted.
    fn is_allowed_in_pow(&self) -> bool {
        false
    }
}

/// Attribute usages and witness-program shape shared by most types.
pub fn check_standard_attributes_and_programs(
    tx: &Transaction,
    need_programs: bool,
) -> Result<(), RuleError> {
    for attr in &tx.attributes {
        if !is_valid_attribute_usage(attr.usage) {
            return Err(RuleError::TxPayload(format!(
                "invalid attribute usage {:#04x}",
                attr.usage
            )));
        }
    }

    if need_programs && tx.programs.is_empty() {
        return Err(RuleError::TxPayload("transaction should have program".into()));
    }
    for program in &tx.programs {
        if program.code.len() < MIN_PROGRAM_CODE_SIZE {
            return Err(RuleError::TxPayload("invalid program code size".into()));
        }
    }
    Ok(())
}

fn wrong_payload() -> RuleError {
    RuleError::TxPayload("invalid payload type".into())
}

fn not_before(height: u32, gate: u32, what: &str, gate_name: &str) -> Result<(), RuleError> {
    if height < gate {
        return Err(RuleError::TxPayload(format!(
            "not support {} transaction before {}",
            what, gate_name
        )));
    }
    Ok(())
}

// --- Coinbase and plain transfers ------------------------------------------

struct CoinBaseRules;

impl TxRules for CoinBaseRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CoinBase(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn check_attributes_and_programs(
        &self,
        tx: &Transaction,
        _ctx: &TxRuleContext,
    ) -> Result<(), RuleError> {
        // The coinbase carries no witnesses; the reward accounting
        // validates its outputs.
        check_standard_attributes_and_programs(tx, false)
    }

    fn is_allowed_in_pow(&self) -> bool {
        true
    }
}

struct TransferAssetRules;

impl TxRules for TransferAssetRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::TransferAsset(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        // Vote outputs ride on transfers; gate council-related contents on
        // the candidate/member/proposal actually existing.
        if tx.version < TX_VERSION_09 {
            return Ok(());
        }
        for output in &tx.outputs {
            let Some(vote) = output.vote_payload() else {
                continue;
            };
            vote.validate()
                .map_err(|e| RuleError::TxPayload(e.to_string()))?;
            if vote.version < VOTE_PRODUCER_AND_CR_VERSION {
                continue;
            }
            for content in &vote.contents {
                for cv in &content.candidate_votes {
                    match content.vote_type {
                        VoteKind::Crc => {
                            let cid = cv.candidate_as_hash168().ok_or_else(|| {
                                RuleError::TxPayload("invalid CR candidate bytes".into())
                            })?;
                            if !ctx.committee.candidate_exists(&cid) {
                                return Err(RuleError::TxPayload(
                                    "vote for unregistered CR candidate".into(),
                                ));
                            }
                        }
                        VoteKind::CrcImpeachment => {
                            let did = cv.candidate_as_hash168().ok_or_else(|| {
                                RuleError::TxPayload("invalid CR member bytes".into())
                            })?;
                            if !ctx.committee.is_elected_member(&did) {
                                return Err(RuleError::TxPayload(
                                    "impeachment vote for non-elected member".into(),
                                ));
                            }
                        }
                        VoteKind::CrcProposal => {
                            let hash = kestrel_types::Hash256::from_slice(&cv.candidate)
                                .ok_or_else(|| {
                                    RuleError::TxPayload("invalid proposal hash bytes".into())
                                })?;
                            if !ctx.committee.proposal_exists(&hash) {
                                return Err(RuleError::TxPayload(
                                    "reject vote for unknown proposal".into(),
                                ));
                            }
                        }
                        VoteKind::Delegate => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn is_allowed_in_pow(&self) -> bool {
        true
    }
}

// --- Producer lifecycle ----------------------------------------------------

struct RegisterProducerRules;

impl TxRules for RegisterProducerRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::ProducerInfo(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn height_version_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::ProducerInfo(info) = &tx.payload else {
            return Err(wrong_payload());
        };
        if info.is_dpos_v2() {
            not_before(
                ctx.height,
                ctx.params.dpos_v2_start_height,
                tx.tx_type.name(),
                "DPoSV2StartHeight",
            )?;
        }
        Ok(())
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::ProducerInfo(info) = &tx.payload else {
            return Err(wrong_payload());
        };
        if info.owner_key.is_empty() || info.node_key.is_empty() {
            return Err(RuleError::TxPayload("empty producer key".into()));
        }
        if ctx.producers.producer_by_owner(&info.owner_key).is_some() {
            return Err(RuleError::TxPayload("producer already registered".into()));
        }
        if ctx.producers.node_key_exists(&info.node_key) {
            return Err(RuleError::TxPayload("node key already registered".into()));
        }
        if ctx.producers.nickname_exists(&info.nickname) {
            return Err(RuleError::TxPayload("nickname already in use".into()));
        }
        if info.is_dpos_v2()
            && info.stake_until < ctx.height + ctx.params.dpos_v2_deposit_min_lock_time
        {
            return Err(RuleError::TxPayload("stake lock too short".into()));
        }
        if !ctx
            .sig
            .verify(&info.owner_key, &info.data_for_signing(tx.payload_version), &info.signature)
        {
            return Err(RuleError::TxPayload("invalid signature in payload".into()));
        }
        Ok(())
    }
}

struct UpdateProducerRules;

impl TxRules for UpdateProducerRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::ProducerInfo(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn height_version_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        RegisterProducerRules.height_version_check(tx, ctx)
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::ProducerInfo(info) = &tx.payload else {
            return Err(wrong_payload());
        };
        let Some(existing) = ctx.producers.producer_by_owner(&info.owner_key) else {
            return Err(RuleError::TxPayload("getting unknown producer".into()));
        };
        // A v2 producer can only extend its lock, never shorten it.
        if existing.stake_until > 0 && info.stake_until < existing.stake_until {
            return Err(RuleError::TxPayload("stake lock can only extend".into()));
        }
        if info.node_key != existing.node_key && ctx.producers.node_key_exists(&info.node_key) {
            return Err(RuleError::TxPayload("node key already registered".into()));
        }
        if !ctx
            .sig
            .verify(&info.owner_key, &info.data_for_signing(tx.payload_version), &info.signature)
        {
            return Err(RuleError::TxPayload("invalid signature in payload".into()));
        }
        Ok(())
    }
}

struct CancelProducerRules;

impl TxRules for CancelProducerRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::ProcessProducer(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::ProcessProducer(process) = &tx.payload else {
            return Err(wrong_payload());
        };
        if process.owner_key.is_empty() {
            return Err(RuleError::TxPayload("invalid public key in payload".into()));
        }
        // Inline signature below the Schnorr version; later versions sign
        // through the outer witness, which program verification covers.
        if tx.payload_version < PROCESS_PRODUCER_SCHNORR_VERSION
            && !ctx.sig.verify(
                &process.owner_key,
                &process.data_for_signing(tx.payload_version),
                &process.signature,
            )
        {
            return Err(RuleError::TxPayload("invalid signature in payload".into()));
        }

        let Some(producer) = ctx.producers.producer_by_owner(&process.owner_key) else {
            return Err(RuleError::TxPayload("getting unknown producer".into()));
        };
        if producer.is_dpos_v2() {
            return Err(RuleError::TxPayload("can not cancel DPoS V2 producer".into()));
        }
        if producer.status != kestrel_api::ProducerStatus::Active {
            return Err(RuleError::TxPayload("can not cancel this producer".into()));
        }
        Ok(())
    }
}

// --- Council candidate lifecycle -------------------------------------------

struct RegisterCrRules;

impl TxRules for RegisterCrRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrInfo(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CrInfo(info) = &tx.payload else {
            return Err(wrong_payload());
        };
        if tx.tx_type == TxType::RegisterCr && ctx.committee.candidate_exists(&info.cid) {
            return Err(RuleError::TxPayload("CR candidate already registered".into()));
        }
        if tx.tx_type == TxType::UpdateCr && !ctx.committee.candidate_exists(&info.cid) {
            return Err(RuleError::TxPayload("updating unknown CR candidate".into()));
        }
        if !ctx
            .sig
            .verify(&info.code, &info.data_for_signing(tx.payload_version), &info.signature)
        {
            return Err(RuleError::TxPayload("invalid signature in payload".into()));
        }
        Ok(())
    }
}

struct UnregisterCrRules;

impl TxRules for UnregisterCrRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::UnregisterCr(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::UnregisterCr(payload) = &tx.payload else {
            return Err(wrong_payload());
        };
        if !ctx.committee.candidate_exists(&payload.cid) {
            return Err(RuleError::TxPayload("unregistering unknown CR candidate".into()));
        }
        Ok(())
    }
}

// --- Proposals -------------------------------------------------------------

struct CrcProposalRules;

impl TxRules for CrcProposalRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrcProposal(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CrcProposal(proposal) = &tx.payload else {
            return Err(wrong_payload());
        };
        if proposal.budgets.is_empty() {
            return Err(RuleError::TxPayload("proposal without budgets".into()));
        }
        for budget in &proposal.budgets {
            if !budget.amount.is_positive() {
                return Err(RuleError::TxPayload("non-positive budget stage".into()));
            }
        }
        if ctx.committee.proposal_exists(&proposal.hash(tx.payload_version)) {
            return Err(RuleError::TxPayload("proposal already registered".into()));
        }
        if !ctx.committee.is_elected_member(&proposal.cr_council_member_did) {
            return Err(RuleError::TxPayload(
                "proposal sponsor is not an elected member".into(),
            ));
        }
        // Budgets already committed by earlier proposals in this block count
        // against the same headroom.
        let headroom = ctx.committee.available_committee_amount() - ctx.proposals_used_amount;
        if proposal.total_budget() > headroom {
            return Err(RuleError::TxBalance(
                "proposal budgets exceed committee funds".into(),
            ));
        }
        if !ctx.sig.verify(
            &proposal.owner_key,
            &proposal.data_for_signing(tx.payload_version),
            &proposal.signature,
        ) {
            return Err(RuleError::TxPayload("invalid signature in payload".into()));
        }
        Ok(())
    }
}

struct CrcProposalReviewRules;

impl TxRules for CrcProposalReviewRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrcProposalReview(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CrcProposalReview(review) = &tx.payload else {
            return Err(wrong_payload());
        };
        if !ctx.committee.proposal_exists(&review.proposal_hash) {
            return Err(RuleError::TxPayload("reviewing unknown proposal".into()));
        }
        if !ctx.committee.is_elected_member(&review.did) {
            return Err(RuleError::TxPayload("reviewer is not an elected member".into()));
        }
        Ok(())
    }
}

struct CrcProposalTrackingRules;

impl TxRules for CrcProposalTrackingRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrcProposalTracking(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CrcProposalTracking(tracking) = &tx.payload else {
            return Err(wrong_payload());
        };
        if !ctx.committee.proposal_exists(&tracking.proposal_hash) {
            return Err(RuleError::TxPayload("tracking unknown proposal".into()));
        }
        Ok(())
    }
}

struct CrcProposalWithdrawRules;

impl TxRules for CrcProposalWithdrawRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrcProposalWithdraw(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CrcProposalWithdraw(withdraw) = &tx.payload else {
            return Err(wrong_payload());
        };
        if !ctx.committee.proposal_exists(&withdraw.proposal_hash) {
            return Err(RuleError::TxPayload("withdrawing from unknown proposal".into()));
        }
        if !withdraw.amount.is_positive() {
            return Err(RuleError::TxBalance("non-positive withdrawal".into()));
        }
        Ok(())
    }
}

struct CrcAppropriationRules;

impl TxRules for CrcAppropriationRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CrcAppropriation(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn check_attributes_and_programs(
        &self,
        tx: &Transaction,
        _ctx: &TxRuleContext,
    ) -> Result<(), RuleError> {
        check_standard_attributes_and_programs(tx, false)
    }
}

// --- Votes and staking -----------------------------------------------------

struct ExchangeVotesRules;

impl ExchangeVotesRules {
    fn check_output_single_input(tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        if tx.outputs.len() > 2 {
            return Err(RuleError::TxPayload(
                "output count should not be greater than 2".into(),
            ));
        }
        if tx.outputs.is_empty() {
            return Err(RuleError::TxPayload("transaction has no outputs".into()));
        }
        if tx.programs.len() != 1 {
            return Err(RuleError::TxPayload("invalid programs count".into()));
        }
        Self::check_common_outputs(tx, ctx)
    }

    fn check_output_multi_inputs(tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        if tx.outputs.is_empty() {
            return Err(RuleError::TxPayload("transaction has no outputs".into()));
        }
        if tx.programs.is_empty() {
            return Err(RuleError::TxPayload("invalid programs count".into()));
        }
        Self::check_common_outputs(tx, ctx)
    }

    fn check_common_outputs(tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        for output in &tx.outputs {
            if output.asset_id != ctx.params.native_asset_id {
                return Err(RuleError::TxPayload("asset ID in output is invalid".into()));
            }
            if !output.value.is_positive() {
                return Err(RuleError::TxPayload("invalid transaction UTXO output".into()));
            }
        }
        let first = &tx.outputs[0];
        if first.output_type != OutputType::Stake {
            return Err(RuleError::TxPayload("invalid output type".into()));
        }
        first
            .payload
            .validate()
            .map_err(|e| RuleError::TxPayload(e.to_string()))?;
        if first.program_hash != ctx.params.stake_pool_program_hash {
            return Err(RuleError::TxPayload(
                "first output address need to be stake address".into(),
            ));
        }
        Ok(())
    }
}

impl TxRules for ExchangeVotesRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::ExchangeVotes(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn height_version_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        not_before(
            ctx.height,
            ctx.params.dpos_v2_start_height,
            tx.tx_type.name(),
            "DPoSV2StartHeight",
        )?;
        if ctx.height < ctx.params.multi_exchange_votes_start_height && tx.programs.len() > 1 {
            return Err(RuleError::TxPayload(format!(
                "not support multi-addr {} transaction before MultiExchangeVotesStartHeight",
                tx.tx_type.name()
            )));
        }
        Ok(())
    }

    fn check_attributes_and_programs(
        &self,
        tx: &Transaction,
        ctx: &TxRuleContext,
    ) -> Result<(), RuleError> {
        check_standard_attributes_and_programs(tx, true)?;
        if ctx.in_pow_mode() && tx.programs.len() != 1 {
            return Err(RuleError::TxPayload(
                "transaction should have one program".into(),
            ));
        }
        Ok(())
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        if ctx.height < ctx.params.votes_schnorr_start_height {
            for program in &tx.programs {
                if ctx.sig.is_schnorr(&program.code) {
                    return Err(RuleError::TxPayload(format!(
                        "not support {} transaction before VotesSchnorrStartHeight",
                        tx.tx_type.name()
                    )));
                }
            }
        }
        if ctx.in_pow_mode() || ctx.height < ctx.params.multi_exchange_votes_start_height {
            Self::check_output_single_input(tx, ctx)
        } else {
            Self::check_output_multi_inputs(tx, ctx)
        }
    }

    fn is_allowed_in_pow(&self) -> bool {
        true
    }
}

struct CreateNftRules;

impl TxRules for CreateNftRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::CreateNft(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn height_version_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        not_before(
            ctx.height,
            ctx.params.nft_start_height,
            tx.tx_type.name(),
            "NFTStartHeight",
        )
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::CreateNft(payload) = &tx.payload else {
            return Err(wrong_payload());
        };
        if !ctx.producers.dpos_v2_vote_exists(&payload.id) {
            return Err(RuleError::TxPayload("the NFT ID does not exist".into()));
        }
        Ok(())
    }
}

// --- Sidechain and arbiter specials ----------------------------------------

struct WithdrawFromSideChainRules;

impl TxRules for WithdrawFromSideChainRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::WithdrawFromSideChain(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn is_allowed_in_pow(&self) -> bool {
        true
    }
}

/// Shared shape for the no-witness arbiter specials: verified payload, no
/// inputs, no outputs, no programs.
fn check_bare_special(tx: &Transaction) -> Result<(), RuleError> {
    if !tx.inputs.is_empty() || !tx.outputs.is_empty() {
        return Err(RuleError::TxPayload(
            "special transaction must not move coins".into(),
        ));
    }
    check_standard_attributes_and_programs(tx, false)
}

macro_rules! bare_special_rules {
    ($name:ident, $variant:ident, $pow:expr) => {
        struct $name;

        impl TxRules for $name {
            fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
                match tx.payload {
                    Payload::$variant(_) => Ok(()),
                    _ => Err(wrong_payload()),
                }
            }

            fn check_attributes_and_programs(
                &self,
                tx: &Transaction,
                _ctx: &TxRuleContext,
            ) -> Result<(), RuleError> {
                check_bare_special(tx)
            }

            fn is_allowed_in_pow(&self) -> bool {
                $pow
            }
        }
    };
}

bare_special_rules!(IllegalBlockEvidenceRules, IllegalBlockEvidence, true);
bare_special_rules!(SidechainIllegalRules, SidechainIllegalData, false);
bare_special_rules!(InactiveArbitratorsRules, InactiveArbitrators, false);
bare_special_rules!(NextTurnDposInfoRules, NextTurnDposInfo, true);
bare_special_rules!(CustomIdResultRules, CustomIdResult, false);
bare_special_rules!(RecordSponsorRules, RecordSponsor, true);

struct RevertToPowRules;

impl TxRules for RevertToPowRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::RevertToPow(_) => Ok(()),
            _ => Err(wrong_payload()),
        }
    }

    fn height_version_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        not_before(
            ctx.height,
            ctx.params.revert_to_pow_start_height,
            tx.tx_type.name(),
            "RevertToPOWStartHeight",
        )
    }

    fn check_attributes_and_programs(
        &self,
        tx: &Transaction,
        _ctx: &TxRuleContext,
    ) -> Result<(), RuleError> {
        check_bare_special(tx)
    }

    fn special_context_check(&self, tx: &Transaction, ctx: &TxRuleContext) -> Result<(), RuleError> {
        let Payload::RevertToPow(payload) = &tx.payload else {
            return Err(wrong_payload());
        };
        if payload.working_height != ctx.height {
            return Err(RuleError::ConsensusRule(
                "revert working height must match block height".into(),
            ));
        }
        Ok(())
    }

    fn is_allowed_in_pow(&self) -> bool {
        true
    }
}

struct ReturnDepositRules;

impl TxRules for ReturnDepositRules {
    fn check_payload(&self, tx: &Transaction) -> Result<(), RuleError> {
        match tx.payload {
            Payload::ReturnDepositCoin | Payload::ReturnCrDepositCoin => Ok(()),
            _ => Err(wrong_payload()),
        }
    }
}

/// Returns the rules for a transaction type.
pub fn rules_for(tx_type: TxType) -> &'static dyn TxRules {
    match tx_type {
        TxType::CoinBase => &CoinBaseRules,
        TxType::TransferAsset => &TransferAssetRules,
        TxType::WithdrawFromSideChain => &WithdrawFromSideChainRules,
        TxType::RegisterProducer => &RegisterProducerRules,
        TxType::UpdateProducer => &UpdateProducerRules,
        TxType::CancelProducer => &CancelProducerRules,
        TxType::ReturnDepositCoin | TxType::ReturnCrDepositCoin => &ReturnDepositRules,
        TxType::IllegalBlockEvidence => &IllegalBlockEvidenceRules,
        TxType::SidechainIllegalEvidence => &SidechainIllegalRules,
        TxType::InactiveArbitrators => &InactiveArbitratorsRules,
        TxType::NextTurnDposInfo => &NextTurnDposInfoRules,
        TxType::RecordSponsor => &RecordSponsorRules,
        TxType::RegisterCr | TxType::UpdateCr => &RegisterCrRules,
        TxType::UnregisterCr => &UnregisterCrRules,
        TxType::CrcProposal => &CrcProposalRules,
        TxType::CrcProposalReview => &CrcProposalReviewRules,
        TxType::CrcProposalTracking => &CrcProposalTrackingRules,
        TxType::CrcAppropriation => &CrcAppropriationRules,
        TxType::CrcProposalWithdraw => &CrcProposalWithdrawRules,
        TxType::CustomIdResult => &CustomIdResultRules,
        TxType::RevertToPow => &RevertToPowRules,
        TxType::ExchangeVotes => &ExchangeVotesRules,
        TxType::CreateNft => &CreateNftRules,
    }
}
