//! Read-only views the validator is injected with.
//!
//! The original node reached this state through process-wide singletons;
//! here every collaborator arrives as an explicit trait object so the
//! validator stays a pure function of its inputs and tests inject fakes.

use kestrel_types::amount::Amount;
use kestrel_types::block::Block;
use kestrel_types::error::RuleError;
use kestrel_types::hash::Hash168;
use kestrel_types::tx::{Input, Output, Transaction};
use std::collections::{BTreeMap, HashMap};

/// Network-adjusted wall clock.
pub trait TimeSource: Send + Sync {
    /// Current adjusted time as unix seconds.
    fn adjusted_time(&self) -> u64;
}

/// Read-only UTXO lookups.
///
/// Validation never suspends on I/O; implementations answer from memory.
pub trait UtxoView: Send + Sync {
    /// Resolves each input of `tx` to the output it spends.
    fn tx_reference(&self, tx: &Transaction) -> Result<HashMap<Input, Output>, RuleError>;
}

/// Signature verification seam; real crypto lives outside the core.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `data` for a public key or code.
    fn verify(&self, key_or_code: &[u8], data: &[u8], signature: &[u8]) -> bool;

    /// True when `code` is a Schnorr redeem script.
    fn is_schnorr(&self, code: &[u8]) -> bool;
}

/// Which consensus regime currently produces blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsensusAlgorithm {
    /// The arbiter rotation confirms blocks.
    #[default]
    Dpos,
    /// The chain has reverted to raw PoW.
    Pow,
}

/// Lifecycle state of a registered producer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    parity_scale_codec::Encode,
    parity_scale_codec::Decode,
)]
pub enum ProducerStatus {
    /// Registered, not yet producing.
    #[default]
    Pending,
    /// In the candidate pool or the rotation.
    Active,
    /// Demoted for missing its turns.
    Inactive,
    /// Cancellation settled, deposit still locked.
    Canceled,
    /// Convicted by on-chain evidence.
    Illegal,
    /// Deposit returned, record retired.
    Returned,
}

/// A read-only summary of one producer, enough for validation rules.
#[derive(Debug, Clone, Default)]
pub struct ProducerDigest {
    /// The producer's owner key.
    pub owner_key: Vec<u8>,
    /// The producer's node key.
    pub node_key: Vec<u8>,
    /// Lifecycle state.
    pub status: ProducerStatus,
    /// Stake lock height; non-zero marks a DPoS v2 producer.
    pub stake_until: u32,
}

impl ProducerDigest {
    /// True when the producer registered with v2 staking semantics.
    pub fn is_dpos_v2(&self) -> bool {
        self.stake_until > 0
    }
}

/// Read-only producer registry lookups used by transaction rules.
pub trait ProducersView: Send + Sync {
    /// The producer registered under `owner_key`, if any.
    fn producer_by_owner(&self, owner_key: &[u8]) -> Option<ProducerDigest>;

    /// True when `node_key` is taken by any non-canceled producer.
    fn node_key_exists(&self, node_key: &[u8]) -> bool;

    /// True when `nickname` is taken by any non-canceled producer.
    fn nickname_exists(&self, nickname: &str) -> bool;

    /// True when a v2 stake vote with this refer-key hash exists, the
    /// precondition for minting its NFT.
    fn dpos_v2_vote_exists(&self, id: &kestrel_types::Hash256) -> bool;
}

/// Read-only committee lookups used by transaction rules.
pub trait CommitteeView: Send + Sync {
    /// True when a candidate is registered under `cid`.
    fn candidate_exists(&self, cid: &Hash168) -> bool;

    /// True when `did` belongs to a sitting, elected council member.
    fn is_elected_member(&self, did: &Hash168) -> bool;

    /// True when a proposal with this hash is known.
    fn proposal_exists(&self, hash: &kestrel_types::Hash256) -> bool;

    /// Treasury headroom available for new proposal budgets, before the
    /// amounts already committed by earlier transactions of the same block.
    fn available_committee_amount(&self) -> Amount;
}

/// What the validator needs from the arbiter state.
pub trait ArbitersView: Send + Sync {
    /// The per-arbiter reward table computed at the last round boundary.
    fn arbiters_round_reward(&self) -> BTreeMap<Hash168, Amount>;

    /// Rounding dust from the last round's reward split.
    fn final_round_change(&self) -> Amount;

    /// The height DPoS v2 became fully active, or `u32::MAX` if it has not.
    fn dpos_v2_active_height(&self) -> u32;

    /// The consensus regime in force.
    fn consensus_algorithm(&self) -> ConsensusAlgorithm;

    /// Timestamp of the last settled block.
    fn last_block_timestamp(&self) -> u32;

    /// Block-level placement rules for illegal-evidence transactions.
    fn check_dpos_illegal_tx(&self, block: &Block) -> Result<(), RuleError>;

    /// Block-level placement rules for committee appropriation transactions.
    fn check_crc_appropriation_tx(&self, block: &Block) -> Result<(), RuleError>;

    /// Block-level placement rules for next-turn announcements.
    fn check_next_turn_dpos_info_tx(&self, block: &Block) -> Result<(), RuleError>;

    /// Block-level placement rules for custom-id results.
    fn check_custom_id_results_tx(&self, block: &Block) -> Result<(), RuleError>;
}
