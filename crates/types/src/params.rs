//! Chain parameters and height thresholds.
//!
//! Every consensus-relevant constant lives here so tests and alternative
//! networks can inject their own values. Fields all carry serde defaults, so
//! a TOML file only needs to name what it overrides.

use crate::amount::Amount;
use crate::compact::compact_to_big;
use crate::hash::Hash168;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Genesis coin supply in grains: 33 million coins.
pub const ORIGIN_SUPPLY: i64 = 33_000_000 * crate::amount::GRAINS_PER_COIN;
/// Blocks per year at the 2-minute block interval.
pub const BLOCKS_PER_YEAR: i64 = 365 * 24 * 30;
/// Annual inflation in percent.
pub const INFLATION_PER_YEAR_PERCENT: i64 = 4;
/// Blocks between reward halvings on the reduced issuance schedule.
pub const REWARD_ADJUST_INTERVAL: u32 = 4 * BLOCKS_PER_YEAR as u32;

fn default_pow_limit_bits() -> u32 {
    0x1f00_8fff
}
fn default_aux_pow_chain_id() -> u32 {
    6
}
fn default_max_tx_per_block() -> u32 {
    10_000
}
fn default_max_block_header_size() -> u32 {
    1 << 20
}
fn default_max_block_context_size() -> u32 {
    8 << 20
}
fn default_target_time_per_block() -> u32 {
    2 * 60
}
fn default_target_timespan() -> u32 {
    24 * 60 * 60
}
fn default_adjust_factor() -> u32 {
    4
}
fn default_public_dpos_height() -> u32 {
    402_680
}
fn default_dpos_v2_start_height() -> u32 {
    1_405_000
}
fn default_dpos_v2_active_height() -> u32 {
    u32::MAX
}
fn default_nft_start_height() -> u32 {
    1_405_000
}
fn default_record_sponsor_start_height() -> u32 {
    u32::MAX
}
fn default_votes_schnorr_start_height() -> u32 {
    u32::MAX
}
fn default_multi_exchange_votes_start_height() -> u32 {
    u32::MAX
}
fn default_revert_to_pow_start_height() -> u32 {
    738_000
}
fn default_change_view_v1_height() -> u32 {
    1_405_000
}
fn default_new_issuance_height() -> u32 {
    1_300_000
}
fn default_check_reward_height() -> u32 {
    436_812
}
fn default_stop_confirm_block_time() -> i64 {
    11 * 60
}
fn default_stop_confirm_block_time_v1() -> i64 {
    7 * 60
}
fn default_revert_to_pow_no_block_time() -> i64 {
    12 * 60
}
fn default_revert_to_pow_no_block_time_v1() -> i64 {
    8 * 60
}
fn default_cr_member_count() -> u32 {
    12
}
fn default_cr_agreement_count() -> u32 {
    8
}
fn default_proposal_cr_voting_period() -> u32 {
    7 * 720
}
fn default_proposal_public_voting_period() -> u32 {
    7 * 720
}
fn default_voter_reject_percentage() -> u32 {
    10
}
fn default_producer_pending_blocks() -> u32 {
    6
}
fn default_max_rollback_depth() -> u32 {
    6
}
fn default_dpos_v2_deposit_min_lock_time() -> u32 {
    7200
}
fn default_data_path() -> PathBuf {
    PathBuf::from("data/checkpoints")
}
fn default_true() -> bool {
    true
}

/// All consensus parameters of a kestrel network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Compact form of the largest admissible PoW target.
    #[serde(default = "default_pow_limit_bits")]
    pub pow_limit_bits: u32,
    /// Chain id merge-mining proofs must declare.
    #[serde(default = "default_aux_pow_chain_id")]
    pub aux_pow_chain_id: u32,
    /// Most transactions one block may carry.
    #[serde(default = "default_max_tx_per_block")]
    pub max_tx_per_block: u32,
    /// Largest serialized header accepted.
    #[serde(default = "default_max_block_header_size")]
    pub max_block_header_size: u32,
    /// Largest serialized block body accepted, beyond the header allowance.
    #[serde(default = "default_max_block_context_size")]
    pub max_block_context_size: u32,
    /// Seconds aimed at between blocks.
    #[serde(default = "default_target_time_per_block")]
    pub target_time_per_block: u32,
    /// Seconds per difficulty adjustment window.
    #[serde(default = "default_target_timespan")]
    pub target_timespan: u32,
    /// Clamp factor for one retarget step.
    #[serde(default = "default_adjust_factor")]
    pub adjust_factor: u32,

    /// First height of the public DPoS era (coinbase era 2).
    #[serde(default = "default_public_dpos_height")]
    pub public_dpos_height: u32,
    /// First height DPoS v2 registrations are accepted.
    #[serde(default = "default_dpos_v2_start_height")]
    pub dpos_v2_start_height: u32,
    /// Height at which DPoS v2 went fully active (coinbase era 3 starts at
    /// `+2`); `u32::MAX` while v2 has not activated.
    #[serde(default = "default_dpos_v2_active_height")]
    pub dpos_v2_active_height: u32,
    /// First height NFT minting is accepted.
    #[serde(default = "default_nft_start_height")]
    pub nft_start_height: u32,
    /// First height the record-sponsor rule is enforced.
    #[serde(default = "default_record_sponsor_start_height")]
    pub record_sponsor_start_height: u32,
    /// First height Schnorr witnesses are accepted on vote transactions.
    #[serde(default = "default_votes_schnorr_start_height")]
    pub votes_schnorr_start_height: u32,
    /// First height multi-input exchange-votes transactions are accepted.
    #[serde(default = "default_multi_exchange_votes_start_height")]
    pub multi_exchange_votes_start_height: u32,
    /// First height the PoW-revert machinery exists.
    #[serde(default = "default_revert_to_pow_start_height")]
    pub revert_to_pow_start_height: u32,
    /// Height the v1 view-change timing activates.
    #[serde(default = "default_change_view_v1_height")]
    pub change_view_v1_height: u32,
    /// Height the reduced issuance schedule starts.
    #[serde(default = "default_new_issuance_height")]
    pub new_issuance_height: u32,
    /// Height below which a coinbase mismatch also dumps the fully
    /// serialized block to the log.
    #[serde(default = "default_check_reward_height")]
    pub check_reward_height: u32,

    /// Seconds without a confirm after which arbiters stop confirming.
    #[serde(default = "default_stop_confirm_block_time")]
    pub stop_confirm_block_time: i64,
    /// `stop_confirm_block_time` after the v1 view-change height.
    #[serde(default = "default_stop_confirm_block_time_v1")]
    pub stop_confirm_block_time_v1: i64,
    /// Seconds without a block after which a PoW revert is proposed.
    #[serde(default = "default_revert_to_pow_no_block_time")]
    pub revert_to_pow_no_block_time: i64,
    /// `revert_to_pow_no_block_time` after the v1 view-change height.
    #[serde(default = "default_revert_to_pow_no_block_time_v1")]
    pub revert_to_pow_no_block_time_v1: i64,

    /// Seats on the council.
    #[serde(default = "default_cr_member_count")]
    pub cr_member_count: u32,
    /// Council approvals required to pass a proposal.
    #[serde(default = "default_cr_agreement_count")]
    pub cr_agreement_count: u32,
    /// Blocks the council has to review a registered proposal.
    #[serde(default = "default_proposal_cr_voting_period")]
    pub proposal_cr_voting_period: u32,
    /// Blocks the public has to reject an approved proposal.
    #[serde(default = "default_proposal_public_voting_period")]
    pub proposal_public_voting_period: u32,
    /// Percent of circulation whose reject votes cancel a proposal.
    #[serde(default = "default_voter_reject_percentage")]
    pub voter_reject_percentage: u32,

    /// Blocks a registered producer stays pending before activation.
    #[serde(default = "default_producer_pending_blocks")]
    pub producer_pending_blocks: u32,
    /// Deepest rollback the node tolerates.
    #[serde(default = "default_max_rollback_depth")]
    pub max_rollback_depth: u32,
    /// Shortest stake lock accepted from a v2 producer.
    #[serde(default = "default_dpos_v2_deposit_min_lock_time")]
    pub dpos_v2_deposit_min_lock_time: u32,

    /// Identity of the native asset minted by the genesis block.
    #[serde(default)]
    pub native_asset_id: crate::hash::Hash256,
    /// Program hash of the stake pool.
    #[serde(default)]
    pub stake_pool_program_hash: Hash168,
    /// Program hash that burns coins.
    #[serde(default)]
    pub destroy_program_hash: Hash168,
    /// Program hash holding council assets.
    #[serde(default)]
    pub crc_assets_program_hash: Hash168,
    /// Program hash accumulating DPoS v2 rewards.
    #[serde(default)]
    pub dpos_v2_reward_accumulate_program_hash: Hash168,
    /// Program hash of the council foundation.
    #[serde(default)]
    pub crc_foundation: Hash168,
    /// Program hash of the council's operating treasury.
    #[serde(default)]
    pub crc_committee_address: Hash168,

    /// Root directory for checkpoint files.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Keep per-height snapshot history on disk.
    #[serde(default = "default_true")]
    pub enable_history: bool,
    /// Persist snapshots at all.
    #[serde(default = "default_true")]
    pub need_save: bool,
}

impl Default for ChainParams {
    fn default() -> Self {
        // Round-trip through serde so the field defaults are the single
        // source of truth.
        toml::from_str("").unwrap_or_else(|_| unreachable!("all fields carry defaults"))
    }
}

impl ChainParams {
    /// Loads parameters from a TOML file; missing fields keep defaults.
    pub fn from_toml_file(path: &Path) -> std::io::Result<ChainParams> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// The largest admissible PoW target as a big integer.
    pub fn pow_limit(&self) -> BigInt {
        compact_to_big(self.pow_limit_bits)
    }

    /// The minted reward for a block at `height`.
    ///
    /// Up to `new_issuance_height` issuance is the flat 4%-per-year
    /// inflation over the genesis supply. From there the reduced schedule
    /// applies: the per-block reward halves once immediately and then again
    /// every [`REWARD_ADJUST_INTERVAL`] blocks, integer math throughout.
    pub fn block_reward(&self, height: u32) -> Amount {
        let annual = ORIGIN_SUPPLY / 100 * INFLATION_PER_YEAR_PERCENT;
        let per_block = annual / BLOCKS_PER_YEAR;
        if height < self.new_issuance_height {
            return Amount::from_grains(per_block);
        }
        let reductions = (height - self.new_issuance_height) / REWARD_ADJUST_INTERVAL + 1;
        Amount::from_grains(per_block >> reductions.min(63))
    }

    /// The confirm-stop window applicable at `height`.
    pub fn stop_confirm_time(&self, height: u32) -> i64 {
        if height < self.change_view_v1_height {
            self.stop_confirm_block_time
        } else {
            self.stop_confirm_block_time_v1
        }
    }

    /// The no-block revert window applicable at `height`.
    pub fn revert_no_block_time(&self, height: u32) -> i64 {
        if height < self.change_view_v1_height {
            self.revert_to_pow_no_block_time
        } else {
            self.revert_to_pow_no_block_time_v1
        }
    }
}
