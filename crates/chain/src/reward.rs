//! Coinbase reward accounting across the three consensus eras.
//!
//! The split fractions are specified as ceilings of fractional products;
//! [`kestrel_types::Amount::ceil_mul`] reproduces them in exact integer
//! arithmetic so results cannot drift between platforms.

use kestrel_api::{ArbitersView, ConsensusAlgorithm};
use kestrel_types::amount::Amount;
use kestrel_types::error::RuleError;
use kestrel_types::params::ChainParams;
use kestrel_types::tx::Transaction;

/// Numerator/denominator of the arbiter share.
const ARBITER_SHARE: (i64, i64) = (35, 100);
/// Numerator/denominator of the cyber-republic share.
const CYBER_REPUBLIC_SHARE: (i64, i64) = (30, 100);

/// The 35% arbiter cut of a block's total reward.
pub fn block_dpos_reward(total_tx_fee: Amount, height: u32, params: &ChainParams) -> Amount {
    (total_tx_fee + params.block_reward(height)).ceil_mul(ARBITER_SHARE.0, ARBITER_SHARE.1)
}

/// Verifies the coinbase output layout and amounts for `height`.
pub fn check_coinbase_context(
    height: u32,
    coinbase: &Transaction,
    total_tx_fee: Amount,
    dpos_reward: Amount,
    params: &ChainParams,
    arbiters: &dyn ArbitersView,
) -> Result<(), RuleError> {
    let active_height = arbiters.dpos_v2_active_height();
    if active_height != u32::MAX && height > active_height + 1 {
        return check_dpos_v2_coinbase(height, coinbase, total_tx_fee, dpos_reward, params, arbiters);
    }

    if height >= params.public_dpos_height {
        return check_dpos_v1_coinbase(height, coinbase, total_tx_fee, params, arbiters);
    }

    // Pre-DPoS: the whole coinbase mints the configured block reward on top
    // of collected fees.
    let reward_in_coinbase: Amount = coinbase.outputs.iter().map(|o| o.value).sum();
    if reward_in_coinbase - total_tx_fee != params.block_reward(height) {
        return Err(RuleError::TxBalance(format!(
            "reward amount in coinbase not correct, height: {}, dpos height: {}",
            height, params.public_dpos_height
        )));
    }
    Ok(())
}

fn check_dpos_v2_coinbase(
    height: u32,
    coinbase: &Transaction,
    total_tx_fee: Amount,
    dpos_reward: Amount,
    params: &ChainParams,
    arbiters: &dyn ArbitersView,
) -> Result<(), RuleError> {
    let total_reward = total_tx_fee + params.block_reward(height);
    let reward_cyber_republic =
        total_reward.ceil_mul(CYBER_REPUBLIC_SHARE.0, CYBER_REPUBLIC_SHARE.1);
    let reward_dpos_arbiter = total_reward.ceil_mul(ARBITER_SHARE.0, ARBITER_SHARE.1);
    let reward_merge_miner = total_reward - reward_cyber_republic - reward_dpos_arbiter;

    if coinbase.outputs.len() != 3 {
        return Err(RuleError::TxBalance(
            "coinbase only can have 3 outputs at the most when it is DPoS v2".into(),
        ));
    }
    if coinbase.outputs[0].value != reward_cyber_republic {
        return Err(RuleError::TxBalance(
            "reward cyber republic value not correct".into(),
        ));
    }
    if coinbase.outputs[1].value != reward_merge_miner {
        return Err(RuleError::TxBalance(
            "reward merge miner value not correct".into(),
        ));
    }
    if coinbase.outputs[2].value != dpos_reward {
        return Err(RuleError::TxBalance(
            "last DPoS reward value not correct".into(),
        ));
    }

    match arbiters.consensus_algorithm() {
        ConsensusAlgorithm::Pow => {
            // In PoW-revert mode both governance shares burn.
            if coinbase.outputs[2].program_hash != params.destroy_program_hash {
                return Err(RuleError::TxBalance("DPoS reward address not correct".into()));
            }
            if coinbase.outputs[0].program_hash != params.destroy_program_hash {
                return Err(RuleError::TxBalance(
                    "reward cyber republic address not correct".into(),
                ));
            }
        }
        ConsensusAlgorithm::Dpos => {
            if coinbase.outputs[0].program_hash != params.crc_assets_program_hash {
                return Err(RuleError::TxBalance(
                    "reward cyber republic address not correct".into(),
                ));
            }
            if coinbase.outputs[2].program_hash != params.dpos_v2_reward_accumulate_program_hash {
                return Err(RuleError::TxBalance("DPoS reward address not correct".into()));
            }
        }
    }

    Ok(())
}

fn check_dpos_v1_coinbase(
    height: u32,
    coinbase: &Transaction,
    total_tx_fee: Amount,
    params: &ChainParams,
    arbiters: &dyn ArbitersView,
) -> Result<(), RuleError> {
    if coinbase.outputs.len() < 2 {
        return Err(RuleError::TxBalance(
            "DPoS v1 coinbase needs the foundation and miner outputs".into(),
        ));
    }

    let total_reward = total_tx_fee + params.block_reward(height);
    let reward_dpos_arbiter = total_reward.ceil_mul(ARBITER_SHARE.0, ARBITER_SHARE.1);
    let expected =
        total_reward - reward_dpos_arbiter + arbiters.final_round_change();
    if coinbase.outputs[0].value + coinbase.outputs[1].value != expected {
        return Err(RuleError::TxBalance(
            "reward amount in coinbase not correct".into(),
        ));
    }

    check_coinbase_arbiters_reward(coinbase, arbiters)
}

/// Verifies `outputs[2..]` against the arbiter round-reward table: the same
/// addresses, the same amounts, nothing extra.
pub fn check_coinbase_arbiters_reward(
    coinbase: &Transaction,
    arbiters: &dyn ArbitersView,
) -> Result<(), RuleError> {
    let rewards = arbiters.arbiters_round_reward();
    if rewards.len() != coinbase.outputs.len().saturating_sub(2) {
        return Err(RuleError::TxBalance("coinbase output count not match".into()));
    }

    for output in coinbase.outputs.iter().skip(2) {
        match rewards.get(&output.program_hash) {
            None => {
                return Err(RuleError::TxBalance("unknown dpos reward address".into()));
            }
            Some(amount) if *amount != output.value => {
                return Err(RuleError::TxBalance("incorrect dpos reward amount".into()));
            }
            Some(_) => {}
        }
    }

    Ok(())
}
