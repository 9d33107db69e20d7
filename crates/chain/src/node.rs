//! In-memory header chain nodes, the median-time window and the difficulty
//! retarget.

use kestrel_types::compact::{big_to_compact, compact_to_big};
use kestrel_types::error::RuleError;
use kestrel_types::hash::Hash256;
use kestrel_types::params::ChainParams;
use num_bigint::BigInt;
use std::sync::Arc;

/// Headers contributing to the past-median-time window.
pub const MEDIAN_TIME_BLOCKS: usize = 11;

/// A settled header in the ancestor chain, linked towards genesis.
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// Hash of this header.
    pub hash: Hash256,
    /// Parent node; `None` at genesis.
    pub prev: Option<Arc<BlockNode>>,
    /// Header height.
    pub height: u32,
    /// Header timestamp, unix seconds.
    pub timestamp: u32,
    /// Header compact target.
    pub bits: u32,
}

impl BlockNode {
    /// Creates the genesis node.
    pub fn genesis(hash: Hash256, timestamp: u32, bits: u32) -> Arc<BlockNode> {
        Arc::new(BlockNode {
            hash,
            prev: None,
            height: 0,
            timestamp,
            bits,
        })
    }

    /// Appends a child node.
    pub fn extend(self: &Arc<Self>, hash: Hash256, timestamp: u32, bits: u32) -> Arc<BlockNode> {
        Arc::new(BlockNode {
            hash,
            prev: Some(Arc::clone(self)),
            height: self.height + 1,
            timestamp,
            bits,
        })
    }

    /// Walks `back` ancestors towards genesis, saturating at genesis.
    pub fn ancestor(self: &Arc<Self>, back: u32) -> Arc<BlockNode> {
        let mut node = Arc::clone(self);
        for _ in 0..back {
            match &node.prev {
                Some(prev) => node = Arc::clone(prev),
                None => break,
            }
        }
        node
    }
}

/// Median timestamp of the last [`MEDIAN_TIME_BLOCKS`] headers ending at
/// `node`.
pub fn median_time_past(node: &Arc<BlockNode>) -> u32 {
    let mut timestamps = Vec::with_capacity(MEDIAN_TIME_BLOCKS);
    let mut cursor = Some(Arc::clone(node));
    while let Some(n) = cursor {
        timestamps.push(n.timestamp);
        if timestamps.len() == MEDIAN_TIME_BLOCKS {
            break;
        }
        cursor = n.prev.as_ref().map(Arc::clone);
    }
    timestamps.sort_unstable();
    timestamps[timestamps.len() / 2]
}

/// Computes the compact target required for the block following `prev`.
///
/// Every `target_timespan / target_time_per_block` blocks the target scales
/// by the actual window duration over the target duration, clamped to
/// `1/adjust_factor ..= adjust_factor`, and capped at the pow limit.
/// Non-boundary heights inherit the previous target.
pub fn calc_next_required_difficulty(
    prev: &Arc<BlockNode>,
    params: &ChainParams,
) -> Result<u32, RuleError> {
    let blocks_per_retarget = params.target_timespan / params.target_time_per_block;
    if blocks_per_retarget == 0 {
        return Err(RuleError::Difficulty(
            "difficulty window shorter than block interval".into(),
        ));
    }

    let next_height = prev.height + 1;
    if next_height % blocks_per_retarget != 0 {
        return Ok(prev.bits);
    }

    // First node of the closing window.
    let first = prev.ancestor(blocks_per_retarget - 1);
    let actual_timespan = prev.timestamp.saturating_sub(first.timestamp) as i64;
    let min_timespan = (params.target_timespan / params.adjust_factor) as i64;
    let max_timespan = (params.target_timespan * params.adjust_factor) as i64;
    let adjusted = actual_timespan.clamp(min_timespan, max_timespan);

    let old_target = compact_to_big(prev.bits);
    let new_target = old_target * BigInt::from(adjusted) / BigInt::from(params.target_timespan);

    let limit = params.pow_limit();
    let capped = if new_target > limit { limit } else { new_target };
    Ok(big_to_compact(&capped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> Hash256 {
        Hash256::double_sha256(&n.to_le_bytes())
    }

    fn chain_of(timestamps: &[u32], bits: u32) -> Arc<BlockNode> {
        let mut node = BlockNode::genesis(h(0), timestamps[0], bits);
        for (i, ts) in timestamps.iter().enumerate().skip(1) {
            node = node.extend(h(i as u64), *ts, bits);
        }
        node
    }

    #[test]
    fn median_of_short_chain_is_middle_value() {
        let tip = chain_of(&[100, 300, 200], 0x1d00_ffff);
        assert_eq!(median_time_past(&tip), 200);
    }

    #[test]
    fn median_uses_last_eleven() {
        let timestamps: Vec<u32> = (0..20).map(|i| 1000 + i * 10).collect();
        let tip = chain_of(&timestamps, 0x1d00_ffff);
        // Last 11 timestamps are 1090..=1190; their median is 1140.
        assert_eq!(median_time_past(&tip), 1140);
    }

    #[test]
    fn non_boundary_height_inherits_bits() {
        let params = ChainParams::default();
        let tip = chain_of(&[100, 220, 340], 0x1d00_ffff);
        // Height 3 is not a retarget boundary for the default 720-block window.
        assert_eq!(
            calc_next_required_difficulty(&tip, &params).unwrap(),
            0x1d00_ffff
        );
    }

    #[test]
    fn retarget_loosens_after_slow_window() {
        let mut params = ChainParams::default();
        // A 4-block retarget window for the test.
        params.target_timespan = 8 * 60;
        params.target_time_per_block = 2 * 60;
        params.pow_limit_bits = 0x2100_ffff;

        // Blocks arrive at twice the target spacing; height 4 is a boundary.
        let tip = chain_of(&[0, 240, 480, 720], 0x1d00_ffff);
        let next = calc_next_required_difficulty(&tip, &params).unwrap();
        let old = compact_to_big(0x1d00_ffff);
        let new = compact_to_big(next);
        assert!(new > old, "target must loosen when blocks are slow");
    }

    #[test]
    fn ancestor_saturates_at_genesis() {
        let tip = chain_of(&[1, 2, 3], 0x1d00_ffff);
        assert_eq!(tip.ancestor(100).height, 0);
    }
}
