//! Block lifecycle listeners and the checkpoint capability.

use kestrel_types::block::DposBlock;
use kestrel_types::error::CheckpointError;

/// Fan-out order of checkpoints; lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Runs before everything else.
    VeryHigh = 0x00,
    /// Runs early.
    High = 0x01,
    /// Runs after the high band.
    MediumHigh = 0x02,
    /// The default band.
    Medium = 0x03,
    /// Runs after the default band.
    MediumLow = 0x04,
    /// Runs late.
    Low = 0x05,
    /// Runs last.
    VeryLow = 0x06,
}

/// Events during a block's lifetime, delivered to every registered state
/// listener.
///
/// Listeners must not hold references to each other; all coordination goes
/// through the checkpoint manager and each listener's own history journal.
pub trait BlockListener: Send {
    /// Fired after a block is settled in the chain, exactly once per height
    /// and in height order.
    fn on_block_saved(&mut self, block: &DposBlock);

    /// Fired during a chain rollback. Only a bounded number of blocks
    /// (6 by default) is guaranteed to be reversible.
    fn on_rollback_to(&mut self, height: u32) -> Result<(), CheckpointError>;

    /// Fired when rolling back bookkeeping only, after the state has been
    /// replaced from a snapshot.
    fn on_rollback_seek_to(&mut self, height: u32);
}

/// A state subsystem that can be snapshotted and restored by the checkpoint
/// manager.
///
/// The manager treats snapshot bytes as opaque; only the implementor knows
/// the encoding, and `restore(snapshot())` must reproduce the state
/// byte-exactly.
pub trait Checkpoint: BlockListener {
    /// The unique id this checkpoint registers under; also its directory
    /// name on disk.
    fn key(&self) -> &str;

    /// Fan-out position relative to other checkpoints.
    fn priority(&self) -> Priority;

    /// Height of the newest block folded into the live state.
    fn height(&self) -> u32;

    /// Records the height of the newest snapshot taken.
    fn set_height(&mut self, height: u32);

    /// First height this subsystem consumes blocks from.
    fn start_height(&self) -> u32;

    /// Height below which no snapshot files are written.
    fn save_start_height(&self) -> u32;

    /// Blocks between persisted snapshots.
    fn save_period(&self) -> u32;

    /// Blocks a snapshot lags the tip before it is final enough to replace
    /// the default file.
    fn effective_period(&self) -> u32;

    /// File extension of this subsystem's snapshot files.
    fn data_extension(&self) -> &str;

    /// A deep-copy snapshot of the current state.
    ///
    /// Called on the hot path under the manager's lock; the returned bytes
    /// are handed to a background worker, so they must not alias live state.
    fn snapshot(&self) -> Vec<u8>;

    /// Replaces the live state from snapshot bytes.
    fn restore(&mut self, bytes: &[u8]) -> Result<(), CheckpointError>;

    /// Builds a fresh instance of this checkpoint kind restored from
    /// snapshot bytes, leaving the live object untouched.
    fn generate(&self, bytes: &[u8]) -> Result<Box<dyn Checkpoint>, CheckpointError>;

    /// Fired after the manager successfully loaded the default snapshot.
    fn on_init(&mut self);

    /// Drops all state back to genesis.
    fn on_reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_ascending() {
        assert!(Priority::VeryHigh < Priority::High);
        assert!(Priority::Medium < Priority::VeryLow);
    }
}
