//! Checkpoint adapter for the committee state.

use crate::committee::Committee;
use crate::state::CommitteeData;
use kestrel_api::{BlockListener, Checkpoint, Priority};
use kestrel_types::block::DposBlock;
use kestrel_types::codec;
use kestrel_types::error::CheckpointError;
use kestrel_types::params::ChainParams;

/// Registry key of the committee checkpoint.
pub const CHECKPOINT_KEY: &str = "cp_cr";
/// Snapshot file extension.
pub const DATA_EXTENSION: &str = ".ccp";
/// Blocks between persisted snapshots.
pub const SAVE_PERIOD: u32 = 720;
/// Blocks a snapshot lags the tip before replacing the default file.
pub const EFFECTIVE_PERIOD: u32 = 720;

/// Wraps a [`Committee`] as a manager-registered checkpoint.
pub struct CommitteeCheckpoint {
    committee: Committee,
    height: u32,
    start_height: u32,
}

impl CommitteeCheckpoint {
    /// Builds the checkpoint over a fresh committee.
    pub fn new(params: ChainParams) -> CommitteeCheckpoint {
        CommitteeCheckpoint {
            committee: Committee::new(params),
            height: 0,
            start_height: 0,
        }
    }

    /// The wrapped live committee.
    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Mutable access for the node wiring.
    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}

impl BlockListener for CommitteeCheckpoint {
    fn on_block_saved(&mut self, block: &DposBlock) {
        self.committee.process_block(block);
    }

    fn on_rollback_to(&mut self, height: u32) -> Result<(), CheckpointError> {
        self.committee.rollback_to(height);
        if self.height > height {
            self.height = height;
        }
        Ok(())
    }

    fn on_rollback_seek_to(&mut self, height: u32) {
        self.committee.rollback_seek_to(height);
    }
}

impl Checkpoint for CommitteeCheckpoint {
    fn key(&self) -> &str {
        CHECKPOINT_KEY
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    fn start_height(&self) -> u32 {
        self.start_height
    }

    fn save_start_height(&self) -> u32 {
        self.start_height
    }

    fn save_period(&self) -> u32 {
        SAVE_PERIOD
    }

    fn effective_period(&self) -> u32 {
        EFFECTIVE_PERIOD
    }

    fn data_extension(&self) -> &str {
        DATA_EXTENSION
    }

    fn snapshot(&self) -> Vec<u8> {
        codec::to_bytes_canonical(&(self.height, self.committee.data().clone()))
    }

    fn restore(&mut self, bytes: &[u8]) -> Result<(), CheckpointError> {
        let (height, data): (u32, CommitteeData) =
            codec::from_bytes_canonical(bytes).map_err(CheckpointError::Decode)?;
        self.committee.replace_data(data);
        self.height = height;
        Ok(())
    }

    fn generate(&self, bytes: &[u8]) -> Result<Box<dyn Checkpoint>, CheckpointError> {
        let mut fresh = CommitteeCheckpoint::new(self.committee.params().clone());
        fresh.restore(bytes)?;
        Ok(Box::new(fresh))
    }

    fn on_init(&mut self) {}

    fn on_reset(&mut self) {
        let params = self.committee.params().clone();
        self.committee = Committee::new(params);
        self.height = 0;
    }
}
