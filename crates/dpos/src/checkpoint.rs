//! Checkpoint adapter for the arbiter state.

use crate::state::{ArbiterState, StateData};
use kestrel_api::{BlockListener, Checkpoint, Priority};
use kestrel_types::block::DposBlock;
use kestrel_types::codec;
use kestrel_types::error::CheckpointError;
use kestrel_types::params::ChainParams;

/// Registry key of the arbiter checkpoint.
pub const CHECKPOINT_KEY: &str = "cp_dpos";
/// Snapshot file extension.
pub const DATA_EXTENSION: &str = ".dcp";
/// Blocks between persisted snapshots.
pub const SAVE_PERIOD: u32 = 720;
/// Blocks a snapshot lags the tip before replacing the default file.
pub const EFFECTIVE_PERIOD: u32 = 720;

/// Wraps an [`ArbiterState`] as a manager-registered checkpoint.
pub struct ArbitersCheckpoint {
    state: ArbiterState,
    height: u32,
    start_height: u32,
    save_start_height: u32,
}

impl ArbitersCheckpoint {
    /// Builds the checkpoint; consumption starts at the public DPoS height.
    pub fn new(params: ChainParams) -> ArbitersCheckpoint {
        let start_height = params.public_dpos_height;
        ArbitersCheckpoint {
            state: ArbiterState::new(params),
            height: 0,
            start_height,
            save_start_height: start_height,
        }
    }

    /// The wrapped live state.
    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    /// Mutable access for the node wiring.
    pub fn state_mut(&mut self) -> &mut ArbiterState {
        &mut self.state
    }
}

impl BlockListener for ArbitersCheckpoint {
    fn on_block_saved(&mut self, block: &DposBlock) {
        self.state.process_block(block);
    }

    fn on_rollback_to(&mut self, height: u32) -> Result<(), CheckpointError> {
        self.state.rollback_to(height);
        if self.height > height {
            self.height = height;
        }
        Ok(())
    }

    fn on_rollback_seek_to(&mut self, height: u32) {
        self.state.rollback_seek_to(height);
    }
}

impl Checkpoint for ArbitersCheckpoint {
    fn key(&self) -> &str {
        CHECKPOINT_KEY
    }

    fn priority(&self) -> Priority {
        Priority::High
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
        self.save_start_height
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
        codec::to_bytes_canonical(&(self.height, self.state.data().clone()))
    }

    fn restore(&mut self, bytes: &[u8]) -> Result<(), CheckpointError> {
        let (height, data): (u32, StateData) =
            codec::from_bytes_canonical(bytes).map_err(CheckpointError::Decode)?;
        self.state.replace_data(data);
        self.height = height;
        Ok(())
    }

    fn generate(&self, bytes: &[u8]) -> Result<Box<dyn Checkpoint>, CheckpointError> {
        let mut fresh = ArbitersCheckpoint::new(self.state.params().clone());
        fresh.restore(bytes)?;
        Ok(Box::new(fresh))
    }

    fn on_init(&mut self) {}

    fn on_reset(&mut self) {
        let params = self.state.params().clone();
        self.state = ArbiterState::new(params);
        self.height = 0;
    }
}
