//! Manager fan-out, persistence and restore scenarios.

use kestrel_api::{BlockListener, Checkpoint, Priority};
use kestrel_checkpoint::{Config, Manager};
use kestrel_dpos::ArbitersCheckpoint;
use kestrel_types::block::{Block, DposBlock, Header};
use kestrel_types::codec;
use kestrel_types::error::CheckpointError;
use kestrel_types::params::ChainParams;
use parity_scale_codec::{Decode, Encode};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A minimal checkpoint that counts blocks and records call order.
struct ProbeCheckpoint {
    key: String,
    priority: Priority,
    height: u32,
    start_height: u32,
    save_period: u32,
    effective_period: u32,
    blocks_seen: u32,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ProbeCheckpoint {
    fn new(key: &str, priority: Priority, calls: Arc<Mutex<Vec<String>>>) -> ProbeCheckpoint {
        ProbeCheckpoint {
            key: key.to_string(),
            priority,
            height: 0,
            start_height: 0,
            save_period: 10,
            effective_period: 10,
            blocks_seen: 0,
            calls,
        }
    }
}

#[derive(Encode, Decode)]
struct ProbeSnapshot {
    height: u32,
    blocks_seen: u32,
}

impl BlockListener for ProbeCheckpoint {
    fn on_block_saved(&mut self, block: &DposBlock) {
        self.blocks_seen += 1;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{}@{}", self.key, block.height()));
        }
    }

    fn on_rollback_to(&mut self, height: u32) -> Result<(), CheckpointError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("rollback:{}@{}", self.key, height));
        }
        if self.height > height {
            self.height = height;
        }
        Ok(())
    }

    fn on_rollback_seek_to(&mut self, _height: u32) {}
}

impl Checkpoint for ProbeCheckpoint {
    fn key(&self) -> &str {
        &self.key
    }
    fn priority(&self) -> Priority {
        self.priority
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
        self.save_period
    }
    fn effective_period(&self) -> u32 {
        self.effective_period
    }
    fn data_extension(&self) -> &str {
        ".pcp"
    }
    fn snapshot(&self) -> Vec<u8> {
        codec::to_bytes_canonical(&ProbeSnapshot {
            height: self.height,
            blocks_seen: self.blocks_seen,
        })
    }
    fn restore(&mut self, bytes: &[u8]) -> Result<(), CheckpointError> {
        let snap: ProbeSnapshot =
            codec::from_bytes_canonical(bytes).map_err(CheckpointError::Decode)?;
        self.height = snap.height;
        self.blocks_seen = snap.blocks_seen;
        Ok(())
    }
    fn generate(&self, bytes: &[u8]) -> Result<Box<dyn Checkpoint>, CheckpointError> {
        let mut fresh = ProbeCheckpoint::new(&self.key, self.priority, Arc::clone(&self.calls));
        fresh.restore(bytes)?;
        Ok(Box::new(fresh))
    }
    fn on_init(&mut self) {}
    fn on_reset(&mut self) {
        self.height = 0;
        self.blocks_seen = 0;
    }
}

fn block_at(height: u32) -> DposBlock {
    DposBlock::unconfirmed(Block {
        header: Header {
            height,
            timestamp: 1_000 + height,
            ..Default::default()
        },
        transactions: Vec::new(),
    })
}

fn manager_in(dir: &TempDir) -> Manager {
    Manager::new(Config {
        data_path: dir.path().to_path_buf(),
        enable_history: true,
        need_save: true,
    })
}

#[test]
fn fan_out_follows_priority_order() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));

    // Registered in "wrong" key order; priority must win.
    manager.register(Box::new(ProbeCheckpoint::new(
        "a_low",
        Priority::Low,
        Arc::clone(&calls),
    )));
    manager.register(Box::new(ProbeCheckpoint::new(
        "z_high",
        Priority::VeryHigh,
        Arc::clone(&calls),
    )));

    manager.on_block_saved(&block_at(1), None, true, false);
    manager.on_rollback_to(0).unwrap();

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec!["z_high@1", "a_low@1", "rollback:z_high@0", "rollback:a_low@0"]
    );
}

#[test]
fn each_height_is_delivered_once() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register(Box::new(ProbeCheckpoint::new(
        "probe",
        Priority::Medium,
        Arc::clone(&calls),
    )));

    for height in 1..=12u32 {
        manager.on_block_saved(&block_at(height), None, true, false);
    }
    // Replaying an old block is a no-op: the checkpoint is already past it.
    manager.on_block_saved(&block_at(5), None, true, false);

    let seen: Vec<String> = calls.lock().unwrap().clone();
    let expected: Vec<String> = (1..=12).map(|h| format!("probe@{}", h)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn snapshots_land_on_save_period_boundaries() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register(Box::new(ProbeCheckpoint::new(
        "probe",
        Priority::Medium,
        calls,
    )));

    for height in 1..=25u32 {
        manager.on_block_saved(&block_at(height), None, true, false);
    }
    manager.close();

    // save_period is 10: snapshots at heights 10 and 20.
    assert!(dir.path().join("probe").join("10.pcp").exists());
    assert!(dir.path().join("probe").join("20.pcp").exists());
    assert!(!dir.path().join("probe").join("15.pcp").exists());
    // Height 20 = 10 + effective_period promoted the height-10 file.
    assert!(dir.path().join("probe").join("default.pcp").exists());
}

#[test]
fn get_checkpoint_prefers_live_state_and_falls_back_to_history() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register(Box::new(ProbeCheckpoint::new(
        "probe",
        Priority::Medium,
        calls,
    )));

    for height in 1..=25u32 {
        manager.on_block_saved(&block_at(height), None, true, false);
    }

    // Live: requested height at/above the checkpoint height.
    let live = manager.get_checkpoint("probe", 30).unwrap();
    assert_eq!(live.height(), 20);

    // History: height 12 resolves to the snapshot saved at height 10.
    let historical = manager.get_checkpoint("probe", 12).unwrap();
    assert_eq!(historical.height(), 10);

    assert!(matches!(
        manager.get_checkpoint("missing", 1),
        Err(CheckpointError::UnknownKey(_))
    ));
}

#[test]
fn safe_height_is_monotonic_under_saves() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register(Box::new(ProbeCheckpoint::new(
        "probe",
        Priority::Medium,
        calls,
    )));

    let mut last = 0;
    for height in 1..=40u32 {
        manager.on_block_saved(&block_at(height), None, true, false);
        let safe = manager.safe_height();
        assert!(safe >= last, "safe height regressed at {}", height);
        last = safe;
    }
    assert!(last > 0);
}

#[test]
fn restart_restores_saved_state_from_disk() {
    let dir = TempDir::new().unwrap();
    let params = {
        let mut params = ChainParams::default();
        // Let the arbiter checkpoint consume blocks from genesis.
        params.public_dpos_height = 0;
        params
    };

    // First run: process enough blocks to cross a save period, then stop.
    let saved_bytes;
    {
        let manager = manager_in(&dir);
        manager.register(Box::new(ArbitersCheckpoint::new(params.clone())));
        for height in 1..=720u32 {
            manager.on_block_saved(&block_at(height), None, true, false);
        }
        saved_bytes = manager
            .get_checkpoint(kestrel_dpos::checkpoint::CHECKPOINT_KEY, 720)
            .unwrap()
            .snapshot();
        // A full effective period later the height-720 file is promoted to
        // the default resume snapshot.
        for height in 721..=1441u32 {
            manager.on_block_saved(&block_at(height), None, true, false);
        }
        manager.close();
    }

    // Second run: a fresh manager restores the promoted default snapshot.
    let manager = manager_in(&dir);
    manager.register(Box::new(ArbitersCheckpoint::new(params)));
    manager.restore().unwrap();

    let restored = manager
        .get_checkpoint(kestrel_dpos::checkpoint::CHECKPOINT_KEY, 721)
        .unwrap();
    assert_eq!(restored.snapshot(), saved_bytes);
}
