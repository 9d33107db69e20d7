//! The checkpoint registry and its priority-ordered fan-out.

use crate::channel::{default_file_path, height_file_path, FileChannel};
use kestrel_api::{BlockListener, Checkpoint, Priority};
use kestrel_types::block::DposBlock;
use kestrel_types::error::CheckpointError;
use kestrel_types::params::ChainParams;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::sync::oneshot;
use tracing::{error, warn};

/// Key of the transaction-pool checkpoint, excluded from the safe height.
pub const TXPOOL_CHECKPOINT_KEY: &str = "cp_txPool";

/// Persistence settings of the manager.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; each checkpoint gets a subdirectory named by key.
    pub data_path: PathBuf,
    /// Keep per-height snapshot history for historical queries.
    pub enable_history: bool,
    /// Persist snapshots at all.
    pub need_save: bool,
}

impl From<&ChainParams> for Config {
    fn from(params: &ChainParams) -> Config {
        Config {
            data_path: params.data_path.clone(),
            enable_history: params.enable_history,
            need_save: params.need_save,
        }
    }
}

/// Predicate selecting a subset of checkpoints for one fan-out.
pub type CheckpointFilter<'f> = &'f dyn Fn(&dyn Checkpoint) -> bool;

struct Registered {
    checkpoint: Box<dyn Checkpoint>,
    channel: FileChannel,
}

struct Inner {
    checkpoints: BTreeMap<String, Registered>,
    cfg: Config,
}

impl Inner {
    /// Keys in ascending priority order, `VeryHigh` first.
    fn ordered_keys(&self) -> Vec<String> {
        let mut keys: Vec<(Priority, String)> = self
            .checkpoints
            .iter()
            .map(|(key, r)| (r.checkpoint.priority(), key.clone()))
            .collect();
        keys.sort();
        keys.into_iter().map(|(_, key)| key).collect()
    }

    fn directory(&self, key: &str) -> PathBuf {
        self.cfg.data_path.join(key)
    }
}

/// Holds every registered checkpoint and drives snapshots automatically.
///
/// Registration, block fan-out and rollback serialize under the writer
/// lock, preserving the happens-before relation between a block commit and
/// its snapshot; read queries share the reader lock.
pub struct Manager {
    inner: RwLock<Inner>,
}

impl Manager {
    /// An empty manager over `cfg`.
    pub fn new(cfg: Config) -> Manager {
        Manager {
            inner: RwLock::new(Inner {
                checkpoints: BTreeMap::new(),
                cfg,
            }),
        }
    }

    /// Registers a checkpoint under its key and opens its file channel.
    pub fn register(&self, checkpoint: Box<dyn Checkpoint>) {
        let mut inner = self.write();
        let key = checkpoint.key().to_string();
        let channel = FileChannel::new(
            inner.directory(&key),
            checkpoint.data_extension().to_string(),
        );
        inner
            .checkpoints
            .insert(key, Registered { checkpoint, channel });
    }

    /// Removes a checkpoint and drains its file channel.
    pub fn unregister(&self, key: &str) {
        let mut inner = self.write();
        if let Some(registered) = inner.checkpoints.remove(key) {
            registered.channel.exit();
        }
    }

    /// Fans a settled block out to every matching checkpoint in ascending
    /// priority order and schedules snapshot writes.
    ///
    /// Fire-and-forget by default; `synchronous` waits for each file
    /// operation's acknowledgment.
    pub fn on_block_saved(
        &self,
        block: &DposBlock,
        filter: Option<CheckpointFilter<'_>>,
        synchronous: bool,
        init: bool,
    ) {
        let mut inner = self.write();
        let height = block.height();
        let need_save = inner.cfg.need_save;

        for key in inner.ordered_keys() {
            let Some(registered) = inner.checkpoints.get_mut(&key) else {
                continue;
            };
            let Registered {
                checkpoint: cp,
                channel,
            } = registered;
            if let Some(filter) = filter {
                if !filter(cp.as_ref()) {
                    continue;
                }
            }
            if height < cp.start_height() || height <= cp.height() {
                continue;
            }
            cp.on_block_saved(block);

            if !need_save || init || height <= cp.save_start_height() {
                continue;
            }

            let original_height = cp.height();
            if original_height > 0 && height == original_height + cp.effective_period() {
                let ack = Self::make_ack(synchronous);
                channel.replace(original_height, ack.0);
                Self::wait_ack(ack.1, &key);
            }

            if height >= original_height + cp.save_period() {
                cp.set_height(height);
                let snapshot = cp.snapshot();
                let ack = Self::make_ack(synchronous);
                channel.save(height, snapshot, ack.0);
                Self::wait_ack(ack.1, &key);
            }
        }
    }

    /// Rewinds every checkpoint past `height` in ascending priority order;
    /// the first listener failure is returned.
    pub fn on_rollback_to(&self, height: u32) -> Result<(), CheckpointError> {
        let mut inner = self.write();
        for key in inner.ordered_keys() {
            let Some(registered) = inner.checkpoints.get_mut(&key) else {
                continue;
            };
            if let Err(err) = registered.checkpoint.on_rollback_to(height) {
                error!(target: "checkpoint", %key, %err, "manager rollback failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns a checkpoint valid at `height`: a deep copy of the live
    /// object when it is current enough, otherwise the nearest persisted
    /// snapshot when history is enabled.
    pub fn get_checkpoint(
        &self,
        key: &str,
        height: u32,
    ) -> Result<Box<dyn Checkpoint>, CheckpointError> {
        let inner = self.read();
        let registered = inner
            .checkpoints
            .get(key)
            .ok_or_else(|| CheckpointError::UnknownKey(key.to_string()))?;
        let cp = &registered.checkpoint;

        if height >= cp.height() {
            let snapshot = cp.snapshot();
            return cp.generate(&snapshot);
        }

        if !inner.cfg.enable_history {
            return Err(CheckpointError::UnknownKey(format!(
                "{} has no history at height {}",
                key, height
            )));
        }
        Self::find_history_checkpoint(&inner, cp.as_ref(), height)
    }

    /// The lowest height the node can safely resume execution from.
    pub fn safe_height(&self) -> u32 {
        let inner = self.read();
        let mut height = u32::MAX;
        for (key, registered) in &inner.checkpoints {
            if key == TXPOOL_CHECKPOINT_KEY {
                continue;
            }
            let cp = &registered.checkpoint;
            let record_height = cp.height().saturating_sub(cp.effective_period());
            let safe = record_height.max(cp.start_height());
            height = height.min(safe);
        }
        height
    }

    /// Loads every checkpoint's default snapshot and fires `on_init`.
    ///
    /// A checkpoint without a default file is skipped: it simply starts
    /// from genesis.
    pub fn restore(&self) -> Result<(), CheckpointError> {
        let mut inner = self.write();
        for key in inner.ordered_keys() {
            let directory = inner.directory(&key);
            let Some(registered) = inner.checkpoints.get_mut(&key) else {
                continue;
            };
            let path = default_file_path(&directory, registered.checkpoint.data_extension());
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            registered.checkpoint.restore(&bytes)?;
            registered.checkpoint.on_init();
        }
        Ok(())
    }

    /// Loads every checkpoint's snapshot at exactly `height`, then seeks
    /// histories to it.
    pub fn restore_to(&self, height: u32) -> Result<(), CheckpointError> {
        let mut inner = self.write();
        for key in inner.ordered_keys() {
            let directory = inner.directory(&key);
            let Some(registered) = inner.checkpoints.get_mut(&key) else {
                continue;
            };
            let path = height_file_path(
                &directory,
                registered.checkpoint.data_extension(),
                height,
            );
            let bytes = fs::read(&path)?;
            registered.checkpoint.restore(&bytes)?;
            registered.checkpoint.on_init();
            registered.checkpoint.on_rollback_seek_to(height);
        }
        Ok(())
    }

    /// Resets matching checkpoints to genesis and removes their files.
    pub fn reset(&self, filter: Option<CheckpointFilter<'_>>) {
        let mut inner = self.write();
        for key in inner.ordered_keys() {
            let Some(registered) = inner.checkpoints.get_mut(&key) else {
                continue;
            };
            if let Some(filter) = filter {
                if !filter(registered.checkpoint.as_ref()) {
                    continue;
                }
            }
            registered.checkpoint.on_reset();
            registered.channel.reset(None);
        }
    }

    /// Shuts every file channel down, flushing queued writes.
    pub fn close(&self) {
        let mut inner = self.write();
        let keys: Vec<String> = inner.checkpoints.keys().cloned().collect();
        for key in keys {
            if let Some(registered) = inner.checkpoints.remove(&key) {
                registered.channel.exit();
            }
        }
    }

    /// Points the manager at a new snapshot root.
    pub fn set_data_path(&self, path: PathBuf) {
        self.write().cfg.data_path = path;
    }

    /// Toggles snapshot persistence.
    pub fn set_need_save(&self, need_save: bool) {
        self.write().cfg.need_save = need_save;
    }

    fn find_history_checkpoint(
        inner: &Inner,
        current: &dyn Checkpoint,
        find_height: u32,
    ) -> Result<Box<dyn Checkpoint>, CheckpointError> {
        // Walk back in save-period steps to the newest persisted snapshot
        // at or below the requested height.
        let mut best_height = current.height();
        while best_height > find_height && best_height >= current.save_period() {
            best_height -= current.save_period();
        }
        if best_height > find_height {
            best_height = 0;
        }

        let directory = inner.directory(current.key());
        let path = height_file_path(&directory, current.data_extension(), best_height);
        let bytes = fs::read(&path)?;
        current.generate(&bytes)
    }

    fn make_ack(
        synchronous: bool,
    ) -> (Option<oneshot::Sender<bool>>, Option<oneshot::Receiver<bool>>) {
        if synchronous {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        }
    }

    fn wait_ack(receiver: Option<oneshot::Receiver<bool>>, key: &str) {
        if let Some(receiver) = receiver {
            match receiver.blocking_recv() {
                Ok(true) => {}
                // A failed write is logged by the worker; the next save
                // period retries.
                Ok(false) | Err(_) => {
                    warn!(target: "checkpoint", %key, "snapshot write not confirmed");
                }
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.close();
    }
}
