//! Per-checkpoint background file workers.
//!
//! Every registered checkpoint gets one worker thread fed by an unbounded
//! command channel, so the hot block-save path never blocks on disk I/O.
//! Commands within one key are FIFO; across keys there is no ordering.
//! Each command optionally carries an acknowledgment channel for callers
//! that need synchronous behavior.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// Most height-files retained per checkpoint key.
pub const MAX_CHECKPOINT_FILES_COUNT: usize = 36;

/// File stem of the resume snapshot.
pub const DEFAULT_CHECKPOINT: &str = "default";

enum FileCommand {
    /// Persist snapshot bytes as the file for `height`.
    Save {
        height: u32,
        bytes: Vec<u8>,
        ack: Option<oneshot::Sender<bool>>,
    },
    /// Promote the already-saved file for `height` to the default file.
    Replace {
        height: u32,
        ack: Option<oneshot::Sender<bool>>,
    },
    /// Remove every snapshot file of this key.
    Reset { ack: Option<oneshot::Sender<bool>> },
    /// Flush and stop the worker.
    Exit,
}

/// Handle to one key's worker thread.
pub struct FileChannel {
    sender: mpsc::UnboundedSender<FileCommand>,
    worker: Option<JoinHandle<()>>,
}

impl FileChannel {
    /// Spawns the worker for a checkpoint directory.
    pub fn new(directory: PathBuf, extension: String) -> FileChannel {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = match std::thread::Builder::new()
            .name("checkpoint-file".into())
            .spawn(move || worker_loop(receiver, &directory, &extension))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(target: "checkpoint", %err, "spawning file worker failed");
                None
            }
        };
        FileChannel {
            sender,
            worker,
        }
    }

    /// Queues a snapshot write; `ack` fires once the file is durable.
    pub fn save(&self, height: u32, bytes: Vec<u8>, ack: Option<oneshot::Sender<bool>>) {
        let _ = self.sender.send(FileCommand::Save { height, bytes, ack });
    }

    /// Queues promotion of the `height` file to the default file.
    pub fn replace(&self, height: u32, ack: Option<oneshot::Sender<bool>>) {
        let _ = self.sender.send(FileCommand::Replace { height, ack });
    }

    /// Queues removal of every file under the key.
    pub fn reset(&self, ack: Option<oneshot::Sender<bool>>) {
        let _ = self.sender.send(FileCommand::Reset { ack });
    }

    /// Stops the worker after the queued commands drain.
    pub fn exit(mut self) {
        let _ = self.sender.send(FileCommand::Exit);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    mut receiver: mpsc::UnboundedReceiver<FileCommand>,
    directory: &Path,
    extension: &str,
) {
    while let Some(command) = receiver.blocking_recv() {
        match command {
            FileCommand::Save { height, bytes, ack } => {
                let ok = save_snapshot(directory, extension, height, &bytes)
                    .map_err(|err| error!(target: "checkpoint", %err, "snapshot save failed"))
                    .is_ok();
                if let Some(ack) = ack {
                    let _ = ack.send(ok);
                }
            }
            FileCommand::Replace { height, ack } => {
                let ok = replace_default(directory, extension, height)
                    .map_err(|err| error!(target: "checkpoint", %err, "snapshot replace failed"))
                    .is_ok();
                if let Some(ack) = ack {
                    let _ = ack.send(ok);
                }
            }
            FileCommand::Reset { ack } => {
                let ok = fs::remove_dir_all(directory)
                    .map_err(|err| error!(target: "checkpoint", %err, "snapshot reset failed"))
                    .is_ok();
                if let Some(ack) = ack {
                    let _ = ack.send(ok);
                }
            }
            FileCommand::Exit => break,
        }
    }
}

/// Path of the snapshot file for `height`.
pub fn height_file_path(directory: &Path, extension: &str, height: u32) -> PathBuf {
    directory.join(format!("{}{}", height, extension))
}

/// Path of the default resume file.
pub fn default_file_path(directory: &Path, extension: &str) -> PathBuf {
    directory.join(format!("{}{}", DEFAULT_CHECKPOINT, extension))
}

fn save_snapshot(directory: &Path, extension: &str, height: u32, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(directory)
        .with_context(|| format!("creating {}", directory.display()))?;

    // Write through a temp file so a crash never leaves a torn snapshot.
    let path = height_file_path(directory, extension, height);
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path).with_context(|| format!("renaming {}", path.display()))?;
    debug!(target: "checkpoint", path = %path.display(), "snapshot saved");

    enforce_retention(directory, extension)
}

fn replace_default(directory: &Path, extension: &str, height: u32) -> Result<()> {
    let source = height_file_path(directory, extension, height);
    let target = default_file_path(directory, extension);
    fs::copy(&source, &target)
        .with_context(|| format!("promoting {}", source.display()))?;
    Ok(())
}

/// Deletes the oldest height-files beyond the retention cap.
fn enforce_retention(directory: &Path, extension: &str) -> Result<()> {
    let mut heights: Vec<u32> = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(extension) else {
            continue;
        };
        if let Ok(height) = stem.parse::<u32>() {
            heights.push(height);
        }
    }

    if heights.len() <= MAX_CHECKPOINT_FILES_COUNT {
        return Ok(());
    }
    heights.sort_unstable();
    let excess = heights.len() - MAX_CHECKPOINT_FILES_COUNT;
    for height in heights.into_iter().take(excess) {
        let path = height_file_path(directory, extension, height);
        fs::remove_file(&path)
            .with_context(|| format!("evicting {}", path.display()))?;
    }
    Ok(())
}
