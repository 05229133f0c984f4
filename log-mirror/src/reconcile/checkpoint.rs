//! Per-origin checkpoint file
//!
//! JSON object `{ "<origin name>": <next block to scan> }`. Writes go through
//! [`write_json_atomic`] while holding an in-process lock, so concurrent
//! origins never interleave their read-modify-write cycles.

use crate::error::MirrorError;
use crate::persist::write_json_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub type Checkpoints = BTreeMap<String, u64>;

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All checkpoints; an absent file is an empty map.
    ///
    /// A file that exists but does not parse is an error rather than a reset,
    /// since resetting would rescan from the lookback window.
    pub async fn load_all(&self) -> Result<Checkpoints, MirrorError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Checkpoints::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                MirrorError::Config(format!(
                    "checkpoint file {} is corrupted: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Checkpoints::new()),
            Err(e) => Err(MirrorError::Checkpoint(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub async fn get(&self, origin: &str) -> Result<Option<u64>, MirrorError> {
        Ok(self.load_all().await?.get(origin).copied())
    }

    /// Moves `origin` forward to `next_block`. Never moves a checkpoint back.
    pub async fn advance(&self, origin: &str, next_block: u64) -> Result<(), MirrorError> {
        let _guard = self.lock.lock().await;
        let mut checkpoints = self.load_all().await?;
        if let Some(current) = checkpoints.get(origin) {
            if *current >= next_block {
                debug!(
                    "Checkpoint for {} already at {} (>= {})",
                    origin, current, next_block
                );
                return Ok(());
            }
        }
        checkpoints.insert(origin.to_string(), next_block);
        write_json_atomic(&self.path, &checkpoints)
            .await
            .map_err(|e| {
                MirrorError::Checkpoint(format!("cannot write {}: {}", self.path.display(), e))
            })?;
        debug!("Checkpoint for {} -> {}", origin, next_block);
        Ok(())
    }
}
