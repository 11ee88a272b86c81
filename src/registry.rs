//! Durable allow-list of channels that are relayed.
//!
//! The whole set is rewritten on every mutation. Writes go to a temporary
//! sibling file which is then renamed over the target, so a crash mid-write
//! never leaves a half-written list behind.

use crate::error::PersistError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// On-disk layout: `{"channels": {"<id>": true}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ChannelFile {
    #[serde(default)]
    channels: BTreeMap<String, bool>,
}

pub struct ChannelRegistry {
    path: PathBuf,
    channels: Mutex<BTreeSet<String>>,
    // Held across mutate + write so the file always ends at the latest
    // mutation. Readers only ever take `channels`.
    writer: Mutex<()>,
}

impl ChannelRegistry {
    /// Load the persisted list, merge `seed` into it and persist once so the
    /// file exists and is well-formed from the first run on.
    pub fn open(path: impl Into<PathBuf>, seed: &[String]) -> Result<Self, PersistError> {
        let path = path.into();
        let mut channels = load(&path);
        let persisted = channels.len();
        channels.extend(seed.iter().cloned());

        info!(
            "Loaded {} relay channels from {} ({} from config)",
            channels.len(),
            path.display(),
            channels.len() - persisted
        );

        let registry = Self {
            path,
            channels: Mutex::new(channels),
            writer: Mutex::new(()),
        };
        registry.update(|_| {})?;
        Ok(registry)
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.lock().contains(channel_id)
    }

    /// Add a channel. Adding a present channel still rewrites the file.
    ///
    /// On a write failure the channel stays added in memory.
    pub fn add(&self, channel_id: &str) -> Result<(), PersistError> {
        self.update(|channels| {
            channels.insert(channel_id.to_string());
        })
    }

    /// Remove a channel. Removing an absent channel is a successful no-op
    /// that still rewrites the file.
    ///
    /// On a write failure the channel stays removed in memory.
    pub fn remove(&self, channel_id: &str) -> Result<(), PersistError> {
        self.update(|channels| {
            channels.remove(channel_id);
        })
    }

    /// Snapshot of the current channel set.
    pub fn channels(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` in memory, then write a snapshot to disk. Blocking I/O
    /// happens outside the `channels` lock so `contains` never waits on disk.
    fn update(&self, mutate: impl FnOnce(&mut BTreeSet<String>)) -> Result<(), PersistError> {
        let _writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = {
            let mut channels = self.lock();
            mutate(&mut channels);
            channels.clone()
        };
        self.persist(&snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, channels: &BTreeSet<String>) -> Result<(), PersistError> {
        let file = ChannelFile {
            channels: channels.iter().map(|c| (c.clone(), true)).collect(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let tmp_path = tmp_path_for(&self.path);
        let io_err = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp_path, data).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}

fn load(path: &Path) -> BTreeSet<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!("Failed to read {}: {}, starting empty", path.display(), e);
            return BTreeSet::new();
        }
    };

    match serde_json::from_str::<ChannelFile>(&raw) {
        Ok(file) => file
            .channels
            .into_iter()
            .filter_map(|(id, enabled)| enabled.then_some(id))
            .collect(),
        Err(e) => {
            warn!("Ignoring unparseable {}: {}", path.display(), e);
            BTreeSet::new()
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "channels.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
