//! Durable traversal snapshots keyed by the unit of work last completed.
//!
//! One JSON file per key, written atomically (temp file in the same
//! directory, then rename) so a crash mid-write can never leave a partial
//! snapshot readable as valid. Snapshots are only taken at boundaries where
//! registry and frontiers are mutually consistent, so loading one is always
//! equivalent to having recomputed up to that key.

use crate::directive::TraversalDirective;
use crate::error::{Result, TermgraphError};
use crate::frontier::FrontierScheduler;
use crate::registry::ConceptRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Checkpoint granularity: one seed fully processed, or one BFS level fully
/// processed across all seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointKey {
    Seed(String),
    Level(u32),
}

impl CheckpointKey {
    fn file_name(&self) -> String {
        match self {
            CheckpointKey::Seed(id) => format!("processed_{}.json", id),
            CheckpointKey::Level(distance) => format!("level_{:03}.json", distance),
        }
    }
}

/// Full resumable state of a traversal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalSnapshot {
    pub directives: BTreeMap<String, TraversalDirective>,
    pub registry: ConceptRegistry,
    pub frontiers: FrontierScheduler,
    /// Deepest distance level completed (0 while still in the seed pass).
    pub distance: u32,
    pub saved_at: DateTime<Utc>,
}

/// File-backed checkpoint store. Owns the persisted layout exclusively; the
/// engine only writes during normal operation and only reads during resume.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(CheckpointStore { dir })
    }

    fn path_for(&self, key: &CheckpointKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has_checkpoint(&self, key: &CheckpointKey) -> bool {
        self.path_for(key).exists()
    }

    /// Atomically persist `snapshot` under `key`.
    pub fn save(&self, key: &CheckpointKey, snapshot: &TraversalSnapshot) -> Result<()> {
        let target = self.path_for(key);
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&tmp, snapshot).map_err(|e| {
            TermgraphError::Checkpoint(format!(
                "Failed to serialize snapshot for {}: {}",
                target.display(),
                e
            ))
        })?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .map_err(|e| TermgraphError::Checkpoint(format!(
                "Failed to persist snapshot {}: {}",
                target.display(),
                e
            )))?;
        log::debug!("Saved checkpoint {}", target.display());
        Ok(())
    }

    /// Load the snapshot for `key`. A missing or corrupt file is a hard
    /// error: resuming from bad state would silently under- or over-expand
    /// the graph.
    pub fn load(&self, key: &CheckpointKey) -> Result<TraversalSnapshot> {
        let path = self.path_for(key);
        let file = std::fs::File::open(&path).map_err(|e| {
            TermgraphError::Checkpoint(format!("Cannot open checkpoint {}: {}", path.display(), e))
        })?;
        let snapshot = serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
            TermgraphError::Checkpoint(format!(
                "Corrupt checkpoint {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded checkpoint {}", path.display());
        Ok(snapshot)
    }
}
