use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::info;
use serde::{Deserialize, Serialize};

use crate::bulletinboard::BBError;
use crate::util;

/// Full serialized board state. Written wholesale after every mutation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub start_time: f64,
    pub duration: f64,
    pub tokens: BTreeMap<String, bool>,
    pub votes: Vec<Vec<String>>,
    /// Decimal modulus of the key the votes were encrypted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<String>,
}

/// Durable home of a [`Snapshot`].
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>, BBError>;
    /// Returns only once the snapshot is durable.
    fn store(&self, snapshot: &Snapshot) -> Result<(), BBError>;
}

impl<T: SnapshotStore> SnapshotStore for Arc<T> {
    fn load(&self) -> Result<Option<Snapshot>, BBError> {
        (**self).load()
    }
    fn store(&self, snapshot: &Snapshot) -> Result<(), BBError> {
        (**self).store(snapshot)
    }
}

/// Snapshot kept as a json document on the local filesystem.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> FileStore {
        FileStore {
            path: path.as_ref().to_path_buf(),
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<Snapshot>, BBError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = util::read_file_bytes(&self.path)?;
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| BBError::Corrupt(format!("{}: {}", self.path.display(), e)))?;
        info!("FileStore: loaded snapshot {}", self.path.display());

        Ok(Some(snapshot))
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), BBError> {
        let now = std::time::Instant::now();
        let bytes = serde_json::to_vec(snapshot)?;
        util::write_file_bytes(&self.path, &bytes)?;
        info!(
            "FileStore: wrote {} bytes [{}ms]",
            bytes.len(),
            now.elapsed().as_millis()
        );

        Ok(())
    }
}

/// In-memory store. `fail_writes` makes every subsequent store fail.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Option<Vec<u8>>>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, BBError> {
        let data = self
            .data
            .lock()
            .map_err(|_| BBError::Msg("memory store lock poisoned".to_string()))?;
        match data.as_ref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), BBError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BBError::Msg("memory store: write refused".to_string()));
        }
        let bytes = serde_json::to_vec(snapshot)?;
        let mut data = self
            .data
            .lock()
            .map_err(|_| BBError::Msg("memory store lock poisoned".to_string()))?;
        *data = Some(bytes);

        Ok(())
    }
}
