//! Persistence of the serialized pairing record.
//!
//! A store holds at most one record under [`PAIRING_RECORD_KEY`]. Stores deal
//! in raw strings; parsing belongs to [`Pairing::from_record`](super::Pairing::from_record).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::core::constants::PAIRING_RECORD_KEY;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure on the backing medium.
    #[error("pairing store I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store itself is unusable.
    #[error("pairing store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence collaborator for the pairing record.
pub trait PairingStore: Send + Sync {
    /// Load the stored record, if any.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Store a record, replacing any previous one.
    fn save(&self, record: &str) -> Result<(), StoreError>;

    /// Remove the record. Removing a missing record is not an error.
    fn remove(&self) -> Result<(), StoreError>;
}

/// In-memory store, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `record`.
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(record.into())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreError> {
        self.record
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl PairingStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, record: &str) -> Result<(), StoreError> {
        *self.slot()? = Some(record.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Store keeping the record as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store the record at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the record as `<dir>/pairing.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{PAIRING_RECORD_KEY}.json")))
    }

    /// Record file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PairingStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, record)?;
        debug!(path = %self.path.display(), "pairing record saved");
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "pairing record removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("{}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{}"));

        store.remove().unwrap();
        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().join("nested"));
        assert!(store.path().ends_with("pairing.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save(r#"{"hash":"h"}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"hash":"h"}"#));

        store.save(r#"{"hash":"h2"}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"hash":"h2"}"#));

        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.remove().unwrap();
    }
}
