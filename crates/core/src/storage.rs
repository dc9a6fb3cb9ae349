//! Key-value persistence for ledger documents.
//!
//! Every document is read whole and written whole; there are no partial
//! updates. Blobs are opaque JSON strings at this layer.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// The independent documents the ledger persists.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum StorageKey {
    Favorites,
    Statistics,
    SavedRoutes,
    /// Preferences, badges and points
    Profile,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error for {key}: {source}")]
    Io {
        key: StorageKey,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode {key}: {source}")]
    Encode {
        key: StorageKey,
        #[source]
        source: serde_json::Error,
    },
}

/// A place to keep whole JSON documents by key.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved under `key`.
    fn load(&self, key: StorageKey) -> Result<Option<String>, StorageError>;

    fn save(&self, key: StorageKey, blob: &str) -> Result<(), StorageError>;

    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn load(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn save(&self, key: StorageKey, blob: &str) -> Result<(), StorageError> {
        (**self).save(key, blob)
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Result of decoding a stored document.
#[derive(Debug)]
pub(crate) enum Decoded<T> {
    Missing,
    Found(T),
    /// The blob did not parse; holds the parse error message
    Corrupt(String),
}

pub(crate) fn decode<T: DeserializeOwned>(blob: Option<String>) -> Decoded<T> {
    match blob {
        None => Decoded::Missing,
        Some(blob) => match serde_json::from_str(&blob) {
            Ok(value) => Decoded::Found(value),
            Err(e) => Decoded::Corrupt(e.to_string()),
        },
    }
}

pub(crate) fn encode<T: Serialize>(key: StorageKey, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Encode { key, source })
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, for tests and sessions without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a document, e.g. to replay an existing session.
    pub fn with(self, key: StorageKey, blob: impl Into<String>) -> Self {
        self.lock().insert(key, blob.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<StorageKey, String>> {
        // A panic while holding the lock cannot leave a half-written blob
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(&key).cloned())
    }

    fn save(&self, key: StorageKey, blob: &str) -> Result<(), StorageError> {
        self.lock().insert(key, blob.to_owned());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.lock().remove(&key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// One `<key>.json` file per document in a directory.
///
/// Writes go to `<key>.json.tmp` first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn atomic_write(&self, key: StorageKey, data: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let final_path = self.path(key);
        let tmp_path = self.dir.join(format!("{key}.json.tmp"));

        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&tmp_path, final_path)
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { key, source }),
        }
    }

    fn save(&self, key: StorageKey, blob: &str) -> Result<(), StorageError> {
        self.atomic_write(key, blob.as_bytes())
            .map_err(|source| StorageError::Io { key, source })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { key, source }),
        }
    }
}
