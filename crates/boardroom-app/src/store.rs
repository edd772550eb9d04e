//! Key/value persistence for the independently stored records.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Name of one persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    /// Participant directory.
    Participants,
    /// Meetings.
    Meetings,
    /// Tasks.
    Tasks,
    /// Compliance programs.
    Compliance,
    /// Settings singleton.
    Settings,
}

impl RecordKey {
    /// Every key, in load order.
    pub const ALL: [Self; 5] = [
        Self::Participants,
        Self::Meetings,
        Self::Tasks,
        Self::Compliance,
        Self::Settings,
    ];

    /// Storage name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Participants => "participants",
            Self::Meetings => "meetings",
            Self::Tasks => "tasks",
            Self::Compliance => "compliance",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal storage abstraction: one serialized document per key.
pub trait RecordStore {
    /// Error type bubbled up from the backing store.
    type Error: Into<anyhow::Error>;

    /// Read the document stored under `key`, or `None` if nothing was saved yet.
    ///
    /// # Errors
    /// Returns a store-specific error when reading fails.
    fn load(&self, key: RecordKey) -> Result<Option<String>, Self::Error>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    /// Returns a store-specific error when writing fails.
    fn save(&self, key: RecordKey, contents: &str) -> Result<(), Self::Error>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    type Error = T::Error;

    fn load(&self, key: RecordKey) -> Result<Option<String>, Self::Error> {
        (**self).load(key)
    }

    fn save(&self, key: RecordKey, contents: &str) -> Result<(), Self::Error> {
        (**self).save(key, contents)
    }
}

/// Errors raised by [`JsonDirStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading a record file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing a record file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Stores each record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Use `dir` as the data directory; it is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    #[must_use]
    pub fn path_for(&self, key: RecordKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RecordStore for JsonDirStore {
    type Error = StoreError;

    fn load(&self, key: RecordKey) -> Result<Option<String>, Self::Error> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!(record = %key, bytes = contents.len(), "loaded record");
                Ok(Some(contents))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn save(&self, key: RecordKey, contents: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        // Stage beside the target, then rename into place.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, contents)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(record = %key, bytes = contents.len(), "saved record");
        Ok(())
    }
}

/// Volatile store keeping documents in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, String>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the document stored under `key`.
    #[must_use]
    pub fn get(&self, key: RecordKey) -> Option<String> {
        self.guard().get(&key).cloned()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<RecordKey, String>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    type Error = Infallible;

    fn load(&self, key: RecordKey) -> Result<Option<String>, Self::Error> {
        Ok(self.get(key))
    }

    fn save(&self, key: RecordKey, contents: &str) -> Result<(), Self::Error> {
        self.guard().insert(key, contents.to_owned());
        Ok(())
    }
}
