//! Durable JSON storage for crawl state and statistics
//!
//! Writes go to a temporary file next to the target, are flushed and synced,
//! and then renamed over the target, so readers only ever see a complete
//! previous or complete new version.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur while loading or saving persisted records
#[derive(Debug, Error)]
pub enum StateError {
    #[error("{} exists but cannot be parsed: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} is inconsistent: {reason}", .path.display())]
    Inconsistent { path: PathBuf, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for state store operations
pub type StateResult<T> = Result<T, StateError>;

/// A JSON file holding one record of type `T`
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the record, or returns `T::default()` if the file is absent
    ///
    /// A file that exists but does not parse is reported as
    /// `StateError::Corrupt`; it is never silently replaced.
    pub fn load(&self) -> StateResult<T> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No persisted record, starting empty");
                return Ok(T::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically replaces the file with the serialized record
    pub fn save(&self, record: &T) -> StateResult<()> {
        let write_err = |source: io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, record)?;
            writer.flush().map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        Ok(())
    }

    /// Deletes the file if present
    pub fn remove(&self) -> StateResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
