//! Run-scoped key/value store for values exported between stages.

use crate::errors::{MetadataConflictError, ReleaseflowError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Timestamp of the release packaging, `YYYY-MM-DD_HH:MM:SS`.
pub const TIMESTAMP_KEY: &str = "TIMESTAMP";
/// File name of the release archive.
pub const RELEASE_FILE_KEY: &str = "RELEASE_FILE";
/// Release version (tag name without `refs/tags/`).
pub const VERSION_KEY: &str = "VERSION";

/// A thread-safe store of exported run metadata.
///
/// Each key may be exported once per run; a second export of the same key
/// raises a `MetadataConflictError`. Iteration order is by key.
#[derive(Debug, Default)]
pub struct MetadataStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MetadataStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Gets a value that an earlier stage must have exported.
    ///
    /// # Errors
    ///
    /// Returns `ReleaseflowError::MissingMetadata` if the key is absent.
    pub fn require(&self, key: &str) -> Result<String, ReleaseflowError> {
        self.get(key)
            .ok_or_else(|| ReleaseflowError::MissingMetadata(key.to_string()))
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Exports a value.
    ///
    /// # Errors
    ///
    /// Returns `MetadataConflictError` if the key was already exported.
    pub fn export(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MetadataConflictError> {
        let key = key.into();
        let mut data = self.data.write();

        if data.contains_key(&key) {
            return Err(MetadataConflictError::new(&key));
        }

        data.insert(key, value.into());
        Ok(())
    }

    /// Returns a copy of all exports.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.data.read().clone()
    }

    /// Returns the number of exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing has been exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Appends the given keys as `KEY=VALUE` lines to a CI env file.
    ///
    /// Keys that were never exported are ignored.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be opened or written.
    pub fn append_to_env_file(&self, path: &Path, keys: &[&str]) -> std::io::Result<()> {
        let data = self.data.read();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        for key in keys {
            if let Some(value) = data.get(*key) {
                writeln!(file, "{key}={value}")?;
            }
        }

        file.flush()
    }
}
