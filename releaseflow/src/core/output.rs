//! Stage output returned by successful stage executions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The output of a stage that completed.
///
/// Failures are reported through `Err(ReleaseflowError)` instead, so an
/// output always means the stage's action succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Structured data produced by the stage.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,

    /// Free-form diagnostic lines (versions, listings, command tails).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl StageOutput {
    /// Creates an output with no data.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an output with a single value.
    #[must_use]
    pub fn value(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::empty().with_value(key, value)
    }

    /// Adds a value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds several notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl IntoIterator<Item = String>) -> Self {
        self.notes.extend(notes);
        self
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value from the data.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}
