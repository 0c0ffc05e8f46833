//! Run identity for tracking pipeline executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,

    /// When the run was created.
    pub created_at: DateTime<Utc>,

    /// CI-provided run identifier (e.g. `GITHUB_RUN_ID`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            external_id: None,
        }
    }

    /// Creates a run identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            ..Self::new()
        }
    }

    /// Sets the CI-provided identifier.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_identities_are_unique() {
        let a = RunIdentity::new();
        let b = RunIdentity::new();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_with_run_id() {
        let id = Uuid::new_v4();
        let identity = RunIdentity::with_run_id(id).with_external_id("8812345");
        assert_eq!(identity.run_id, id);
        assert_eq!(identity.external_id.as_deref(), Some("8812345"));
    }

    #[test]
    fn test_serialization_skips_missing_external_id() {
        let identity = RunIdentity::new();
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("external_id").is_none());
        assert!(json.get("run_id").is_some());
    }
}
