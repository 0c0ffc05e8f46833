//! Release artifact naming.
//!
//! The descriptor is a pure function of the trigger, the artifact name, the
//! input patterns and one clock reading, so identical runs name their
//! artifacts identically.

use crate::context::{RELEASE_FILE_KEY, TIMESTAMP_KEY, VERSION_KEY};
use crate::trigger::TriggerContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of the exported `TIMESTAMP` value.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Extension of the release archive.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Default artifact name, used as the archive and binary prefix.
pub const DEFAULT_ARTIFACT_NAME: &str = "gen_inds";

/// One glob pattern selecting build outputs for the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPattern {
    /// Glob relative to the build output directory.
    pub pattern: String,
    /// Whether packaging fails when the pattern matches nothing.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl InputPattern {
    /// A pattern that must match at least one file.
    #[must_use]
    pub fn required(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            required: true,
        }
    }

    /// A pattern that may match nothing.
    #[must_use]
    pub fn optional(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            required: false,
        }
    }
}

/// Default inputs: the binary and any `lib<name>*` library artifacts.
#[must_use]
pub fn default_input_patterns(artifact_name: &str) -> Vec<InputPattern> {
    vec![
        InputPattern::optional(artifact_name.to_string()),
        InputPattern::optional(format!("lib{artifact_name}*")),
    ]
}

/// Builds the archive file name: `<artifact>_<version>.tar.gz`.
#[must_use]
pub fn release_file_name(artifact_name: &str, version: &str) -> String {
    format!("{artifact_name}_{version}{ARCHIVE_EXTENSION}")
}

/// Formats a packaging timestamp.
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Everything needed to name and assemble a release archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArtifactDescriptor {
    /// Packaging time, `YYYY-MM-DD_HH:MM:SS`.
    pub timestamp: String,
    /// Tag name without `refs/tags/`.
    pub version: String,
    /// Archive file name.
    pub file_name: String,
    /// Ordered input patterns over the build output directory.
    pub input_paths: Vec<InputPattern>,
}

impl ReleaseArtifactDescriptor {
    /// Builds the descriptor for a release run.
    ///
    /// Returns `None` unless the trigger is a release tag.
    #[must_use]
    pub fn for_trigger(
        trigger: &TriggerContext,
        artifact_name: &str,
        input_paths: Vec<InputPattern>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let version = trigger.release_tag()?.to_string();
        Some(Self {
            timestamp: format_timestamp(now),
            file_name: release_file_name(artifact_name, &version),
            version,
            input_paths,
        })
    }

    /// Returns the key/value pairs exported to later stages.
    #[must_use]
    pub fn exports(&self) -> [(&'static str, &str); 3] {
        [
            (TIMESTAMP_KEY, self.timestamp.as_str()),
            (RELEASE_FILE_KEY, self.file_name.as_str()),
            (VERSION_KEY, self.version.as_str()),
        ]
    }
}
