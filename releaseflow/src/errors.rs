//! Error types for releaseflow.
//!
//! Every stage failure is expressed as a [`ReleaseflowError`]. The pipeline
//! runner records the first gating error verbatim together with the name of
//! the stage that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for releaseflow operations.
#[derive(Debug, Error)]
pub enum ReleaseflowError {
    /// Toolchain installation or update failed.
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    /// A lint, format, test, type-check or build gate failed.
    #[error("{0}")]
    Check(#[from] CheckFailure),

    /// No files matched a required artifact pattern, or the archive could not be written.
    #[error("{0}")]
    Packaging(#[from] PackagingError),

    /// The release publisher rejected or failed the upload.
    #[error("{0}")]
    Publish(#[from] PublishError),

    /// A stage exceeded its configured timeout.
    #[error("Stage '{stage}' timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        /// The stage name.
        stage: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The run was aborted externally.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The stage list could not be assembled.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A run-scoped metadata key was written twice.
    #[error("{0}")]
    MetadataConflict(#[from] MetadataConflictError),

    /// A stage needed a metadata key an earlier stage should have exported.
    #[error("Missing run metadata: '{0}' was never exported")]
    MissingMetadata(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseflowError {
    /// Returns the coarse kind used in run reports.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Toolchain(_) => ErrorKind::Toolchain,
            Self::Check(_) => ErrorKind::Check,
            Self::Packaging(_) => ErrorKind::Packaging,
            Self::Publish(_) => ErrorKind::Publish,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Config(_) | Self::Validation(_) => ErrorKind::Config,
            Self::MetadataConflict(_) | Self::MissingMetadata(_) => ErrorKind::Metadata,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Creates a toolchain error.
    #[must_use]
    pub fn toolchain(message: impl Into<String>) -> Self {
        Self::Toolchain(message.into())
    }
}

/// Discriminant of [`ReleaseflowError`] suitable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `ToolchainError`.
    Toolchain,
    /// `CheckFailure`.
    Check,
    /// `PackagingError`.
    Packaging,
    /// `PublishError`.
    Publish,
    /// Stage timeout.
    Timeout,
    /// External abort.
    Cancelled,
    /// Configuration problem.
    Config,
    /// Run metadata misuse.
    Metadata,
    /// Filesystem or process IO.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Toolchain => "toolchain",
            Self::Check => "check",
            Self::Packaging => "packaging",
            Self::Publish => "publish",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Metadata => "metadata",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

/// A check command reported a violation or exited non-zero.
#[derive(Debug, Clone, Error)]
#[error("Check failed: `{command}` {status}{}", diagnostics_suffix(.diagnostics))]
pub struct CheckFailure {
    /// The command that failed.
    pub command: String,
    /// Human readable exit status (e.g. "exited with code 101").
    pub status: String,
    /// Tail of the captured output.
    pub diagnostics: Option<String>,
}

impl CheckFailure {
    /// Creates a new check failure.
    #[must_use]
    pub fn new(command: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: status.into(),
            diagnostics: None,
        }
    }

    /// Attaches captured diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        if !diagnostics.trim().is_empty() {
            self.diagnostics = Some(diagnostics);
        }
        self
    }
}

fn diagnostics_suffix(diagnostics: &Option<String>) -> String {
    diagnostics
        .as_ref()
        .map(|d| format!(": {}", d.trim()))
        .unwrap_or_default()
}

/// Packaging the release archive failed.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// A required input pattern matched nothing.
    #[error("Packaging failed: pattern '{pattern}' matched no files in {}", .output_dir.display())]
    NoMatch {
        /// The pattern that matched nothing.
        pattern: String,
        /// The directory the pattern was resolved against.
        output_dir: PathBuf,
    },

    /// No input pattern matched anything at all.
    #[error("Packaging failed: no build outputs matched any input pattern in {}", .output_dir.display())]
    Empty {
        /// The directory the patterns were resolved against.
        output_dir: PathBuf,
    },

    /// A pattern is not a valid glob.
    #[error("Packaging failed: invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        reason: String,
    },

    /// Writing the archive failed.
    #[error("Packaging failed: could not write {}: {source}", .archive.display())]
    Archive {
        /// Archive path.
        archive: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Publishing the release failed.
#[derive(Debug, Clone, Error)]
#[error("Publish failed for tag '{tag}': {reason}")]
pub struct PublishError {
    /// The release tag.
    pub tag: String,
    /// What went wrong.
    pub reason: String,
    /// HTTP status if the publisher is remote.
    pub status: Option<u16>,
}

impl PublishError {
    /// Creates a new publish error.
    #[must_use]
    pub fn new(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            reason: reason.into(),
            status: None,
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but is invalid.
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Raised when a metadata key is exported twice in one run.
#[derive(Debug, Clone, Error)]
#[error("Metadata conflict: key '{key}' already exported")]
pub struct MetadataConflictError {
    /// The conflicting key.
    pub key: String,
}

impl MetadataConflictError {
    /// Creates a new metadata conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failure_message_includes_diagnostics() {
        let err = CheckFailure::new("cargo fmt --all -- --check", "exited with code 1")
            .with_diagnostics("Diff in src/lib.rs\n");

        let msg = err.to_string();
        assert!(msg.contains("cargo fmt --all -- --check"));
        assert!(msg.contains("exited with code 1"));
        assert!(msg.ends_with("Diff in src/lib.rs"));
    }

    #[test]
    fn test_check_failure_blank_diagnostics_dropped() {
        let err = CheckFailure::new("cargo test", "exited with code 101").with_diagnostics("  \n");
        assert!(err.diagnostics.is_none());
        assert_eq!(err.to_string(), "Check failed: `cargo test` exited with code 101");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ReleaseflowError::toolchain("rustup missing").kind(), ErrorKind::Toolchain);
        assert_eq!(
            ReleaseflowError::from(PublishError::new("v1.0.0", "HTTP 422")).kind(),
            ErrorKind::Publish
        );
        assert_eq!(
            ReleaseflowError::from(PackagingError::Empty { output_dir: PathBuf::from("target/release") })
                .kind(),
            ErrorKind::Packaging
        );
        assert_eq!(
            ReleaseflowError::MissingMetadata("RELEASE_FILE".into()).kind(),
            ErrorKind::Metadata
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = ReleaseflowError::Timeout {
            stage: "Test".into(),
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "Stage 'Test' timed out after 90s");
    }

    #[test]
    fn test_no_match_message() {
        let err = PackagingError::NoMatch {
            pattern: "libgen_inds*".into(),
            output_dir: PathBuf::from("target/release"),
        };
        assert_eq!(
            err.to_string(),
            "Packaging failed: pattern 'libgen_inds*' matched no files in target/release"
        );
    }

    #[test]
    fn test_validation_error_is_config_kind() {
        let err = ReleaseflowError::from(
            PipelineValidationError::new("Duplicate stage name 'Lint'").with_stages(vec!["Lint".into()]),
        );
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "Duplicate stage name 'Lint'");
    }

    #[test]
    fn test_error_kind_serialize() {
        let json = serde_json::to_string(&ErrorKind::Packaging).unwrap();
        assert_eq!(json, r#""packaging""#);
        assert_eq!(ErrorKind::Publish.to_string(), "publish");
    }
}
