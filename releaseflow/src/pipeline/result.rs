//! Run reports.

use super::Fatality;
use crate::core::{RunStatus, StageOutcome, StageOutput};
use crate::errors::{ErrorKind, ReleaseflowError};
use crate::trigger::TriggerContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Exit code for configuration and usage errors.
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Base of per-stage exit codes: stage `n` (1-based) exits with `BASE + n`.
pub const STAGE_EXIT_CODE_BASE: u8 = 10;

/// How a failed run maps to a process exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCodePolicy {
    /// Any failure exits with 1.
    #[default]
    Uniform,
    /// A failure exits with `10 + <1-based index of the failing stage>`.
    PerStage,
}

/// A failed stage's error, flattened for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Error kind.
    pub kind: ErrorKind,
    /// Error message, verbatim.
    pub message: String,
}

impl From<&ReleaseflowError> for StageFailure {
    fn from(err: &ReleaseflowError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// 1-based position in the pipeline.
    pub index: usize,
    /// Terminal outcome.
    pub outcome: StageOutcome,
    /// The stage's fatality.
    pub fatality: Fatality,
    /// True for a best-effort failure that did not abort the run.
    #[serde(default)]
    pub tolerated: bool,
    /// When the stage started, if it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Wall time in milliseconds, if it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Why the stage did not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// The failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageFailure>,
    /// The stage output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,
}

impl StageRecord {
    pub(crate) fn skipped(name: &str, index: usize, fatality: Fatality, reason: String) -> Self {
        Self {
            name: name.to_string(),
            index,
            outcome: StageOutcome::Skipped,
            fatality,
            tolerated: false,
            started_at: None,
            duration_ms: None,
            skip_reason: Some(reason),
            error: None,
            output: None,
        }
    }

    /// Returns true if the stage's action was invoked.
    #[must_use]
    pub fn executed(&self) -> bool {
        self.started_at.is_some()
    }
}

/// The first gating failure of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Name of the failing stage.
    pub stage: String,
    /// 1-based index of the failing stage.
    pub index: usize,
    /// Error kind.
    pub kind: ErrorKind,
    /// Error message, verbatim.
    pub message: String,
}

/// The report of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunResult {
    /// Run identifier.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// The trigger the run evaluated.
    pub trigger: TriggerContext,
    /// Overall status.
    pub status: RunStatus,
    /// One record per stage, in pipeline order.
    pub stages: Vec<StageRecord>,
    /// The first gating failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PipelineFailure>,
    /// Metadata exported during the run.
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total wall time in milliseconds.
    pub duration_ms: u64,
}

impl PipelineRunResult {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Looks up a stage record by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the outcome of a stage, `Pending` if unknown.
    #[must_use]
    pub fn outcome(&self, name: &str) -> StageOutcome {
        self.stage(name).map_or(StageOutcome::Pending, |s| s.outcome)
    }

    /// Names of stages whose action was invoked, in order.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Names of tolerated best-effort failures.
    #[must_use]
    pub fn tolerated_failures(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.tolerated)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Maps the run to a process exit code.
    #[must_use]
    pub fn exit_code(&self, policy: ExitCodePolicy) -> u8 {
        match (&self.failure, policy) {
            (None, _) => 0,
            (Some(_), ExitCodePolicy::Uniform) => 1,
            (Some(failure), ExitCodePolicy::PerStage) => {
                let index = u8::try_from(failure.index).unwrap_or(u8::MAX);
                STAGE_EXIT_CODE_BASE.saturating_add(index).min(125)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::EventKind;

    fn report(failure: Option<PipelineFailure>) -> PipelineRunResult {
        PipelineRunResult {
            run_id: Uuid::nil(),
            pipeline: "release".into(),
            trigger: TriggerContext::new(EventKind::Push, "refs/heads/main"),
            status: if failure.is_some() {
                RunStatus::Failure
            } else {
                RunStatus::Success
            },
            stages: vec![StageRecord::skipped(
                "PublishRelease",
                9,
                Fatality::Gating,
                "predicate not satisfied".into(),
            )],
            failure,
            exports: BTreeMap::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn lint_failure() -> PipelineFailure {
        PipelineFailure {
            stage: "Lint".into(),
            index: 3,
            kind: ErrorKind::Check,
            message: "Check failed".into(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(None).exit_code(ExitCodePolicy::Uniform), 0);
        assert_eq!(report(None).exit_code(ExitCodePolicy::PerStage), 0);
        assert_eq!(report(Some(lint_failure())).exit_code(ExitCodePolicy::Uniform), 1);
        assert_eq!(report(Some(lint_failure())).exit_code(ExitCodePolicy::PerStage), 13);
    }

    #[test]
    fn test_lookup_helpers() {
        let report = report(None);
        assert_eq!(report.outcome("PublishRelease"), StageOutcome::Skipped);
        assert_eq!(report.outcome("Unknown"), StageOutcome::Pending);
        assert!(report.executed_stages().is_empty());
        assert!(report.tolerated_failures().is_empty());
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(report(Some(lint_failure()))).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["failure"]["kind"], "check");
        assert_eq!(json["stages"][0]["outcome"], "skipped");
        assert!(json["stages"][0].get("error").is_none());
    }
}
