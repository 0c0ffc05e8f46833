//! Stage specifications.

use crate::errors::PipelineValidationError;
use crate::stages::Stage;
use crate::trigger::TriggerContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a stage runs for a given trigger.
#[derive(Clone, Default)]
pub enum StagePredicate {
    /// The stage always runs.
    #[default]
    Always,
    /// The stage runs only on release tags.
    ReleaseTag,
    /// Arbitrary condition over the trigger.
    Custom(Arc<dyn Fn(&TriggerContext) -> bool + Send + Sync>),
}

impl StagePredicate {
    /// Wraps a closure as a predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&TriggerContext) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn evaluate(&self, trigger: &TriggerContext) -> bool {
        match self {
            Self::Always => true,
            Self::ReleaseTag => trigger.is_release_tag(),
            Self::Custom(f) => f(trigger),
        }
    }

    /// Short label for reports.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::ReleaseTag => "release tag",
            Self::Custom(_) => "custom condition",
        }
    }
}

impl fmt::Debug for StagePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Whether a stage failure aborts the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fatality {
    /// Failure skips every later stage and fails the run.
    #[default]
    Gating,
    /// Failure is recorded and the run continues.
    BestEffort,
}

impl Fatality {
    /// Maps a `best_effort` flag.
    #[must_use]
    pub fn from_best_effort(best_effort: bool) -> Self {
        if best_effort {
            Self::BestEffort
        } else {
            Self::Gating
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// When the stage runs.
    pub predicate: StagePredicate,
    /// What a failure does to the run.
    pub fatality: Fatality,
    /// Upper bound on the stage's wall time.
    pub timeout: Option<Duration>,
}

impl StageSpec {
    /// Creates an unconditional, gating stage specification named after its runner.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            runner,
            predicate: StagePredicate::Always,
            fatality: Fatality::Gating,
            timeout: None,
        }
    }

    /// Sets the predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: StagePredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Runs the stage only on release tags.
    #[must_use]
    pub fn when_release_tag(self) -> Self {
        self.with_predicate(StagePredicate::ReleaseTag)
    }

    /// Sets the fatality.
    #[must_use]
    pub fn with_fatality(mut self, fatality: Fatality) -> Self {
        self.fatality = fatality;
        self
    }

    /// Marks the stage best-effort.
    #[must_use]
    pub fn best_effort(self) -> Self {
        self.with_fatality(Fatality::BestEffort)
    }

    /// Sets or clears the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the timeout is zero.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name cannot be empty"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' has a zero timeout",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;
    use crate::trigger::EventKind;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(NoOpStage::new(name))
    }

    #[test]
    fn test_stage_spec_defaults() {
        let spec = StageSpec::new(noop("Lint"));
        assert_eq!(spec.name, "Lint");
        assert_eq!(spec.fatality, Fatality::Gating);
        assert!(spec.timeout.is_none());
        assert_eq!(spec.predicate.describe(), "always");
    }

    #[test]
    fn test_stage_spec_builders() {
        let spec = StageSpec::new(noop("ListBuildOutput"))
            .when_release_tag()
            .best_effort()
            .with_timeout(Duration::from_secs(30));

        assert_eq!(spec.fatality, Fatality::BestEffort);
        assert_eq!(spec.timeout, Some(Duration::from_secs(30)));
        assert_eq!(format!("{:?}", spec.predicate), "release tag");
    }

    #[test]
    fn test_predicates() {
        let tag = TriggerContext::new(EventKind::TagPush, "refs/tags/v1.0.0");
        let branch = TriggerContext::new(EventKind::Push, "refs/heads/main");

        assert!(StagePredicate::Always.evaluate(&branch));
        assert!(StagePredicate::ReleaseTag.evaluate(&tag));
        assert!(!StagePredicate::ReleaseTag.evaluate(&branch));

        let pr_only = StagePredicate::custom(|t| t.event_kind() == EventKind::PullRequest);
        assert!(!pr_only.evaluate(&branch));
    }

    #[test]
    fn test_validate() {
        assert!(StageSpec::new(noop(" ")).validate().is_err());
        assert!(StageSpec::new(noop("Test"))
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(StageSpec::new(noop("Test")).validate().is_ok());
    }

    #[test]
    fn test_fatality_from_flag() {
        assert_eq!(Fatality::from_best_effort(true), Fatality::BestEffort);
        assert_eq!(Fatality::from_best_effort(false), Fatality::Gating);
        assert_eq!(serde_json::to_string(&Fatality::BestEffort).unwrap(), r#""best_effort""#);
    }
}
