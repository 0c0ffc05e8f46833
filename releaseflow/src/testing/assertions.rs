//! Test assertions for run reports.

use crate::core::StageOutcome;
use crate::pipeline::PipelineRunResult;

/// Asserts each stage's outcome, in pipeline order.
pub fn assert_outcomes(result: &PipelineRunResult, expected: &[(&str, StageOutcome)]) {
    let actual: Vec<(&str, StageOutcome)> = result
        .stages
        .iter()
        .map(|s| (s.name.as_str(), s.outcome))
        .collect();
    assert_eq!(actual, expected, "stage outcomes differ");
}

/// Asserts that the run failed at `stage` and every later stage was skipped.
pub fn assert_failed_at(result: &PipelineRunResult, stage: &str) {
    let failure = result
        .failure
        .as_ref()
        .unwrap_or_else(|| panic!("expected run to fail at '{stage}', but it succeeded"));
    assert_eq!(failure.stage, stage, "run failed at a different stage");

    for record in result.stages.iter().filter(|s| s.index > failure.index) {
        assert_eq!(
            record.outcome,
            StageOutcome::Skipped,
            "stage '{}' after the failure was not skipped",
            record.name
        );
    }
}

/// Asserts that exactly `stages` executed, in order.
pub fn assert_executed(result: &PipelineRunResult, stages: &[&str]) {
    assert_eq!(result.executed_stages(), stages, "executed stages differ");
}

/// Asserts that every stage outcome is terminal.
pub fn assert_all_terminal(result: &PipelineRunResult) {
    for record in &result.stages {
        assert!(
            record.outcome.is_terminal(),
            "stage '{}' is still {}",
            record.name,
            record.outcome
        );
    }
}
