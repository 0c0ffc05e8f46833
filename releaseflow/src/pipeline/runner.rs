//! Sequential pipeline execution.

use super::result::{PipelineFailure, PipelineRunResult, StageFailure, StageRecord};
use super::{Fatality, StageSpec};
use crate::context::RunContext;
use crate::core::{RunStatus, StageOutcome};
use crate::errors::ReleaseflowError;
use crate::stages::StageResult;
use crate::trigger::TriggerContext;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// An ordered, validated list of stages.
///
/// Built with [`super::PipelineBuilder`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
}

/// Whether a stage would run for a trigger, before anything fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    /// Stage name.
    pub name: String,
    /// Predicate label.
    pub condition: &'static str,
    /// The stage's fatality.
    pub fatality: Fatality,
    /// Whether the predicate holds.
    pub runs: bool,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl Pipeline {
    pub(crate) fn new(name: String, stages: Vec<StageSpec>) -> Self {
        Self { name, stages }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage specifications in order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Evaluates every predicate against `trigger` without running anything.
    #[must_use]
    pub fn plan(&self, trigger: &TriggerContext) -> Vec<PlannedStage> {
        self.stages
            .iter()
            .map(|spec| PlannedStage {
                name: spec.name.clone(),
                condition: spec.predicate.describe(),
                fatality: spec.fatality,
                runs: spec.predicate.evaluate(trigger),
            })
            .collect()
    }

    /// Runs every stage in order.
    ///
    /// Each stage's outcome is final before the next stage is considered.
    /// After the first gating failure every later stage is `Skipped`.
    /// Best-effort failures are recorded as tolerated and the run continues.
    pub async fn run(&self, ctx: &RunContext) -> PipelineRunResult {
        let started_at = ctx.clock().now();
        let start = Instant::now();
        let trigger = ctx.trigger();

        info!(
            pipeline = %self.name,
            run_id = %ctx.identity().run_id,
            trigger = %trigger,
            release = trigger.is_release_tag(),
            "pipeline started"
        );
        ctx.emit(
            "pipeline.started",
            json!({
                "pipeline": self.name,
                "event": trigger.event_kind(),
                "ref": trigger.ref_name(),
                "is_release_tag": trigger.is_release_tag(),
            }),
        )
        .await;

        let mut records = Vec::with_capacity(self.stages.len());
        let mut failure: Option<PipelineFailure> = None;

        for (position, spec) in self.stages.iter().enumerate() {
            let index = position + 1;

            if let Some(first) = &failure {
                let reason = format!("skipped after '{}' failed", first.stage);
                records.push(self.skip(ctx, spec, index, reason).await);
                continue;
            }

            if !spec.predicate.evaluate(trigger) {
                let reason = format!("condition not met: {}", spec.predicate.describe());
                records.push(self.skip(ctx, spec, index, reason).await);
                continue;
            }

            let record = self.execute(ctx, spec, index).await;
            if record.outcome == StageOutcome::Failure && !record.tolerated {
                if let Some(err) = &record.error {
                    failure = Some(PipelineFailure {
                        stage: spec.name.clone(),
                        index,
                        kind: err.kind,
                        message: err.message.clone(),
                    });
                }
            }
            records.push(record);
        }

        let status = if failure.is_some() {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        let duration_ms = elapsed_ms(start);

        match &failure {
            None => {
                info!(pipeline = %self.name, duration_ms, "pipeline succeeded");
                ctx.emit("pipeline.completed", json!({ "duration_ms": duration_ms }))
                    .await;
            }
            Some(f) => {
                error!(pipeline = %self.name, stage = %f.stage, kind = %f.kind, error = %f.message, "pipeline failed");
                ctx.emit(
                    "pipeline.failed",
                    json!({ "stage": f.stage, "kind": f.kind, "error": f.message, "duration_ms": duration_ms }),
                )
                .await;
            }
        }

        PipelineRunResult {
            run_id: ctx.identity().run_id,
            pipeline: self.name.clone(),
            trigger: trigger.clone(),
            status,
            stages: records,
            failure,
            exports: ctx.metadata().to_map(),
            started_at,
            duration_ms,
        }
    }

    async fn skip(&self, ctx: &RunContext, spec: &StageSpec, index: usize, reason: String) -> StageRecord {
        info!(stage = %spec.name, reason = %reason, "stage skipped");
        ctx.emit_stage("stage.skipped", &spec.name, json!({ "reason": reason }))
            .await;
        StageRecord::skipped(&spec.name, index, spec.fatality, reason)
    }

    async fn execute(&self, ctx: &RunContext, spec: &StageSpec, index: usize) -> StageRecord {
        let started_at = ctx.clock().now();
        let start = Instant::now();

        ctx.emit_stage("stage.started", &spec.name, json!({ "index": index }))
            .await;

        let span = info_span!("stage", pipeline = %self.name, stage = %spec.name, index);
        let result = run_guarded(ctx, spec).instrument(span).await;
        let duration_ms = elapsed_ms(start);

        let mut record = StageRecord {
            name: spec.name.clone(),
            index,
            outcome: StageOutcome::Success,
            fatality: spec.fatality,
            tolerated: false,
            started_at: Some(started_at),
            duration_ms: Some(duration_ms),
            skip_reason: None,
            error: None,
            output: None,
        };

        match result {
            Ok(output) => {
                info!(stage = %spec.name, duration_ms, "stage completed");
                ctx.emit_stage("stage.completed", &spec.name, json!({ "duration_ms": duration_ms }))
                    .await;
                record.output = Some(output);
            }
            Err(err) => {
                let tolerated = spec.fatality == Fatality::BestEffort
                    && !matches!(err, ReleaseflowError::Cancelled(_));
                if tolerated {
                    warn!(stage = %spec.name, kind = %err.kind(), error = %err, "best-effort stage failed");
                } else {
                    error!(stage = %spec.name, kind = %err.kind(), error = %err, "stage failed");
                }
                ctx.emit_stage(
                    "stage.failed",
                    &spec.name,
                    json!({
                        "kind": err.kind(),
                        "error": err.to_string(),
                        "tolerated": tolerated,
                        "duration_ms": duration_ms,
                    }),
                )
                .await;
                record.outcome = StageOutcome::Failure;
                record.tolerated = tolerated;
                record.error = Some(StageFailure::from(&err));
            }
        }

        record
    }
}

/// Runs one stage under its timeout, racing the run's cancellation token.
async fn run_guarded(ctx: &RunContext, spec: &StageSpec) -> StageResult {
    let cancelled = |ctx: &RunContext| {
        ReleaseflowError::Cancelled(
            ctx.cancellation()
                .reason()
                .unwrap_or_else(|| "cancelled".to_string()),
        )
    };

    if ctx.is_cancelled() {
        return Err(cancelled(ctx));
    }

    let action = spec.runner.execute(ctx);
    let bounded = async {
        match spec.timeout {
            Some(timeout) => tokio::time::timeout(timeout, action)
                .await
                .unwrap_or_else(|_| {
                    Err(ReleaseflowError::Timeout {
                        stage: spec.name.clone(),
                        timeout,
                    })
                }),
            None => action.await,
        }
    };

    tokio::select! {
        biased;
        () = ctx.cancellation().cancelled() => Err(cancelled(ctx)),
        result = bounded => result,
    }
}
