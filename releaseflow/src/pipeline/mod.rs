//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications with predicates, fatality and timeouts
//! - A pipeline builder with validation
//! - The sequential runner and its run report
//! - The stock nine-stage release pipeline

mod builder;
mod result;
mod runner;
mod spec;
mod standard;

pub use builder::PipelineBuilder;
pub use result::{
    ExitCodePolicy, PipelineFailure, PipelineRunResult, StageFailure, StageRecord, EXIT_CONFIG_ERROR,
    STAGE_EXIT_CODE_BASE,
};
pub use runner::{Pipeline, PlannedStage};
pub use spec::{Fatality, StagePredicate, StageSpec};
pub use standard::{release_pipeline, stage_names, RELEASE_PIPELINE_NAME};
