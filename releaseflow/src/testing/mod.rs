//! Testing utilities for releaseflow pipelines.
//!
//! This module provides:
//! - Mock stages and a recording publisher
//! - Trigger and run-context fixtures
//! - Assertions over run reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_all_terminal, assert_executed, assert_failed_at, assert_outcomes};
pub use fixtures::{
    branch_trigger, fixed_instant, pull_request_trigger, tag_trigger, write_build_outputs, TestRun,
};
pub use mocks::{ExecutionLog, MockStage, PublishCall, RecordingPublisher};
