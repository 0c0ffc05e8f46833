//! Core domain model types for releaseflow.
//!
//! This module contains the fundamental types shared by stages and the runner:
//! - Stage outcome and run status enums
//! - Stage output produced by successful stages

mod output;
mod status;

pub use output::StageOutput;
pub use status::{RunStatus, StageOutcome};
