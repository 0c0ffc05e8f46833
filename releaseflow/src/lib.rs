//! # Releaseflow
//!
//! A release-gating pipeline for Rust projects.
//!
//! Every run executes an ordered list of stages:
//!
//! - **Verification gates**: toolchain setup, lint, test and build run on every trigger
//! - **Release stages**: metadata, packaging and publishing run only on release tags
//! - **Short-circuit**: the first gating failure skips every later stage
//! - **Best-effort stages**: diagnostic stages may fail without aborting the run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use releaseflow::prelude::*;
//!
//! let config = load_config(Some(Path::new("releaseflow.toml")))?;
//! validate_config(&config)?;
//!
//! let pipeline = release_pipeline(&config, Arc::new(DryRunPublisher))?;
//! let trigger = TriggerContext::new(EventKind::TagPush, "refs/tags/v2.0.1");
//!
//! let result = pipeline.run(&RunContext::new(trigger)).await;
//! assert_eq!(result.exports["RELEASE_FILE"], "gen_inds_v2.0.1.tar.gz");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod release;
pub mod stages;
pub mod testing;
pub mod trigger;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{load_config, validate_config, Config};
    pub use crate::context::{
        Clock, MetadataStore, RunContext, RunIdentity, SystemClock, RELEASE_FILE_KEY,
        TIMESTAMP_KEY, VERSION_KEY,
    };
    pub use crate::core::{RunStatus, StageOutcome, StageOutput};
    pub use crate::errors::{
        CheckFailure, ConfigError, ErrorKind, PackagingError, PipelineValidationError,
        PublishError, ReleaseflowError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        release_pipeline, ExitCodePolicy, Fatality, Pipeline, PipelineBuilder,
        PipelineRunResult, StagePredicate, StageSpec,
    };
    pub use crate::release::{DryRunPublisher, ReleaseArtifactDescriptor, ReleasePublisher};
    pub use crate::stages::{Stage, StageResult};
    pub use crate::trigger::{EventKind, ReleaseTagMatcher, TriggerContext};
}
