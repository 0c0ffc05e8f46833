//! Event sink system for observability.
//!
//! The pipeline runner reports lifecycle transitions (`pipeline.started`,
//! `stage.started`, `stage.completed`, `stage.skipped`, `stage.failed`,
//! `pipeline.completed`, `pipeline.failed`) to an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
