//! The run-scoped context handed to every stage.

use super::{Clock, MetadataStore, RunIdentity, SystemClock};
use crate::cancellation::CancellationToken;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::trigger::TriggerContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// State owned by a single pipeline run.
///
/// The trigger is fixed at construction. Stages communicate only through the
/// [`MetadataStore`] and the build output directory.
pub struct RunContext {
    identity: RunIdentity,
    trigger: TriggerContext,
    metadata: MetadataStore,
    workdir: PathBuf,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
}

impl RunContext {
    /// Creates a context for a run started by `trigger`.
    #[must_use]
    pub fn new(trigger: TriggerContext) -> Self {
        Self {
            identity: RunIdentity::new(),
            trigger,
            metadata: MetadataStore::new(),
            workdir: PathBuf::from("."),
            clock: Arc::new(SystemClock),
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the working directory commands run in and relative paths resolve against.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the trigger that started the run.
    #[must_use]
    pub fn trigger(&self) -> &TriggerContext {
        &self.trigger
    }

    /// Returns the run-scoped metadata store.
    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Returns the working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolves `path` against the working directory unless it is absolute.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emits a run-level event.
    pub async fn emit(&self, event_type: &str, data: serde_json::Value) {
        let event = PipelineEvent::new(event_type, self.identity.run_id).with_data(data);
        self.event_sink.emit(&event).await;
    }

    /// Emits a stage-level event.
    pub async fn emit_stage(&self, event_type: &str, stage: &str, data: serde_json::Value) {
        let event = PipelineEvent::new(event_type, self.identity.run_id)
            .for_stage(stage)
            .with_data(data);
        self.event_sink.emit(&event).await;
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.identity.run_id)
            .field("trigger", &self.trigger)
            .field("workdir", &self.workdir)
            .field("exports", &self.metadata.to_map())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
