//! Test fixtures for pipeline testing.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::context::{FixedClock, RunContext};
use crate::events::CollectingEventSink;
use crate::trigger::{EventKind, TriggerContext};

/// A trigger for a push to `branch`.
#[must_use]
pub fn branch_trigger(branch: &str) -> TriggerContext {
    TriggerContext::new(EventKind::Push, format!("refs/heads/{branch}"))
}

/// A trigger for a pull request against `branch`.
#[must_use]
pub fn pull_request_trigger(branch: &str) -> TriggerContext {
    TriggerContext::new(EventKind::PullRequest, format!("refs/heads/{branch}"))
}

/// A trigger for a pushed tag.
#[must_use]
pub fn tag_trigger(tag: &str) -> TriggerContext {
    TriggerContext::new(EventKind::TagPush, format!("refs/tags/{tag}"))
}

/// The instant every fixture clock reports.
#[must_use]
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 5, 9, 3, 7)
        .single()
        .unwrap_or_default()
}

/// A run context with a fixed clock and a collecting event sink.
#[derive(Debug)]
pub struct TestRun {
    /// The context to run against.
    pub ctx: RunContext,
    /// Events emitted during the run.
    pub events: Arc<CollectingEventSink>,
}

impl TestRun {
    /// Creates a test run for `trigger` in the current directory.
    #[must_use]
    pub fn new(trigger: TriggerContext) -> Self {
        let events = Arc::new(CollectingEventSink::new());
        let ctx = RunContext::new(trigger)
            .with_clock(Arc::new(FixedClock(fixed_instant())))
            .with_event_sink(events.clone());
        Self { ctx, events }
    }

    /// Runs in `workdir` instead.
    #[must_use]
    pub fn in_dir(mut self, workdir: &Path) -> Self {
        self.ctx = self.ctx.with_workdir(workdir);
        self
    }
}

/// Writes empty build outputs named `files` under `<root>/<output_dir>`.
///
/// # Errors
///
/// Returns an IO error if a directory or file cannot be created.
pub fn write_build_outputs(root: &Path, output_dir: &str, files: &[&str]) -> std::io::Result<()> {
    let dir = root.join(output_dir);
    for file in files {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, file.as_bytes())?;
    }
    std::fs::create_dir_all(dir)
}
