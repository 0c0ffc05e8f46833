//! Mock stages and publishers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::{PublishError, ReleaseflowError};
use crate::release::{PublishReceipt, ReleasePublisher};
use crate::stages::{Stage, StageResult};

/// Shared, ordered log of stage starts and ends.
///
/// Entries are `start:<stage>` and `end:<stage>`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }

    /// Returns a copy of the entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the names of stages that started, in order.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix("start:").map(str::to_string))
            .collect()
    }
}

type ErrorFactory = Arc<dyn Fn() -> ReleaseflowError + Send + Sync>;

/// A configurable stage that records its calls.
pub struct MockStage {
    name: String,
    error: Option<ErrorFactory>,
    delay: Option<Duration>,
    exports: Vec<(String, String)>,
    output: StageOutput,
    log: Option<ExecutionLog>,
    calls: Mutex<usize>,
}

impl std::fmt::Debug for MockStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStage")
            .field("name", &self.name)
            .field("fails", &self.error.is_some())
            .field("delay", &self.delay)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl MockStage {
    /// Creates a mock stage that succeeds with an empty output.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: None,
            delay: None,
            exports: Vec::new(),
            output: StageOutput::empty(),
            log: None,
            calls: Mutex::new(0),
        }
    }

    /// Creates a mock stage that fails with the error built by `error`.
    #[must_use]
    pub fn failing<F>(name: impl Into<String>, error: F) -> Self
    where
        F: Fn() -> ReleaseflowError + Send + Sync + 'static,
    {
        let mut stage = Self::new(name);
        stage.error = Some(Arc::new(error));
        stage
    }

    /// Sleeps before completing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Exports a metadata key when the stage succeeds.
    #[must_use]
    pub fn with_export(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exports.push((key.into(), value.into()));
        self
    }

    /// Sets the output returned on success.
    #[must_use]
    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = output;
        self
    }

    /// Records starts and ends into `log`.
    #[must_use]
    pub fn with_log(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Returns the number of times the stage was executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        *self.calls.lock() += 1;
        if let Some(log) = &self.log {
            log.push(format!("start:{}", self.name));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &self.error {
            Some(make_error) => Err(make_error()),
            None => {
                for (key, value) in &self.exports {
                    ctx.metadata().export(key.clone(), value.clone())?;
                }
                Ok(self.output.clone())
            }
        };

        if let Some(log) = &self.log {
            log.push(format!("end:{}", self.name));
        }
        result
    }
}

/// One recorded `publish` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    /// The tag passed to the publisher.
    pub tag: String,
    /// The asset paths passed to the publisher.
    pub assets: Vec<PathBuf>,
}

/// A publisher that records calls and optionally fails.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<PublishCall>>,
    fail_with_status: Option<u16>,
}

impl RecordingPublisher {
    /// Creates a publisher that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that rejects every call with an HTTP status.
    #[must_use]
    pub fn rejecting(status: u16) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with_status: Some(status),
        }
    }

    /// Returns the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ReleasePublisher for RecordingPublisher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, tag: &str, assets: &[PathBuf]) -> Result<PublishReceipt, PublishError> {
        self.calls.lock().push(PublishCall {
            tag: tag.to_string(),
            assets: assets.to_vec(),
        });

        if let Some(status) = self.fail_with_status {
            return Err(PublishError::new(tag, format!("HTTP {status}")).with_status(status));
        }

        let uploaded = assets
            .iter()
            .filter_map(|a| a.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        Ok(PublishReceipt::new(tag, uploaded))
    }
}
