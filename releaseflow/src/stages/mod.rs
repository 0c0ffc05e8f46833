//! Stage trait and implementations.
//!
//! A stage is one unit of pipeline work. It either returns a
//! [`StageOutput`] or fails with a [`ReleaseflowError`]; the runner turns
//! that into the stage's terminal outcome.

mod command;
mod release;

pub use command::{CommandKind, CommandStage};
pub use release::{
    ComputeReleaseMetadataStage, ListBuildOutputStage, PackageArtifactStage, PublishReleaseStage,
};

use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::ReleaseflowError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;

/// Result of a stage action.
pub type StageResult = Result<StageOutput, ReleaseflowError>;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage against the run context.
    async fn execute(&self, ctx: &RunContext) -> StageResult;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&RunContext) -> StageResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&RunContext) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&RunContext) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&RunContext) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// The closure returns a boxed future borrowing the context, e.g.
/// `|ctx| async move { ... }.boxed()`.
pub struct AsyncFnStage<F>
where
    F: for<'a> Fn(&'a RunContext) -> BoxFuture<'a, StageResult> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> AsyncFnStage<F>
where
    F: for<'a> Fn(&'a RunContext) -> BoxFuture<'a, StageResult> + Send + Sync,
{
    /// Creates a new async function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a RunContext) -> BoxFuture<'a, StageResult> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a RunContext) -> BoxFuture<'a, StageResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        (self.func)(ctx).await
    }
}

/// A stage that does nothing and succeeds.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &RunContext) -> StageResult {
        Ok(StageOutput::empty())
    }
}
