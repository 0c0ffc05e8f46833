//! Stages that derive, package and publish the release artifact.

use super::{Stage, StageResult};
use crate::context::{RunContext, RELEASE_FILE_KEY, TIMESTAMP_KEY, VERSION_KEY};
use crate::core::StageOutput;
use crate::errors::{ConfigError, PublishError, ReleaseflowError};
use crate::release::{
    collect_assets, list_directory, resolve_inputs, write_archive, InputPattern, ReleaseArtifactDescriptor,
    ReleasePublisher,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Derives the release descriptor and exports `TIMESTAMP`, `RELEASE_FILE`
/// and `VERSION`.
#[derive(Debug, Clone)]
pub struct ComputeReleaseMetadataStage {
    name: String,
    artifact_name: String,
    inputs: Vec<InputPattern>,
    env_file: Option<PathBuf>,
}

impl ComputeReleaseMetadataStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        artifact_name: impl Into<String>,
        inputs: Vec<InputPattern>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_name: artifact_name.into(),
            inputs,
            env_file: None,
        }
    }

    /// Also appends the exports to a CI env file (e.g. `$GITHUB_ENV`).
    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }
}

#[async_trait]
impl Stage for ComputeReleaseMetadataStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        let descriptor = ReleaseArtifactDescriptor::for_trigger(
            ctx.trigger(),
            &self.artifact_name,
            self.inputs.clone(),
            ctx.clock().now(),
        )
        .ok_or_else(|| {
            ConfigError::Validation(format!(
                "{} requires a release tag, got {}",
                self.name,
                ctx.trigger()
            ))
        })?;

        for (key, value) in descriptor.exports() {
            ctx.metadata().export(key, value)?;
        }

        if let Some(env_file) = &self.env_file {
            let path = ctx.resolve_path(env_file);
            ctx.metadata()
                .append_to_env_file(&path, &[TIMESTAMP_KEY, RELEASE_FILE_KEY, VERSION_KEY])?;
            info!(env_file = %path.display(), "release metadata appended to env file");
        }

        info!(
            version = %descriptor.version,
            release_file = %descriptor.file_name,
            timestamp = %descriptor.timestamp,
            "release metadata computed"
        );

        Ok(StageOutput::value(
            "descriptor",
            serde_json::to_value(&descriptor).unwrap_or_default(),
        ))
    }
}

/// Lists the build output directory.
#[derive(Debug, Clone)]
pub struct ListBuildOutputStage {
    name: String,
    output_dir: PathBuf,
}

impl ListBuildOutputStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Stage for ListBuildOutputStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        let dir = ctx.resolve_path(&self.output_dir);
        let entries = list_directory(&dir)?;

        for entry in &entries {
            info!(dir = %dir.display(), entry = %entry, "build output");
        }

        Ok(StageOutput::value("entries", serde_json::json!(entries.len())).with_notes(entries))
    }
}

/// Archives the matched build outputs as `RELEASE_FILE`.
#[derive(Debug, Clone)]
pub struct PackageArtifactStage {
    name: String,
    output_dir: PathBuf,
    release_dir: PathBuf,
    inputs: Vec<InputPattern>,
}

impl PackageArtifactStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        release_dir: impl Into<PathBuf>,
        inputs: Vec<InputPattern>,
    ) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            release_dir: release_dir.into(),
            inputs,
        }
    }
}

#[async_trait]
impl Stage for PackageArtifactStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        let release_file = ctx.metadata().require(RELEASE_FILE_KEY)?;
        let output_dir = ctx.resolve_path(&self.output_dir);
        let archive_path = ctx.resolve_path(&self.release_dir).join(&release_file);
        let inputs = self.inputs.clone();

        let summary = tokio::task::spawn_blocking(move || {
            let files = resolve_inputs(&output_dir, &inputs)?;
            write_archive(&output_dir, &files, &archive_path)
        })
        .await
        .map_err(|e| ReleaseflowError::Io(std::io::Error::other(e)))??;

        let files: Vec<String> = summary
            .files
            .iter()
            .map(|f| f.display().to_string())
            .collect();

        Ok(StageOutput::value("archive", serde_json::json!(summary.path))
            .with_value("files", serde_json::json!(files))
            .with_value("bytes", serde_json::json!(summary.bytes))
            .with_value("sha256", serde_json::json!(summary.sha256))
            .with_notes(files))
    }
}

/// Hands the release assets to the publisher under the run's tag.
pub struct PublishReleaseStage {
    name: String,
    release_dir: PathBuf,
    asset_glob: String,
    publisher: Arc<dyn ReleasePublisher>,
}

impl std::fmt::Debug for PublishReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishReleaseStage")
            .field("name", &self.name)
            .field("release_dir", &self.release_dir)
            .field("asset_glob", &self.asset_glob)
            .field("publisher", &self.publisher.name())
            .finish()
    }
}

impl PublishReleaseStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        release_dir: impl Into<PathBuf>,
        asset_glob: impl Into<String>,
        publisher: Arc<dyn ReleasePublisher>,
    ) -> Self {
        Self {
            name: name.into(),
            release_dir: release_dir.into(),
            asset_glob: asset_glob.into(),
            publisher,
        }
    }
}

#[async_trait]
impl Stage for PublishReleaseStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        let tag = ctx.trigger().release_tag().ok_or_else(|| {
            PublishError::new(ctx.trigger().ref_name(), "not a release tag")
        })?;

        let release_dir = ctx.resolve_path(&self.release_dir);
        let assets = collect_assets(&release_dir, &self.asset_glob)?;
        if assets.is_empty() {
            return Err(PublishError::new(
                tag,
                format!("no assets matching '{}' in {}", self.asset_glob, release_dir.display()),
            )
            .into());
        }

        info!(
            tag = tag,
            publisher = self.publisher.name(),
            assets = assets.len(),
            "publishing release"
        );
        let receipt = self.publisher.publish(tag, &assets).await?;

        Ok(StageOutput::value("tag", serde_json::json!(receipt.tag))
            .with_value("uploaded", serde_json::json!(receipt.uploaded))
            .with_value("release_url", serde_json::json!(receipt.release_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedClock;
    use crate::errors::{ErrorKind, PackagingError};
    use crate::release::{default_input_patterns, MockReleasePublisher, PublishReceipt};
    use crate::trigger::{EventKind, TriggerContext};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn tag_ctx(dir: &std::path::Path) -> RunContext {
        RunContext::new(TriggerContext::new(EventKind::TagPush, "refs/tags/v2.0.1"))
            .with_workdir(dir)
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
            )))
    }

    fn compute_stage() -> ComputeReleaseMetadataStage {
        ComputeReleaseMetadataStage::new(
            "ComputeReleaseMetadata",
            "gen_inds",
            default_input_patterns("gen_inds"),
        )
    }

    fn write_build_output(dir: &std::path::Path) {
        let out = dir.join("target/release");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("gen_inds"), b"bin").unwrap();
        std::fs::write(out.join("libgen_inds.so"), b"so").unwrap();
    }

    #[tokio::test]
    async fn test_compute_exports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = tag_ctx(dir.path());

        compute_stage().execute(&ctx).await.unwrap();

        assert_eq!(ctx.metadata().get(RELEASE_FILE_KEY).as_deref(), Some("gen_inds_v2.0.1.tar.gz"));
        assert_eq!(ctx.metadata().get(TIMESTAMP_KEY).as_deref(), Some("2024-03-09_14:05:00"));
        assert_eq!(ctx.metadata().get(VERSION_KEY).as_deref(), Some("v2.0.1"));
    }

    #[tokio::test]
    async fn test_compute_appends_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = tag_ctx(dir.path());

        compute_stage()
            .with_env_file("github_env")
            .execute(&ctx)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("github_env")).unwrap();
        assert_eq!(
            contents,
            "TIMESTAMP=2024-03-09_14:05:00\nRELEASE_FILE=gen_inds_v2.0.1.tar.gz\nVERSION=v2.0.1\n"
        );
    }

    #[tokio::test]
    async fn test_compute_rejects_branch_trigger() {
        let ctx = RunContext::new(TriggerContext::new(EventKind::Push, "refs/heads/main"));
        let err = compute_stage().execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(ctx.metadata().is_empty());
    }

    #[tokio::test]
    async fn test_compute_twice_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = tag_ctx(dir.path());
        compute_stage().execute(&ctx).await.unwrap();
        let err = compute_stage().execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Metadata);
    }

    #[tokio::test]
    async fn test_list_build_output() {
        let dir = tempfile::tempdir().unwrap();
        write_build_output(dir.path());

        let output = ListBuildOutputStage::new("ListBuildOutput", "target/release")
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(output.notes, vec!["gen_inds".to_string(), "libgen_inds.so".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_output_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ListBuildOutputStage::new("ListBuildOutput", "target/release")
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_package_writes_release_file() {
        let dir = tempfile::tempdir().unwrap();
        write_build_output(dir.path());
        let ctx = tag_ctx(dir.path());
        compute_stage().execute(&ctx).await.unwrap();

        let output = PackageArtifactStage::new(
            "PackageArtifact",
            "target/release",
            ".",
            default_input_patterns("gen_inds"),
        )
        .execute(&ctx)
        .await
        .unwrap();

        assert!(dir.path().join("gen_inds_v2.0.1.tar.gz").is_file());
        assert_eq!(output.notes, vec!["gen_inds".to_string(), "libgen_inds.so".to_string()]);
        assert_eq!(output.get_str("sha256").map(str::len), Some(64));
    }

    #[tokio::test]
    async fn test_package_into_fresh_release_dir_then_publish() {
        let dir = tempfile::tempdir().unwrap();
        write_build_output(dir.path());
        let ctx = tag_ctx(dir.path());
        compute_stage().execute(&ctx).await.unwrap();

        PackageArtifactStage::new(
            "PackageArtifact",
            "target/release",
            "dist",
            default_input_patterns("gen_inds"),
        )
        .execute(&ctx)
        .await
        .unwrap();
        assert!(dir.path().join("dist/gen_inds_v2.0.1.tar.gz").is_file());

        let mut publisher = MockReleasePublisher::new();
        publisher.expect_name().return_const("mock");
        publisher
            .expect_publish()
            .withf(|_, assets| assets.len() == 1 && assets[0].ends_with("dist/gen_inds_v2.0.1.tar.gz"))
            .times(1)
            .returning(|tag, _| {
                Ok(PublishReceipt::new(tag, vec!["gen_inds_v2.0.1.tar.gz".into()]))
            });

        let output = PublishReleaseStage::new("PublishRelease", "dist", "*.tar.gz", Arc::new(publisher))
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(output.get_str("tag"), Some("v2.0.1"));
    }

    #[tokio::test]
    async fn test_package_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_build_output(dir.path());

        let err = PackageArtifactStage::new("PackageArtifact", "target/release", ".", vec![])
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseflowError::MissingMetadata(ref key) if key == RELEASE_FILE_KEY));
    }

    #[tokio::test]
    async fn test_package_with_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target/release")).unwrap();
        let ctx = tag_ctx(dir.path());
        compute_stage().execute(&ctx).await.unwrap();

        let err = PackageArtifactStage::new(
            "PackageArtifact",
            "target/release",
            ".",
            default_input_patterns("gen_inds"),
        )
        .execute(&ctx)
        .await
        .unwrap_err();

        assert!(matches!(err, ReleaseflowError::Packaging(PackagingError::Empty { .. })));
        assert!(!dir.path().join("gen_inds_v2.0.1.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_publish_hands_assets_to_publisher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gen_inds_v2.0.1.tar.gz"), b"archive").unwrap();

        let mut publisher = MockReleasePublisher::new();
        publisher.expect_name().return_const("mock");
        publisher
            .expect_publish()
            .withf(|tag, assets| {
                tag == "v2.0.1"
                    && assets.len() == 1
                    && assets[0].ends_with("gen_inds_v2.0.1.tar.gz")
            })
            .times(1)
            .returning(|tag, _| {
                Ok(PublishReceipt::new(tag, vec!["gen_inds_v2.0.1.tar.gz".into()]))
            });

        let output = PublishReleaseStage::new("PublishRelease", ".", "*.tar.gz", Arc::new(publisher))
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(output.get_str("tag"), Some("v2.0.1"));
    }

    #[tokio::test]
    async fn test_publish_without_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut publisher = MockReleasePublisher::new();
        publisher.expect_name().return_const("mock");
        publisher.expect_publish().never();

        let err = PublishReleaseStage::new("PublishRelease", ".", "*.tar.gz", Arc::new(publisher))
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Publish);
    }

    #[tokio::test]
    async fn test_publish_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gen_inds_v2.0.1.tar.gz"), b"archive").unwrap();
        let mut publisher = MockReleasePublisher::new();
        publisher.expect_name().return_const("mock");
        publisher
            .expect_publish()
            .returning(|tag, _| Err(PublishError::new(tag, "HTTP 401").with_status(401)));

        let err = PublishReleaseStage::new("PublishRelease", ".", "*.tar.gz", Arc::new(publisher))
            .execute(&tag_ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseflowError::Publish(ref e) if e.status == Some(401)));
    }
}
