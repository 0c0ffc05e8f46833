//! Release publisher collaborators.

use crate::config::{PublishSettings, PublisherKind};
use crate::errors::{ConfigError, PublishError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// What a publisher reports after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// The release tag.
    pub tag: String,
    /// Web URL of the release, if the publisher has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    /// File names of the uploaded assets, in upload order.
    pub uploaded: Vec<String>,
}

impl PublishReceipt {
    /// Creates a receipt for `tag` with no URL.
    #[must_use]
    pub fn new(tag: impl Into<String>, uploaded: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            release_url: None,
            uploaded,
        }
    }

    /// Sets the release URL.
    #[must_use]
    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = Some(url.into());
        self
    }
}

/// Creates or updates the release for a tag and attaches assets to it.
///
/// Any non-success response is a [`PublishError`]. Implementations do not
/// retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleasePublisher: Send + Sync {
    /// Returns a short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Publishes `assets` under `tag`.
    async fn publish(&self, tag: &str, assets: &[PathBuf]) -> Result<PublishReceipt, PublishError>;
}

/// Returns the file name component used as the asset name.
pub(crate) fn asset_name(tag: &str, path: &Path) -> Result<String, PublishError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PublishError::new(tag, format!("asset path {} has no file name", path.display())))
}

/// A publisher that only logs what it would upload.
#[derive(Debug, Clone, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl ReleasePublisher for DryRunPublisher {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn publish(&self, tag: &str, assets: &[PathBuf]) -> Result<PublishReceipt, PublishError> {
        let mut uploaded = Vec::with_capacity(assets.len());
        for asset in assets {
            let name = asset_name(tag, asset)?;
            info!(tag = tag, asset = %name, "dry run: would upload release asset");
            uploaded.push(name);
        }
        Ok(PublishReceipt::new(tag, uploaded))
    }
}

/// Builds the publisher selected by configuration.
///
/// `dry_run` forces the [`DryRunPublisher`] regardless of the provider.
///
/// # Errors
///
/// Returns `ConfigError::Validation` if the GitHub publisher is selected but
/// the repository or token is missing, or the crate was built without the
/// `github` feature.
pub fn publisher_from_config(
    settings: &PublishSettings,
    repository: Option<String>,
    dry_run: bool,
) -> Result<Arc<dyn ReleasePublisher>, ConfigError> {
    if dry_run || settings.provider == PublisherKind::DryRun {
        return Ok(Arc::new(DryRunPublisher));
    }
    github_publisher(settings, repository)
}

#[cfg(feature = "github")]
fn github_publisher(
    settings: &PublishSettings,
    repository: Option<String>,
) -> Result<Arc<dyn ReleasePublisher>, ConfigError> {
    let repository = repository.ok_or_else(|| {
        ConfigError::Validation("publish.repository is required for the github publisher".into())
    })?;
    Ok(Arc::new(super::GithubReleasePublisher::from_env(
        settings, repository,
    )?))
}

#[cfg(not(feature = "github"))]
fn github_publisher(
    _settings: &PublishSettings,
    _repository: Option<String>,
) -> Result<Arc<dyn ReleasePublisher>, ConfigError> {
    Err(ConfigError::Validation(
        "the github publisher requires the `github` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dry_run_publisher_lists_assets() {
        let publisher = DryRunPublisher;
        let receipt = publisher
            .publish(
                "v2.0.1",
                &[PathBuf::from("/tmp/release/gen_inds_v2.0.1.tar.gz")],
            )
            .await
            .unwrap();

        assert_eq!(receipt, PublishReceipt::new("v2.0.1", vec!["gen_inds_v2.0.1.tar.gz".into()]));
        assert_eq!(publisher.name(), "dry-run");
    }

    #[tokio::test]
    async fn test_dry_run_rejects_nameless_asset() {
        let err = DryRunPublisher.publish("v1", &[PathBuf::from("/")]).await.unwrap_err();
        assert_eq!(err.tag, "v1");
    }

    #[tokio::test]
    async fn test_mock_publisher_error_passthrough() {
        let mut mock = MockReleasePublisher::new();
        mock.expect_publish()
            .withf(|tag, assets| tag == "v3.0.0" && assets.len() == 1)
            .times(1)
            .returning(|tag, _| Err(PublishError::new(tag, "HTTP 422").with_status(422)));

        let err = mock
            .publish("v3.0.0", &[PathBuf::from("gen_inds_v3.0.0.tar.gz")])
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(422));
    }

    #[test]
    fn test_publisher_from_config_dry_run() {
        let publisher = publisher_from_config(&PublishSettings::default(), None, true).unwrap();
        assert_eq!(publisher.name(), "dry-run");

        let settings = PublishSettings {
            provider: PublisherKind::DryRun,
            ..PublishSettings::default()
        };
        let publisher = publisher_from_config(&settings, None, false).unwrap();
        assert_eq!(publisher.name(), "dry-run");
    }

    #[test]
    fn test_publisher_from_config_github_needs_repository() {
        let result = publisher_from_config(&PublishSettings::default(), None, false);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_receipt_serialization_skips_missing_url() {
        let json = serde_json::to_value(PublishReceipt::new("v1", vec![])).unwrap();
        assert!(json.get("release_url").is_none());

        let with_url = PublishReceipt::new("v1", vec![]).with_release_url("https://example.test/r/1");
        assert_eq!(with_url.release_url.as_deref(), Some("https://example.test/r/1"));
    }
}
