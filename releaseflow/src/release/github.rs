//! GitHub Releases publisher.

use super::publisher::{asset_name, PublishReceipt, ReleasePublisher};
use crate::config::PublishSettings;
use crate::errors::{ConfigError, PublishError};
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";

/// Release resource fields this client reads.
#[derive(Debug, Deserialize)]
struct Release {
    html_url: String,
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
}

/// Publishes to the GitHub Releases REST API.
///
/// Reuses the release for the tag if one exists, creates it otherwise, then
/// uploads every asset. An asset name that already exists on the release is
/// rejected by the API and surfaces as a [`PublishError`].
pub struct GithubReleasePublisher {
    client: Client,
    api_url: Url,
    repository: String,
    token: String,
    draft: bool,
    prerelease: bool,
}

impl std::fmt::Debug for GithubReleasePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubReleasePublisher")
            .field("api_url", &self.api_url.as_str())
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl GithubReleasePublisher {
    /// Creates a publisher with an explicit token.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the token is empty, the API URL
    /// cannot take path segments, or the HTTP client cannot be built.
    pub fn new(
        settings: &PublishSettings,
        repository: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "GitHub token is empty (set {})",
                settings.token_env
            )));
        }

        let api_url = Url::parse(&settings.api_url)
            .map_err(|e| ConfigError::Validation(format!("invalid API URL {}: {e}", settings.api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(ConfigError::Validation(format!(
                "API URL {} cannot take a path",
                settings.api_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("releaseflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Validation(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            repository: repository.into(),
            token,
            draft: settings.draft,
            prerelease: settings.prerelease,
        })
    }

    /// Creates a publisher reading the token from `settings.token_env`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the variable is unset or empty.
    pub fn from_env(settings: &PublishSettings, repository: impl Into<String>) -> Result<Self, ConfigError> {
        let token = std::env::var(&settings.token_env).map_err(|_| {
            ConfigError::Validation(format!("{} is not set", settings.token_env))
        })?;
        Self::new(settings, repository, token)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Builds `{api_url}/repos/{owner}/{repo}/releases/{tail..}`.
    ///
    /// Every tail segment is percent-encoded, so a tag containing `#`, `%`,
    /// `?` or `/` stays one path segment.
    fn releases_url(&self, tag: &str, tail: &[&str]) -> Result<Url, PublishError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| PublishError::new(tag, format!("API URL {} cannot take a path", self.api_url)))?
            .pop_if_empty()
            .push("repos")
            .extend(self.repository.split('/'))
            .push("releases")
            .extend(tail);
        Ok(url)
    }

    async fn find_or_create_release(&self, tag: &str) -> Result<Release, PublishError> {
        let url = self.releases_url(tag, &["tags", tag])?;
        debug!(url = %url, "looking up release");

        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| transport_error(tag, &e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return self.create_release(tag).await;
        }

        let response = ensure_success(tag, "look up release", response).await?;
        response
            .json()
            .await
            .map_err(|e| PublishError::new(tag, format!("invalid release response: {e}")))
    }

    async fn create_release(&self, tag: &str) -> Result<Release, PublishError> {
        let url = self.releases_url(tag, &[])?;
        info!(tag = tag, repository = %self.repository, "creating release");

        let body = CreateRelease {
            tag_name: tag,
            name: tag,
            draft: self.draft,
            prerelease: self.prerelease,
        };
        let response = self
            .request(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(tag, &e))?;

        let response = ensure_success(tag, "create release", response).await?;
        response
            .json()
            .await
            .map_err(|e| PublishError::new(tag, format!("invalid release response: {e}")))
    }

    async fn upload_asset(&self, tag: &str, upload_url: &str, asset: &Path) -> Result<String, PublishError> {
        let name = asset_name(tag, asset)?;
        let bytes = tokio::fs::read(asset)
            .await
            .map_err(|e| PublishError::new(tag, format!("cannot read {}: {e}", asset.display())))?;

        info!(tag = tag, asset = %name, bytes = bytes.len(), "uploading release asset");

        let response = self
            .request(self.client.post(upload_url))
            .query(&[("name", name.as_str())])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error(tag, &e))?;

        ensure_success(tag, &format!("upload {name}"), response).await?;
        Ok(name)
    }
}

/// Strips the RFC 6570 `{?name,label}` suffix from an upload URL.
fn upload_endpoint(upload_url: &str) -> &str {
    upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base)
}

fn transport_error(tag: &str, err: &reqwest::Error) -> PublishError {
    let publish_err = PublishError::new(tag, err.to_string());
    match err.status() {
        Some(status) => publish_err.with_status(status.as_u16()),
        None => publish_err,
    }
}

async fn ensure_success(tag: &str, action: &str, response: Response) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::new(tag, format!("{action}: HTTP {status}: {}", body.trim()))
        .with_status(status.as_u16()))
}

#[async_trait]
impl ReleasePublisher for GithubReleasePublisher {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn publish(&self, tag: &str, assets: &[PathBuf]) -> Result<PublishReceipt, PublishError> {
        let release = self.find_or_create_release(tag).await?;
        let endpoint = upload_endpoint(&release.upload_url);

        let mut uploaded = Vec::with_capacity(assets.len());
        for asset in assets {
            uploaded.push(self.upload_asset(tag, endpoint, asset).await?);
        }

        Ok(PublishReceipt::new(tag, uploaded).with_release_url(release.html_url))
    }
}
