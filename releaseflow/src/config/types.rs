//! Configuration types.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock Rust release pipeline.

use crate::release::{default_input_patterns, InputPattern, DEFAULT_ARTIFACT_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process-level settings.
    pub pipeline: PipelineSettings,
    /// Release tag recognition.
    pub trigger: TriggerSettings,
    /// Artifact naming and packaging inputs.
    pub artifact: ArtifactSettings,
    /// Per-stage settings.
    pub stages: StagesSettings,
    /// Release publishing.
    pub publish: PublishSettings,
}

/// Settings shared by all stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Directory commands run in and relative paths resolve against.
    pub workdir: PathBuf,
    /// Shell prefix used to run each command string.
    pub shell: Vec<String>,
    /// Timeout applied to stages without their own, in seconds.
    pub default_timeout_secs: Option<u64>,
    /// Exit with a per-stage code instead of 1 on failure.
    pub stage_exit_codes: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            shell: vec!["sh".into(), "-c".into()],
            default_timeout_secs: None,
            stage_exit_codes: false,
        }
    }
}

/// Release tag recognition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    /// Regex the tag name must match to count as a release. Any tag when unset.
    pub release_tag_pattern: Option<String>,
}

/// Artifact naming and packaging inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Archive and binary name prefix.
    pub name: String,
    /// Build output directory the inputs are resolved against.
    pub output_dir: PathBuf,
    /// Directory the archive is written to and assets are collected from.
    pub release_dir: PathBuf,
    /// Input patterns. Empty means the binary plus `lib<name>*`.
    pub inputs: Vec<InputPattern>,
    /// Glob selecting the assets handed to the publisher.
    pub asset_glob: String,
    /// File exports are appended to. Falls back to `GITHUB_ENV` in the CLI.
    pub env_file: Option<PathBuf>,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_ARTIFACT_NAME.to_string(),
            output_dir: PathBuf::from("target/release"),
            release_dir: PathBuf::from("."),
            inputs: Vec::new(),
            asset_glob: "*.tar.gz".to_string(),
            env_file: None,
        }
    }
}

impl ArtifactSettings {
    /// Returns the configured inputs, or the defaults for this artifact name.
    #[must_use]
    pub fn effective_inputs(&self) -> Vec<InputPattern> {
        if self.inputs.is_empty() {
            default_input_patterns(&self.name)
        } else {
            self.inputs.clone()
        }
    }
}

/// Settings for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Commands to run, in order. Only used by command stages.
    pub commands: Vec<String>,
    /// Record failures without aborting the run.
    pub best_effort: bool,
    /// Stage timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl StageSettings {
    fn commands(commands: &[&str]) -> Self {
        Self {
            commands: commands.iter().map(|c| (*c).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Resolves the effective timeout against the pipeline default.
    #[must_use]
    pub fn timeout(&self, default_secs: Option<u64>) -> Option<Duration> {
        self.timeout_secs.or(default_secs).map(Duration::from_secs)
    }
}

/// Settings for each stage of the release pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesSettings {
    /// `ToolchainSetup`.
    pub toolchain_setup: StageSettings,
    /// `ToolchainInfo`.
    pub toolchain_info: StageSettings,
    /// `Lint`.
    pub lint: StageSettings,
    /// `Test`.
    pub test: StageSettings,
    /// `Build`.
    pub build: StageSettings,
    /// `ComputeReleaseMetadata`.
    pub compute_release_metadata: StageSettings,
    /// `ListBuildOutput`.
    pub list_build_output: StageSettings,
    /// `PackageArtifact`.
    pub package_artifact: StageSettings,
    /// `PublishRelease`.
    pub publish_release: StageSettings,
}

impl Default for StagesSettings {
    fn default() -> Self {
        Self {
            toolchain_setup: StageSettings::commands(&[
                "rustup update stable",
                "rustup component add rustfmt clippy",
            ]),
            toolchain_info: StageSettings::commands(&[
                "rustc --version",
                "cargo --version",
                "rustup show",
            ]),
            lint: StageSettings::commands(&[
                "cargo fmt --all -- --check",
                "cargo clippy --all-targets --all-features -- -D warnings",
            ]),
            test: StageSettings::commands(&["cargo check", "cargo test --workspace"]),
            build: StageSettings::commands(&["cargo build --release"]),
            compute_release_metadata: StageSettings::default(),
            list_build_output: StageSettings::default(),
            package_artifact: StageSettings::default(),
            publish_release: StageSettings::default(),
        }
    }
}

impl StagesSettings {
    /// Returns `(stage name, settings)` pairs in pipeline order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &StageSettings); 9] {
        use crate::pipeline::stage_names as n;
        [
            (n::TOOLCHAIN_SETUP, &self.toolchain_setup),
            (n::TOOLCHAIN_INFO, &self.toolchain_info),
            (n::LINT, &self.lint),
            (n::TEST, &self.test),
            (n::BUILD, &self.build),
            (n::COMPUTE_RELEASE_METADATA, &self.compute_release_metadata),
            (n::LIST_BUILD_OUTPUT, &self.list_build_output),
            (n::PACKAGE_ARTIFACT, &self.package_artifact),
            (n::PUBLISH_RELEASE, &self.publish_release),
        ]
    }
}

/// Which publisher implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    /// GitHub Releases REST API.
    #[default]
    Github,
    /// Log only.
    DryRun,
}

/// Release publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Publisher implementation.
    pub provider: PublisherKind,
    /// `owner/name`. Falls back to `GITHUB_REPOSITORY` in the CLI.
    pub repository: Option<String>,
    /// REST API base URL.
    pub api_url: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Create releases as drafts.
    pub draft: bool,
    /// Mark releases as pre-releases.
    pub prerelease: bool,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            provider: PublisherKind::Github,
            repository: None,
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            draft: false,
            prerelease: false,
            request_timeout_secs: 60,
        }
    }
}
