//! Configuration validation.

use super::types::{Config, PublisherKind};
use crate::errors::ConfigError;
use crate::trigger::ReleaseTagMatcher;
use glob::Pattern;

/// Validates a loaded configuration.
///
/// Checks:
/// - the release tag pattern compiles
/// - the artifact name is non-empty and contains no path separators
/// - every input pattern and the asset glob parse
/// - every command stage has at least one command
/// - the shell prefix is non-empty
/// - no timeout is zero
/// - a GitHub publisher has a repository of the form `owner/name`
///
/// # Errors
///
/// Returns the first `ConfigError::Validation` found.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ReleaseTagMatcher::from_option(config.trigger.release_tag_pattern.as_deref())?;

    let name = config.artifact.name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "artifact.name '{}' must be a non-empty file name",
            config.artifact.name
        )));
    }

    for input in &config.artifact.inputs {
        check_glob("artifact.inputs", &input.pattern)?;
    }
    check_glob("artifact.asset_glob", &config.artifact.asset_glob)?;

    if config.pipeline.shell.is_empty() {
        return Err(ConfigError::Validation(
            "pipeline.shell cannot be empty".to_string(),
        ));
    }

    if config.pipeline.default_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "pipeline.default_timeout_secs cannot be 0".to_string(),
        ));
    }

    let stages = &config.stages;
    for (stage, settings) in [
        ("toolchain_setup", &stages.toolchain_setup),
        ("toolchain_info", &stages.toolchain_info),
        ("lint", &stages.lint),
        ("test", &stages.test),
        ("build", &stages.build),
    ] {
        if settings.commands.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "stages.{stage}.commands must contain at least one command"
            )));
        }
    }

    for (stage, settings) in stages.named() {
        if settings.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(format!(
                "timeout of stage '{stage}' cannot be 0"
            )));
        }
    }

    if config.publish.provider == PublisherKind::Github {
        if let Some(repository) = &config.publish.repository {
            if !is_repository_slug(repository) {
                return Err(ConfigError::Validation(format!(
                    "publish.repository '{repository}' must be of the form owner/name"
                )));
            }
        }
    }

    Ok(())
}

fn check_glob(field: &str, pattern: &str) -> Result<(), ConfigError> {
    Pattern::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::Validation(format!("{field}: invalid glob '{pattern}': {e}")))
}

/// Returns true for `owner/name` with both parts non-empty.
#[must_use]
pub fn is_repository_slug(value: &str) -> bool {
    match value.split_once('/') {
        Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        None => false,
    }
}
