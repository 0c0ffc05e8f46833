//! Configuration loading.
//!
//! Sources are layered: built-in defaults, then the TOML file, then
//! `RELEASEFLOW_` environment variables (`__` separates nested keys, e.g.
//! `RELEASEFLOW_ARTIFACT__NAME=mytool`).

use super::types::Config;
use crate::errors::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RELEASEFLOW_";

fn base_figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

/// Loads configuration from an optional file with environment overrides.
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if `path` is given but missing, and
/// `ConfigError::Parse` if any source fails to deserialize.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = base_figment();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Loads configuration from a TOML string on top of the defaults.
///
/// # Errors
///
/// Returns `ConfigError::Parse` if the string does not deserialize.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    base_figment()
        .merge(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}
