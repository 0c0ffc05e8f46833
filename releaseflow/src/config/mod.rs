//! Configuration for releaseflow.
//!
//! Loaded with figment from defaults, an optional TOML file and
//! `RELEASEFLOW_` environment variables, then validated.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str, ENV_PREFIX};
pub use types::*;
pub use validate::{is_repository_slug, validate_config};
