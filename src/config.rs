//! Resolver configuration.
//!
//! Layered loading via the `config` crate: defaults, then an optional
//! `hoist.toml` in the working directory, then `HOIST_`-prefixed environment
//! variables. Nothing here is required; every field has a default.

use crate::logging::LoggingConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a resolution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Install into a global root: placement never climbs past it.
    pub global: bool,

    /// Skip development dependencies when loading the root.
    pub production: bool,

    pub logging: LoggingConfig,
}

impl ResolverConfig {
    /// Load configuration for the given working directory.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let file = dir.join("hoist.toml");
        Config::builder()
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix("HOIST").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a specific file, plus the environment.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("HOIST").separator("__"))
            .build()?
            .try_deserialize()
    }
}
