// odoshard_cli/src/config.rs

//! Layered loading of the run configuration: built-in defaults, then an
//! optional TOML file, then `ODOSHARD_*` environment variables, then flags.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use odoshard_core::prelude::RunConfig;
use std::path::Path;
use tracing::info;

use crate::error::CliError;

/// Environment variables with this prefix override configuration keys.
/// Nested keys are separated by `__`, e.g. `ODOSHARD_OUTPUT__MAX_FRAMES_PER_SHARD`.
pub const ENV_PREFIX: &str = "ODOSHARD_";

/// Top-level sections of [`RunConfig`]. Other `ODOSHARD_*` variables are ignored.
pub const SECTIONS: [&str; 4] = ["schema", "scan", "sampling", "output"];

fn is_config_key(key: &str) -> bool {
    let section = key.split("__").next().unwrap_or(key);
    SECTIONS.iter().any(|s| section.eq_ignore_ascii_case(s))
}

pub fn figment(path: Option<&Path>, seed: Option<u64>) -> Result<Figment, CliError> {
    let mut figment = Figment::from(Serialized::defaults(RunConfig::default()));

    if let Some(path) = path {
        // Toml::file silently yields nothing for a missing file.
        if !path.is_file() {
            return Err(CliError::MissingConfig(path.to_path_buf()));
        }
        info!("Loading configuration from: {:?}", path);
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(
        Env::prefixed(ENV_PREFIX)
            .filter(|key| is_config_key(key.as_str()))
            .split("__"),
    );

    if let Some(seed) = seed {
        figment = figment.merge(Serialized::default("sampling.seed", seed));
    }
    Ok(figment)
}

pub fn load_config(path: Option<&Path>, seed: Option<u64>) -> Result<RunConfig, CliError> {
    figment(path, seed)?.extract().map_err(Box::new).map_err(CliError::from)
}
