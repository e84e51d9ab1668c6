// odoshard_cli/src/error.rs

use odoshard_core::prelude::{ConfigError, DatasetError, PoseError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration file {0:?} does not exist")]
    MissingConfig(PathBuf),
    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Pose(#[from] PoseError),
    #[error("failed to list scans under {path:?}: {source}")]
    ScanDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
