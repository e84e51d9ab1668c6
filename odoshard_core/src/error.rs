// odoshard_core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::store::{ShardId, Stream};

#[derive(Debug, Error)]
pub enum PoseError {
    /// The reference transform of a difference could not be inverted.
    #[error("transform is singular and cannot be inverted (corrupted pose data?)")]
    SingularTransform,
    #[error("malformed pose on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("failed to read pose file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("data schema has no windows")]
    EmptyData,
    #[error("odometry schema has no batch slots")]
    EmptyOdometry,
    #[error("data window {window} has {found} slots, expected {expected}")]
    RaggedWindow {
        window: usize,
        expected: usize,
        found: usize,
    },
    #[error("{windows} data windows cannot be split into batches of {batch_size}")]
    IndivisibleHistory { windows: usize, batch_size: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create container {path:?}: {reason}")]
    Create { path: PathBuf, reason: String },
    #[error("failed to write {stream} cell ({row}, {channel}) of {id}: {source}")]
    Write {
        id: ShardId,
        stream: Stream,
        row: usize,
        channel: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to flush {id}: {source}")]
    Flush {
        id: ShardId,
        #[source]
        source: std::io::Error,
    },
    #[error("no open container for {0}")]
    UnknownShard(ShardId),
    #[error("{stream} cell ({row}, {channel}) of {id} is outside the container")]
    CellOutOfBounds {
        id: ShardId,
        stream: Stream,
        row: usize,
        channel: usize,
    },
    #[error("{stream} cell expects {expected} values, got {found}")]
    CellShape {
        stream: Stream,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("shard writer has no active sequence")]
    NotActive,
    #[error("shards must hold at least one frame")]
    ZeroCapacity,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan {scan:?} has no channel '{channel}'")]
    MissingChannel { scan: PathBuf, channel: String },
    #[error("scan {scan:?} channel '{channel}' is malformed: {reason}")]
    Malformed {
        scan: PathBuf,
        channel: String,
        reason: String,
    },
    #[error("failed to read scan {scan:?}: {source}")]
    Io {
        scan: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("invalid sweep schedule: {0}")]
    Schedule(String),
    #[error("invalid scan layout: {0}")]
    Scan(String),
    #[error("max_frames_per_shard must be at least 1")]
    ShardCapacity,
}

/// Everything that can stop a run.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Pose(#[from] PoseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shard(#[from] ShardError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl From<SchemaError> for DatasetError {
    fn from(err: SchemaError) -> Self {
        DatasetError::Config(ConfigError::Schema(err))
    }
}

impl From<StoreError> for DatasetError {
    fn from(err: StoreError) -> Self {
        DatasetError::Shard(ShardError::Store(err))
    }
}
