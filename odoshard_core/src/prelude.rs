// odoshard_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::scan::ScanSource;
pub use crate::store::{ShardId, ShardShape, Stream, TensorStore};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::config::{OutputConfig, RunConfig, SamplingConfig, ScanConfig};
pub use crate::pose::{load_poses, parse_poses, Pose};
pub use crate::sampler::{RetentionMask, SpeedPairing};
pub use crate::schema::{CompiledSchema, WindowSchema};

// --- Pipeline Stages ---
pub use crate::driver::{RunDriver, RunSummary, SweepSummary};
pub use crate::odometry::delta_odometry;
pub use crate::sampler::retention_mask;
pub use crate::shard::{ShardGeometry, ShardWriter, WriteOutcome};

// --- Errors ---
pub use crate::error::{
    ConfigError, DatasetError, PoseError, ScanError, SchemaError, ShardError, StoreError,
};
