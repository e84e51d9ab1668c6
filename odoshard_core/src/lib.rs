// odoshard_core/src/lib.rs

// This file defines the public modules of the sharding engine.
pub mod config;
pub mod driver;
pub mod error;
pub mod odometry;
pub mod pose;
pub mod prelude;
pub mod sampler;
pub mod scan;
pub mod schema;
pub mod shard;
pub mod store;
