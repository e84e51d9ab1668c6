// odoshard_cli/src/prelude.rs

// Re-export the entire odoshard_core prelude so binaries can reach the
// engine types through one import.
pub use odoshard_core::prelude::*;

// Re-export the adapters that bind the engine to the file system.
pub use crate::cli::Cli;
pub use crate::config::load_config;
pub use crate::error::CliError;
pub use crate::npy_store::{shard_path, NpyShardStore};
pub use crate::opencv::OpenCvYamlScans;
pub use crate::scans::collect_scan_dir;
