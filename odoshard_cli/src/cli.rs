// odoshard_cli/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// odoshard: turns a KITTI-style pose file and projected LiDAR scans into
/// fixed-shape, sharded training tensors for odometry sequence models.
///
/// Writes `<OUTPUT_PREFIX>.<sweep>.<shard>.data.npy` and
/// `<OUTPUT_PREFIX>.<sweep>.<shard>.odometry.npy` for every sweep.
#[derive(Parser, Debug, Clone)]
#[command(name = "odoshard", author, version, about, long_about = None)]
pub struct Cli {
    /// Pose file: one line per frame, 12 numbers of the 3x4 transform.
    pub pose_file: PathBuf,

    /// Prefix of every output container.
    pub output_prefix: PathBuf,

    /// Scan files (OpenCV YAML), index-aligned with the pose file.
    pub scans: Vec<PathBuf>,

    /// Also take every .yaml/.yml file under this directory, sorted by path.
    #[arg(long)]
    pub scan_dir: Option<PathBuf>,

    /// TOML file overriding the built-in run configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for the frame sampler. Overrides the configuration.
    #[arg(long)]
    pub seed: Option<u64>,
}
