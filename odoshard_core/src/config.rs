// odoshard_core/src/config.rs

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sampler::SpeedPairing;
use crate::schema::{CompiledSchema, WindowSchema};
use crate::shard::ShardGeometry;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # RunConfig
/// Everything that is fixed for one run. The defaults reproduce the
/// constants the published datasets were generated with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct RunConfig {
    #[serde(default)]
    pub schema: WindowSchema,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Checks every section and compiles the schema.
    pub fn validate(&self) -> Result<CompiledSchema, ConfigError> {
        self.scan.validate()?;
        self.sampling.skip_probabilities()?;
        if self.output.max_frames_per_shard == 0 {
            return Err(ConfigError::ShardCapacity);
        }
        Ok(self.schema.compile()?)
    }

    pub fn shard_geometry(&self, schema: &CompiledSchema) -> ShardGeometry {
        ShardGeometry {
            max_frames_per_shard: self.output.max_frames_per_shard,
            history_size: schema.history_size(),
            channels: self.scan.channels.len() * schema.join_depth(),
            height: self.scan.height,
            width: self.scan.width,
        }
    }
}

// =========================================================================
// == Sections ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Image channels read from every scan, in output channel order.
    pub channels: Vec<String>,
    /// Image rows (laser rings).
    pub height: usize,
    /// Image columns (azimuth bins).
    pub width: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            channels: vec!["range".into(), "y".into(), "intensity".into()],
            height: 64,
            width: 360,
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::Scan("at least one channel is required".into()));
        }
        if self.height == 0 || self.width == 0 {
            return Err(ConfigError::Scan(format!(
                "image shape {}x{} is empty",
                self.height, self.width
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// Optional seed for the pseudo-random number generator for determinism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub min_skip_probability: f64,
    /// Exclusive upper bound of the sweep.
    pub max_skip_probability: f64,
    /// Additive step between sweeps.
    pub skip_probability_step: f64,
    /// Frames may only be dropped below this speed, in m/s.
    pub max_speed: f64,
    /// Time between two input frames, in seconds.
    pub frame_interval: f64,
    #[serde(default)]
    pub pairing: SpeedPairing,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: None,
            min_skip_probability: 0.0,
            max_skip_probability: 0.01,
            skip_probability_step: 0.9,
            max_speed: 60.0 / 3.6,
            frame_interval: 0.1,
            pairing: SpeedPairing::LookAhead,
        }
    }
}

impl SamplingConfig {
    /// Distance per frame interval below which a frame may be dropped.
    pub fn speed_threshold(&self) -> f64 {
        self.max_speed * self.frame_interval
    }

    /// The skip probability of every sweep: `min, min + step, ...` while
    /// strictly below `max`.
    pub fn skip_probabilities(&self) -> Result<Vec<f64>, ConfigError> {
        let (min, max, step) = (
            self.min_skip_probability,
            self.max_skip_probability,
            self.skip_probability_step,
        );
        if !(step > 0.0) {
            return Err(ConfigError::Schedule(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if !(0.0..1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
            return Err(ConfigError::Schedule(format!(
                "probabilities must lie in [0, 1), got {}..{}",
                min, max
            )));
        }

        let mut values = Vec::new();
        loop {
            let p = min + values.len() as f64 * step;
            if p >= max {
                break;
            }
            values.push(p);
        }
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Upper bound of frames (odometry rows) per shard file.
    pub max_frames_per_shard: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_frames_per_shard: 200,
        }
    }
}
