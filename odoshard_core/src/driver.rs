// odoshard_core/src/driver.rs

//! Orchestrates the full pipeline: one sweep per skip probability, each
//! producing its own shard set.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::DatasetError;
use crate::odometry::delta_odometry;
use crate::pose::Pose;
use crate::sampler::retention_mask;
use crate::scan::ScanSource;
use crate::schema::CompiledSchema;
use crate::shard::{ShardWriter, WriteOutcome};
use crate::store::{Stream, TensorStore};

/// What one sweep produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSummary {
    pub sweep: usize,
    pub skip_probability: f64,
    pub retained_frames: usize,
    pub usable_frames: usize,
    pub shards: usize,
    pub cells_written: usize,
    /// Writes dropped because their row lay past the usable frames.
    pub cells_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub sweeps: Vec<SweepSummary>,
}

/// Independent random source for sweep `sweep`. Seeded runs derive one
/// reproducible stream per sweep; unseeded runs draw from OS entropy.
pub fn sweep_rng(seed: Option<u64>, sweep: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(sweep as u64)),
        None => ChaCha8Rng::from_entropy(),
    }
}

pub struct RunDriver<'a, S: TensorStore> {
    config: &'a RunConfig,
    schema: CompiledSchema,
    source: &'a dyn ScanSource,
    writer: ShardWriter<S>,
}

impl<'a, S: TensorStore> RunDriver<'a, S> {
    pub fn new(
        config: &'a RunConfig,
        source: &'a dyn ScanSource,
        store: S,
    ) -> Result<Self, DatasetError> {
        let schema = config.validate()?;
        let writer = ShardWriter::new(store, config.shard_geometry(&schema))?;
        Ok(Self {
            config,
            schema,
            source,
            writer,
        })
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn into_store(self) -> S {
        self.writer.into_store()
    }

    /// Runs every sweep of the configured schedule over `poses` and the
    /// index-aligned `scans`.
    pub fn run(&mut self, poses: &[Pose], scans: &[PathBuf]) -> Result<RunSummary, DatasetError> {
        if poses.len() != scans.len() {
            warn!(
                "Number of poses ({}) and scan frames ({}) differ, using the first {}",
                poses.len(),
                scans.len(),
                poses.len().min(scans.len())
            );
        }

        let mut summary = RunSummary::default();
        let probabilities = self.config.sampling.skip_probabilities()?;
        for skip_probability in probabilities {
            // Sweep indices keep counting across runs of the same driver.
            let sweep = self.writer.next_sweep();
            let mut rng = sweep_rng(self.config.sampling.seed, sweep);
            let result = self.run_sweep(sweep, skip_probability, poses, scans, &mut rng)?;
            info!(
                "Sweep {} (skip probability {:.3}): {} retained, {} usable, {} shards",
                result.sweep,
                result.skip_probability,
                result.retained_frames,
                result.usable_frames,
                result.shards
            );
            summary.sweeps.push(result);
        }
        Ok(summary)
    }

    fn run_sweep(
        &mut self,
        sweep: usize,
        skip_probability: f64,
        poses: &[Pose],
        scans: &[PathBuf],
        rng: &mut ChaCha8Rng,
    ) -> Result<SweepSummary, DatasetError> {
        let sampling = &self.config.sampling;
        let mask = retention_mask(
            poses,
            skip_probability,
            sampling.speed_threshold(),
            sampling.pairing,
            rng,
        );
        let files = mask.apply(scans);
        let deltas = delta_odometry(poses, &mask)?;

        let retained_frames = files.len().min(deltas.len());
        let usable_frames = self.schema.usable_frames(retained_frames);
        let shards = self.writer.new_sequence(usable_frames)?;

        let mut summary = SweepSummary {
            sweep,
            skip_probability,
            retained_frames,
            usable_frames,
            shards: shards.len(),
            cells_written: 0,
            cells_skipped: 0,
        };

        let written = self.write_frames(&files[..retained_frames], &deltas, &mut summary);
        // Release the shard set even when a frame failed.
        let closed = self.writer.close();
        written?;
        closed?;
        Ok(summary)
    }

    fn write_frames(
        &mut self,
        files: &[PathBuf],
        deltas: &[Pose],
        summary: &mut SweepSummary,
    ) -> Result<(), DatasetError> {
        let features = self.config.scan.channels.len();
        let progress_every = self.config.output.max_frames_per_shard;

        for (i, (file, delta)) in files.iter().zip(deltas).enumerate() {
            let frame = self.source.load_frame(file, &self.config.scan.channels)?;
            let odometry: Vec<f32> = delta.decompose().iter().map(|&v| v as f32).collect();
            let dispatch = self.schema.dispatch(i);

            let mut record = |outcome: WriteOutcome| match outcome {
                WriteOutcome::Written => summary.cells_written += 1,
                WriteOutcome::OutOfRange => summary.cells_skipped += 1,
            };

            for target in &dispatch.data {
                for (feature, image) in frame.iter().enumerate() {
                    let channel = target.position * features + feature;
                    record(self.writer.put(Stream::Data, target.row, channel, image)?);
                }
            }
            for &row in &dispatch.odometry_rows {
                for (channel, value) in odometry.iter().enumerate() {
                    record(self.writer.put(Stream::Odometry, row, channel, &[*value])?);
                }
            }
            debug!(
                "Frame {} -> {} data cells, {} odometry rows",
                i,
                dispatch.data.len() * features,
                dispatch.odometry_rows.len()
            );

            if i > 0 && i % progress_every == 0 {
                info!("{} / {}", i, files.len());
            }
        }
        Ok(())
    }
}
