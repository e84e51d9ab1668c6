// odoshard_core/src/sampler.rs

//! Stochastic sub-sampling of a frame sequence.
//!
//! Dropping frames while the vehicle moves slowly simulates a sensor that
//! captured at a lower or irregular rate, which diversifies the effective
//! spacing between consecutive training frames.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pose::Pose;

/// Which pose is compared against the last retained frame when deciding
/// whether frame `i` may be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPairing {
    /// Compare frame `i + 1` with the last retained frame. This is the pairing
    /// the published datasets were generated with.
    #[default]
    LookAhead,
    /// Compare frame `i` itself with the last retained frame.
    Current,
}

/// One keep/drop flag per input frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetentionMask(Vec<bool>);

impl RetentionMask {
    pub fn all_retained(len: usize) -> Self {
        Self(vec![true; len])
    }

    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self(flags)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_retained(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn flags(&self) -> &[bool] {
        &self.0
    }

    pub fn retained_count(&self) -> usize {
        self.0.iter().filter(|&&keep| keep).count()
    }

    /// Keeps the items whose flag is set. On a length mismatch the shorter
    /// length wins and the mismatch is logged.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        if items.len() != self.len() {
            warn!(
                "Number of poses ({}) and scan frames ({}) differ",
                self.len(),
                items.len()
            );
        }
        items
            .iter()
            .zip(self.0.iter())
            .filter(|(_, &keep)| keep)
            .map(|(item, _)| item.clone())
            .collect()
    }
}

/// Produces the retention mask for one sweep.
///
/// Endpoints are always retained. An inner frame is dropped only when the
/// distance covered since the last retained frame stays below
/// `speed_threshold` and a uniform draw falls below `skip_probability`.
/// Exactly one draw is taken per inner frame.
pub fn retention_mask<R: Rng + ?Sized>(
    poses: &[Pose],
    skip_probability: f64,
    speed_threshold: f64,
    pairing: SpeedPairing,
    rng: &mut R,
) -> RetentionMask {
    let n = poses.len();
    if n == 0 {
        return RetentionMask::default();
    }

    let mut flags = Vec::with_capacity(n);
    flags.push(true);
    let mut last_retained = 0;

    for i in 1..n.saturating_sub(1) {
        let candidate = match pairing {
            SpeedPairing::LookAhead => i + 1,
            SpeedPairing::Current => i,
        };
        let distance = poses[candidate].translation_distance(&poses[last_retained]);
        let draw: f64 = rng.gen();

        if distance < speed_threshold && draw < skip_probability {
            flags.push(false);
        } else {
            flags.push(true);
            last_retained = i;
        }
    }

    if n > 1 {
        flags.push(true);
    }
    RetentionMask(flags)
}
