// odoshard_core/src/odometry.rs

use tracing::warn;

use crate::error::PoseError;
use crate::pose::Pose;
use crate::sampler::RetentionMask;

/// Converts absolute poses into the motion between consecutive retained frames.
///
/// The first retained frame gets the identity. Every later retained frame gets
/// its pose expressed in the previous retained frame. The result is
/// index-aligned with the masked scan list.
pub fn delta_odometry(poses: &[Pose], mask: &RetentionMask) -> Result<Vec<Pose>, PoseError> {
    if poses.len() != mask.len() {
        warn!(
            "Number of poses ({}) and mask entries ({}) differ",
            poses.len(),
            mask.len()
        );
    }
    let len = poses.len().min(mask.len());
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut deltas = Vec::with_capacity(mask.retained_count());
    deltas.push(Pose::identity());
    let mut previous = 0;

    for i in 1..len {
        if mask.is_retained(i) {
            deltas.push(poses[i].difference(&poses[previous])?);
            previous = i;
        }
    }
    Ok(deltas)
}
