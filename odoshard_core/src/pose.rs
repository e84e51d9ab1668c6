// odoshard_core/src/pose.rs

use nalgebra::{Matrix3, Matrix4, Vector3, Vector6};
use std::fs;
use std::path::Path;

use crate::error::PoseError;

/// Below this value of `cos(ry)` the rotation is treated as gimbal-locked.
const GIMBAL_EPSILON: f64 = 4.0 * f64::EPSILON;

// =========================================================================
// == Pose ==
// =========================================================================

/// A rigid 3D transform stored as a 4x4 homogeneous matrix.
///
/// The bottom row is always `[0, 0, 0, 1]`. The 6-DoF decomposition is derived
/// from the matrix on demand, so it can never drift out of sync with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    matrix: Matrix4<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Builds a pose from the 12 row-major entries of the top 3x4 block
    /// (the layout of one line of a KITTI pose file).
    pub fn from_kitti_row(entries: [f64; 12]) -> Self {
        let mut matrix = Matrix4::identity();
        for (i, value) in entries.iter().enumerate() {
            matrix[(i / 4, i % 4)] = *value;
        }
        Self { matrix }
    }

    /// Builds a pose from a translation and the x/y/z rotation angles (radians)
    /// using `R = Rx(rx) * Ry(ry) * Rz(rz)`, the inverse of [`Pose::decompose`].
    pub fn from_euler(translation: Vector3<f64>, rx: f64, ry: f64, rz: f64) -> Self {
        let (sx, cx) = rx.sin_cos();
        let (sy, cy) = ry.sin_cos();
        let (sz, cz) = rz.sin_cos();
        let mx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx);
        let my = Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy);
        let mz = Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0);

        let mut matrix = Matrix4::identity();
        matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(mx * my * mz));
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The transform equivalent to applying `other` first, then `self`.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            matrix: self.matrix * other.matrix,
        }
    }

    /// `self` expressed in the frame of `reference`: `inverse(reference) * self`.
    pub fn difference(&self, reference: &Pose) -> Result<Pose, PoseError> {
        let inverse = reference
            .matrix
            .try_inverse()
            .ok_or(PoseError::SingularTransform)?;
        Ok(Pose {
            matrix: inverse * self.matrix,
        })
    }

    /// The 6-DoF vector `[tx, ty, tz, rx, ry, rz]`, angles in radians.
    ///
    /// Angles are recovered for `R = Rx(rx) * Ry(ry) * Rz(rz)`. When `cos(ry)`
    /// vanishes the x rotation is folded into `rz` and `rx` is reported as 0.
    pub fn decompose(&self) -> Vector6<f64> {
        let m = &self.matrix;
        let (r11, r12, r13) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let (r21, r22, r23) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
        let r33 = m[(2, 2)];

        let cy = (r33 * r33 + r23 * r23).sqrt();
        let (rx, ry, rz) = if cy > GIMBAL_EPSILON {
            ((-r23).atan2(r33), r13.atan2(cy), (-r12).atan2(r11))
        } else {
            (0.0, r13.atan2(cy), r21.atan2(r22))
        };

        Vector6::new(m[(0, 3)], m[(1, 3)], m[(2, 3)], rx, ry, rz)
    }

    /// Rotation about the x axis.
    pub fn roll(&self) -> f64 {
        self.decompose()[3]
    }

    /// Rotation about the y axis.
    pub fn pitch(&self) -> f64 {
        self.decompose()[4]
    }

    /// Rotation about the z axis.
    pub fn yaw(&self) -> f64 {
        self.decompose()[5]
    }

    /// Euclidean distance between the translation parts, orientation ignored.
    pub fn translation_distance(&self, other: &Pose) -> f64 {
        (self.translation() - other.translation()).norm()
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

// =========================================================================
// == Pose File ==
// =========================================================================

/// Parses one pose per line, 12 whitespace-separated numbers each.
/// Blank lines are skipped.
pub fn parse_poses(text: &str) -> Result<Vec<Pose>, PoseError> {
    let mut poses = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parse_error = |reason: String| PoseError::Parse {
            line: idx + 1,
            reason,
        };

        let values = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|e| parse_error(format!("'{}': {}", token, e)))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let entries: [f64; 12] = values
            .as_slice()
            .try_into()
            .map_err(|_| parse_error(format!("expected 12 values, found {}", values.len())))?;

        poses.push(Pose::from_kitti_row(entries));
    }
    Ok(poses)
}

pub fn load_poses(path: &Path) -> Result<Vec<Pose>, PoseError> {
    let text = fs::read_to_string(path).map_err(|source| PoseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_poses(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    fn assert_pose_eq(a: &Pose, b: &Pose) {
        for (x, y) in a.matrix().iter().zip(b.matrix().iter()) {
            assert_abs_diff_eq!(x, y, epsilon = EPS);
        }
    }

    fn sample_poses() -> (Pose, Pose, Pose) {
        (
            Pose::from_euler(Vector3::new(1.0, -2.0, 0.5), 0.1, -0.3, 1.2),
            Pose::from_euler(Vector3::new(-0.4, 3.0, 2.0), -0.7, 0.2, -2.5),
            Pose::from_euler(Vector3::new(10.0, 0.0, -1.0), 0.05, 0.9, 0.3),
        )
    }

    #[test]
    fn kitti_row_places_rotation_and_translation() {
        let pose = Pose::from_kitti_row([1.0, 0.0, 0.0, 4.0, 0.0, 1.0, 0.0, 5.0, 0.0, 0.0, 1.0, 6.0]);
        assert_eq!(pose.translation(), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(pose.rotation(), Matrix3::identity());
        assert_eq!(pose.matrix()[(3, 3)], 1.0);
    }

    #[test]
    fn decompose_inverts_from_euler() {
        let pose = Pose::from_euler(Vector3::new(1.0, 2.0, 3.0), 0.3, -0.4, 2.0);
        let dof = pose.decompose();
        assert_abs_diff_eq!(dof[0], 1.0, epsilon = EPS);
        assert_abs_diff_eq!(dof[1], 2.0, epsilon = EPS);
        assert_abs_diff_eq!(dof[2], 3.0, epsilon = EPS);
        assert_abs_diff_eq!(pose.roll(), 0.3, epsilon = EPS);
        assert_abs_diff_eq!(pose.pitch(), -0.4, epsilon = EPS);
        assert_abs_diff_eq!(pose.yaw(), 2.0, epsilon = EPS);
    }

    #[test]
    fn decompose_gimbal_lock_reports_zero_roll() {
        let pose = Pose::from_euler(Vector3::zeros(), 0.0, std::f64::consts::FRAC_PI_2, 0.4);
        let dof = pose.decompose();
        assert_abs_diff_eq!(dof[3], 0.0, epsilon = EPS);
        assert_abs_diff_eq!(dof[4], std::f64::consts::FRAC_PI_2, epsilon = 1e-6);
        // Rebuilding from the reported angles must give back the same rotation.
        let rebuilt = Pose::from_euler(Vector3::zeros(), dof[3], dof[4], dof[5]);
        assert_pose_eq(&pose, &rebuilt);
    }

    #[test]
    fn compose_then_difference_recovers_relative_motion() {
        let (a, b, c) = sample_poses();
        let lhs = a.compose(&b).difference(&a.compose(&c)).unwrap();
        let rhs = b.difference(&c).unwrap();
        assert_pose_eq(&lhs, &rhs);
    }

    #[test]
    fn difference_with_itself_is_identity() {
        let (a, _, _) = sample_poses();
        assert_pose_eq(&a.difference(&a).unwrap(), &Pose::identity());
    }

    #[test]
    fn difference_against_singular_reference_fails() {
        let singular = Pose::from_kitti_row([0.0; 12]);
        let result = Pose::identity().difference(&singular);
        assert!(matches!(result, Err(PoseError::SingularTransform)));
    }

    #[test]
    fn mul_operator_matches_compose() {
        let (a, b, _) = sample_poses();
        assert_pose_eq(&(a * b), &a.compose(&b));
    }

    #[test]
    fn translation_distance_ignores_orientation() {
        let a = Pose::from_euler(Vector3::new(0.0, 0.0, 0.0), 0.0, 0.0, 0.0);
        let b = Pose::from_euler(Vector3::new(3.0, 4.0, 0.0), 1.0, -1.0, 2.0);
        assert_abs_diff_eq!(a.translation_distance(&b), 5.0, epsilon = EPS);
    }

    #[test]
    fn parse_poses_skips_blank_lines() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\n\n1 0 0 1.5 0 1 0 0 0 0 1 0\n";
        let poses = parse_poses(text).unwrap();
        assert_eq!(poses.len(), 2);
        assert_abs_diff_eq!(poses[1].translation().x, 1.5, epsilon = EPS);
    }

    #[test]
    fn parse_poses_reports_short_line() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\n1 0 0\n";
        match parse_poses(text) {
            Err(PoseError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn parse_poses_reports_bad_number() {
        let text = "1 0 0 0 0 1 0 x 0 0 1 0\n";
        assert!(matches!(parse_poses(text), Err(PoseError::Parse { line: 1, .. })));
    }
}
