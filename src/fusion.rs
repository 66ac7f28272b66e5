//! Post processing of the raw waypoint sequence: waypoints that are too close to the
//! previously kept one are merged.

use crate::pose::{pose_error_norms, Pose};
use nalgebra::Translation3;
use tracing::debug;

/// What to do with a waypoint that is within tolerance of the last kept one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionPolicy {
    /// Discard the close waypoint.
    #[default]
    Drop,
    /// Move the kept waypoint to the midpoint of the two positions, keeping its rotation.
    Average,
}

/// Fuses near duplicate waypoints. The first and the last waypoint always survive
/// unchanged, the result is never longer than the input.
pub fn fuse_waypoints(
    waypoints: &[Pose],
    position_tolerance: f64,
    orientation_tolerance: f64,
    policy: FusionPolicy,
) -> Vec<Pose> {
    if waypoints.len() <= 2 {
        return waypoints.to_vec();
    }

    let last = waypoints.len() - 1;
    let mut fused: Vec<Pose> = Vec::with_capacity(waypoints.len());
    fused.push(waypoints[0]);
    for (i, waypoint) in waypoints.iter().enumerate().skip(1).take(last - 1) {
        // The first waypoint is an anchor and is never moved.
        let movable = fused.len() > 1;
        let Some(kept) = fused.last_mut() else {
            continue;
        };
        let (position_error, orientation_error) = pose_error_norms(kept, waypoint);
        if position_error < position_tolerance && orientation_error < orientation_tolerance {
            debug!(
                "Fusing waypoint {} ({:.4} m, {:.4} rad from the previous one), {:?}",
                i, position_error, orientation_error, policy
            );
            if policy == FusionPolicy::Average && movable {
                let midpoint = (kept.translation.vector + waypoint.translation.vector) * 0.5;
                kept.translation = Translation3::from(midpoint);
            }
        } else {
            fused.push(*waypoint);
        }
    }
    fused.push(waypoints[last]);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::state_to_pose;
    use nalgebra::Vector3;

    fn at(x: f64) -> Pose {
        state_to_pose(&Vector3::new(x, 0.0, 0.0), &Vector3::zeros())
    }

    fn xs(poses: &[Pose]) -> Vec<f64> {
        poses.iter().map(|p| p.translation.x).collect()
    }

    #[test]
    fn test_short_sequences_unchanged() {
        assert!(fuse_waypoints(&[], 0.01, 0.1, FusionPolicy::Drop).is_empty());
        assert_eq!(fuse_waypoints(&[at(0.0)], 0.01, 0.1, FusionPolicy::Drop).len(), 1);
        let pair = fuse_waypoints(&[at(0.0), at(0.0)], 0.01, 0.1, FusionPolicy::Drop);
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn test_drop_policy() {
        let raw = [at(0.0), at(0.1), at(0.105), at(0.2), at(0.2)];
        let fused = fuse_waypoints(&raw, 0.01, 0.1, FusionPolicy::Drop);
        assert_eq!(xs(&fused), vec![0.0, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_average_policy() {
        let raw = [at(0.0), at(0.1), at(0.105), at(0.2)];
        let fused = fuse_waypoints(&raw, 0.01, 0.1, FusionPolicy::Average);
        assert_eq!(fused.len(), 3);
        assert!((fused[1].translation.x - 0.1025).abs() < 1e-12);
        assert_eq!(fused[2].translation.x, 0.2);
    }

    #[test]
    fn test_compares_against_last_kept() {
        // Each step is below tolerance but the drift accumulates
        let raw = [at(0.0), at(0.004), at(0.008), at(0.012), at(0.5)];
        let fused = fuse_waypoints(&raw, 0.01, 0.1, FusionPolicy::Drop);
        assert_eq!(xs(&fused), vec![0.0, 0.012, 0.5]);
    }

    #[test]
    fn test_first_waypoint_is_anchor() {
        let raw = [at(0.0), at(0.005), at(0.3)];
        let fused = fuse_waypoints(&raw, 0.01, 0.1, FusionPolicy::Average);
        assert_eq!(xs(&fused), vec![0.0, 0.3]);
    }

    #[test]
    fn test_orientation_difference_keeps_waypoint() {
        let turned = state_to_pose(&Vector3::new(0.1, 0.0, 0.0), &Vector3::new(0.0, 0.0, 0.5));
        let raw = [at(0.0), at(0.1), turned, at(0.3)];
        let fused = fuse_waypoints(&raw, 0.01, 0.1, FusionPolicy::Drop);
        assert_eq!(fused.len(), 4);
    }
}
