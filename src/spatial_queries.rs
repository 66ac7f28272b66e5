//! Read-only queries over the obstacle points for a given end effector pose.
//!
//! All functions are free of side effects and can be called from many threads at
//! once as long as the obstacle index is not rebuilt meanwhile.

use crate::obstacles::ObstacleIndex;
use crate::pose::Pose;
use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion};
use parry3d::bounding_volume::Aabb;
use parry3d::math::Point as ParryPoint;

/// Nearest obstacle distance from the position of the pose, None if there are no obstacles.
pub fn nearest_obstacle_distance(obstacles: Option<&dyn ObstacleIndex>, pose: &Pose) -> Option<f64> {
    let obstacles = obstacles?;
    if obstacles.is_empty() {
        return None;
    }
    obstacles.nearest_distance(&Point3::from(pose.translation.vector))
}

/// Remaps the end effector frame into the culling camera frame (X forward, Y up, Z right).
/// Culling X is the end effector Z, so the camera looks where the look-at cost aims.
fn camera_remap() -> Isometry3<f64> {
    let m = Matrix3::new(
        0.0, 0.0, 1.0,
        0.0, -1.0, 0.0,
        1.0, 0.0, 0.0,
    );
    Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m)),
    )
}

/// View frustum of the onboard camera.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Horizontal field of view, degrees.
    pub horizontal_fov: f64,
    /// Vertical field of view, degrees.
    pub vertical_fov: f64,
    pub near: f64,
    pub far: f64,
}

impl Frustum {
    /// True if the world point is inside the frustum of the camera at `pose`.
    pub fn contains(&self, pose: &Pose, point: &Point3<f64>) -> bool {
        let camera = pose * camera_remap();
        self.contains_local(&camera.inverse_transform_point(point))
    }

    fn contains_local(&self, q: &Point3<f64>) -> bool {
        let tan_h = (self.horizontal_fov.to_radians() * 0.5).tan();
        let tan_v = (self.vertical_fov.to_radians() * 0.5).tan();
        q.x >= self.near
            && q.x <= self.far
            && q.z.abs() <= q.x * tan_h
            && q.y.abs() <= q.x * tan_v
    }

    /// Number of obstacle points inside the frustum of the camera at `pose`.
    /// None if there are no obstacle points at all.
    pub fn count_visible(&self, obstacles: Option<&dyn ObstacleIndex>, pose: &Pose) -> Option<usize> {
        let obstacles = obstacles?;
        if obstacles.is_empty() {
            return None;
        }
        let camera = pose * camera_remap();
        Some(
            obstacles
                .points()
                .iter()
                .filter(|p| self.contains_local(&camera.inverse_transform_point(p)))
                .count(),
        )
    }
}

/// Number of obstacle points inside the box given in the end effector frame of `pose`.
pub fn count_points_in_box(obstacles: Option<&dyn ObstacleIndex>, pose: &Pose, bounds: &Aabb) -> usize {
    let Some(obstacles) = obstacles else {
        return 0;
    };
    let inverse = pose.inverse();
    obstacles
        .points()
        .iter()
        .filter(|p| {
            let local = inverse.transform_point(p);
            bounds.contains_local_point(&ParryPoint::new(local.x as f32, local.y as f32, local.z as f32))
        })
        .count()
}
