//! Helper functions

use crate::pose::{state_to_pose, Pose};
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

/// Builds a pose from position (meters) and roll, pitch, yaw given in degrees.
pub fn pose_degrees(xyz: [f64; 3], rpy_degrees: [f64; 3]) -> Pose {
    state_to_pose(
        &Vector3::new(xyz[0], xyz[1], xyz[2]),
        &Vector3::new(
            rpy_degrees[0].to_radians(),
            rpy_degrees[1].to_radians(),
            rpy_degrees[2].to_radians(),
        ),
    )
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;
    let (roll, pitch, yaw) = rotation.euler_angles();
    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  rpy: {:.2},{:.2},{:.2}",
        translation.x,
        translation.y,
        translation.z,
        roll.to_degrees(),
        pitch.to_degrees(),
        yaw.to_degrees()
    );
}

/// Print all waypoints, one per line.
#[allow(dead_code)]
pub fn dump_waypoints(waypoints: &[Pose]) {
    if waypoints.is_empty() {
        println!("No waypoints");
    }
    for (i, waypoint) in waypoints.iter().enumerate() {
        print!("{:3}: ", i);
        dump_pose(waypoint);
    }
}

/// Length of the polyline through the waypoint positions.
pub fn path_length(waypoints: &[Pose]) -> f64 {
    waypoints
        .windows(2)
        .map(|w| (w[1].translation.vector - w[0].translation.vector).norm())
        .sum()
}

pub fn assert_pose_eq(ta: &Isometry3<f64>, tb: &Isometry3<f64>,
                 distance_tolerance: f64, angular_tolerance: f64) -> bool {
    fn bad(ta: &Isometry3<f64>, tb: &Isometry3<f64>) {
        dump_pose(ta);
        dump_pose(tb);
    }

    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance.abs() > distance_tolerance {
        bad(ta, tb);
        panic!("Poses have too different translations");
    }

    if angular_distance.abs() > angular_tolerance {
        bad(ta, tb);
        panic!("Poses have too different angles");
    }
    true
}
