//! Pose and pose error kinematics.
//!
//! The planner state is a 6-vector: position (x, y, z) followed by intrinsic Z-Y-X Euler
//! angles stored as (roll, pitch, yaw). Poses are `nalgebra::Isometry3<f64>`, so the
//! rotational part is always a proper rotation.

use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6};
use std::f64::consts::FRAC_PI_2;

/// Pose of the end effector (camera / tool center point) in world coordinates.
pub type Pose = Isometry3<f64>;

/// Planner state, position followed by roll, pitch and yaw.
pub type State = Vector6<f64>;

/// Dimension of the state and of a single control step (simple integrator).
pub const STATE_DIM: usize = 6;

/// Builds the pose from position and roll-pitch-yaw angles, composing rotations about
/// Z, then Y, then X (intrinsic), then applying the translation.
pub fn state_to_pose(position: &Vector3<f64>, euler_zyx: &Vector3<f64>) -> Pose {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), euler_zyx.z)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), euler_zyx.y)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), euler_zyx.x);
    Isometry3::from_parts(
        Translation3::from(*position),
        UnitQuaternion::from_rotation_matrix(&rotation),
    )
}

/// Converts the full state vector into pose.
pub fn pose_from_state(state: &State) -> Pose {
    state_to_pose(&state.fixed_rows::<3>(0).into_owned(), &state.fixed_rows::<3>(3).into_owned())
}

/// Recovers roll, pitch and yaw. Pitch is taken from the magnitude of the last row
/// rather than asin of a single entry, which keeps it well defined over a wider range.
pub fn pose_to_roll_pitch_yaw(pose: &Pose) -> Vector3<f64> {
    let m = pose.rotation.to_rotation_matrix().into_inner();
    rotation_to_roll_pitch_yaw(&m)
}

fn rotation_to_roll_pitch_yaw(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(
        m[(2, 1)].atan2(m[(2, 2)]),
        (-m[(2, 0)]).atan2((m[(2, 1)] * m[(2, 1)] + m[(2, 2)] * m[(2, 2)]).sqrt()),
        m[(1, 0)].atan2(m[(0, 0)]),
    )
}

/// State vector (position + roll, pitch, yaw) of the pose.
pub fn state_from_pose(pose: &Pose) -> State {
    let p = pose.translation.vector;
    let rpy = pose_to_roll_pitch_yaw(pose);
    State::new(p.x, p.y, p.z, rpy.x, rpy.y, rpy.z)
}

/// 6D error between two poses. The first three components are the translational
/// difference `a - b`, the last three the rotational error of `Ra * Rb^T` as a rotation
/// vector.
///
/// The rotational part has three branches: first order approximation when the skew part
/// is tiny (no division by its near zero norm), exact angle-axis otherwise, and a
/// diagonal based fallback for rotations of almost exactly 180 degrees where the skew
/// part vanishes.
pub fn pose_error(a: &Pose, b: &Pose) -> Vector6<f64> {
    let mut e = Vector6::zeros();
    let dt = a.translation.vector - b.translation.vector;
    e.fixed_rows_mut::<3>(0).copy_from(&dt);

    let ra = a.rotation.to_rotation_matrix().into_inner();
    let rb = b.rotation.to_rotation_matrix().into_inner();
    let re = ra * rb.transpose();
    let t = re.trace();
    let eps = Vector3::new(
        re[(2, 1)] - re[(1, 2)],
        re[(0, 2)] - re[(2, 0)],
        re[(1, 0)] - re[(0, 1)],
    );
    let eps_norm = eps.norm();

    let rotational = if t > -0.99 || eps_norm > 1e-10 {
        if eps_norm < 1e-3 {
            (0.75 - t / 12.0) * eps
        } else {
            (eps_norm.atan2(t - 1.0) / eps_norm) * eps
        }
    } else {
        re.diagonal().add_scalar(1.0) * FRAC_PI_2
    };
    e.fixed_rows_mut::<3>(3).copy_from(&rotational);
    e
}

/// Positional and orientation error norms between the two poses.
pub fn pose_error_norms(a: &Pose, b: &Pose) -> (f64, f64) {
    let e = pose_error(a, b);
    (e.fixed_rows::<3>(0).norm(), e.fixed_rows::<3>(3).norm())
}
