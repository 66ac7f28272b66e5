//! Receding horizon waypoint planner for a 6-DOF end effector carrying a camera.
//!
//! Given a start and a goal pose, the planner repeatedly optimizes a short sequence of
//! bounded pose increments, executes only the first one and re-plans from there, until
//! the goal is reached or the iteration budget runs out. The cost trades off
//!
//! - tracking of the goal pose (position and orientation, with heavier terminal weights),
//! - keeping the camera pointed at a look-at point in front of the goal,
//! - staying clear of an obstacle point cloud (tool mesh points, a single point barrier,
//!   or points inside the tool bounding box),
//! - keeping enough obstacle points inside the camera frustum.
//!
//! Two optimizers are available per call: a derivative-free bounded pattern search
//! ([`planner::Strategy::Nlp`]) and a parallel sampling based MPPI update
//! ([`planner::Strategy::Mppi`]). Both share the same warm start buffer that is shifted
//! by one step after every cycle.
//!
//! Poses are `nalgebra::Isometry3<f64>`. The optimizers work on a 6-vector state of
//! position and roll, pitch, yaw (intrinsic Z-Y-X).
//!
//! ```no_run
//! use rs_waypoint_mpc::config::PlannerConfig;
//! use rs_waypoint_mpc::planner::{Strategy, WaypointPlanner};
//! use rs_waypoint_mpc::utils::pose_degrees;
//!
//! let mut planner = WaypointPlanner::new(PlannerConfig::default()).unwrap();
//! let plan = planner
//!     .generate_waypoints(
//!         &pose_degrees([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
//!         &pose_degrees([0.3, 0.0, 0.0], [0.0, 0.0, 0.0]),
//!         Strategy::Nlp,
//!     )
//!     .unwrap();
//! println!("{} waypoints", plan.waypoints.len());
//! ```

pub mod planner_error;

pub mod pose;

pub mod rollout;

pub mod obstacles;

pub mod tool_model;

pub mod spatial_queries;

pub mod config;

#[cfg(feature = "allow_filesystem")]
pub mod config_from_file;

pub mod cost;

pub mod optimizers {
    pub mod pattern_search;
    pub mod nlp;
    pub mod mppi;
}

pub mod fusion;

pub mod planner;

#[path = "utils/utils.rs"]
pub mod utils;

#[cfg(test)]
mod tests;
