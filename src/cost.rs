//! Cost model of the planner: pose tracking, look-at-goal, collision and visibility terms,
//! summed over the predicted trajectory.

use crate::config::PlannerConfig;
use crate::obstacles::ObstacleIndex;
use crate::pose::{pose_error, pose_from_state, Pose, State};
use crate::rollout::rollout;
use crate::spatial_queries::{count_points_in_box, nearest_obstacle_distance, Frustum};
use crate::tool_model::ToolModel;
use nalgebra::{Point3, Vector3};

/// Inverse distance barrier, infinite at zero distance and zero from the margin on.
pub fn inverse_distance_barrier(distance: f64, margin: f64, weight: f64) -> f64 {
    if distance < margin {
        let diff = 1.0 / distance - 1.0 / margin;
        0.5 * weight * diff * diff
    } else {
        0.0
    }
}

/// Quadratic barrier that stays finite at zero distance, zero from the margin on.
pub fn quadratic_barrier(distance: f64, margin: f64, weight: f64) -> f64 {
    if distance < margin {
        weight * (distance - margin) * (distance - margin) / (2.0 * margin)
    } else {
        0.0
    }
}

/// Soft exponential penalty for seeing fewer points than required.
pub fn visibility_penalty(visible: usize, min_visible: usize, alpha: f64) -> f64 {
    let delta = min_visible as f64 - visible as f64;
    if delta > 0.0 {
        (alpha * delta).exp() - 1.0
    } else {
        0.0
    }
}

/// Everything needed to score a candidate control sequence. Borrowed for one planning
/// cycle, shared between MPPI workers.
pub struct CostModel<'a> {
    pub config: &'a PlannerConfig,
    pub goal: Pose,
    pub obstacles: Option<&'a dyn ObstacleIndex>,
    pub tool: &'a ToolModel,
    pub min_visible_points: usize,
    look_at_point: Point3<f64>,
    frustum: Frustum,
}

impl<'a> CostModel<'a> {
    pub fn new(
        config: &'a PlannerConfig,
        goal: Pose,
        obstacles: Option<&'a dyn ObstacleIndex>,
        tool: &'a ToolModel,
        min_visible_points: usize,
    ) -> Self {
        let look_at_point = goal * Point3::new(0.0, 0.0, config.look_at_goal_distance);
        Self {
            config,
            goal,
            obstacles,
            tool,
            min_visible_points,
            look_at_point,
            frustum: frustum_of(config),
        }
    }

    /// Point along the goal Z axis the camera should keep looking at.
    pub fn look_at_point(&self) -> Point3<f64> {
        self.look_at_point
    }

    /// Weighted squared pose error to the goal plus the look-at-goal term.
    pub fn pose_cost(&self, pose: &Pose, w_p: f64, w_q: f64) -> f64 {
        let e = pose_error(pose, &self.goal);
        let tracking = w_p * e.fixed_rows::<3>(0).norm_squared() + w_q * e.fixed_rows::<3>(3).norm_squared();

        let camera_z: Vector3<f64> = pose.rotation * Vector3::z();
        let to_target = self.look_at_point.coords - pose.translation.vector;
        let distance = to_target.norm();
        let look_at = if distance > 1e-8 {
            let c = camera_z.dot(&(to_target / distance)).clamp(-1.0, 1.0);
            let angle = c.acos();
            self.config.w_look_at_goal * angle * angle
        } else {
            0.0
        };
        tracking + look_at
    }

    /// Inverse distance barrier on the end effector origin.
    pub fn obstacle_cost(&self, pose: &Pose) -> f64 {
        match nearest_obstacle_distance(self.obstacles, pose) {
            Some(d) => inverse_distance_barrier(d, self.config.collision_margin, self.config.w_obs),
            None => 0.0,
        }
    }

    /// Quadratic barrier accumulated over all tool proxy points placed at `pose`.
    pub fn mesh_collision_cost(&self, pose: &Pose) -> f64 {
        let Some(obstacles) = self.obstacles else {
            return 0.0;
        };
        if obstacles.is_empty() {
            return 0.0;
        }
        self.tool
            .points
            .iter()
            .filter_map(|p| obstacles.nearest_distance(&(pose * p)))
            .map(|d| quadratic_barrier(d, self.config.collision_margin, self.config.w_obs))
            .sum()
    }

    /// Linear penalty for every obstacle point inside the tool box.
    pub fn box_collision_cost(&self, pose: &Pose) -> f64 {
        self.config.w_obs * count_points_in_box(self.obstacles, pose, &self.tool.bounds) as f64
    }

    /// Penalty for having fewer obstacle points in view than required.
    pub fn visibility_cost(&self, pose: &Pose) -> f64 {
        match self.frustum.count_visible(self.obstacles, pose) {
            Some(visible) => {
                visibility_penalty(visible, self.min_visible_points, self.config.alpha_visibility)
            }
            None => 0.0,
        }
    }

    /// Sum of enabled collision terms at the pose.
    pub fn collision_cost(&self, pose: &Pose) -> f64 {
        let mut cost = 0.0;
        if self.config.use_mesh_collision {
            cost += self.mesh_collision_cost(pose);
        }
        if self.config.use_point_collision {
            cost += self.obstacle_cost(pose);
        }
        if self.config.use_box_collision {
            cost += self.box_collision_cost(pose);
        }
        cost
    }

    /// Total cost of the trajectory predicted from `start` under `controls`.
    pub fn trajectory_cost(&self, start: &State, controls: &[f64]) -> f64 {
        let trajectory = rollout(start, controls, self.config.horizon);
        let mut total = 0.0;
        for state in trajectory.iter() {
            let pose = pose_from_state(state);
            total += self.pose_cost(&pose, self.config.w_p, self.config.w_q)
                + self.collision_cost(&pose)
                + self.visibility_cost(&pose);
        }
        if let Some(last) = trajectory.last() {
            total += self.pose_cost(&pose_from_state(last), self.config.w_p_term, self.config.w_q_term);
        }
        total
    }
}

/// Camera frustum described by the configuration.
pub fn frustum_of(config: &PlannerConfig) -> Frustum {
    Frustum {
        horizontal_fov: config.visibility_fov_h,
        vertical_fov: config.visibility_fov_v,
        near: config.visibility_min_range,
        far: config.visibility_max_range,
    }
}
