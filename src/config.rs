//! Planner configuration: cost weights, bounds, sampling and convergence settings.

use crate::fusion::FusionPolicy;
use crate::planner_error::{PlannerError, PlannerResult};
use crate::pose::STATE_DIM;

/// Flat set of planner knobs. Mutable between planning calls, read-only during one.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Number of control steps the optimizer looks ahead.
    pub horizon: usize,

    /// Dimension of a single control step. Must match the state dimension (6) as the
    /// dynamics are a simple integrator.
    pub action_dim: usize,

    /// Positional tracking cost weight.
    pub w_p: f64,
    /// Orientation tracking cost weight.
    pub w_q: f64,
    /// Terminal positional cost weight.
    pub w_p_term: f64,
    /// Terminal orientation cost weight.
    pub w_q_term: f64,

    /// Weight of keeping the camera Z axis pointed at the look-at point of the goal.
    pub w_look_at_goal: f64,
    /// Distance of the look-at point along the goal Z axis.
    pub look_at_goal_distance: f64,

    /// Obstacle cost weight, shared by all collision terms.
    pub w_obs: f64,
    /// Distance to the nearest obstacle below which collision costs activate.
    pub collision_margin: f64,

    /// Mesh point quadratic barrier (needs an ingested tool model).
    pub use_mesh_collision: bool,
    /// Inverse distance barrier of the end effector origin.
    pub use_point_collision: bool,
    /// Linear penalty per obstacle point inside the tool box.
    pub use_box_collision: bool,

    /// Steepness of the exponential visibility penalty.
    pub alpha_visibility: f64,
    /// Horizontal field of view, degrees.
    pub visibility_fov_h: f64,
    /// Vertical field of view, degrees.
    pub visibility_fov_v: f64,
    /// Near plane of the visibility frustum.
    pub visibility_min_range: f64,
    /// Far plane of the visibility frustum.
    pub visibility_max_range: f64,
    /// Fraction of obstacle points that should stay visible.
    pub min_visible_ratio: f64,

    /// Per step translation bounds.
    pub dp_min: f64,
    pub dp_max: f64,
    /// Per step rotation bounds, radians.
    pub dtheta_min: f64,
    pub dtheta_max: f64,

    /// Relative tolerance of the derivative-free solver.
    pub xtol_rel: f64,
    /// Cost evaluation budget of the derivative-free solver per cycle.
    pub max_evaluations: usize,

    /// Number of MPPI candidate sequences.
    pub num_samples: usize,
    /// MPPI temperature.
    pub mppi_lambda: f64,
    /// Standard deviation of translation noise.
    pub noise_std_pos: f64,
    /// Standard deviation of rotation noise.
    pub noise_std_ori: f64,
    /// Fixed base seed for reproducible sampling, random if None.
    pub mppi_seed: Option<u64>,

    /// Waypoint generation converges when the position error is below this (meters).
    pub position_tolerance: f64,
    /// Waypoint generation converges when the orientation error is below this (radians).
    pub orientation_tolerance: f64,
    /// Budget of receding horizon iterations.
    pub max_iterations: usize,

    pub fusion_position_tolerance: f64,
    pub fusion_orientation_tolerance: f64,
    pub fusion_policy: FusionPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            action_dim: STATE_DIM,
            w_p: 100.0,
            w_q: 10.0,
            w_p_term: 1e3,
            w_q_term: 1e3,
            w_look_at_goal: 10.0,
            look_at_goal_distance: 0.11,
            w_obs: 5.0,
            collision_margin: 0.05,
            use_mesh_collision: true,
            use_point_collision: false,
            use_box_collision: false,
            alpha_visibility: 0.2,
            visibility_fov_h: 60.0,
            visibility_fov_v: 60.0,
            visibility_min_range: 0.0,
            visibility_max_range: 0.5,
            min_visible_ratio: 0.5,
            dp_min: -0.1,
            dp_max: 0.1,
            dtheta_min: -0.1,
            dtheta_max: 0.1,
            xtol_rel: 1e-6,
            max_evaluations: 200,
            num_samples: 2048,
            mppi_lambda: 1.0,
            noise_std_pos: 0.01,
            noise_std_ori: 0.05,
            mppi_seed: None,
            position_tolerance: 1e-2,
            orientation_tolerance: 1e-2,
            max_iterations: 20,
            fusion_position_tolerance: 1e-2,
            fusion_orientation_tolerance: 0.1,
            fusion_policy: FusionPolicy::Drop,
        }
    }
}

impl PlannerConfig {
    /// Size of the flat control sequence.
    pub fn control_len(&self) -> usize {
        self.action_dim * self.horizon
    }

    /// Lower and upper bounds of the flat control sequence, translation then rotation
    /// bounds replicated for every step.
    pub fn control_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lower = Vec::with_capacity(self.control_len());
        let mut upper = Vec::with_capacity(self.control_len());
        for _ in 0..self.horizon {
            for i in 0..self.action_dim {
                if i < 3 {
                    lower.push(self.dp_min);
                    upper.push(self.dp_max);
                } else {
                    lower.push(self.dtheta_min);
                    upper.push(self.dtheta_max);
                }
            }
        }
        (lower, upper)
    }

    /// Checks the configuration for values the planner cannot work with.
    pub fn validate(&self) -> PlannerResult<()> {
        fn invalid(msg: String) -> PlannerResult<()> {
            Err(PlannerError::InvalidConfiguration(msg))
        }
        if self.horizon == 0 {
            return invalid("horizon must be positive".into());
        }
        if self.action_dim != STATE_DIM {
            return invalid(format!(
                "action dimension must be {} for the integrator model, got {}",
                STATE_DIM, self.action_dim
            ));
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be positive".into());
        }
        if !(self.dp_min <= self.dp_max) || !(self.dtheta_min <= self.dtheta_max) {
            return invalid(format!(
                "control bounds are inverted: dp [{}, {}], dtheta [{}, {}]",
                self.dp_min, self.dp_max, self.dtheta_min, self.dtheta_max
            ));
        }
        if !(self.collision_margin > 0.0) {
            return invalid(format!("collision margin must be positive, got {}", self.collision_margin));
        }
        if !(self.mppi_lambda > 0.0) {
            return invalid(format!("MPPI temperature must be positive, got {}", self.mppi_lambda));
        }
        if !(self.noise_std_pos >= 0.0 && self.noise_std_pos.is_finite())
            || !(self.noise_std_ori >= 0.0 && self.noise_std_ori.is_finite())
        {
            return invalid(format!(
                "noise deviations must be finite and non-negative, got {} and {}",
                self.noise_std_pos, self.noise_std_ori
            ));
        }
        if self.num_samples == 0 {
            return invalid("num_samples must be positive".into());
        }
        if !(self.visibility_min_range <= self.visibility_max_range) {
            return invalid(format!(
                "visibility range is inverted: [{}, {}]",
                self.visibility_min_range, self.visibility_max_range
            ));
        }
        Ok(())
    }
}
