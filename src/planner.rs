//! Receding horizon waypoint planner. Owns the warm start buffer, the obstacle snapshot
//! and the tool collision proxy, and drives one of the optimizers from the start pose to
//! the goal pose.

use crate::config::PlannerConfig;
use crate::cost::{frustum_of, CostModel};
use crate::fusion::fuse_waypoints;
use crate::obstacles::{KdObstacles, ObstacleIndex};
use crate::optimizers::{mppi, nlp};
use crate::planner_error::{PlannerError, PlannerResult};
use crate::pose::{pose_error_norms, pose_from_state, state_from_pose, Pose};
use crate::rollout::{recede_horizon, rollout};
use crate::tool_model::{ToolModel, ToolMounting};
use nalgebra::Point3;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Which optimizer advances the plan. Chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Derivative-free bound constrained NLP.
    #[default]
    Nlp,
    /// Sampling based MPPI update.
    Mppi,
}

/// State of the waypoint generation loop. Both terminal states end the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Running,
    /// Pose error dropped below both tolerances.
    Converged,
    /// Iteration budget spent before converging.
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct PlanDiagnostics {
    pub elapsed: Duration,
    pub iterations: usize,
    pub termination: Termination,
    /// Mean number of obstacle points in the camera frustum over the raw waypoints.
    pub average_visible_points: f64,
    pub raw_waypoints: usize,
    pub fused_waypoints: usize,
}

/// Result of [`WaypointPlanner::generate_waypoints`]: poses from start to goal.
#[derive(Debug, Clone)]
pub struct Plan {
    pub waypoints: Vec<Pose>,
    pub diagnostics: PlanDiagnostics,
}

pub struct WaypointPlanner {
    /// Can be changed between planning calls.
    pub config: PlannerConfig,
    obstacles: Option<Arc<dyn ObstacleIndex>>,
    tool: ToolModel,
    warm_start: Vec<f64>,
    min_visible_points: usize,
    seed_counter: u64,
}

impl WaypointPlanner {
    pub fn new(config: PlannerConfig) -> PlannerResult<Self> {
        config.validate()?;
        let warm_start = vec![0.0; config.control_len()];
        Ok(WaypointPlanner {
            config,
            obstacles: None,
            tool: ToolModel::default(),
            warm_start,
            min_visible_points: 0,
            seed_counter: 0,
        })
    }

    /// Replaces the obstacle snapshot. The index is only read while planning.
    pub fn set_obstacles(&mut self, obstacles: Option<Arc<dyn ObstacleIndex>>) {
        match &obstacles {
            Some(index) => debug!("Obstacle snapshot with {} points", index.len()),
            None => debug!("Obstacles cleared"),
        }
        self.obstacles = obstacles;
    }

    /// Indexes the points with the default kd-tree and uses them as obstacles.
    pub fn set_obstacle_points(&mut self, points: Vec<Point3<f64>>) {
        self.set_obstacles(Some(Arc::new(KdObstacles::new(points))));
    }

    pub fn obstacles(&self) -> Option<&Arc<dyn ObstacleIndex>> {
        self.obstacles.as_ref()
    }

    pub fn set_tool_model(&mut self, tool: ToolModel) {
        self.tool = tool;
    }

    pub fn tool_model(&self) -> &ToolModel {
        &self.tool
    }

    /// Rebuilds the end effector collision proxy from mesh vertices. On failure the
    /// previous proxy stays in place.
    pub fn update_end_effector(&mut self, mesh_points: &[Point3<f64>], mounting: &ToolMounting) -> PlannerResult<()> {
        match ToolModel::from_mesh_points(mesh_points, mounting) {
            Ok(tool) => {
                info!(
                    "End effector model: {} mesh points, {} after downsampling, box {:?} .. {:?}",
                    mesh_points.len(),
                    tool.points.len(),
                    tool.bounds.mins,
                    tool.bounds.maxs
                );
                self.tool = tool;
                Ok(())
            }
            Err(e) => {
                warn!("End effector model not updated: {}", e);
                Err(e)
            }
        }
    }

    /// Loads an STL, PLY, OBJ or DAE mesh and ingests its vertices.
    #[cfg(feature = "allow_filesystem")]
    pub fn update_end_effector_from_file(&mut self, path: &str, mounting: &ToolMounting) -> anyhow::Result<()> {
        let mesh = rs_read_trimesh::load_trimesh(path, 1.0)
            .map_err(|e| anyhow::anyhow!("Cannot load end effector mesh {}: {}", path, e))?;
        let points: Vec<Point3<f64>> = mesh
            .vertices()
            .iter()
            .map(|v| Point3::new(v.x as f64, v.y as f64, v.z as f64))
            .collect();
        self.update_end_effector(&points, mounting)?;
        Ok(())
    }

    /// Injects a warm start. A sequence of the wrong size is not applied; the buffer is
    /// zeroed instead.
    pub fn set_action(&mut self, controls: Vec<f64>) {
        let expected = self.config.control_len();
        if controls.len() == expected {
            self.warm_start = controls;
        } else {
            warn!("Action of size {} does not match {}, resetting", controls.len(), expected);
            self.warm_start = vec![0.0; expected];
        }
    }

    pub fn reset_action(&mut self) {
        self.warm_start = vec![0.0; self.config.control_len()];
    }

    /// Current warm start buffer.
    pub fn action(&self) -> &[f64] {
        &self.warm_start
    }

    /// Minimum visible point count, from the ratio and the current obstacle count.
    pub fn update_visibility_threshold(&mut self) -> usize {
        let total = self.obstacles.as_ref().map_or(0, |o| o.len());
        self.min_visible_points = (self.config.min_visible_ratio * total as f64).floor().max(0.0) as usize;
        self.min_visible_points
    }

    pub fn min_visible_points(&self) -> usize {
        self.min_visible_points
    }

    fn cost_model(&self, goal: &Pose) -> CostModel<'_> {
        CostModel::new(
            &self.config,
            *goal,
            self.obstacles.as_deref(),
            &self.tool,
            self.min_visible_points,
        )
    }

    fn prepare_warm_start(&mut self) -> PlannerResult<()> {
        self.config.validate()?;
        let expected = self.config.control_len();
        if self.warm_start.len() != expected {
            debug!("Warm start of size {} reset to {}", self.warm_start.len(), expected);
            self.warm_start = vec![0.0; expected];
        }
        Ok(())
    }

    fn next_seed(&mut self) -> u64 {
        match self.config.mppi_seed {
            Some(base) => {
                let seed = base.wrapping_add(self.seed_counter.wrapping_mul(self.config.num_samples as u64));
                self.seed_counter += 1;
                seed
            }
            None => rand::random::<u64>(),
        }
    }

    /// One NLP cycle from `current`. Returns the full optimized sequence; the warm start
    /// is shifted for the next cycle.
    pub fn nlp_action(&mut self, current: &Pose, goal: &Pose) -> PlannerResult<Vec<f64>> {
        self.prepare_warm_start()?;
        let start = state_from_pose(current);
        let optimized = nlp::solve(&self.cost_model(goal), &start, &self.warm_start);
        self.warm_start = recede_horizon(&optimized, self.config.action_dim, self.config.horizon);
        Ok(optimized)
    }

    /// One MPPI cycle from `current`, same contract as [`Self::nlp_action`].
    pub fn mppi_action(&mut self, current: &Pose, goal: &Pose) -> PlannerResult<Vec<f64>> {
        self.prepare_warm_start()?;
        let seed = self.next_seed();
        let start = state_from_pose(current);
        let optimized = mppi::solve(&self.cost_model(goal), &start, &self.warm_start, seed)?;
        self.warm_start = recede_horizon(&optimized, self.config.action_dim, self.config.horizon);
        Ok(optimized)
    }

    /// Plans waypoints from `init` to `goal`. On termination, converged or out of
    /// iterations, the last recorded waypoint is overwritten with exactly `goal`. If that
    /// happens in the first iteration the plan is just `[goal]`.
    ///
    /// The warm start is kept from the previous call, so a reused planner starts from the
    /// controls of its last plan. Call [`Self::reset_action`] first for a cold start.
    pub fn generate_waypoints(&mut self, init: &Pose, goal: &Pose, strategy: Strategy) -> PlannerResult<Plan> {
        self.config.validate()?;
        let started = Instant::now();
        self.seed_counter = 0;
        let min_visible = self.update_visibility_threshold();
        if self.obstacles.as_ref().is_none_or(|o| o.is_empty()) {
            debug!("No obstacle points, collision and visibility costs are off");
        } else {
            debug!("Minimum visible points: {}", min_visible);
        }

        let mut waypoints = vec![*init];
        let mut current = *init;
        let mut iterations = 0;
        let mut termination = Termination::Running;

        while termination == Termination::Running {
            iterations += 1;
            let controls = match strategy {
                Strategy::Nlp => self.nlp_action(&current, goal)?,
                Strategy::Mppi => self.mppi_action(&current, goal)?,
            };
            let trajectory = rollout(&state_from_pose(&current), &controls, self.config.horizon);
            let Some(next) = trajectory.get(1) else {
                return Err(PlannerError::InvalidConfiguration("empty control sequence".into()));
            };
            let pose = pose_from_state(next);
            let (position_error, orientation_error) = pose_error_norms(&pose, goal);
            debug!(
                "Iteration {}: position error {:.5} m, orientation error {:.5} rad",
                iterations, position_error, orientation_error
            );

            if position_error < self.config.position_tolerance
                && orientation_error < self.config.orientation_tolerance
            {
                termination = Termination::Converged;
            } else if iterations >= self.config.max_iterations {
                termination = Termination::BudgetExhausted;
            }

            if termination == Termination::Running {
                waypoints.push(pose);
                current = pose;
            } else if let Some(last) = waypoints.last_mut() {
                *last = *goal;
            }
        }

        match termination {
            Termination::Converged => info!("Converged after {} iterations", iterations),
            _ => warn!(
                "No convergence within {} iterations, last waypoint snapped to goal",
                iterations
            ),
        }

        let frustum = frustum_of(&self.config);
        let obstacles = self.obstacles.as_deref();
        let visible: usize = waypoints
            .iter()
            .map(|w| frustum.count_visible(obstacles, w).unwrap_or(0))
            .sum();
        let average_visible_points = visible as f64 / waypoints.len() as f64;

        let raw_waypoints = waypoints.len();
        let fused = fuse_waypoints(
            &waypoints,
            self.config.fusion_position_tolerance,
            self.config.fusion_orientation_tolerance,
            self.config.fusion_policy,
        );
        let elapsed = started.elapsed();
        info!(
            "Planned {} waypoints ({} before fusion) in {:?}, average visible points {:.1}",
            fused.len(),
            raw_waypoints,
            elapsed,
            average_visible_points
        );

        Ok(Plan {
            diagnostics: PlanDiagnostics {
                elapsed,
                iterations,
                termination,
                average_visible_points,
                raw_waypoints,
                fused_waypoints: fused.len(),
            },
            waypoints: fused,
        })
    }
}

impl std::fmt::Debug for WaypointPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaypointPlanner")
            .field("config", &self.config)
            .field("obstacles", &self.obstacles.as_ref().map(|o| o.len()))
            .field("tool_points", &self.tool.points.len())
            .field("warm_start", &self.warm_start)
            .finish()
    }
}
