//! Optimizer B: sampling based model predictive path integral update.
//!
//! Candidates are perturbations of the warm start mean. Every candidate owns a
//! generator seeded from `base_seed + index`, so results do not depend on how
//! rayon schedules the work.

use crate::cost::CostModel;
use crate::planner_error::{PlannerError, PlannerResult};
use crate::pose::State;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Performs one MPPI update of `mean` and returns the new control sequence.
pub fn solve(model: &CostModel, start: &State, mean: &[f64], base_seed: u64) -> PlannerResult<Vec<f64>> {
    let config = model.config;
    let (lower, upper) = config.control_bounds();
    if mean.len() != lower.len() {
        return Err(PlannerError::InvalidConfiguration(format!(
            "control sequence has {} entries, expected {}",
            mean.len(),
            lower.len()
        )));
    }
    let position_noise = Normal::new(0.0, config.noise_std_pos)
        .map_err(|e| PlannerError::InvalidConfiguration(format!("position noise: {}", e)))?;
    let orientation_noise = Normal::new(0.0, config.noise_std_ori)
        .map_err(|e| PlannerError::InvalidConfiguration(format!("orientation noise: {}", e)))?;

    let action_dim = config.action_dim;
    let candidates: Vec<(Vec<f64>, f64)> = (0..config.num_samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let mut u = Vec::with_capacity(mean.len());
            for k in 0..config.horizon {
                let scale = (-(k as f64)).exp();
                for j in 0..action_dim {
                    let idx = k * action_dim + j;
                    let noise = if j < 3 {
                        position_noise.sample(&mut rng)
                    } else {
                        orientation_noise.sample(&mut rng)
                    };
                    u.push((mean[idx] + scale * noise).clamp(lower[idx], upper[idx]));
                }
            }
            let cost = model.trajectory_cost(start, &u);
            (u, cost)
        })
        .collect();

    let min_cost = candidates
        .iter()
        .map(|(_, c)| *c)
        .filter(|c| c.is_finite())
        .fold(f64::INFINITY, f64::min);
    if !min_cost.is_finite() {
        warn!("All {} MPPI candidates have non-finite cost, keeping the mean", candidates.len());
        return Ok(mean
            .iter()
            .enumerate()
            .map(|(i, m)| m.clamp(lower[i], upper[i]))
            .collect());
    }

    let weights: Vec<f64> = candidates
        .iter()
        .map(|(_, c)| {
            if c.is_finite() {
                (-(c - min_cost) / config.mppi_lambda).exp()
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = weights.iter().sum();

    let mut updated = vec![0.0; mean.len()];
    for ((u, _), w) in candidates.iter().zip(weights.iter()) {
        let w = w / total;
        for (acc, v) in updated.iter_mut().zip(u.iter()) {
            *acc += w * v;
        }
    }
    debug!(
        "MPPI update over {} candidates, best cost {:.6}, weight sum {:.3}",
        candidates.len(),
        min_cost,
        total
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::pose::{state_to_pose, Pose};
    use crate::tool_model::ToolModel;
    use nalgebra::Vector3;

    fn setup() -> (PlannerConfig, ToolModel) {
        let config = PlannerConfig { horizon: 3, num_samples: 256, ..Default::default() };
        (config, ToolModel::default())
    }

    #[test]
    fn test_same_seed_same_result() {
        let (config, tool) = setup();
        let goal = state_to_pose(&Vector3::new(0.3, 0.0, 0.0), &Vector3::zeros());
        let model = CostModel::new(&config, goal, None, &tool, 0);
        let mean = vec![0.0; config.control_len()];
        let a = solve(&model, &State::zeros(), &mean, 42).unwrap();
        let b = solve(&model, &State::zeros(), &mean, 42).unwrap();
        assert_eq!(a, b);
        let c = solve(&model, &State::zeros(), &mean, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_update_within_bounds() {
        let config = PlannerConfig {
            horizon: 2,
            num_samples: 64,
            noise_std_pos: 1.0,
            noise_std_ori: 1.0,
            ..Default::default()
        };
        let tool = ToolModel::default();
        let goal = state_to_pose(&Vector3::new(5.0, -5.0, 5.0), &Vector3::new(2.0, -1.0, 1.0));
        let model = CostModel::new(&config, goal, None, &tool, 0);
        let mean = vec![0.09; config.control_len()];
        let u = solve(&model, &State::zeros(), &mean, 7).unwrap();
        let (lower, upper) = config.control_bounds();
        for i in 0..u.len() {
            assert!(u[i] >= lower[i] - 1e-12 && u[i] <= upper[i] + 1e-12, "u[{}] = {}", i, u[i]);
        }
    }

    #[test]
    fn test_improves_over_mean() {
        let (config, tool) = setup();
        let goal = state_to_pose(&Vector3::new(0.3, 0.0, 0.0), &Vector3::zeros());
        let model = CostModel::new(&config, goal, None, &tool, 0);
        let mean = vec![0.0; config.control_len()];
        let u = solve(&model, &State::zeros(), &mean, 1).unwrap();
        assert!(model.trajectory_cost(&State::zeros(), &u) < model.trajectory_cost(&State::zeros(), &mean));
        assert!(u[0] > 0.0);
    }

    #[test]
    fn test_zero_noise_returns_mean() {
        let config = PlannerConfig { horizon: 2, num_samples: 8, noise_std_pos: 0.0, noise_std_ori: 0.0, ..Default::default() };
        let tool = ToolModel::default();
        let model = CostModel::new(&config, Pose::identity(), None, &tool, 0);
        let mean = vec![0.05, 0.0, -0.05, 0.0, 0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let u = solve(&model, &State::zeros(), &mean, 0).unwrap();
        for (a, b) in u.iter().zip(mean.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let (config, tool) = setup();
        let model = CostModel::new(&config, Pose::identity(), None, &tool, 0);
        assert!(matches!(
            solve(&model, &State::zeros(), &[0.0; 3], 0),
            Err(PlannerError::InvalidConfiguration(_))
        ));
    }
}
