//! Optimizer A: one receding horizon cycle solved as a bound constrained
//! nonlinear program with the pattern search minimizer.

use crate::cost::CostModel;
use crate::optimizers::pattern_search::PatternSearch;
use crate::pose::{pose_error_norms, pose_from_state, State};
use crate::rollout::rollout;
use tracing::{debug, warn};

/// Optimizes the full control sequence starting from `warm_start`. Never fails: if the
/// solver cannot run, the warm start clipped into the bounds is returned.
pub fn solve(model: &CostModel, start: &State, warm_start: &[f64]) -> Vec<f64> {
    let config = model.config;
    let (lower, upper) = config.control_bounds();
    let solver = PatternSearch::new(lower, upper, config.xtol_rel, config.max_evaluations);

    let optimized = match solver.minimize(|u: &[f64]| model.trajectory_cost(start, u), warm_start) {
        Ok(outcome) => {
            if outcome.converged() {
                debug!(
                    "NLP converged after {} evaluations, cost {:.6}",
                    outcome.evaluations, outcome.cost
                );
            } else {
                debug!(
                    "NLP stopped at {:?} after {} evaluations, cost {:.6}, using best candidate",
                    outcome.status, outcome.evaluations, outcome.cost
                );
            }
            outcome.x
        }
        Err(e) => {
            warn!("NLP solver failed: {}, keeping warm start", e);
            warm_start
                .iter()
                .zip(solver.lower.iter().zip(solver.upper.iter()))
                .map(|(u, (lo, hi))| u.clamp(*lo, *hi))
                .collect()
        }
    };

    if let Some(last) = rollout(start, &optimized, config.horizon).last() {
        let (position_error, orientation_error) = pose_error_norms(&pose_from_state(last), &model.goal);
        debug!(
            "Final step error: position {:.5} m, orientation {:.5} rad",
            position_error, orientation_error
        );
    }
    optimized
}
