//! Dynamics rollout of the control sequence and the receding horizon shift.

use crate::pose::{State, STATE_DIM};

/// Integrates the flat control sequence (`horizon` steps of `STATE_DIM` deltas each) starting
/// from `start`. Returns `horizon + 1` states, the first being `start` itself.
/// No saturation happens here, bounds are the business of the optimizers.
pub fn rollout(start: &State, controls: &[f64], horizon: usize) -> Vec<State> {
    let mut trajectory = Vec::with_capacity(horizon + 1);
    trajectory.push(*start);
    for (k, delta) in controls.chunks_exact(STATE_DIM).take(horizon).enumerate() {
        let next = trajectory[k] + State::from_column_slice(delta);
        trajectory.push(next);
    }
    trajectory
}

/// Receding horizon: the warm start for the next cycle is the optimized sequence shifted
/// left by one step, with the vacated last step zeroed. With a single step horizon
/// there is nothing to carry over and the whole buffer is zeroed.
pub fn recede_horizon(optimized: &[f64], action_dim: usize, horizon: usize) -> Vec<f64> {
    let mut next = vec![0.0; action_dim * horizon];
    if horizon > 1 {
        next[..action_dim * (horizon - 1)]
            .copy_from_slice(&optimized[action_dim..action_dim * horizon]);
    }
    next
}
