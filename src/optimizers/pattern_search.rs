//! Bounded derivative-free local minimizer: compass (coordinate) polling with
//! Hooke-Jeeves pattern moves and step halving.

use crate::planner_error::{PlannerError, PlannerResult};

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Every step shrank below the relative tolerance.
    XtolReached,
    /// The evaluation budget ran out first.
    MaxEvaluationsReached,
}

#[derive(Debug, Clone)]
pub struct SolverOutcome {
    /// Best point found, always within bounds.
    pub x: Vec<f64>,
    pub cost: f64,
    pub evaluations: usize,
    pub status: SolverStatus,
}

impl SolverOutcome {
    pub fn converged(&self) -> bool {
        self.status == SolverStatus::XtolReached
    }
}

#[derive(Debug, Clone)]
pub struct PatternSearch {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub xtol_rel: f64,
    pub max_evaluations: usize,
}

/// Objective wrapper that counts evaluations and maps NaN to +inf.
struct Budget<F> {
    objective: F,
    used: usize,
    limit: usize,
}

impl<F: FnMut(&[f64]) -> f64> Budget<F> {
    fn eval(&mut self, x: &[f64]) -> Option<f64> {
        if self.used >= self.limit {
            return None;
        }
        self.used += 1;
        let value = (self.objective)(x);
        Some(if value.is_nan() { f64::INFINITY } else { value })
    }
}

impl PatternSearch {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>, xtol_rel: f64, max_evaluations: usize) -> Self {
        PatternSearch { lower, upper, xtol_rel, max_evaluations }
    }

    fn check(&self, x0: &[f64]) -> PlannerResult<()> {
        let n = x0.len();
        if n == 0 || self.lower.len() != n || self.upper.len() != n {
            return Err(PlannerError::InvalidConfiguration(format!(
                "dimension mismatch: start {}, lower {}, upper {}",
                n,
                self.lower.len(),
                self.upper.len()
            )));
        }
        if self.max_evaluations == 0 {
            return Err(PlannerError::InvalidConfiguration("evaluation budget is zero".into()));
        }
        if !(self.xtol_rel >= 0.0) {
            return Err(PlannerError::InvalidConfiguration(format!(
                "relative tolerance must be non-negative, got {}",
                self.xtol_rel
            )));
        }
        for i in 0..n {
            if !(self.lower[i].is_finite() && self.upper[i].is_finite() && self.lower[i] <= self.upper[i]) {
                return Err(PlannerError::InvalidConfiguration(format!(
                    "bad bounds [{}, {}] at index {}",
                    self.lower[i], self.upper[i], i
                )));
            }
        }
        Ok(())
    }

    fn clip(&self, i: usize, value: f64) -> f64 {
        if value.is_nan() {
            return self.lower[i];
        }
        value.clamp(self.lower[i], self.upper[i])
    }

    /// Minimizes `objective` starting from `x0` (clipped into the bounds first).
    pub fn minimize<F>(&self, objective: F, x0: &[f64]) -> PlannerResult<SolverOutcome>
    where
        F: FnMut(&[f64]) -> f64,
    {
        self.check(x0)?;
        let n = x0.len();
        let mut budget = Budget { objective, used: 0, limit: self.max_evaluations };

        let mut x: Vec<f64> = x0.iter().enumerate().map(|(i, v)| self.clip(i, *v)).collect();
        let Some(mut fx) = budget.eval(&x) else {
            return Err(PlannerError::InvalidConfiguration("evaluation budget is zero".into()));
        };
        let mut steps: Vec<f64> = (0..n).map(|i| 0.5 * (self.upper[i] - self.lower[i])).collect();

        let status = loop {
            let small_enough = steps
                .iter()
                .zip(x.iter())
                .all(|(s, xi)| *s <= self.xtol_rel * xi.abs().max(1.0));
            if small_enough {
                break SolverStatus::XtolReached;
            }

            let base = x.clone();
            match self.explore(&mut budget, &mut x, &mut fx, &steps) {
                None => break SolverStatus::MaxEvaluationsReached,
                Some(false) => {
                    for s in steps.iter_mut() {
                        *s *= 0.5;
                    }
                }
                Some(true) => {
                    if self.pattern_moves(&mut budget, base, &mut x, &mut fx, &steps) {
                        break SolverStatus::MaxEvaluationsReached;
                    }
                }
            }
        };

        Ok(SolverOutcome { x, cost: fx, evaluations: budget.used, status })
    }

    /// Polls every coordinate at +step then -step, accepting the first improvement.
    /// Returns None when the budget runs out (x and fx still hold the best point),
    /// otherwise whether anything improved.
    fn explore<F: FnMut(&[f64]) -> f64>(
        &self,
        budget: &mut Budget<F>,
        x: &mut [f64],
        fx: &mut f64,
        steps: &[f64],
    ) -> Option<bool> {
        let mut improved = false;
        for i in 0..x.len() {
            if steps[i] <= 0.0 {
                continue;
            }
            let original = x[i];
            let mut moved = false;
            for direction in [1.0, -1.0] {
                let candidate = self.clip(i, original + direction * steps[i]);
                if candidate == original {
                    continue;
                }
                x[i] = candidate;
                match budget.eval(x) {
                    None => {
                        x[i] = original;
                        return None;
                    }
                    Some(value) if value < *fx => {
                        *fx = value;
                        improved = true;
                        moved = true;
                        break;
                    }
                    Some(_) => {}
                }
            }
            if !moved {
                x[i] = original;
            }
        }
        Some(improved)
    }

    /// Keeps extrapolating along the last successful direction while that pays off.
    /// Returns true if the budget ran out.
    fn pattern_moves<F: FnMut(&[f64]) -> f64>(
        &self,
        budget: &mut Budget<F>,
        mut previous: Vec<f64>,
        x: &mut Vec<f64>,
        fx: &mut f64,
        steps: &[f64],
    ) -> bool {
        loop {
            let mut probe: Vec<f64> = x
                .iter()
                .zip(previous.iter())
                .enumerate()
                .map(|(i, (xi, pi))| self.clip(i, 2.0 * xi - pi))
                .collect();
            let Some(mut f_probe) = budget.eval(&probe) else {
                return true;
            };
            let swept = self.explore(budget, &mut probe, &mut f_probe, steps);
            let better = f_probe < *fx;
            if better {
                previous = std::mem::replace(x, probe);
                *fx = f_probe;
            }
            if swept.is_none() {
                return true;
            }
            if !better {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl(center: &[f64]) -> impl FnMut(&[f64]) -> f64 + '_ {
        move |x: &[f64]| x.iter().zip(center).map(|(a, b)| (a - b) * (a - b)).sum()
    }

    #[test]
    fn test_finds_interior_minimum() {
        let center = [0.3, -0.25, 0.1];
        let solver = PatternSearch::new(vec![-1.0; 3], vec![1.0; 3], 1e-7, 10_000);
        let outcome = solver.minimize(bowl(&center), &[0.0, 0.0, 0.0]).unwrap();
        assert!(outcome.converged(), "Status {:?}", outcome.status);
        for (x, c) in outcome.x.iter().zip(center.iter()) {
            assert!((x - c).abs() < 1e-5, "Got {:?}", outcome.x);
        }
        assert!(outcome.evaluations <= 10_000);
    }

    #[test]
    fn test_minimum_outside_bounds_lands_on_bound() {
        let center = [2.0, -3.0];
        let solver = PatternSearch::new(vec![-0.1, -0.1], vec![0.1, 0.1], 1e-6, 5_000);
        let outcome = solver.minimize(bowl(&center), &[0.0, 0.0]).unwrap();
        assert_eq!(outcome.x, vec![0.1, -0.1]);
    }

    #[test]
    fn test_start_is_clipped() {
        let solver = PatternSearch::new(vec![-0.1], vec![0.1], 1e-6, 1);
        let outcome = solver.minimize(|x: &[f64]| x[0] * x[0], &[5.0]).unwrap();
        assert_eq!(outcome.x, vec![0.1]);
        assert_eq!(outcome.evaluations, 1);
        assert_eq!(outcome.status, SolverStatus::MaxEvaluationsReached);
    }

    #[test]
    fn test_budget_is_respected() {
        let center = [0.3, -0.25, 0.1, 0.05];
        let mut calls = 0;
        let solver = PatternSearch::new(vec![-1.0; 4], vec![1.0; 4], 1e-12, 15);
        let start_cost: f64 = center.iter().map(|c| c * c).sum();
        let outcome = solver
            .minimize(
                |x: &[f64]| {
                    calls += 1;
                    x.iter().zip(center.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
                },
                &[0.0; 4],
            )
            .unwrap();
        assert_eq!(calls, 15);
        assert_eq!(outcome.evaluations, 15);
        assert!(!outcome.converged());
        assert!(outcome.cost <= start_cost);
    }

    #[test]
    fn test_nan_is_never_accepted() {
        let solver = PatternSearch::new(vec![-1.0], vec![1.0], 1e-6, 500);
        let outcome = solver
            .minimize(|x: &[f64]| if x[0] > 0.0 { f64::NAN } else { (x[0] + 0.5).abs() }, &[0.0])
            .unwrap();
        assert!(outcome.x[0] <= 0.0);
        assert!((outcome.x[0] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_setup() {
        let solver = PatternSearch::new(vec![-1.0; 2], vec![1.0; 3], 1e-6, 100);
        assert!(matches!(
            solver.minimize(|_: &[f64]| 0.0, &[0.0; 2]),
            Err(PlannerError::InvalidConfiguration(_))
        ));
        let solver = PatternSearch::new(vec![1.0], vec![-1.0], 1e-6, 100);
        assert!(solver.minimize(|_: &[f64]| 0.0, &[0.0]).is_err());
        let solver = PatternSearch::new(vec![-1.0], vec![1.0], 1e-6, 0);
        assert!(solver.minimize(|_: &[f64]| 0.0, &[0.0]).is_err());
    }

    #[test]
    fn test_degenerate_bounds_converge_immediately() {
        let solver = PatternSearch::new(vec![0.2, 0.2], vec![0.2, 0.2], 1e-6, 100);
        let outcome = solver.minimize(|x: &[f64]| x[0] + x[1], &[0.0, 0.0]).unwrap();
        assert!(outcome.converged());
        assert_eq!(outcome.evaluations, 1);
        assert_eq!(outcome.x, vec![0.2, 0.2]);
    }
}
