//! Nelder-Mead simplex refinement
//!
//! A derivative-free local minimizer used to polish the continuous
//! parameters of top-ranked individuals. Box constraints are soft: a trial
//! point outside its box is not rejected, its objective is charged a
//! penalty of twenty times the magnitude of the first evaluated objective
//! value, which pushes the simplex back inward while keeping the search
//! continuous. Residual excursions are clamped by the caller before any
//! result is committed.

use serde::{Deserialize, Serialize};

/// Default relative perturbation used to seed the initial simplex
const DEFAULT_INITIAL_STEP: f64 = 0.05;

/// Out-of-box penalty as a multiple of the first objective magnitude
const PENALTY_SCALE: f64 = 20.0;

/// Nelder-Mead downhill simplex minimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplexOptimizer {
    /// Fractional convergence tolerance on the objective spread
    pub ftol: f64,
    /// Iteration cap
    pub max_iterations: usize,
    /// Relative perturbation of each parameter when seeding the simplex,
    /// as a fraction of its box width
    pub initial_step: f64,
}

/// Outcome of a simplex run
#[derive(Debug, Clone)]
pub struct SimplexResult {
    /// Best vertex found (may sit slightly outside the box; clamp before use)
    pub point: Vec<f64>,
    /// Objective value at the best vertex, penalty included
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether the spread criterion was met before the iteration cap
    pub converged: bool,
}

/// Objective wrapper charging the out-of-box penalty
struct Penalized<'a, F> {
    f: F,
    bounds: &'a [(f64, f64)],
    first: Option<f64>,
}

impl<F: FnMut(&[f64]) -> f64> Penalized<'_, F> {
    fn eval(&mut self, x: &[f64]) -> f64 {
        let raw = (self.f)(x);
        let base = *self.first.get_or_insert(raw);
        let out = x
            .iter()
            .zip(self.bounds)
            .any(|(&v, &(lo, hi))| v < lo || v > hi);
        if out {
            log::debug!("simplex trial point outside box, penalizing");
            raw + PENALTY_SCALE * base.abs()
        } else {
            raw
        }
    }
}

impl SimplexOptimizer {
    /// Create an optimizer with the given termination settings
    pub fn new(ftol: f64, max_iterations: usize) -> Self {
        Self {
            ftol,
            max_iterations,
            initial_step: DEFAULT_INITIAL_STEP,
        }
    }

    /// Set the relative initial-simplex perturbation
    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Minimize `f` starting from `start`, one box per parameter.
    ///
    /// Terminates when `2*|y_hi - y_lo| / (|y_hi| + |y_lo|) < ftol` or
    /// after `max_iterations`.
    pub fn minimize<F>(&self, start: &[f64], bounds: &[(f64, f64)], f: F) -> SimplexResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = start.len();
        debug_assert_eq!(n, bounds.len());

        let mut obj = Penalized {
            f,
            bounds,
            first: None,
        };

        if n == 0 {
            return SimplexResult {
                point: Vec::new(),
                value: obj.eval(start),
                iterations: 0,
                converged: true,
            };
        }

        // initial simplex: start plus one vertex per parameter, each offset
        // by a fraction of its box width; the offset flips sign when the
        // start sits too close to the upper bound
        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(start.to_vec());
        for i in 0..n {
            let (lo, hi) = bounds[i];
            let span = hi - lo;
            let mut dx = if span > 0.0 {
                self.initial_step * span
            } else {
                self.initial_step
            };
            if start[i] + dx > hi {
                dx = -dx;
            }
            let mut v = start.to_vec();
            v[i] += dx;
            simplex.push(v);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| obj.eval(v)).collect();

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            // rank the vertices
            let mut lo = 0;
            let mut hi = 0;
            for (i, &y) in values.iter().enumerate() {
                if y < values[lo] {
                    lo = i;
                }
                if y > values[hi] {
                    hi = i;
                }
            }
            let mut next_hi = lo;
            for (i, &y) in values.iter().enumerate() {
                if i != hi && y > values[next_hi] {
                    next_hi = i;
                }
            }

            let denom = values[hi].abs() + values[lo].abs();
            let rtol = if denom > 0.0 {
                2.0 * (values[hi] - values[lo]).abs() / denom
            } else {
                0.0
            };
            if rtol < self.ftol {
                converged = true;
                break;
            }
            iterations += 1;

            // centroid of every vertex but the worst
            let mut centroid = vec![0.0; n];
            for (i, v) in simplex.iter().enumerate() {
                if i != hi {
                    for (c, &x) in centroid.iter_mut().zip(v) {
                        *c += x;
                    }
                }
            }
            for c in &mut centroid {
                *c /= n as f64;
            }

            // reflection
            let reflected: Vec<f64> = centroid
                .iter()
                .zip(&simplex[hi])
                .map(|(&c, &w)| c + (c - w))
                .collect();
            let y_reflected = obj.eval(&reflected);

            if y_reflected < values[lo] {
                // expansion
                let expanded: Vec<f64> = centroid
                    .iter()
                    .zip(&simplex[hi])
                    .map(|(&c, &w)| c + 2.0 * (c - w))
                    .collect();
                let y_expanded = obj.eval(&expanded);
                if y_expanded < y_reflected {
                    simplex[hi] = expanded;
                    values[hi] = y_expanded;
                } else {
                    simplex[hi] = reflected;
                    values[hi] = y_reflected;
                }
            } else if y_reflected < values[next_hi] {
                simplex[hi] = reflected;
                values[hi] = y_reflected;
            } else {
                // contraction toward the centroid
                let contracted: Vec<f64> = centroid
                    .iter()
                    .zip(&simplex[hi])
                    .map(|(&c, &w)| c + 0.5 * (w - c))
                    .collect();
                let y_contracted = obj.eval(&contracted);
                if y_contracted < values[hi] {
                    simplex[hi] = contracted;
                    values[hi] = y_contracted;
                } else {
                    // shrink every vertex toward the best
                    let best = simplex[lo].clone();
                    for (i, v) in simplex.iter_mut().enumerate() {
                        if i != lo {
                            for (x, &b) in v.iter_mut().zip(&best) {
                                *x = b + 0.5 * (*x - b);
                            }
                            values[i] = obj.eval(v);
                        }
                    }
                }
            }
        }

        let best = values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        SimplexResult {
            point: simplex.swap_remove(best),
            value: values[best],
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimizes_quadratic_1d() {
        let opt = SimplexOptimizer::new(1e-10, 500);
        let result = opt.minimize(&[8.0], &[(-10.0, 10.0)], |x| (x[0] - 3.0).powi(2));

        assert!(result.converged);
        assert_relative_eq!(result.point[0], 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_minimizes_sphere_3d() {
        let opt = SimplexOptimizer::new(1e-12, 2000);
        let result = opt.minimize(
            &[2.0, -1.5, 0.5],
            &[(-5.0, 5.0), (-5.0, 5.0), (-5.0, 5.0)],
            |x| x.iter().map(|v| v * v).sum::<f64>(),
        );

        assert!(result.converged);
        for v in &result.point {
            assert!(v.abs() < 1e-3);
        }
    }

    #[test]
    fn test_respects_iteration_cap() {
        let opt = SimplexOptimizer::new(0.0, 7); // ftol 0 never triggers
        let result = opt.minimize(&[1.0, 1.0], &[(-5.0, 5.0), (-5.0, 5.0)], |x| {
            x.iter().map(|v| v * v).sum::<f64>()
        });

        assert!(!result.converged);
        assert_eq!(result.iterations, 7);
    }

    #[test]
    fn test_penalty_keeps_minimum_near_box() {
        // unconstrained minimum at x = 12, box is [-10, 10]
        let opt = SimplexOptimizer::new(1e-10, 500);
        let result = opt.minimize(&[0.0], &[(-10.0, 10.0)], |x| (x[0] - 12.0).powi(2));

        // the penalty pushes the simplex inward; any residual excursion is
        // small and clamped by the caller
        assert!(result.point[0] <= 10.5);
        assert!(result.point[0] > 5.0);
    }

    #[test]
    fn test_zero_dimensions_is_trivially_converged() {
        let opt = SimplexOptimizer::new(1e-8, 100);
        let result = opt.minimize(&[], &[], |_| 4.2);

        assert!(result.converged);
        assert_eq!(result.value, 4.2);
        assert!(result.point.is_empty());
    }

    #[test]
    fn test_starting_at_upper_bound_seeds_inward() {
        let opt = SimplexOptimizer::new(1e-10, 500);
        let result = opt.minimize(&[10.0], &[(-10.0, 10.0)], |x| (x[0] + 2.0).powi(2));

        assert!(result.converged);
        assert_relative_eq!(result.point[0], -2.0, epsilon = 1e-3);
    }
}
