// /////////////////////////////////////////////////////////////////////////////
// Pipeline Scheduler RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Regression Primitives
//!
//! The three estimators the performance predictor is built from:
//!
//! - [`nnls`]: non-negative least squares (Lawson–Hanson active-set method)
//!   for fits of the form `y = a·x + b` where negative coefficients are
//!   physically meaningless (durations and volumes cannot shrink when the
//!   pipeline input grows)
//! - [`weighted_linear_fit`]: weighted ordinary least squares in closed
//!   form, used where larger measurement runs should anchor the fit
//! - [`RandomForestRegressor`]: a bagged ensemble of single-feature
//!   regression trees with a fixed seed, used for the noisy CPU and memory
//!   targets where a line underfits
//!
//! All predictions made from these primitives are clipped at zero by the
//! callers.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f64 = 1e-10;

/// Solves `min ||A·x - y||` subject to `x >= 0` with the Lawson–Hanson
/// active-set method.
///
/// Suitable for the small, well-conditioned systems the estimators build
/// (two coefficients, a handful of samples). Returns the zero vector when no
/// coefficient improves the fit.
pub fn nnls(a: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = a.ncols();
    let mut x = Array1::<f64>::zeros(n);
    let mut passive = vec![false; n];
    let max_outer_iterations = 3 * n.max(1);

    for _ in 0..max_outer_iterations {
        let residual = y - &a.dot(&x);
        let gradient = a.t().dot(&residual);

        // Most promising coordinate still clamped at zero
        let candidate = (0..n)
            .filter(|&j| !passive[j] && gradient[j] > TOLERANCE)
            .max_by(|&i, &j| gradient[i].total_cmp(&gradient[j]));
        let Some(next) = candidate else {
            break;
        };
        passive[next] = true;

        loop {
            let Some(unconstrained) = solve_passive_subproblem(a, y, &passive) else {
                // Singular subproblem: drop the coordinate again and stop
                passive[next] = false;
                return x.mapv_into(|v| v.max(0.0));
            };
            let feasible = (0..n)
                .filter(|&k| passive[k])
                .all(|k| unconstrained[k] > TOLERANCE);
            if feasible {
                x = unconstrained;
                break;
            }

            // Step toward the unconstrained solution as far as feasibility
            // allows, then release the coordinates that hit zero
            let mut alpha = f64::INFINITY;
            for k in (0..n).filter(|&k| passive[k] && unconstrained[k] <= TOLERANCE) {
                let denominator = x[k] - unconstrained[k];
                if denominator > 0.0 {
                    alpha = alpha.min(x[k] / denominator);
                }
            }
            if !alpha.is_finite() {
                x = unconstrained;
                break;
            }
            x = &x + &((&unconstrained - &x) * alpha);
            for k in 0..n {
                if passive[k] && x[k].abs() < TOLERANCE {
                    passive[k] = false;
                    x[k] = 0.0;
                }
            }
        }
    }

    x.mapv_into(|v| v.max(0.0))
}

/// Least-squares solution restricted to the passive columns, via the normal
/// equations. `None` when the reduced system is singular.
fn solve_passive_subproblem(
    a: &Array2<f64>,
    y: &Array1<f64>,
    passive: &[bool],
) -> Option<Array1<f64>> {
    let columns: Vec<usize> = (0..a.ncols()).filter(|&j| passive[j]).collect();
    if columns.is_empty() {
        return Some(Array1::zeros(a.ncols()));
    }
    let k = columns.len();

    let mut normal = Array2::<f64>::zeros((k, k));
    let mut rhs = Array1::<f64>::zeros(k);
    for (i, &ci) in columns.iter().enumerate() {
        rhs[i] = a.column(ci).dot(y);
        for (j, &cj) in columns.iter().enumerate() {
            normal[(i, j)] = a.column(ci).dot(&a.column(cj));
        }
    }

    let reduced = solve_linear_system(normal, rhs)?;
    let mut full = Array1::<f64>::zeros(a.ncols());
    for (i, &ci) in columns.iter().enumerate() {
        full[ci] = reduced[i];
    }
    Some(full)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut m: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| m[(i, col)].abs().total_cmp(&m[(j, col)].abs()))
            .expect("non-empty pivot range");
        if m[(pivot_row, col)].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = m[(col, k)];
                m[(col, k)] = m[(pivot_row, k)];
                m[(pivot_row, k)] = tmp;
            }
            b.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = m[(row, col)] / m[(col, col)];
            for k in col..n {
                m[(row, k)] -= factor * m[(col, k)];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= m[(row, k)] * x[k];
        }
        x[row] = sum / m[(row, row)];
    }
    Some(x)
}

/// A fitted line `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Weighted ordinary least squares in closed form. Degenerate inputs (empty,
/// zero total weight, no spread in x) fall back to the weighted mean.
pub fn weighted_linear_fit(x: &[f64], y: &[f64], weights: &[f64]) -> LinearModel {
    let total_weight: f64 = weights.iter().sum();
    if x.is_empty() || total_weight <= 0.0 {
        return LinearModel {
            slope: 0.0,
            intercept: mean(y),
        };
    }

    let x_mean = dot(weights, x) / total_weight;
    let y_mean = dot(weights, y) / total_weight;
    let mut variance = 0.0;
    let mut covariance = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - x_mean;
        variance += weights[i] * dx * dx;
        covariance += weights[i] * dx * (y[i] - y_mean);
    }
    if variance < TOLERANCE {
        return LinearModel {
            slope: 0.0,
            intercept: y_mean,
        };
    }
    let slope = covariance / variance;
    LinearModel {
        slope,
        intercept: y_mean - slope * x_mean,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

const FOREST_SIZE: usize = 100;
const FOREST_SEED: u64 = 42;
const MAX_TREE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, x: f64) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                threshold,
                left,
                right,
            } => {
                if x <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }
}

/// A bagged ensemble of single-feature regression trees.
///
/// 100 trees, each grown on a bootstrap sample drawn from a generator seeded
/// with a fixed constant, so identical corpora always produce identical
/// predictions.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    trees: Vec<TreeNode>,
}

impl RandomForestRegressor {
    /// Fits the forest; `None` when the training set is empty.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(FOREST_SEED);
        let trees = (0..FOREST_SIZE)
            .map(|_| {
                let mut sample_x = Vec::with_capacity(n);
                let mut sample_y = Vec::with_capacity(n);
                for _ in 0..n {
                    let index = rng.random_range(0..n);
                    sample_x.push(x[index]);
                    sample_y.push(y[index]);
                }
                build_tree(&sample_x, &sample_y, 0)
            })
            .collect();
        Some(RandomForestRegressor { trees })
    }

    /// The ensemble mean at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(x)).sum();
        sum / self.trees.len() as f64
    }
}

fn build_tree(x: &[f64], y: &[f64], depth: usize) -> TreeNode {
    let node_mean = mean(y);
    if x.len() < 2 || depth >= MAX_TREE_DEPTH {
        return TreeNode::Leaf { value: node_mean };
    }

    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&i, &j| x[i].total_cmp(&x[j]));

    // Prefix sums over the sorted samples for O(n) split evaluation
    let n = order.len();
    let mut prefix_sum = vec![0.0; n + 1];
    let mut prefix_sum_sq = vec![0.0; n + 1];
    for (rank, &i) in order.iter().enumerate() {
        prefix_sum[rank + 1] = prefix_sum[rank] + y[i];
        prefix_sum_sq[rank + 1] = prefix_sum_sq[rank] + y[i] * y[i];
    }
    let total_sse = prefix_sum_sq[n] - prefix_sum[n] * prefix_sum[n] / n as f64;

    let mut best: Option<(usize, f64, f64)> = None; // (split rank, threshold, sse)
    for rank in 1..n {
        let (lo, hi) = (x[order[rank - 1]], x[order[rank]]);
        if lo == hi {
            continue;
        }
        let left_n = rank as f64;
        let right_n = (n - rank) as f64;
        let left_sse = prefix_sum_sq[rank] - prefix_sum[rank] * prefix_sum[rank] / left_n;
        let right_sum = prefix_sum[n] - prefix_sum[rank];
        let right_sse = (prefix_sum_sq[n] - prefix_sum_sq[rank]) - right_sum * right_sum / right_n;
        let sse = left_sse + right_sse;
        if best.map_or(true, |(_, _, best_sse)| sse < best_sse) {
            best = Some((rank, (lo + hi) / 2.0, sse));
        }
    }

    match best {
        // Split while the node still has variance to reduce
        Some((rank, threshold, _)) if total_sse > TOLERANCE => {
            let left_indices = &order[..rank];
            let right_indices = &order[rank..];
            let left_x: Vec<f64> = left_indices.iter().map(|&i| x[i]).collect();
            let left_y: Vec<f64> = left_indices.iter().map(|&i| y[i]).collect();
            let right_x: Vec<f64> = right_indices.iter().map(|&i| x[i]).collect();
            let right_y: Vec<f64> = right_indices.iter().map(|&i| y[i]).collect();
            TreeNode::Split {
                threshold,
                left: Box::new(build_tree(&left_x, &left_y, depth + 1)),
                right: Box::new(build_tree(&right_x, &right_y, depth + 1)),
            }
        }
        _ => TreeNode::Leaf { value: node_mean },
    }
}
