//! # Portfolio Optimizer
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mu^\top \mathbf{w} = r^\*, \ \mathbf{1}^\top \mathbf{w} = 1, \ 0 \le w_i \le 1
//! $$
//!
//! Long-only minimum-variance solve at a target expected return, built on
//! the Clarabel interior-point conic solver: the two equalities live in a
//! zero cone and the box bounds in a nonnegative cone.

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettings;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT;
use nalgebra::DMatrix;
use nalgebra::DVector;

use super::moments::MomentModel;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

/// Tunables for the constrained min-variance solve.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
  /// Iteration cap for the first attempt, doubled on each retry.
  pub max_iter: u32,
  /// Tolerance for feasibility checks and post-solve bound clamping.
  pub tolerance: f64,
  /// Total solve attempts before reporting non-convergence.
  pub max_attempts: u32,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iter: 200,
      tolerance: 1e-8,
      max_attempts: 3,
    }
  }
}

/// Minimize portfolio variance subject to a target expected return, full
/// investment and no short selling.
///
/// The target must lie inside `[min(μ), max(μ)]`; under the simplex
/// constraints the portfolio return is a convex combination of the asset
/// means, so anything outside that interval fails with
/// [`PortfolioError::InfeasibleTarget`] before the solver runs. A solver
/// that still reports primal infeasibility maps to the same error, never
/// to a degenerate weight vector. Deterministic for identical inputs.
pub fn optimize_min_variance(
  model: &MomentModel,
  target_return: f64,
  config: &OptimizerConfig,
) -> Result<Weights> {
  if !target_return.is_finite() {
    return Err(PortfolioError::InvalidInput(
      "target return must be finite".into(),
    ));
  }

  let n = model.len();
  if n == 0 {
    return Err(PortfolioError::EmptyData("no assets to optimize".into()));
  }

  let mu = model.mean();
  let min = mu.min();
  let max = mu.max();

  // A single asset leaves no freedom: either the target is its expected
  // return or nothing is feasible. Handing n = 1 to the general solver
  // only invites spurious convergence failures.
  if n == 1 {
    if (mu[0] - target_return).abs() <= config.tolerance {
      return Ok(Weights {
        symbols: model.symbols().to_vec(),
        values: vec![1.0],
      });
    }
    return Err(PortfolioError::InfeasibleTarget {
      target: target_return,
      min,
      max,
    });
  }

  if target_return < min - config.tolerance || target_return > max + config.tolerance {
    return Err(PortfolioError::InfeasibleTarget {
      target: target_return,
      min,
      max,
    });
  }

  let p = quadratic_cost(model.cov());
  let q = vec![0.0; n];
  let (a, b, cones) = constraint_system(mu, target_return);

  let mut max_iter = config.max_iter;
  let mut last_status = SolverStatus::Unsolved;

  for attempt in 1..=config.max_attempts {
    let settings = DefaultSettings::<f64> {
      verbose: false,
      max_iter,
      tol_gap_abs: config.tolerance,
      tol_gap_rel: config.tolerance,
      ..DefaultSettings::default()
    };

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
    solver.solve();

    match solver.solution.status {
      SolverStatus::Solved => {
        return finish(model, &solver.solution.x, config, attempt);
      }
      SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
        return Err(PortfolioError::InfeasibleTarget {
          target: target_return,
          min,
          max,
        });
      }
      status => {
        tracing::debug!(?status, attempt, max_iter, "solve attempt did not converge");
        last_status = status;
        max_iter = max_iter.saturating_mul(2);
      }
    }
  }

  Err(PortfolioError::Convergence {
    attempts: config.max_attempts,
    detail: format!("last solver status {last_status:?}"),
  })
}

/// Validate the raw optimum against the box bounds and renormalize.
///
/// Entries are clamped into [0, 1] only when they violate a bound by at
/// most `tolerance`, and the sum may drift from one by at most 1e-6;
/// anything worse is a convergence failure, not something to paper over.
fn finish(model: &MomentModel, x: &[f64], config: &OptimizerConfig, attempts: u32) -> Result<Weights> {
  let tol = config.tolerance;
  let mut values = Vec::with_capacity(x.len());

  for &w in x {
    if w < -tol || w > 1.0 + tol {
      return Err(PortfolioError::Convergence {
        attempts,
        detail: format!("weight {w} outside [0, 1] beyond tolerance {tol}"),
      });
    }
    values.push(w.clamp(0.0, 1.0));
  }

  let sum: f64 = values.iter().sum();
  if (sum - 1.0).abs() > 1e-6 {
    return Err(PortfolioError::Convergence {
      attempts,
      detail: format!("weights sum to {sum}, not 1"),
    });
  }
  for w in &mut values {
    *w /= sum;
  }

  Ok(Weights {
    symbols: model.symbols().to_vec(),
    values,
  })
}

/// Upper triangle of `2Σ` in compressed sparse column form, so that
/// Clarabel's `(1/2)wᵀPw` objective equals `wᵀΣw`.
fn quadratic_cost(cov: &DMatrix<f64>) -> CscMatrix<f64> {
  let n = cov.ncols();
  let mut colptr = Vec::with_capacity(n + 1);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..n {
    for i in 0..=j {
      let v = 2.0 * cov[(i, j)];
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(rowval.len());
  }

  CscMatrix::new(n, n, colptr, rowval, nzval)
}

/// Constraint block `Aw + s = b` over a zero cone (target return and full
/// investment) followed by a nonnegative cone (`w ≥ 0` and `w ≤ 1`).
fn constraint_system(
  mu: &DVector<f64>,
  target_return: f64,
) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
  let n = mu.len();
  let m = 2 + 2 * n;

  let mut colptr = Vec::with_capacity(n + 1);
  let mut rowval = Vec::with_capacity(4 * n);
  let mut nzval = Vec::with_capacity(4 * n);

  colptr.push(0);
  for j in 0..n {
    rowval.push(0);
    nzval.push(mu[j]);
    rowval.push(1);
    nzval.push(1.0);
    // w_j >= 0 as s = w_j in the nonnegative cone
    rowval.push(2 + j);
    nzval.push(-1.0);
    // w_j <= 1 as s = 1 - w_j in the nonnegative cone
    rowval.push(2 + n + j);
    nzval.push(1.0);
    colptr.push(rowval.len());
  }

  let mut b = vec![0.0; m];
  b[0] = target_return;
  b[1] = 1.0;
  for j in 0..n {
    b[2 + n + j] = 1.0;
  }

  let a = CscMatrix::new(m, n, colptr, rowval, nzval);
  let cones = vec![
    SupportedConeT::ZeroConeT(2),
    SupportedConeT::NonnegativeConeT(2 * n),
  ];

  (a, b, cones)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn model(symbols: &[&str], mean: &[f64], cov: &[f64]) -> MomentModel {
    let n = symbols.len();
    MomentModel::new(
      symbols.iter().map(|s| s.to_string()).collect(),
      DVector::from_column_slice(mean),
      DMatrix::from_row_slice(n, n, cov),
    )
    .unwrap()
  }

  #[test]
  fn two_asset_equality_constraints_pin_the_weights() {
    // Returns equidistant from the target force w = [0.5, 0.5] through the
    // two equality constraints alone; variance there is 0.0325.
    let m = model(
      &["AAA", "BBB"],
      &[0.10, 0.30],
      &[0.04, 0.0, 0.0, 0.09],
    );

    let w = optimize_min_variance(&m, 0.20, &OptimizerConfig::default()).unwrap();

    assert_abs_diff_eq!(w.values[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(w.values[1], 0.5, epsilon = 1e-6);

    let achieved: f64 = (0..2)
      .map(|i| {
        (0..2)
          .map(|j| w.values[i] * w.values[j] * m.cov()[(i, j)])
          .sum::<f64>()
      })
      .sum();
    assert_abs_diff_eq!(achieved, 0.25 * 0.04 + 0.25 * 0.09, epsilon = 1e-6);
  }

  #[test]
  fn three_asset_solution_is_feasible_and_risk_minimal() {
    let m = model(
      &["AAA", "BBB", "CCC"],
      &[0.08, 0.12, 0.20],
      &[
        0.04, 0.01, 0.00, //
        0.01, 0.09, 0.02, //
        0.00, 0.02, 0.16,
      ],
    );

    let w = optimize_min_variance(&m, 0.12, &OptimizerConfig::default()).unwrap();

    let sum: f64 = w.values.iter().sum();
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
    for &wi in &w.values {
      assert!((-1e-9..=1.0 + 1e-9).contains(&wi));
    }

    let achieved_return: f64 = w
      .values
      .iter()
      .zip(m.mean().iter())
      .map(|(&wi, &mi)| wi * mi)
      .sum();
    assert_abs_diff_eq!(achieved_return, 0.12, epsilon = 1e-6);
  }

  #[test]
  fn single_asset_target_at_mean_gets_full_weight() {
    let m = model(&["AAA"], &[0.15], &[0.04]);
    let w = optimize_min_variance(&m, 0.15, &OptimizerConfig::default()).unwrap();
    assert_eq!(w.values, vec![1.0]);
  }

  #[test]
  fn single_asset_unreachable_target_is_infeasible() {
    let m = model(&["AAA"], &[0.15], &[0.04]);
    let err = optimize_min_variance(&m, 0.25, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, PortfolioError::InfeasibleTarget { .. }));
  }

  #[test]
  fn target_above_best_asset_is_infeasible() {
    let m = model(
      &["AAA", "BBB"],
      &[0.10, 0.30],
      &[0.04, 0.0, 0.0, 0.09],
    );

    let err = optimize_min_variance(&m, 0.40, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::InfeasibleTarget {
        max,
        ..
      } if (max - 0.30).abs() < 1e-12
    ));
  }

  #[test]
  fn target_below_worst_asset_is_infeasible() {
    let m = model(
      &["AAA", "BBB"],
      &[0.10, 0.30],
      &[0.04, 0.0, 0.0, 0.09],
    );

    let err = optimize_min_variance(&m, 0.05, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, PortfolioError::InfeasibleTarget { .. }));
  }

  #[test]
  fn non_finite_target_is_invalid_input() {
    let m = model(&["AAA"], &[0.15], &[0.04]);
    let err = optimize_min_variance(&m, f64::NAN, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidInput(_)));
  }

  #[test]
  fn repeated_solves_agree() {
    let m = model(
      &["AAA", "BBB", "CCC"],
      &[0.08, 0.12, 0.20],
      &[
        0.04, 0.01, 0.00, //
        0.01, 0.09, 0.02, //
        0.00, 0.02, 0.16,
      ],
    );

    let first = optimize_min_variance(&m, 0.14, &OptimizerConfig::default()).unwrap();
    let second = optimize_min_variance(&m, 0.14, &OptimizerConfig::default()).unwrap();

    for (a, b) in first.values.iter().zip(second.values.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
  }
}
