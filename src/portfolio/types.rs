//! # Portfolio Types
//!
//! $$
//! \sum_i w_i = 1, \quad 0 \le w_i \le 1
//! $$
//!
//! Shared result containers for the allocation pipeline.

use std::fmt::Display;

/// Why an asset was left out of the optimized universe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExclusionReason {
  /// No usable price observations after input sanitation.
  EmptySeries,
  /// Fewer than two consecutive observed prices, so no return can be formed.
  InsufficientHistory,
  /// Annualized moments contained NaN or infinite entries.
  NonFiniteMoments,
}

impl Display for ExclusionReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::EmptySeries => write!(f, "no usable price observations"),
      Self::InsufficientHistory => write!(f, "fewer than two consecutive prices"),
      Self::NonFiniteMoments => write!(f, "non-finite annualized moments"),
    }
  }
}

/// Record of an asset dropped before optimization.
#[derive(Clone, Debug)]
pub struct Exclusion {
  /// Asset identifier.
  pub symbol: String,
  /// Why the asset was dropped.
  pub reason: ExclusionReason,
}

/// Long-only weight vector over the surviving assets.
#[derive(Clone, Debug)]
pub struct Weights {
  /// Asset identifiers, index-aligned with `values`.
  pub symbols: Vec<String>,
  /// Weight per asset, each in [0, 1], summing to one.
  pub values: Vec<f64>,
}

/// One asset's share of the final allocation.
#[derive(Clone, Debug)]
pub struct Position {
  /// Asset identifier.
  pub symbol: String,
  /// Fraction of capital assigned to the asset.
  pub weight: f64,
  /// Currency amount assigned to the asset.
  pub allocation: f64,
}

/// Complete output of one allocation run.
#[derive(Clone, Debug)]
pub struct PortfolioReport {
  /// Optimized positions over the surviving assets.
  pub positions: Vec<Position>,
  /// Annualized portfolio expected return, `μ·w`.
  pub expected_return: f64,
  /// Annualized portfolio variance, `wᵀΣw`.
  pub variance: f64,
  /// Assets omitted along the way and why.
  pub excluded: Vec<Exclusion>,
}
