//! # Errors
//!
//! $$
//! r^\* \in [\min_i \mu_i, \max_i \mu_i]
//! $$
//!
//! Error taxonomy for the allocation pipeline. Each stage fails fast with the
//! most specific variant; partial results are never surfaced as success.

use thiserror::Error;

/// Errors produced by the allocation pipeline.
#[derive(Debug, Error)]
pub enum PortfolioError {
  /// The merged price table has no usable date axis.
  #[error("schema error: {0}")]
  Schema(String),

  /// No usable rows remained after filtering.
  #[error("empty data: {0}")]
  EmptyData(String),

  /// The target return is unreachable under the full-investment and
  /// no-short-selling constraints.
  #[error("target return {target:.4} outside achievable range [{min:.4}, {max:.4}]")]
  InfeasibleTarget {
    /// Requested annualized portfolio return.
    target: f64,
    /// Smallest achievable expected return.
    min: f64,
    /// Largest achievable expected return.
    max: f64,
  },

  /// The solver failed to produce a usable optimum.
  #[error("solver failed after {attempts} attempt(s): {detail}")]
  Convergence {
    /// Solve attempts made before giving up.
    attempts: u32,
    /// Last solver status or constraint violation observed.
    detail: String,
  },

  /// A caller-supplied scalar was out of domain.
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PortfolioError>;
