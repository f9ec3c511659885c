//! # Allocation Reporter
//!
//! $$
//! a_i = w_i \cdot C
//! $$
//!
//! Scale optimal weights by total capital into currency amounts.

use super::types::Position;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

/// Turn a weight vector into currency positions.
///
/// `total_investment` must be finite and non-negative; anything else fails
/// with [`PortfolioError::InvalidInput`]. Pure function, no side effects.
pub fn allocate(weights: &Weights, total_investment: f64) -> Result<Vec<Position>> {
  if !total_investment.is_finite() || total_investment < 0.0 {
    return Err(PortfolioError::InvalidInput(format!(
      "total investment must be finite and non-negative, got {total_investment}"
    )));
  }

  Ok(
    weights
      .symbols
      .iter()
      .zip(&weights.values)
      .map(|(symbol, &weight)| Position {
        symbol: symbol.clone(),
        weight,
        allocation: weight * total_investment,
      })
      .collect(),
  )
}
