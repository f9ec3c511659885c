//! # Return & Moment Estimator
//!
//! $$
//! r_t = \frac{p_t}{p_{t-1}} - 1, \quad
//! \hat\mu = P \cdot \bar r, \quad
//! \hat\Sigma = P \cdot \mathrm{cov}(r)
//! $$
//!
//! Simple period returns from the aligned price table, then annualized mean
//! and covariance. The optimizer needs a rectangular sample covering every
//! surviving asset, so return rows touching a null are dropped entirely.

use nalgebra::DMatrix;
use nalgebra::DVector;

use super::align::AlignedTable;
use super::types::Exclusion;
use super::types::ExclusionReason;
use crate::error::PortfolioError;
use crate::error::Result;

/// Rectangular matrix of simple period returns, one column per asset.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  symbols: Vec<String>,
  rows: DMatrix<f64>,
}

impl ReturnMatrix {
  /// Derive period returns from an aligned price table.
  ///
  /// Assets with fewer than two consecutive observed prices can never
  /// contribute a return; they are dropped up front and reported so a lone
  /// observation does not poison every row of the sample. Across the
  /// remaining assets, a return row exists only where the current and
  /// previous dates are fully populated.
  pub fn from_table(table: &AlignedTable) -> Result<(Self, Vec<Exclusion>)> {
    let mut excluded = Vec::new();
    let mut kept: Vec<usize> = Vec::new();

    for (i, symbol) in table.symbols().iter().enumerate() {
      if has_consecutive_pair(table.column(i)) {
        kept.push(i);
      } else {
        tracing::warn!(symbol = %symbol, "excluding asset without two consecutive prices");
        excluded.push(Exclusion {
          symbol: symbol.clone(),
          reason: ExclusionReason::InsufficientHistory,
        });
      }
    }

    if kept.is_empty() {
      return Err(PortfolioError::EmptyData(
        "no asset has two consecutive observed prices".into(),
      ));
    }

    let n = kept.len();
    let mut data: Vec<f64> = Vec::new();
    let mut n_rows = 0;

    for t in 1..table.n_dates() {
      let mut row = Vec::with_capacity(n);
      let mut complete = true;

      for &a in &kept {
        match (table.column(a)[t - 1], table.column(a)[t]) {
          (Some(prev), Some(curr)) => row.push(curr / prev - 1.0),
          _ => {
            complete = false;
            break;
          }
        }
      }

      if complete {
        data.extend(row);
        n_rows += 1;
      }
    }

    if n_rows == 0 {
      return Err(PortfolioError::EmptyData(
        "no two consecutive fully-populated dates".into(),
      ));
    }

    let symbols = kept
      .iter()
      .map(|&i| table.symbols()[i].clone())
      .collect();

    Ok((
      Self {
        symbols,
        rows: DMatrix::from_row_slice(n_rows, n, &data),
      },
      excluded,
    ))
  }

  /// Asset identifiers, one per column.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Number of return periods in the sample.
  pub fn n_periods(&self) -> usize {
    self.rows.nrows()
  }

  /// Number of assets in the sample.
  pub fn n_assets(&self) -> usize {
    self.rows.ncols()
  }
}

fn has_consecutive_pair(column: &[Option<f64>]) -> bool {
  column.windows(2).any(|w| w[0].is_some() && w[1].is_some())
}

/// Annualized expected returns and covariance over a consistent asset index.
#[derive(Clone, Debug)]
pub struct MomentModel {
  symbols: Vec<String>,
  mean: DVector<f64>,
  cov: DMatrix<f64>,
}

impl MomentModel {
  /// Build a model from externally estimated moments.
  ///
  /// The vector and the matrix must share one asset index; mismatched
  /// shapes fail with [`PortfolioError::InvalidInput`].
  pub fn new(symbols: Vec<String>, mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
    let n = symbols.len();
    if mean.len() != n || cov.nrows() != n || cov.ncols() != n {
      return Err(PortfolioError::InvalidInput(format!(
        "moment shapes disagree: {} symbols, {} means, {}x{} covariance",
        n,
        mean.len(),
        cov.nrows(),
        cov.ncols()
      )));
    }
    Ok(Self { symbols, mean, cov })
  }

  /// Estimate annualized moments from a return sample.
  ///
  /// `periods_per_year` scales the per-period mean and covariance (252 for
  /// daily data). Assets whose own annualized mean or variance is
  /// non-finite are dropped from the vector and the matrix together, so
  /// the two structures always end with an identical index.
  pub fn estimate(returns: &ReturnMatrix, periods_per_year: u32) -> Result<(Self, Vec<Exclusion>)> {
    if periods_per_year == 0 {
      return Err(PortfolioError::InvalidInput(
        "periods_per_year must be positive".into(),
      ));
    }

    let p = f64::from(periods_per_year);
    let m = returns.rows.nrows();
    let n = returns.rows.ncols();

    let mut mean = DVector::zeros(n);
    for a in 0..n {
      mean[a] = returns.rows.column(a).sum() / m as f64 * p;
    }

    // Sample covariance with the n-1 denominator; undefined for m < 2 and
    // left non-finite so the cleanup below rejects it.
    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
      for j in i..n {
        let mut acc = 0.0;
        for t in 0..m {
          let di = returns.rows[(t, i)] - mean[i] / p;
          let dj = returns.rows[(t, j)] - mean[j] / p;
          acc += di * dj;
        }
        let c = acc / (m as f64 - 1.0) * p;
        cov[(i, j)] = c;
        cov[(j, i)] = c;
      }
    }

    let mut excluded = Vec::new();
    let mut kept: Vec<usize> = Vec::new();
    for a in 0..n {
      // Judge each asset by its own mean and variance: a non-finite
      // return anywhere in column a poisons the diagonal, while its
      // cross terms would drag healthy neighbours down with it.
      let finite = mean[a].is_finite() && cov[(a, a)].is_finite();
      if finite {
        kept.push(a);
      } else {
        tracing::warn!(symbol = %returns.symbols[a], "excluding asset with non-finite moments");
        excluded.push(Exclusion {
          symbol: returns.symbols[a].clone(),
          reason: ExclusionReason::NonFiniteMoments,
        });
      }
    }

    if kept.is_empty() {
      return Err(PortfolioError::EmptyData(
        "no asset survived moment cleanup".into(),
      ));
    }

    let symbols = kept
      .iter()
      .map(|&a| returns.symbols[a].clone())
      .collect();
    let mean = DVector::from_iterator(kept.len(), kept.iter().map(|&a| mean[a]));
    let cov = DMatrix::from_fn(kept.len(), kept.len(), |i, j| cov[(kept[i], kept[j])]);

    Ok((Self { symbols, mean, cov }, excluded))
  }

  /// Asset identifiers, index-aligned with the moments.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Annualized expected-return vector.
  pub fn mean(&self) -> &DVector<f64> {
    &self.mean
  }

  /// Annualized covariance matrix.
  pub fn cov(&self) -> &DMatrix<f64> {
    &self.cov
  }

  /// Number of assets in the model.
  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  /// Whether the model is empty.
  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }
}
