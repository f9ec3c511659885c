//! # Portfolio Engine
//!
//! $$
//! S \to \text{AlignedTable} \to (\mu, \Sigma) \to \mathbf{w} \to a
//! $$
//!
//! End-to-end orchestration: price history in, allocation report out. The
//! pipeline is a pure function of its inputs, so independent runs are safe
//! to execute concurrently.

use std::collections::BTreeMap;

use nalgebra::DVector;

use super::align::AlignedTable;
use super::allocation::allocate;
use super::moments::MomentModel;
use super::moments::ReturnMatrix;
use super::optimizer::optimize_min_variance;
use super::optimizer::OptimizerConfig;
use super::series::PriceSeries;
use super::types::PortfolioReport;
use crate::error::PortfolioError;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PipelineConfig {
  /// Desired annualized portfolio return as a fraction (0.20 = 20 %).
  pub target_return: f64,
  /// Capital to distribute, in quote-currency units.
  pub total_investment: f64,
  /// Trading periods per year used for annualization (252 for daily data).
  pub periods_per_year: u32,
  /// Solver tunables.
  pub optimizer: OptimizerConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      target_return: 0.20,
      total_investment: 1.0,
      periods_per_year: 252,
      optimizer: OptimizerConfig::default(),
    }
  }
}

/// Single entry point running the full allocation pipeline.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PipelineConfig,
}

impl PortfolioEngine {
  /// Construct an engine with explicit configuration.
  pub fn new(config: PipelineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Run merge → returns → moments → optimize → allocate over the supplied
  /// price histories.
  ///
  /// Returns either a complete [`PortfolioReport`] or one concrete error;
  /// assets dropped by the data-quality rules along the way are collected
  /// in the report's exclusion list and logged, never silently discarded.
  pub fn run(&self, series: &BTreeMap<String, PriceSeries>) -> Result<PortfolioReport> {
    self.validate()?;

    let (table, mut excluded) = AlignedTable::merge(series)?;
    tracing::debug!(
      assets = table.n_assets(),
      dates = table.n_dates(),
      "merged price table"
    );

    let (returns, dropped) = ReturnMatrix::from_table(&table)?;
    excluded.extend(dropped);

    let (model, dropped) = MomentModel::estimate(&returns, self.config.periods_per_year)?;
    excluded.extend(dropped);
    tracing::debug!(assets = model.len(), periods = returns.n_periods(), "estimated moments");

    let weights = optimize_min_variance(&model, self.config.target_return, &self.config.optimizer)?;
    let positions = allocate(&weights, self.config.total_investment)?;

    let w = DVector::from_column_slice(&weights.values);
    let expected_return = model.mean().dot(&w);
    let variance = (w.transpose() * model.cov() * &w)[(0, 0)];

    Ok(PortfolioReport {
      positions,
      expected_return,
      variance,
      excluded,
    })
  }

  fn validate(&self) -> Result<()> {
    if !self.config.target_return.is_finite() {
      return Err(PortfolioError::InvalidInput(
        "target return must be finite".into(),
      ));
    }
    if !self.config.total_investment.is_finite() || self.config.total_investment < 0.0 {
      return Err(PortfolioError::InvalidInput(format!(
        "total investment must be finite and non-negative, got {}",
        self.config.total_investment
      )));
    }
    if self.config.periods_per_year == 0 {
      return Err(PortfolioError::InvalidInput(
        "periods_per_year must be positive".into(),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::portfolio::series::PricePoint;
  use crate::portfolio::types::ExclusionReason;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
  }

  /// Build a series whose price path realizes the given daily returns.
  fn series_from_returns(symbol: &str, daily_returns: &[f64]) -> PriceSeries {
    let mut close = 100.0;
    let mut points = vec![PricePoint {
      date: d(1),
      close,
    }];
    for (i, r) in daily_returns.iter().enumerate() {
      close *= 1.0 + r;
      points.push(PricePoint {
        date: d(2 + i as u32),
        close,
      });
    }
    PriceSeries::new(symbol, points)
  }

  #[test]
  fn end_to_end_allocation_hits_the_target() {
    // Mean daily returns 0.02 and 0.01, annualized to 5.04 and 2.52.
    let mut input = BTreeMap::new();
    input.insert(
      "AAA".to_string(),
      series_from_returns("AAA", &[0.01, 0.03, 0.01, 0.03]),
    );
    input.insert(
      "BBB".to_string(),
      series_from_returns("BBB", &[0.02, 0.0, 0.02, 0.0]),
    );

    let engine = PortfolioEngine::new(PipelineConfig {
      target_return: 3.78,
      total_investment: 1_000_000.0,
      ..PipelineConfig::default()
    });
    let report = engine.run(&input).unwrap();

    assert!(report.excluded.is_empty());
    assert_eq!(report.positions.len(), 2);

    let total: f64 = report.positions.iter().map(|p| p.allocation).sum();
    assert_abs_diff_eq!(total, 1_000_000.0, epsilon = 1.0);
    assert_abs_diff_eq!(report.expected_return, 3.78, epsilon = 1e-4);
    // The two return streams are perfectly anticorrelated, so the
    // midpoint portfolio carries no variance at all.
    assert_abs_diff_eq!(report.variance, 0.0, epsilon = 1e-9);
  }

  #[test]
  fn exclusions_are_surfaced_in_the_report() {
    let mut input = BTreeMap::new();
    input.insert(
      "AAA".to_string(),
      series_from_returns("AAA", &[0.01, 0.03, 0.01, 0.03]),
    );
    input.insert(
      "BBB".to_string(),
      series_from_returns("BBB", &[0.02, 0.0, 0.02, 0.0]),
    );
    input.insert("ZZZ".to_string(), PriceSeries::new("ZZZ", Vec::new()));

    let engine = PortfolioEngine::new(PipelineConfig {
      target_return: 3.78,
      ..PipelineConfig::default()
    });
    let report = engine.run(&input).unwrap();

    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].symbol, "ZZZ");
    assert_eq!(report.excluded[0].reason, ExclusionReason::EmptySeries);
    assert_eq!(report.positions.len(), 2);
  }

  #[test]
  fn invalid_scalars_fail_before_any_work() {
    let input: BTreeMap<String, PriceSeries> = BTreeMap::new();

    let engine = PortfolioEngine::new(PipelineConfig {
      total_investment: f64::NAN,
      ..PipelineConfig::default()
    });
    assert!(matches!(
      engine.run(&input).unwrap_err(),
      PortfolioError::InvalidInput(_)
    ));

    let engine = PortfolioEngine::new(PipelineConfig {
      periods_per_year: 0,
      ..PipelineConfig::default()
    });
    assert!(matches!(
      engine.run(&input).unwrap_err(),
      PortfolioError::InvalidInput(_)
    ));
  }

  #[test]
  fn unreachable_target_surfaces_infeasibility() {
    let mut input = BTreeMap::new();
    input.insert(
      "AAA".to_string(),
      series_from_returns("AAA", &[0.01, 0.03, 0.01, 0.03]),
    );
    input.insert(
      "BBB".to_string(),
      series_from_returns("BBB", &[0.02, 0.0, 0.02, 0.0]),
    );

    let engine = PortfolioEngine::new(PipelineConfig {
      target_return: 50.0,
      ..PipelineConfig::default()
    });
    assert!(matches!(
      engine.run(&input).unwrap_err(),
      PortfolioError::InfeasibleTarget { .. }
    ));
  }
}
