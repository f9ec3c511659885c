//! # Alignment & Merge
//!
//! $$
//! \mathcal{D} = \bigcup_i \{ d : (d, p) \in S_i \}
//! $$
//!
//! Outer-join of per-asset price series onto a shared, strictly increasing
//! date axis. Dates present for any asset are kept; an asset absent on a
//! date is null, never zero or interpolated.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::series::PricePoint;
use super::series::PriceSeries;
use super::types::Exclusion;
use super::types::ExclusionReason;
use crate::error::PortfolioError;
use crate::error::Result;

/// Date-indexed price table with one column per asset.
#[derive(Clone, Debug)]
pub struct AlignedTable {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  columns: Vec<Vec<Option<f64>>>,
}

impl AlignedTable {
  /// Outer-join all series onto the union of their observed dates.
  ///
  /// Assets with no usable observations are excluded and reported rather
  /// than aborting the merge of the remaining assets. Inputs are not
  /// mutated. Fails with [`PortfolioError::Schema`] when the merge yields
  /// an empty date axis.
  pub fn merge(series: &BTreeMap<String, PriceSeries>) -> Result<(Self, Vec<Exclusion>)> {
    let mut excluded = Vec::new();
    let mut cleaned: Vec<(String, Vec<PricePoint>)> = Vec::new();

    for (symbol, raw) in series {
      let points = raw.sanitized();
      if points.is_empty() {
        tracing::warn!(symbol = %symbol, "excluding asset with no usable observations");
        excluded.push(Exclusion {
          symbol: symbol.clone(),
          reason: ExclusionReason::EmptySeries,
        });
      } else {
        cleaned.push((symbol.clone(), points));
      }
    }

    let mut axis: BTreeSet<NaiveDate> = BTreeSet::new();
    for (_, points) in &cleaned {
      axis.extend(points.iter().map(|p| p.date));
    }

    if axis.is_empty() {
      return Err(PortfolioError::Schema(
        "merge produced an empty date axis".into(),
      ));
    }

    let dates: Vec<NaiveDate> = axis.into_iter().collect();
    let mut symbols = Vec::with_capacity(cleaned.len());
    let mut columns = Vec::with_capacity(cleaned.len());

    for (symbol, points) in cleaned {
      let by_date: BTreeMap<NaiveDate, f64> = points.iter().map(|p| (p.date, p.close)).collect();
      let column: Vec<Option<f64>> = dates.iter().map(|d| by_date.get(d).copied()).collect();
      symbols.push(symbol);
      columns.push(column);
    }

    Ok((
      Self {
        dates,
        symbols,
        columns,
      },
      excluded,
    ))
  }

  /// Shared date axis, strictly increasing and unique.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Asset identifiers, one per column.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Price column for asset `i`, aligned to [`AlignedTable::dates`].
  pub fn column(&self, i: usize) -> &[Option<f64>] {
    &self.columns[i]
  }

  /// Number of assets in the table.
  pub fn n_assets(&self) -> usize {
    self.symbols.len()
  }

  /// Number of dates on the axis.
  pub fn n_dates(&self) -> usize {
    self.dates.len()
  }
}
