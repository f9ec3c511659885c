//! # Price Series
//!
//! $$
//! p_t > 0, \quad p_t < \infty
//! $$
//!
//! Raw per-asset close-price history and input sanitation. Remote feeds
//! deliver series with gaps, duplicate dates and the occasional NaN or zero
//! close; everything downstream works on the sanitized view.

use chrono::NaiveDate;

/// A single dated close observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
  /// Observation date.
  pub date: NaiveDate,
  /// Close price in the quote currency.
  pub close: f64,
}

/// Close-price history for one asset, as delivered by the data source.
#[derive(Clone, Debug, Default)]
pub struct PriceSeries {
  /// Asset identifier (ticker symbol).
  pub symbol: String,
  /// Dated observations; may be unsorted and contain invalid entries.
  pub points: Vec<PricePoint>,
}

impl PriceSeries {
  /// Construct a series from raw observations.
  pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
    Self {
      symbol: symbol.into(),
      points,
    }
  }

  /// Usable view of the series: non-finite and non-positive closes dropped,
  /// observations sorted by date, last observation kept per duplicate date.
  pub fn sanitized(&self) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = self
      .points
      .iter()
      .copied()
      .filter(|p| p.close.is_finite() && p.close > 0.0)
      .collect();

    points.sort_by_key(|p| p.date);
    points.dedup_by(|next, kept| {
      if next.date == kept.date {
        kept.close = next.close;
        true
      } else {
        false
      }
    });

    points
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
  }

  #[test]
  fn sanitized_drops_invalid_closes() {
    let series = PriceSeries::new(
      "BTC",
      vec![
        PricePoint {
          date: d(1),
          close: 100.0,
        },
        PricePoint {
          date: d(2),
          close: f64::NAN,
        },
        PricePoint {
          date: d(3),
          close: 0.0,
        },
        PricePoint {
          date: d(4),
          close: -5.0,
        },
        PricePoint {
          date: d(5),
          close: 105.0,
        },
      ],
    );

    let clean = series.sanitized();
    assert_eq!(clean.len(), 2);
    assert_eq!(clean[0].date, d(1));
    assert_eq!(clean[1].date, d(5));
  }

  #[test]
  fn sanitized_sorts_and_keeps_last_duplicate() {
    let series = PriceSeries::new(
      "ETH",
      vec![
        PricePoint {
          date: d(3),
          close: 30.0,
        },
        PricePoint {
          date: d(1),
          close: 10.0,
        },
        PricePoint {
          date: d(3),
          close: 31.0,
        },
      ],
    );

    let clean = series.sanitized();
    assert_eq!(clean.len(), 2);
    assert_eq!(clean[0].date, d(1));
    assert_eq!(clean[1].date, d(3));
    assert_eq!(clean[1].close, 31.0);
  }

  #[test]
  fn sanitized_empty_series_stays_empty() {
    let series = PriceSeries::new("DOGE", Vec::new());
    assert!(series.sanitized().is_empty());
  }
}
