//! # CryptoCompare Price Source
//!
//! $$
//! S_i = \{ (d_t, p_t) \}_{t=0}^{T}
//! $$
//!
//! Remote daily close-price collaborator backed by the CryptoCompare REST
//! API. Configuration is explicit per client, never process-wide, and
//! history requests are paced to stay under the API rate limit. A failed
//! symbol is reported and left absent from the result map; it never aborts
//! the pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;

use crate::portfolio::PricePoint;
use crate::portfolio::PriceSeries;

/// Errors from the remote price-history collaborator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  /// The API has no history for the requested symbol.
  #[error("no price history found for {0}")]
  NotFound(String),

  /// The API refused the request due to rate limiting.
  #[error("rate limited by the price API")]
  RateLimit,

  /// Transport-level failure.
  #[error(transparent)]
  Http(#[from] reqwest::Error),

  /// The API answered with an unexpected or unsuccessful payload.
  #[error("unexpected API payload: {0}")]
  Payload(String),
}

/// Explicit client configuration.
#[derive(Clone, Debug)]
pub struct CryptoCompareConfig {
  /// API key sent with every request.
  pub api_key: String,
  /// API root, overridable for testing.
  pub base_url: String,
  /// Quote currency for prices (e.g. "USD").
  pub quote_currency: String,
  /// Pause between consecutive history requests.
  pub request_delay: Duration,
}

impl CryptoCompareConfig {
  /// Production defaults for a given API key.
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key: api_key.into(),
      base_url: "https://min-api.cryptocompare.com".into(),
      quote_currency: "USD".into(),
      request_delay: Duration::from_secs(1),
    }
  }
}

/// One entry of the market-cap toplist.
#[derive(Clone, Debug)]
pub struct CoinListing {
  /// Ticker symbol.
  pub symbol: String,
  /// Human-readable name.
  pub name: String,
}

#[derive(Debug, Deserialize)]
struct TopListResponse {
  #[serde(rename = "Data", default)]
  data: Vec<TopListEntry>,
}

#[derive(Debug, Deserialize)]
struct TopListEntry {
  #[serde(rename = "CoinInfo")]
  coin_info: CoinInfo,
}

#[derive(Debug, Deserialize)]
struct CoinInfo {
  #[serde(rename = "Name")]
  name: String,
  #[serde(rename = "FullName")]
  full_name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
  #[serde(rename = "Response")]
  response: Option<String>,
  #[serde(rename = "Message")]
  message: Option<String>,
  #[serde(rename = "Data")]
  data: Option<HistoryData>,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
  #[serde(rename = "Data", default)]
  data: Vec<HistoryBar>,
}

#[derive(Debug, Deserialize)]
struct HistoryBar {
  time: i64,
  close: f64,
}

/// CryptoCompare REST client.
#[derive(Clone, Debug)]
pub struct CryptoCompareClient {
  http: reqwest::Client,
  config: CryptoCompareConfig,
}

impl CryptoCompareClient {
  /// Construct a client from explicit configuration.
  pub fn new(config: CryptoCompareConfig) -> Self {
    Self {
      http: reqwest::Client::new(),
      config,
    }
  }

  /// The `n` largest coins by market capitalization.
  pub async fn top_by_market_cap(&self, n: usize) -> Result<Vec<CoinListing>, FetchError> {
    let url = format!("{}/data/top/mktcapfull", self.config.base_url);
    let resp: TopListResponse = self
      .http
      .get(&url)
      .query(&[
        ("limit", n.to_string()),
        ("tsym", self.config.quote_currency.clone()),
        ("api_key", self.config.api_key.clone()),
      ])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(
      resp
        .data
        .into_iter()
        .map(|entry| CoinListing {
          symbol: entry.coin_info.name,
          name: entry.coin_info.full_name,
        })
        .collect(),
    )
  }

  /// Daily close history for one symbol over the last `lookback_days`.
  pub async fn price_history(
    &self,
    symbol: &str,
    lookback_days: u32,
  ) -> Result<PriceSeries, FetchError> {
    let url = format!("{}/data/v2/histoday", self.config.base_url);
    let resp: HistoryResponse = self
      .http
      .get(&url)
      .query(&[
        ("fsym", symbol.to_string()),
        ("tsym", self.config.quote_currency.clone()),
        ("limit", lookback_days.to_string()),
        ("api_key", self.config.api_key.clone()),
      ])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    parse_history(symbol, resp)
  }

  /// Fetch histories for a whole universe, pacing requests by the
  /// configured delay.
  ///
  /// Successes land in the map; failures are returned alongside so callers
  /// can see which assets are absent and why.
  pub async fn price_histories(
    &self,
    symbols: &[String],
    lookback_days: u32,
  ) -> (BTreeMap<String, PriceSeries>, Vec<(String, FetchError)>) {
    let mut histories = BTreeMap::new();
    let mut failures = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
      if i > 0 {
        tokio::time::sleep(self.config.request_delay).await;
      }

      match self.price_history(symbol, lookback_days).await {
        Ok(series) => {
          tracing::debug!(symbol = %symbol, points = series.points.len(), "fetched history");
          histories.insert(symbol.clone(), series);
        }
        Err(err) => {
          tracing::warn!(symbol = %symbol, error = %err, "price history fetch failed");
          failures.push((symbol.clone(), err));
        }
      }
    }

    (histories, failures)
  }
}

fn parse_history(symbol: &str, resp: HistoryResponse) -> Result<PriceSeries, FetchError> {
  if let Some(flag) = resp.response.as_deref() {
    if flag.eq_ignore_ascii_case("error") {
      let message = resp.message.unwrap_or_default();
      let lowered = message.to_lowercase();
      if lowered.contains("rate limit") {
        return Err(FetchError::RateLimit);
      }
      if lowered.contains("market does not exist") || lowered.contains("no data") {
        return Err(FetchError::NotFound(symbol.to_string()));
      }
      return Err(FetchError::Payload(message));
    }
  }

  let bars = resp.data.map(|d| d.data).unwrap_or_default();
  if bars.is_empty() {
    return Err(FetchError::NotFound(symbol.to_string()));
  }

  let points = bars
    .iter()
    .filter(|bar| bar.close.is_finite() && bar.close > 0.0)
    .filter_map(|bar| {
      DateTime::from_timestamp(bar.time, 0).map(|dt| PricePoint {
        date: dt.date_naive(),
        close: bar.close,
      })
    })
    .collect();

  Ok(PriceSeries::new(symbol, points))
}
