use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use prettytable::row;
use prettytable::Table;
use tracing_subscriber::EnvFilter;

use markowitz_rs::fetch::CryptoCompareClient;
use markowitz_rs::fetch::CryptoCompareConfig;
use markowitz_rs::portfolio::PipelineConfig;
use markowitz_rs::portfolio::PortfolioEngine;

/// Mean-variance allocation over the largest cryptocurrencies by market cap.
#[derive(Debug, Parser)]
#[command(name = "markowitz", version, about)]
struct Cli {
  /// Capital to allocate, in quote-currency units.
  #[arg(long)]
  total_investment: f64,

  /// Desired annualized portfolio return as a fraction (0.20 = 20 %).
  #[arg(long, default_value_t = 0.20)]
  target_return: f64,

  /// Number of top-market-cap coins to include in the universe.
  #[arg(long, default_value_t = 20)]
  top: usize,

  /// Days of daily history to fetch per coin.
  #[arg(long, default_value_t = 365)]
  lookback_days: u32,

  /// Quote currency for prices and allocations.
  #[arg(long, default_value = "USD")]
  currency: String,

  /// Seconds to pause between consecutive history requests.
  #[arg(long, default_value_t = 1.0)]
  request_delay: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  let api_key =
    std::env::var("CRYPTOCOMPARE_API_KEY").context("CRYPTOCOMPARE_API_KEY is not set")?;

  let mut config = CryptoCompareConfig::new(api_key);
  config.quote_currency = cli.currency.clone();
  config.request_delay = Duration::from_secs_f64(cli.request_delay);
  let client = CryptoCompareClient::new(config);

  let universe = client.top_by_market_cap(cli.top).await?;
  tracing::info!(coins = universe.len(), "fetched market-cap universe");
  for coin in &universe {
    println!("{} ({})", coin.name, coin.symbol);
  }

  let symbols: Vec<String> = universe.iter().map(|c| c.symbol.clone()).collect();
  let (histories, failures) = client.price_histories(&symbols, cli.lookback_days).await;
  for (symbol, err) in &failures {
    tracing::warn!(symbol = %symbol, error = %err, "dropped from universe");
  }

  let engine = PortfolioEngine::new(PipelineConfig {
    target_return: cli.target_return,
    total_investment: cli.total_investment,
    ..PipelineConfig::default()
  });
  let report = engine.run(&histories)?;

  let mut table = Table::new();
  table.add_row(row![
    "Asset",
    "Weight",
    format!("Allocation ({})", cli.currency)
  ]);
  for position in &report.positions {
    table.add_row(row![
      position.symbol,
      format!("{:.4}", position.weight),
      format!("{:.2}", position.allocation)
    ]);
  }
  table.printstd();

  println!(
    "Expected annual return: {:.2}%",
    report.expected_return * 100.0
  );
  println!(
    "Annual variance: {:.6} (volatility {:.2}%)",
    report.variance,
    report.variance.max(0.0).sqrt() * 100.0
  );

  if !report.excluded.is_empty() {
    println!("Excluded assets:");
    for exclusion in &report.excluded {
      println!("  {}: {}", exclusion.symbol, exclusion.reason);
    }
  }

  Ok(())
}
