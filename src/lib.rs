//! # markowitz-rs
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mu^\top \mathbf{w} = r^\*, \ \mathbf{1}^\top \mathbf{w} = 1, \ 0 \le w_i \le 1
//! $$
//!
//! Mean-variance portfolio allocation: raw per-asset price history is merged
//! onto a shared date axis, converted to an annualized return/covariance
//! model, and solved for the minimum-variance long-only weights hitting a
//! target expected return.

pub mod error;
#[cfg(feature = "cryptocompare")]
pub mod fetch;
pub mod portfolio;

pub use error::PortfolioError;
pub use error::Result;
