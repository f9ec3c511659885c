//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Allocation pipeline: price-series alignment, moment estimation,
//! constrained mean-variance optimization and capital allocation.

pub mod align;
pub mod allocation;
pub mod engine;
pub mod moments;
pub mod optimizer;
pub mod series;
pub mod types;

pub use align::AlignedTable;
pub use allocation::allocate;
pub use engine::PipelineConfig;
pub use engine::PortfolioEngine;
pub use moments::MomentModel;
pub use moments::ReturnMatrix;
pub use optimizer::optimize_min_variance;
pub use optimizer::OptimizerConfig;
pub use series::PricePoint;
pub use series::PriceSeries;
pub use types::Exclusion;
pub use types::ExclusionReason;
pub use types::PortfolioReport;
pub use types::Position;
pub use types::Weights;
