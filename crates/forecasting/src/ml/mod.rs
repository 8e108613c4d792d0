pub mod backtest;
pub mod dataset;
pub mod regression;
pub mod trainer;

pub use backtest::{BacktestReport, Backtester};
pub use dataset::{Dataset, DatasetBuilder, LabeledRow};
pub use regression::{RegressionMetrics, fit_ridge};
pub use trainer::Trainer;
