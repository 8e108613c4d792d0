pub mod features;
pub mod inference;
pub mod ml;
pub mod monitoring;
pub mod services;

pub use features::FeatureEngine;
pub use inference::{InferenceEngine, InferencePolicy};
pub use ml::{Backtester, Dataset, DatasetBuilder, Trainer};
pub use monitoring::{DriftDetector, FreshnessTracker, LatencyTracker};
pub use services::FeatureService;
