pub mod drift;
pub mod freshness;
pub mod latency;

pub use drift::{DriftDetector, DriftReport, DriftStatus, FeatureDrift};
pub use freshness::{FreshnessSnapshot, FreshnessTracker};
pub use latency::{LatencySnapshot, LatencyTracker};
