pub mod engineering;

pub use engineering::{FeatureEngine, compute_features};
