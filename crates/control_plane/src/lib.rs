pub mod context;
pub mod services;

pub use context::{AppContext, ContextHandle, MonitoringReport};
pub use services::training_manager::{StartOutcome, TrainingManager};
