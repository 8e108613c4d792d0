pub mod candle;
pub mod features;
pub mod market;
pub mod prediction;
pub mod registry;
pub mod regression;
pub mod training;

pub use candle::{Candle, CandleSeries, validate_sequence};
pub use features::{FEATURE_COLUMNS, FeatureRow, FeatureStats, FeaturesResult};
pub use market::{
    CompanyProfile, DataSource, Exchange, Fundamentals, MarketStatus, Quote, SCHEMA_VERSION,
    Upstream, UpstreamEnvelope,
};
pub use prediction::{
    AuditRecord, BatchPredictionItem, InputDataStatus, PredictionLabel, PredictionResult,
};
pub use registry::{
    DatasetSummary, DatasetWindow, LoadedModel, MetricMap, ModelDetails, ModelMetadata,
    ModelPackage, ModelParams, ModelRecord, ModelSummary, RegistryState, TrainingHistoryEntry,
};
pub use regression::RidgeModel;
pub use training::{TrainingConfig, TrainingJobStatus, TrainingOutcome, TrainingState};
