use std::sync::Arc;

use common::config::Settings;
use common::errors::ServiceResult;
use common::models::{TrainingConfig, TrainingJobStatus};
use forecasting::monitoring::{DriftReport, FreshnessSnapshot, LatencySnapshot};
use forecasting::{
    DatasetBuilder, DriftDetector, FeatureService, FreshnessTracker, InferenceEngine,
    InferencePolicy, LatencyTracker, Trainer,
};
use market_data::{MarketDataClient, MarketDataSource};
use parking_lot::RwLock;
use serde::Serialize;
use storage::{AuditLogger, ModelRegistry, open_registry};
use tracing::{info, warn};

use crate::services::training_manager::TrainingManager;

/// Every long-lived component, built once and shared by handle.
pub struct AppContext {
    pub settings: Settings,
    pub market_data: Arc<dyn MarketDataSource>,
    pub registry: Arc<dyn ModelRegistry>,
    pub audit: Arc<AuditLogger>,
    pub drift: Arc<DriftDetector>,
    pub freshness: Arc<FreshnessTracker>,
    pub latency: Arc<LatencyTracker>,
    pub features: Arc<FeatureService>,
    pub trainer: Arc<Trainer>,
    pub inference: Arc<InferenceEngine>,
    pub training: Arc<TrainingManager>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringReport {
    pub active_version: Option<String>,
    pub freshness: FreshnessSnapshot,
    pub latency: LatencySnapshot,
    pub drift_status: String,
    pub training: TrainingJobStatus,
}

impl AppContext {
    pub async fn build(settings: Settings) -> ServiceResult<Self> {
        let client = MarketDataClient::from_settings(&settings)?;
        Self::with_source(settings, Arc::new(client)).await
    }

    pub async fn with_source(
        settings: Settings,
        market_data: Arc<dyn MarketDataSource>,
    ) -> ServiceResult<Self> {
        let registry = open_registry(&settings)?;
        let audit = Arc::new(AuditLogger::from_settings(&settings));
        let drift = Arc::new(DriftDetector::new(settings.drift_threshold, settings.drift_window));
        let freshness = Arc::new(FreshnessTracker::new());
        let latency = Arc::new(LatencyTracker::new(settings.latency_window));

        match registry.training_history().await {
            Ok(history) => {
                if let Some(last) = history.iter().map(|entry| entry.timestamp).max() {
                    freshness.mark_model_trained(last);
                }
            }
            Err(e) => warn!("Could not read training history: {}", e),
        }

        let features = Arc::new(FeatureService::new(market_data.clone(), &settings));
        let trainer = Arc::new(Trainer::new(
            DatasetBuilder::new(features.clone()),
            registry.clone(),
        ));
        let inference = Arc::new(InferenceEngine::new(
            market_data.clone(),
            features.clone(),
            registry.clone(),
            drift.clone(),
            freshness.clone(),
            latency.clone(),
            audit.clone(),
            InferencePolicy::from_settings(&settings),
        ));
        let training = Arc::new(TrainingManager::new(
            trainer.clone(),
            freshness.clone(),
            TrainingConfig::from_settings(&settings),
        ));

        info!("Application context ready ({:?})", settings.app_env);
        Ok(Self {
            settings,
            market_data,
            registry,
            audit,
            drift,
            freshness,
            latency,
            features,
            trainer,
            inference,
            training,
        })
    }

    /// Recent inputs compared against the training baseline of `version` (or the active one).
    pub async fn drift_report(&self, version: Option<&str>) -> ServiceResult<DriftReport> {
        let baseline = self.registry.training_feature_stats(version).await?;
        Ok(self.drift.evaluate(&baseline))
    }

    pub async fn monitoring(&self) -> ServiceResult<MonitoringReport> {
        let active_version = self.registry.active_version().await?;
        let drift_status = match &active_version {
            Some(version) => self
                .drift_report(Some(version))
                .await?
                .status
                .as_str()
                .to_string(),
            None => "unknown".to_string(),
        };
        Ok(MonitoringReport {
            active_version,
            freshness: self.freshness.snapshot(),
            latency: self.latency.snapshot(),
            drift_status,
            training: self.training.status(),
        })
    }
}

/// Shared pointer to the live context; `reload` swaps in a freshly built one.
pub struct ContextHandle {
    current: RwLock<Arc<AppContext>>,
}

impl ContextHandle {
    pub fn new(context: AppContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    pub fn current(&self) -> Arc<AppContext> {
        self.current.read().clone()
    }

    /// Rebuilds every component from `settings`. Callers holding the old context keep it
    /// until they drop it.
    pub async fn reload(&self, settings: Settings) -> ServiceResult<Arc<AppContext>> {
        let fresh = Arc::new(AppContext::build(settings).await?);
        *self.current.write() = fresh.clone();
        info!("Application context reloaded");
        Ok(fresh)
    }

    pub fn replace(&self, context: AppContext) -> Arc<AppContext> {
        let fresh = Arc::new(context);
        *self.current.write() = fresh.clone();
        fresh
    }
}
