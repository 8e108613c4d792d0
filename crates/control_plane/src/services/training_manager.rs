use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use common::models::{TrainingConfig, TrainingJobStatus, TrainingState};
use forecasting::{FreshnessTracker, Trainer};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl StartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AlreadyRunning => "already_running",
        }
    }
}

/// Runs at most one training job in the background and tracks its lifecycle.
pub struct TrainingManager {
    trainer: Arc<Trainer>,
    freshness: Arc<FreshnessTracker>,
    config: TrainingConfig,
    status: Arc<Mutex<TrainingJobStatus>>,
}

impl TrainingManager {
    pub fn new(trainer: Arc<Trainer>, freshness: Arc<FreshnessTracker>, config: TrainingConfig) -> Self {
        Self {
            trainer,
            freshness,
            config,
            status: Arc::new(Mutex::new(TrainingJobStatus::default())),
        }
    }

    pub fn default_config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Never blocks on the job. A request while one is running is rejected, not queued.
    pub fn start_training(
        &self,
        version: Option<String>,
        config: Option<TrainingConfig>,
    ) -> StartOutcome {
        {
            let mut status = self.status.lock();
            if status.state == TrainingState::Running {
                warn!("Training requested while a job is already running");
                return StartOutcome::AlreadyRunning;
            }
            *status = TrainingJobStatus {
                state: TrainingState::Running,
                started_at: Some(Utc::now()),
                completed_at: None,
                latest_version: status.latest_version.take(),
                error: None,
            };
        }

        let trainer = self.trainer.clone();
        let freshness = self.freshness.clone();
        let status = self.status.clone();
        let config = config.unwrap_or_else(|| self.config.clone());
        info!("Training job started for {:?}", config.symbols);

        tokio::spawn(async move {
            let run = AssertUnwindSafe(trainer.train(&config, version)).catch_unwind().await;
            let finished = Utc::now();
            let mut status = status.lock();
            status.completed_at = Some(finished);
            match run {
                Ok(Ok(outcome)) => {
                    info!("Training job succeeded with {}", outcome.version);
                    freshness.mark_model_trained(finished);
                    status.state = TrainingState::Succeeded;
                    status.latest_version = Some(outcome.version);
                }
                Ok(Err(e)) => {
                    error!("Training job failed: {}", e);
                    status.state = TrainingState::Failed;
                    status.error = Some(e.to_string());
                }
                Err(_) => {
                    error!("Training job panicked");
                    status.state = TrainingState::Failed;
                    status.error = Some("training job panicked".to_string());
                }
            }
        });
        StartOutcome::Started
    }

    pub fn status(&self) -> TrainingJobStatus {
        self.status.lock().clone()
    }
}
