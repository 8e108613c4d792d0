use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::{DatasetSummary, MetricMap, ModelParams};
use crate::config::Settings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub symbols: Vec<String>,
    pub exchange: String,
    pub lookback: usize,
    pub test_size: f64,
    pub random_state: u64,
    pub cv_folds: usize,
    pub model_params: ModelParams,
}

impl TrainingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            symbols: settings.train_symbols.clone(),
            exchange: settings.default_exchange.clone(),
            lookback: settings.train_lookback,
            test_size: settings.train_test_size,
            random_state: settings.train_random_state,
            cv_folds: settings.train_cv_folds,
            model_params: ModelParams {
                fit_intercept: true,
                l2_alpha: settings.train_l2_alpha,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub version: String,
    pub metrics: MetricMap,
    pub training_metrics: MetricMap,
    pub dataset_summary: DatasetSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJobStatus {
    pub state: TrainingState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub latest_version: Option<String>,
    pub error: Option<String>,
}

impl Default for TrainingJobStatus {
    fn default() -> Self {
        Self {
            state: TrainingState::Idle,
            started_at: None,
            completed_at: None,
            latest_version: None,
            error: None,
        }
    }
}
