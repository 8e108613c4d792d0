use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::FeatureStats;
use super::regression::RidgeModel;

pub type MetricMap = BTreeMap<String, f64>;

pub const MODEL_ARTIFACT: &str = "model.json";
pub const METADATA_DOC: &str = "metadata.json";
pub const METRICS_DOC: &str = "metrics.json";
pub const FEATURE_COLUMNS_DOC: &str = "feature_columns.json";
pub const DATASET_SUMMARY_DOC: &str = "dataset_summary.json";
pub const REGISTRY_DOC: &str = "registry.json";
pub const TRAINING_HISTORY_DOC: &str = "training_history.json";

/// Numeric part of a `v<N>` version id.
pub fn parse_version_number(version: &str) -> Option<u64> {
    version.strip_prefix('v')?.parse().ok()
}

/// Next id after the largest of `versions`, `v1` when there are none.
pub fn next_version_after<'a, I>(versions: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let latest = versions.into_iter().filter_map(parse_version_number).max();
    format!("v{}", latest.map_or(1, |n| n + 1))
}

pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by_key(|v| (parse_version_number(v).unwrap_or(u64::MAX), v.clone()));
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub window: DatasetWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub fit_intercept: bool,
    pub l2_alpha: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            l2_alpha: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub algorithm: String,
    pub lookback: usize,
    pub symbols: Vec<String>,
    pub exchange: String,
    pub test_size: f64,
    pub random_state: u64,
    pub cv_folds: usize,
    pub model_params: ModelParams,
    #[serde(default)]
    pub training_metrics: MetricMap,
    #[serde(default)]
    pub validation_metrics: MetricMap,
    #[serde(default)]
    pub dataset_window: DatasetWindow,
    #[serde(default)]
    pub training_feature_stats: BTreeMap<String, FeatureStats>,
}

/// Everything written for one version. Immutable once saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPackage {
    pub version: String,
    pub model: RidgeModel,
    pub metadata: ModelMetadata,
    pub metrics: MetricMap,
    pub feature_columns: Vec<String>,
    pub dataset_summary: DatasetSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub training_metrics: MetricMap,
    #[serde(default)]
    pub validation_metrics: MetricMap,
    #[serde(default)]
    pub dataset_window: DatasetWindow,
    pub artifact_sha256: String,
}

impl ModelRecord {
    pub fn from_package(package: &ModelPackage, artifact_sha256: String) -> Self {
        let validation_metrics = if package.metadata.validation_metrics.is_empty() {
            package.metrics.clone()
        } else {
            package.metadata.validation_metrics.clone()
        };
        Self {
            created_at: package.metadata.trained_at,
            training_metrics: package.metadata.training_metrics.clone(),
            validation_metrics,
            dataset_window: package.metadata.dataset_window.clone(),
            artifact_sha256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub active_version: Option<String>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistoryEntry {
    pub version: String,
    pub training_metrics: MetricMap,
    pub validation_metrics: MetricMap,
    pub dataset_range: DatasetWindow,
    pub timestamp: DateTime<Utc>,
}

impl TrainingHistoryEntry {
    pub fn new(version: &str, record: &ModelRecord) -> Self {
        Self {
            version: version.to_string(),
            training_metrics: record.training_metrics.clone(),
            validation_metrics: record.validation_metrics.clone(),
            dataset_range: record.dataset_window.clone(),
            timestamp: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub version: String,
    pub created_at: Option<DateTime<Utc>>,
    pub training_metrics: MetricMap,
    pub validation_metrics: MetricMap,
    pub dataset_window: DatasetWindow,
    pub is_active: bool,
}

impl ModelSummary {
    pub fn new(version: &str, state: &RegistryState) -> Self {
        let record = state.models.get(version);
        Self {
            version: version.to_string(),
            created_at: record.map(|r| r.created_at),
            training_metrics: record.map(|r| r.training_metrics.clone()).unwrap_or_default(),
            validation_metrics: record.map(|r| r.validation_metrics.clone()).unwrap_or_default(),
            dataset_window: record.map(|r| r.dataset_window.clone()).unwrap_or_default(),
            is_active: state.active_version.as_deref() == Some(version),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub version: String,
    pub metadata: ModelMetadata,
    pub metrics: MetricMap,
    pub feature_columns: Vec<String>,
    pub dataset_summary: DatasetSummary,
    pub created_at: Option<DateTime<Utc>>,
    pub artifact_sha256: Option<String>,
    pub is_active: bool,
}

/// A model resolved and read back from the registry, ready to serve.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub version: String,
    pub model: RidgeModel,
    pub metadata: ModelMetadata,
    pub feature_columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_version() {
        assert_eq!(next_version_after(Vec::<&str>::new()), "v1");
        assert_eq!(next_version_after(["v1", "v2", "v10", "scratch"]), "v11");
    }

    #[test]
    fn test_sort_versions_numeric() {
        let mut versions = vec!["v10".to_string(), "v2".to_string(), "v1".to_string()];
        sort_versions(&mut versions);
        assert_eq!(versions, vec!["v1", "v2", "v10"]);
    }
}
