use std::collections::BTreeMap;

use async_trait::async_trait;
use common::errors::{ServiceError, ServiceResult};
use common::models::registry::{
    DATASET_SUMMARY_DOC, FEATURE_COLUMNS_DOC, METADATA_DOC, METRICS_DOC, MODEL_ARTIFACT,
    REGISTRY_DOC, TRAINING_HISTORY_DOC, next_version_after, parse_version_number, sort_versions,
};
use common::models::{
    DatasetSummary, FeatureStats, LoadedModel, MetricMap, ModelDetails, ModelMetadata,
    ModelPackage, ModelRecord, ModelSummary, RegistryState, TrainingHistoryEntry,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::documents::{decode_json, decode_model, encode_json, encode_model, version_key};
use super::{BlobStore, ModelRegistry};

/// Registry logic shared by every blob backend.
///
/// Mutations (`save_model_package`, `activate_version`) are serialized through
/// `write_lock`; reads go straight to the store.
pub struct VersionedRegistry<S> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: BlobStore> VersionedRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn read_doc<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        match self.store.get(key).await? {
            Some(bytes) => decode_json(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn write_doc<T: Serialize>(&self, key: &str, value: &T) -> ServiceResult<()> {
        self.store.put(key, encode_json(value)?).await
    }

    async fn read_state(&self) -> ServiceResult<RegistryState> {
        Ok(self.read_doc(REGISTRY_DOC).await?.unwrap_or_default())
    }

    async fn resolve_version(&self, version: Option<&str>) -> ServiceResult<String> {
        match version {
            Some(v) => check_version(v).map(|_| v.to_string()),
            None => self
                .read_state()
                .await?
                .active_version
                .ok_or_else(|| ServiceError::NotFound("no active model version is registered".to_string())),
        }
    }

    async fn read_metadata(&self, version: &str) -> ServiceResult<ModelMetadata> {
        self.read_doc(&version_key(version, METADATA_DOC))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("model version {version} metadata")))
    }
}

#[async_trait]
impl<S: BlobStore> ModelRegistry for VersionedRegistry<S> {
    async fn next_version(&self) -> ServiceResult<String> {
        let versions = self.list_versions().await?;
        Ok(next_version_after(versions.iter().map(String::as_str)))
    }

    async fn list_versions(&self) -> ServiceResult<Vec<String>> {
        let mut versions: Vec<String> = self
            .store
            .list_dirs()
            .await?
            .into_iter()
            .filter(|dir| parse_version_number(dir).is_some())
            .collect();
        sort_versions(&mut versions);
        Ok(versions)
    }

    async fn save_model_package(&self, package: &ModelPackage) -> ServiceResult<()> {
        let version = package.version.as_str();
        check_version(version)?;

        let _guard = self.write_lock.lock().await;
        let mut state = self.read_state().await?;
        if state.models.contains_key(version) || self.store.dir_exists(version).await? {
            return Err(ServiceError::AlreadyExists(format!("model version {version}")));
        }

        let (artifact, checksum) = encode_model(&package.model)?;
        self.store
            .put(&version_key(version, MODEL_ARTIFACT), artifact)
            .await?;
        self.write_doc(&version_key(version, METADATA_DOC), &package.metadata)
            .await?;
        self.write_doc(&version_key(version, METRICS_DOC), &package.metrics)
            .await?;
        self.write_doc(&version_key(version, FEATURE_COLUMNS_DOC), &package.feature_columns)
            .await?;
        self.write_doc(&version_key(version, DATASET_SUMMARY_DOC), &package.dataset_summary)
            .await?;

        let record = ModelRecord::from_package(package, checksum);
        let mut history: Vec<TrainingHistoryEntry> =
            self.read_doc(TRAINING_HISTORY_DOC).await?.unwrap_or_default();
        history.push(TrainingHistoryEntry::new(version, &record));
        self.write_doc(TRAINING_HISTORY_DOC, &history).await?;

        let previous = state.active_version.replace(version.to_string());
        state.models.insert(version.to_string(), record);
        self.write_doc(REGISTRY_DOC, &state).await?;

        info!(
            "Registered model {} in {} (previously active: {:?})",
            version,
            self.store.describe(),
            previous
        );
        Ok(())
    }

    async fn activate_version(&self, version: &str) -> ServiceResult<()> {
        check_version(version)?;
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_state().await?;

        let has_metadata = self
            .store
            .get(&version_key(version, METADATA_DOC))
            .await?
            .is_some();
        if !state.models.contains_key(version) || !has_metadata {
            warn!("Refusing to activate unknown model version {}", version);
            return Err(ServiceError::NotFound(format!("model version {version}")));
        }

        state.active_version = Some(version.to_string());
        self.write_doc(REGISTRY_DOC, &state).await?;
        info!("Activated model version {}", version);
        Ok(())
    }

    async fn active_version(&self) -> ServiceResult<Option<String>> {
        Ok(self.read_state().await?.active_version)
    }

    async fn load_model(&self, version: Option<&str>) -> ServiceResult<LoadedModel> {
        let version = self.resolve_version(version).await?;
        let state = self.read_state().await?;

        let key = version_key(&version, MODEL_ARTIFACT);
        let bytes = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("model artifact for {version}")))?;
        let checksum = state.models.get(&version).map(|r| r.artifact_sha256.as_str());
        let model = decode_model(&key, &bytes, checksum)?;

        let metadata = self.read_metadata(&version).await?;
        let feature_columns: Vec<String> = self
            .read_doc(&version_key(&version, FEATURE_COLUMNS_DOC))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("feature columns for {version}")))?;
        if feature_columns.len() != model.n_features() {
            return Err(ServiceError::Model(format!(
                "{version} lists {} feature columns but the model expects {}",
                feature_columns.len(),
                model.n_features()
            )));
        }

        Ok(LoadedModel {
            version,
            model,
            metadata,
            feature_columns,
        })
    }

    async fn model_details(&self, version: &str) -> ServiceResult<ModelDetails> {
        check_version(version)?;
        let metadata = self.read_metadata(version).await?;
        let metrics: MetricMap = self
            .read_doc(&version_key(version, METRICS_DOC))
            .await?
            .unwrap_or_default();
        let feature_columns: Vec<String> = self
            .read_doc(&version_key(version, FEATURE_COLUMNS_DOC))
            .await?
            .unwrap_or_default();
        let dataset_summary: DatasetSummary = self
            .read_doc(&version_key(version, DATASET_SUMMARY_DOC))
            .await?
            .unwrap_or_default();

        let state = self.read_state().await?;
        let record = state.models.get(version);
        Ok(ModelDetails {
            version: version.to_string(),
            metadata,
            metrics,
            feature_columns,
            dataset_summary,
            created_at: record.map(|r| r.created_at),
            artifact_sha256: record.map(|r| r.artifact_sha256.clone()),
            is_active: state.active_version.as_deref() == Some(version),
        })
    }

    async fn list_models(&self) -> ServiceResult<Vec<ModelSummary>> {
        let state = self.read_state().await?;
        let mut versions = self.list_versions().await?;
        for known in state.models.keys() {
            if !versions.contains(known) {
                versions.push(known.clone());
            }
        }
        sort_versions(&mut versions);
        Ok(versions
            .iter()
            .map(|v| ModelSummary::new(v, &state))
            .collect())
    }

    async fn training_history(&self) -> ServiceResult<Vec<TrainingHistoryEntry>> {
        Ok(self.read_doc(TRAINING_HISTORY_DOC).await?.unwrap_or_default())
    }

    async fn training_feature_stats(
        &self,
        version: Option<&str>,
    ) -> ServiceResult<BTreeMap<String, FeatureStats>> {
        let version = self.resolve_version(version).await?;
        Ok(self.read_metadata(&version).await?.training_feature_stats)
    }
}

/// Versions become blob keys, so only `v<N>` names may reach the store.
fn check_version(version: &str) -> ServiceResult<()> {
    if parse_version_number(version).is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "model version must look like v<N>, got {version}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LocalBlobStore;
    use chrono::{TimeZone, Utc};
    use common::models::{DatasetWindow, ModelParams, RidgeModel};

    fn package(version: &str, coefficients: Vec<f64>) -> ModelPackage {
        let trained_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let columns: Vec<String> = (0..coefficients.len()).map(|i| format!("f{i}")).collect();
        let stats = columns
            .iter()
            .map(|c| (c.clone(), FeatureStats { mean: 1.0, std: 0.5 }))
            .collect();
        let metrics: MetricMap = [("rmse".to_string(), 0.01), ("r2".to_string(), 0.3)].into();

        ModelPackage {
            version: version.to_string(),
            model: RidgeModel {
                fit_intercept: true,
                l2_alpha: 1e-6,
                intercept: 0.001,
                coefficients,
            },
            metadata: ModelMetadata {
                version: version.to_string(),
                trained_at,
                algorithm: "ridge_linear_regression".to_string(),
                lookback: 30,
                symbols: vec!["AAPL".to_string()],
                exchange: "NASDAQ".to_string(),
                test_size: 0.2,
                random_state: 42,
                cv_folds: 3,
                model_params: ModelParams::default(),
                training_metrics: metrics.clone(),
                validation_metrics: metrics.clone(),
                dataset_window: DatasetWindow {
                    start: Some(trained_at),
                    end: Some(trained_at),
                },
                training_feature_stats: stats,
            },
            metrics,
            feature_columns: columns,
            dataset_summary: DatasetSummary {
                rows: 29,
                symbols: vec!["AAPL".to_string()],
                window: DatasetWindow::default(),
            },
        }
    }

    fn registry(dir: &tempfile::TempDir) -> VersionedRegistry<LocalBlobStore> {
        VersionedRegistry::new(LocalBlobStore::new(dir.path()))
    }

    #[tokio::test]
    async fn test_next_version_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        assert_eq!(registry.next_version().await.unwrap(), "v1");

        registry.save_model_package(&package("v1", vec![0.1])).await.unwrap();
        registry.save_model_package(&package("v9", vec![0.1])).await.unwrap();
        assert_eq!(registry.next_version().await.unwrap(), "v10");
        assert_eq!(registry.list_versions().await.unwrap(), vec!["v1", "v9"]);
    }

    #[tokio::test]
    async fn test_versions_are_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.save_model_package(&package("v1", vec![0.1, 0.2])).await.unwrap();

        let err = registry
            .save_model_package(&package("v1", vec![9.0, 9.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));

        let loaded = registry.load_model(Some("v1")).await.unwrap();
        assert_eq!(loaded.model.coefficients, vec![0.1, 0.2]);
        assert_eq!(registry.training_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let original = package("v1", vec![0.37, -1.25, 3.0e-4, 12.5]);
        registry.save_model_package(&original).await.unwrap();

        let loaded = registry.load_model(None).await.unwrap();
        let row = [101.5, 0.0123, 99.8, 0.021];
        assert_eq!(
            loaded.model.predict_row(&row).unwrap().to_bits(),
            original.model.predict_row(&row).unwrap().to_bits()
        );
        assert_eq!(loaded.version, "v1");
        assert_eq!(loaded.feature_columns, original.feature_columns);
    }

    #[tokio::test]
    async fn test_activate_unknown_version_keeps_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.save_model_package(&package("v1", vec![0.1])).await.unwrap();

        let err = registry.activate_version("v7").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(registry.active_version().await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_activation_leaves_history_alone() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.save_model_package(&package("v1", vec![0.1])).await.unwrap();
        registry.save_model_package(&package("v2", vec![0.2])).await.unwrap();
        assert_eq!(registry.active_version().await.unwrap().as_deref(), Some("v2"));

        registry.activate_version("v1").await.unwrap();
        assert_eq!(registry.active_version().await.unwrap().as_deref(), Some("v1"));

        let history = registry.training_history().await.unwrap();
        let versions: Vec<&str> = history.iter().map(|h| h.version.as_str()).collect();
        assert_eq!(versions, vec!["v1", "v2"]);

        let models = registry.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert!(models[0].is_active);
        assert!(!models[1].is_active);
    }

    #[tokio::test]
    async fn test_load_without_active_version() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(&dir).load_model(None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tampered_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.save_model_package(&package("v1", vec![0.1])).await.unwrap();

        let tampered = package("v1", vec![5.0]).model;
        registry
            .store()
            .put("v1/model.json", serde_json::to_vec(&tampered).unwrap())
            .await
            .unwrap();

        let err = registry.load_model(Some("v1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Model(_)));
    }

    #[tokio::test]
    async fn test_details_and_feature_stats() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.save_model_package(&package("v1", vec![0.1, 0.2])).await.unwrap();

        let details = registry.model_details("v1").await.unwrap();
        assert!(details.is_active);
        assert_eq!(details.dataset_summary.rows, 29);
        assert_eq!(details.metrics["rmse"], 0.01);
        assert!(details.artifact_sha256.is_some());

        let stats = registry.training_feature_stats(None).await.unwrap();
        assert_eq!(stats["f1"], FeatureStats { mean: 1.0, std: 0.5 });

        assert!(matches!(
            registry.model_details("v4").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_malformed_version() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(&dir)
            .save_model_package(&package("latest", vec![0.1]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_reads_reject_path_like_versions() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        for version in ["../x", "v1/../../x", ""] {
            assert!(matches!(
                registry.load_model(Some(version)).await.unwrap_err(),
                ServiceError::InvalidInput(_)
            ));
            assert!(matches!(
                registry.model_details(version).await.unwrap_err(),
                ServiceError::InvalidInput(_)
            ));
            assert!(matches!(
                registry.training_feature_stats(Some(version)).await.unwrap_err(),
                ServiceError::InvalidInput(_)
            ));
        }
        assert!(matches!(
            registry.activate_version("../x").await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
    }
}
