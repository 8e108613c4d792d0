use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common::config::Settings;
use common::errors::{ServiceError, ServiceResult};
use common::models::{
    FeatureStats, LoadedModel, ModelDetails, ModelPackage, ModelSummary, TrainingHistoryEntry,
};
use tracing::info;
use url::Url;

pub mod documents;
pub mod local;
pub mod object_store;
pub mod versioned;

pub use local::LocalBlobStore;
pub use object_store::S3BlobStore;
pub use versioned::VersionedRegistry;

pub type LocalModelRegistry = VersionedRegistry<LocalBlobStore>;
pub type S3ModelRegistry = VersionedRegistry<S3BlobStore>;

/// Versioned model persistence with a single active pointer.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn next_version(&self) -> ServiceResult<String>;

    async fn list_versions(&self) -> ServiceResult<Vec<String>>;

    /// Write-once. Also appends to the training history and activates the version.
    async fn save_model_package(&self, package: &ModelPackage) -> ServiceResult<()>;

    async fn activate_version(&self, version: &str) -> ServiceResult<()>;

    async fn active_version(&self) -> ServiceResult<Option<String>>;

    /// Loads `version`, or the active version when `None`.
    async fn load_model(&self, version: Option<&str>) -> ServiceResult<LoadedModel>;

    async fn model_details(&self, version: &str) -> ServiceResult<ModelDetails>;

    async fn list_models(&self) -> ServiceResult<Vec<ModelSummary>>;

    async fn training_history(&self) -> ServiceResult<Vec<TrainingHistoryEntry>>;

    async fn training_feature_stats(
        &self,
        version: Option<&str>,
    ) -> ServiceResult<BTreeMap<String, FeatureStats>>;
}

/// Blob-level I/O a registry backend provides. Keys are `/`-separated and relative to the root.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn describe(&self) -> String;

    async fn get(&self, key: &str) -> ServiceResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> ServiceResult<()>;

    /// Whether anything is stored under `dir/`.
    async fn dir_exists(&self, dir: &str) -> ServiceResult<bool>;

    /// Names of the top-level directories under the root.
    async fn list_dirs(&self) -> ServiceResult<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryLocation {
    Local(PathBuf),
    S3 { bucket: String, prefix: String },
}

impl RegistryLocation {
    pub fn parse(raw: &str) -> ServiceResult<Self> {
        let raw = raw.trim();
        if raw.starts_with("s3://") || raw.starts_with("file://") {
            let url = Url::parse(raw)
                .map_err(|e| ServiceError::Config(format!("MODEL_REGISTRY_DIR: {e}")))?;
            if url.scheme() == "file" {
                let path = url.to_file_path().map_err(|_| {
                    ServiceError::Config(format!("MODEL_REGISTRY_DIR: not a local path: {raw}"))
                })?;
                return Ok(Self::Local(path));
            }

            let bucket = url
                .host_str()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| ServiceError::Config(format!("MODEL_REGISTRY_DIR: missing bucket in {raw}")))?
                .to_string();
            let prefix = url.path().trim_matches('/').to_string();
            return Ok(Self::S3 { bucket, prefix });
        }
        if raw.is_empty() {
            return Err(ServiceError::Config("MODEL_REGISTRY_DIR must not be empty".to_string()));
        }
        Ok(Self::Local(PathBuf::from(raw)))
    }
}

/// Picks the registry backend from the scheme of the configured root.
pub fn open_registry(settings: &Settings) -> ServiceResult<Arc<dyn ModelRegistry>> {
    let registry: Arc<dyn ModelRegistry> = match RegistryLocation::parse(&settings.model_registry_dir)? {
        RegistryLocation::Local(path) => {
            Arc::new(VersionedRegistry::new(LocalBlobStore::new(path)))
        }
        RegistryLocation::S3 { bucket, prefix } => Arc::new(VersionedRegistry::new(
            S3BlobStore::new(bucket, prefix, &settings.object_store)?,
        )),
    };
    info!("Model registry opened at {}", settings.model_registry_dir);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_scheme() {
        assert_eq!(
            RegistryLocation::parse("artifacts/models").unwrap(),
            RegistryLocation::Local(PathBuf::from("artifacts/models"))
        );
        assert_eq!(
            RegistryLocation::parse("file:///var/lib/models").unwrap(),
            RegistryLocation::Local(PathBuf::from("/var/lib/models"))
        );
        assert_eq!(
            RegistryLocation::parse("s3://ml-artifacts/forecaster/models/").unwrap(),
            RegistryLocation::S3 {
                bucket: "ml-artifacts".to_string(),
                prefix: "forecaster/models".to_string(),
            }
        );
        assert_eq!(
            RegistryLocation::parse("s3://ml-artifacts").unwrap(),
            RegistryLocation::S3 {
                bucket: "ml-artifacts".to_string(),
                prefix: String::new(),
            }
        );
    }

    #[test]
    fn test_location_rejects_empty() {
        assert!(RegistryLocation::parse("  ").is_err());
    }
}
