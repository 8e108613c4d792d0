use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use common::config::ObjectStoreSettings;
use common::errors::{ServiceError, ServiceResult};
use tracing::debug;

use super::BlobStore;

/// Registry blobs in an S3-compatible bucket under an optional key prefix.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3BlobStore {
    pub fn new(bucket: String, prefix: String, settings: &ObjectStoreSettings) -> ServiceResult<Self> {
        Ok(Self {
            client: make_s3_client(settings)?,
            bucket,
            prefix,
        })
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn root_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }
}

fn make_s3_client(settings: &ObjectStoreSettings) -> ServiceResult<Client> {
    let (Some(access_key_id), Some(secret_access_key)) =
        (settings.access_key_id.clone(), settings.secret_access_key.clone())
    else {
        return Err(ServiceError::Config(
            "OBJECT_STORE_ACCESS_KEY_ID and OBJECT_STORE_SECRET_ACCESS_KEY are required for an s3:// registry"
                .to_string(),
        ));
    };

    let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "model-registry");
    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &settings.endpoint {
        builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
    }
    Ok(Client::from_conf(builder.build()))
}

fn storage_error<E>(action: &str, key: &str, err: E) -> ServiceError
where
    E: std::error::Error,
{
    ServiceError::Storage(format!("{action} {key} failed: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }

    async fn get(&self, key: &str) -> ServiceResult<Option<Vec<u8>>> {
        let full_key = self.key(key);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None);
            }
            Err(err) => return Err(storage_error("get_object", &full_key, err)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read body of", &full_key, e))?
            .into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> ServiceResult<()> {
        let full_key = self.key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .content_type("application/json")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| storage_error("put_object", &full_key, e))?;
        debug!("Stored s3://{}/{}", self.bucket, full_key);
        Ok(())
    }

    async fn dir_exists(&self, dir: &str) -> ServiceResult<bool> {
        let prefix = format!("{}/", self.key(dir));
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| storage_error("list_objects_v2", &prefix, e))?;
        Ok(!output.contents().is_empty())
    }

    async fn list_dirs(&self) -> ServiceResult<Vec<String>> {
        let root = self.root_prefix();
        let mut dirs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&root)
                .delimiter("/")
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| storage_error("list_objects_v2", &root, e))?;

            dirs.extend(
                output
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix())
                    .filter_map(|p| p.strip_prefix(root.as_str()))
                    .map(|p| p.trim_end_matches('/').to_string())
                    .filter(|p| !p.is_empty()),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_settings(with_keys: bool) -> ObjectStoreSettings {
        ObjectStoreSettings {
            endpoint: Some("http://localhost:9000".to_string()),
            region: "us-east-1".to_string(),
            access_key_id: with_keys.then(|| "minio".to_string()),
            secret_access_key: with_keys.then(|| "minio-secret".to_string()),
        }
    }

    #[tokio::test]
    async fn test_keys_respect_prefix() {
        let store = S3BlobStore::new("bucket".into(), "models".into(), &object_settings(true)).unwrap();
        assert_eq!(store.key("v3/model.json"), "models/v3/model.json");
        assert_eq!(store.root_prefix(), "models/");

        let bare = S3BlobStore::new("bucket".into(), String::new(), &object_settings(true)).unwrap();
        assert_eq!(bare.key("registry.json"), "registry.json");
        assert_eq!(bare.root_prefix(), "");
    }

    #[tokio::test]
    async fn test_credentials_required() {
        let err = S3BlobStore::new("bucket".into(), String::new(), &object_settings(false))
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
