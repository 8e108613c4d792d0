use common::errors::{ServiceError, ServiceResult};
use common::models::RidgeModel;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub fn version_key(version: &str, document: &str) -> String {
    format!("{version}/{document}")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn encode_json<T: Serialize>(value: &T) -> ServiceResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

pub fn decode_json<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> ServiceResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| ServiceError::Storage(format!("corrupt registry document {key}: {e}")))
}

/// Serialized artifact bytes and their checksum.
pub fn encode_model(model: &RidgeModel) -> ServiceResult<(Vec<u8>, String)> {
    let bytes = encode_json(model)?;
    let checksum = sha256_hex(&bytes);
    Ok((bytes, checksum))
}

pub fn decode_model(key: &str, bytes: &[u8], expected_sha256: Option<&str>) -> ServiceResult<RidgeModel> {
    if let Some(expected) = expected_sha256 {
        let actual = sha256_hex(bytes);
        if actual != expected {
            return Err(ServiceError::Model(format!(
                "checksum mismatch for {key}: expected {expected}, found {actual}"
            )));
        }
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ServiceError::Model(format!("unreadable model artifact {key}: {e}")))
}
