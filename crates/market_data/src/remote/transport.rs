use std::time::Duration;

use async_trait::async_trait;
use common::errors::{ServiceError, ServiceResult};
use reqwest::Client;

use crate::traits::{RawResponse, Transport, TransportError};

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("market_forecaster/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| TransportError(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read body: {e}")))?;
        Ok(RawResponse { status, body })
    }
}
