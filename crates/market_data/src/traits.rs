use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::errors::{ServiceError, ServiceResult};
use common::models::{
    CandleSeries, CompanyProfile, Exchange, Fundamentals, MarketStatus, Quote, Upstream,
    UpstreamEnvelope,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::remote::envelope_response::ContractRules;

pub const DEFAULT_INTRADAY_INTERVAL: &str = "1m";
pub const DEFAULT_INTRADAY_LIMIT: usize = 300;

/// Status and body of one HTTP exchange, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse, TransportError>;
}

/// Wire payload that converts into a validated domain object.
pub trait RemoteResponse<T>: DeserializeOwned {
    fn to_domain(&self, envelope: &UpstreamEnvelope, rules: &ContractRules) -> Result<T, String>;
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_quote(&self, symbol: &str, exchange: Exchange) -> ServiceResult<Upstream<Quote>>;

    /// Recent bars; `interval` and `limit` fall back to `1m` and 300.
    async fn get_intraday(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Option<&str>,
        limit: Option<usize>,
    ) -> ServiceResult<Upstream<CandleSeries>>;

    async fn get_historical(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: &str,
    ) -> ServiceResult<Upstream<CandleSeries>>;

    async fn get_fundamentals(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> ServiceResult<Upstream<Fundamentals>>;

    async fn get_company(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> ServiceResult<Upstream<CompanyProfile>>;

    async fn get_market_status(&self, exchange: Exchange) -> ServiceResult<Upstream<MarketStatus>>;

    /// The `lookback` most recent daily candles, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        exchange: Exchange,
        lookback: usize,
    ) -> ServiceResult<Upstream<CandleSeries>> {
        let end = Utc::now();
        let days = (lookback as i64).saturating_mul(3).max(30);
        let start = end - TimeDelta::days(days);

        let mut response = self.get_historical(symbol, exchange, start, end, "1d").await?;
        let received = response.data.candles.len();
        if received < lookback {
            return Err(ServiceError::InsufficientData {
                symbol: symbol.to_string(),
                requested: lookback,
                received,
            });
        }

        response.data.candles.drain(..received - lookback);
        debug!("Assembled {} candles for {} on {}", lookback, symbol, exchange);
        Ok(response)
    }
}
