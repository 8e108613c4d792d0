use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::config::Settings;
use common::errors::{ServiceError, ServiceResult, UpstreamErrorCode};
use common::models::{
    CandleSeries, CompanyProfile, Exchange, Fundamentals, MarketStatus, Quote, SCHEMA_VERSION,
    Upstream,
};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::candle_response::CandleSeriesResponse;
use super::company_response::CompanyResponse;
use super::envelope_response::{ContractRules, EnvelopeResponse};
use super::error_response::ErrorResponse;
use super::fundamentals_response::FundamentalsResponse;
use super::market_status_response::MarketStatusResponse;
use super::normalize::{normalize_payload, sample_keys};
use super::quote_response::QuoteResponse;
use super::transport::ReqwestTransport;
use crate::traits::{
    DEFAULT_INTRADAY_INTERVAL, DEFAULT_INTRADAY_LIMIT, MarketDataSource, RemoteResponse, Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Quote,
    Intraday,
    Historical,
    Fundamentals,
    Company,
    MarketStatus,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Quote => "/quote",
            Self::Intraday => "/intraday",
            Self::Historical => "/historical",
            Self::Fundamentals => "/fundamentals",
            Self::Company => "/company",
            Self::MarketStatus => "/market-status",
        }
    }
}

/// Outcome of one attempt that did not yield a payload.
enum AttemptFailure {
    Retry(String),
    Fatal(ServiceError),
}

pub struct MarketDataClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry_attempts: u32,
    retry_backoff: Duration,
    rules: ContractRules,
}

impl MarketDataClient {
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        let transport = ReqwestTransport::new(settings.market_data_timeout)?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, settings: &Settings) -> Self {
        Self {
            transport,
            base_url: settings
                .market_data_base_url
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            retry_attempts: settings.market_data_retry_attempts.max(1),
            retry_backoff: settings.market_data_retry_backoff,
            rules: ContractRules {
                max_close_jump: settings.max_close_jump,
            },
        }
    }

    /// Calls `endpoint`, normalizes the payload and validates it against the versioned contract.
    pub async fn fetch<R, T>(
        &self,
        endpoint: Endpoint,
        params: Vec<(String, String)>,
    ) -> ServiceResult<Upstream<T>>
    where
        R: RemoteResponse<T>,
    {
        let payload = self.get_with_retry(endpoint, &params).await?;
        let normalized = normalize_payload(endpoint, payload);
        let keys = sample_keys(&normalized);
        let mismatch = |message: String| ServiceError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            message,
            offending_keys: keys.clone(),
        };

        let envelope = serde_json::from_value::<EnvelopeResponse>(normalized.clone())
            .map_err(|e| mismatch(e.to_string()))?
            .validate()
            .map_err(&mismatch)?;
        let response: R = serde_json::from_value(normalized).map_err(|e| mismatch(e.to_string()))?;
        let data = response
            .to_domain(&envelope, &self.rules)
            .map_err(&mismatch)?;

        if envelope.is_degraded() {
            debug!("{} served from cache for {:?}", endpoint.path(), envelope.symbol);
        }
        Ok(Upstream { envelope, data })
    }

    async fn get_with_retry(
        &self,
        endpoint: Endpoint,
        params: &[(String, String)],
    ) -> ServiceResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let mut last_cause = String::from("no attempt made");

        for attempt in 1..=self.retry_attempts {
            match self.attempt(&url, params).await {
                Ok(payload) => return Ok(payload),
                Err(AttemptFailure::Fatal(err)) => return Err(err),
                Err(AttemptFailure::Retry(cause)) => {
                    warn!(
                        "Upstream call {} failed (attempt {}/{}): {}",
                        url, attempt, self.retry_attempts, cause
                    );
                    last_cause = cause;
                }
            }

            if attempt < self.retry_attempts {
                sleep(self.retry_backoff * attempt).await;
            }
        }

        Err(ServiceError::UpstreamUnavailable {
            url,
            attempts: self.retry_attempts,
            cause: last_cause,
        })
    }

    async fn attempt(&self, url: &str, params: &[(String, String)]) -> Result<Value, AttemptFailure> {
        let raw = self
            .transport
            .get(url, params)
            .await
            .map_err(|e| AttemptFailure::Retry(e.to_string()))?;

        if raw.status >= 400 {
            return Err(match ErrorResponse::parse(&raw.body) {
                Some(body) => {
                    let code = UpstreamErrorCode::from(body.error_code.as_str());
                    if code.is_retryable() {
                        AttemptFailure::Retry(format!("{code}: {}", body.message))
                    } else {
                        AttemptFailure::Fatal(ServiceError::Upstream {
                            code,
                            message: body.message,
                        })
                    }
                }
                None if raw.status >= 500 || raw.status == 429 => {
                    AttemptFailure::Retry(format!("HTTP {}", raw.status))
                }
                None => AttemptFailure::Fatal(ServiceError::Upstream {
                    code: UpstreamErrorCode::SchemaMismatch,
                    message: format!("malformed upstream error payload (HTTP {})", raw.status),
                }),
            });
        }

        serde_json::from_str(&raw.body)
            .map_err(|e| AttemptFailure::Retry(format!("invalid JSON body: {e}")))
    }
}

fn symbol_params(symbol: &str, exchange: Exchange) -> Vec<(String, String)> {
    vec![
        ("symbol".to_string(), symbol.trim().to_uppercase()),
        ("exchange".to_string(), exchange.to_string()),
    ]
}

#[async_trait]
impl MarketDataSource for MarketDataClient {
    async fn get_quote(&self, symbol: &str, exchange: Exchange) -> ServiceResult<Upstream<Quote>> {
        self.fetch::<QuoteResponse, _>(Endpoint::Quote, symbol_params(symbol, exchange))
            .await
    }

    async fn get_intraday(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Option<&str>,
        limit: Option<usize>,
    ) -> ServiceResult<Upstream<CandleSeries>> {
        let mut params = symbol_params(symbol, exchange);
        params.push((
            "interval".to_string(),
            interval.unwrap_or(DEFAULT_INTRADAY_INTERVAL).to_string(),
        ));
        params.push((
            "limit".to_string(),
            limit.unwrap_or(DEFAULT_INTRADAY_LIMIT).to_string(),
        ));
        self.fetch::<CandleSeriesResponse, _>(Endpoint::Intraday, params)
            .await
    }

    async fn get_historical(
        &self,
        symbol: &str,
        exchange: Exchange,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: &str,
    ) -> ServiceResult<Upstream<CandleSeries>> {
        let mut params = symbol_params(symbol, exchange);
        params.push(("interval".to_string(), interval.to_string()));
        params.push((
            "start".to_string(),
            start.to_rfc3339_opts(SecondsFormat::Secs, false),
        ));
        params.push(("end".to_string(), end.to_rfc3339_opts(SecondsFormat::Secs, false)));
        self.fetch::<CandleSeriesResponse, _>(Endpoint::Historical, params)
            .await
    }

    async fn get_fundamentals(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> ServiceResult<Upstream<Fundamentals>> {
        self.fetch::<FundamentalsResponse, _>(Endpoint::Fundamentals, symbol_params(symbol, exchange))
            .await
    }

    async fn get_company(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> ServiceResult<Upstream<CompanyProfile>> {
        self.fetch::<CompanyResponse, _>(Endpoint::Company, symbol_params(symbol, exchange))
            .await
    }

    async fn get_market_status(&self, exchange: Exchange) -> ServiceResult<Upstream<MarketStatus>> {
        let params = vec![("exchange".to_string(), exchange.to_string())];
        self.fetch::<MarketStatusResponse, _>(Endpoint::MarketStatus, params)
            .await
    }
}
