use serde_json::{Value, json};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error codes the upstream feed reports in its `error_code` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamErrorCode {
    #[error("EXCHANGE_UNAVAILABLE")]
    ExchangeUnavailable,
    #[error("RATE_LIMITED")]
    RateLimited,
    #[error("INVALID_INPUT")]
    InvalidInput,
    #[error("SCHEMA_MISMATCH")]
    SchemaMismatch,
    #[error("STALE_DATA")]
    StaleData,
    #[error("PARTIAL_DATA")]
    PartialData,
    #[error("{0}")]
    Unknown(String),
}

impl From<&str> for UpstreamErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "EXCHANGE_UNAVAILABLE" => Self::ExchangeUnavailable,
            "RATE_LIMITED" => Self::RateLimited,
            "INVALID_INPUT" => Self::InvalidInput,
            "SCHEMA_MISMATCH" => Self::SchemaMismatch,
            "STALE_DATA" => Self::StaleData,
            "PARTIAL_DATA" => Self::PartialData,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl UpstreamErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ExchangeUnavailable => 503,
            Self::RateLimited => 429,
            Self::InvalidInput => 422,
            Self::SchemaMismatch | Self::StaleData | Self::PartialData | Self::Unknown(_) => 502,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExchangeUnavailable | Self::RateLimited | Self::StaleData | Self::PartialData
        )
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("upstream unavailable after {attempts} attempts calling {url}: {cause}")]
    UpstreamUnavailable {
        url: String,
        attempts: u32,
        cause: String,
    },
    #[error("upstream rejected request ({code}): {message}")]
    Upstream {
        code: UpstreamErrorCode,
        message: String,
    },
    #[error("upstream payload does not match schema_version {expected} contract: {message}")]
    SchemaMismatch {
        expected: &'static str,
        message: String,
        offending_keys: Vec<String>,
    },
    #[error("insufficient upstream data for {symbol}: requested {requested}, received {received}")]
    InsufficientData {
        symbol: String,
        requested: usize,
        received: usize,
    },
    #[error("feature completeness {actual:.4} is below the required {required:.4}")]
    FeatureCompleteness { required: f64, actual: f64 },
    #[error("quote for {symbol} is {age_seconds}s old (max {max_age_seconds}s)")]
    StaleQuote {
        symbol: String,
        age_seconds: i64,
        max_age_seconds: i64,
    },
    #[error("latest candle for {symbol} is {age_seconds}s old (max {max_age_seconds}s)")]
    StaleCandle {
        symbol: String,
        age_seconds: i64,
        max_age_seconds: i64,
    },
    #[error("exchange {exchange} is closed (session: {session})")]
    ExchangeClosed { exchange: String, session: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("dataset is empty; cannot train model")]
    EmptyDataset,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("model failure: {0}")]
    Model(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Machine-readable code for the routing layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Upstream { .. } => "upstream_error",
            Self::SchemaMismatch { .. } => "upstream_schema_mismatch",
            Self::InsufficientData { .. } => "insufficient_upstream_data",
            Self::FeatureCompleteness { .. } => "feature_completeness_below_threshold",
            Self::StaleQuote { .. } => "stale_quote",
            Self::StaleCandle { .. } => "stale_candle",
            Self::ExchangeClosed { .. } => "exchange_closed",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::EmptyDataset => "empty_dataset",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage_error",
            Self::Model(_) => "model_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::UpstreamUnavailable { .. } => 503,
            Self::Upstream { code, .. } => code.http_status(),
            Self::SchemaMismatch { .. } => 502,
            Self::InsufficientData { .. }
            | Self::FeatureCompleteness { .. }
            | Self::EmptyDataset
            | Self::InvalidInput(_) => 422,
            Self::StaleQuote { .. } | Self::StaleCandle { .. } | Self::ExchangeClosed { .. } => 409,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) => 409,
            Self::Storage(_) | Self::Model(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => {
                500
            }
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::UpstreamUnavailable {
                url,
                attempts,
                cause,
            } => json!({ "url": url, "attempts": attempts, "cause": cause }),
            Self::Upstream { code, message } => {
                json!({ "error_code": code.to_string(), "message": message })
            }
            Self::SchemaMismatch {
                expected,
                message,
                offending_keys,
            } => json!({
                "schema_version": expected,
                "message": message,
                "offending_keys": offending_keys,
            }),
            Self::InsufficientData {
                symbol,
                requested,
                received,
            } => json!({
                "symbol": symbol,
                "requested_lookback": requested,
                "received_candles": received,
            }),
            Self::FeatureCompleteness { required, actual } => {
                json!({ "required": required, "actual": actual })
            }
            Self::StaleQuote {
                symbol,
                age_seconds,
                max_age_seconds,
            }
            | Self::StaleCandle {
                symbol,
                age_seconds,
                max_age_seconds,
            } => json!({
                "symbol": symbol,
                "age_seconds": age_seconds,
                "max_age_seconds": max_age_seconds,
            }),
            Self::ExchangeClosed { exchange, session } => {
                json!({ "exchange": exchange, "session": session })
            }
            other => json!({ "message": other.to_string() }),
        }
    }
}
