use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::errors::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Staging,
    Production,
}

impl FromStr for AppEnv {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ServiceError::Config(format!("APP_ENV: unknown profile {other}"))),
        }
    }
}

impl AppEnv {
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Staging => "info",
            Self::Production => "warn",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStoreSettings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: AppEnv,
    pub log_level: String,

    pub market_data_base_url: Url,
    pub market_data_timeout: Duration,
    pub market_data_retry_attempts: u32,
    pub market_data_retry_backoff: Duration,
    pub default_exchange: String,

    pub default_lookback: usize,
    pub max_lookback: usize,
    pub inference_lookback: usize,
    pub ma_window: usize,
    pub vol_window: usize,
    pub max_close_jump: f64,
    pub min_feature_completeness: f64,
    pub quote_max_age_seconds: i64,
    pub candle_max_age_seconds: i64,

    pub model_registry_dir: String,
    pub object_store: ObjectStoreSettings,

    pub audit_log_file: String,
    pub audit_log_limit: usize,

    pub drift_threshold: f64,
    pub drift_window: usize,
    pub latency_window: usize,

    pub train_symbols: Vec<String>,
    pub train_lookback: usize,
    pub train_test_size: f64,
    pub train_random_state: u64,
    pub train_cv_folds: usize,
    pub train_l2_alpha: f64,
}

impl Settings {
    pub fn from_env() -> ServiceResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env: AppEnv = parse_or(&lookup, "APP_ENV", AppEnv::Development)?;
        let log_level = lookup("LOG_LEVEL")
            .map(|level| level.to_lowercase())
            .unwrap_or_else(|| app_env.default_log_level().to_string());

        let raw_url = lookup("MARKET_DATA_BASE_URL")
            .ok_or_else(|| ServiceError::Config("MARKET_DATA_BASE_URL must be set".to_string()))?;
        let market_data_base_url = Url::parse(&raw_url)
            .map_err(|e| ServiceError::Config(format!("MARKET_DATA_BASE_URL: {e}")))?;

        let settings = Self {
            app_env,
            log_level,
            market_data_base_url,
            market_data_timeout: seconds(&lookup, "MARKET_DATA_TIMEOUT_SECONDS", 5.0)?,
            market_data_retry_attempts: parse_or(&lookup, "MARKET_DATA_RETRY_ATTEMPTS", 3)?,
            market_data_retry_backoff: seconds(&lookup, "MARKET_DATA_RETRY_BACKOFF_SECONDS", 0.5)?,
            default_exchange: lookup("MARKET_DATA_EXCHANGE")
                .map(|e| e.to_uppercase())
                .unwrap_or_else(|| "NASDAQ".to_string()),
            default_lookback: parse_or(&lookup, "DEFAULT_LOOKBACK", 100)?,
            max_lookback: parse_or(&lookup, "MAX_LOOKBACK", 1000)?,
            inference_lookback: parse_or(&lookup, "INFERENCE_LOOKBACK", 60)?,
            ma_window: parse_or(&lookup, "MA_WINDOW", 14)?,
            vol_window: parse_or(&lookup, "VOL_WINDOW", 14)?,
            max_close_jump: parse_or(&lookup, "MAX_CLOSE_JUMP", 0.5)?,
            min_feature_completeness: parse_or(&lookup, "MIN_FEATURE_COMPLETENESS", 0.98)?,
            quote_max_age_seconds: parse_or(&lookup, "QUOTE_MAX_AGE_SECONDS", 90)?,
            candle_max_age_seconds: parse_or(&lookup, "CANDLE_MAX_AGE_SECONDS", 600)?,
            model_registry_dir: lookup("MODEL_REGISTRY_DIR")
                .unwrap_or_else(|| "artifacts/models".to_string()),
            object_store: ObjectStoreSettings {
                endpoint: lookup("OBJECT_STORE_ENDPOINT"),
                region: lookup("OBJECT_STORE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: lookup("OBJECT_STORE_ACCESS_KEY_ID"),
                secret_access_key: lookup("OBJECT_STORE_SECRET_ACCESS_KEY"),
            },
            audit_log_file: lookup("AUDIT_LOG_FILE")
                .unwrap_or_else(|| "artifacts/audit/predictions.jsonl".to_string()),
            audit_log_limit: parse_or(&lookup, "AUDIT_LOG_LIMIT", 500)?,
            drift_threshold: parse_or(&lookup, "DRIFT_THRESHOLD", 0.2)?,
            drift_window: parse_or(&lookup, "DRIFT_WINDOW", 100)?,
            latency_window: parse_or(&lookup, "LATENCY_WINDOW", 200)?,
            train_symbols: lookup("TRAIN_SYMBOLS")
                .map(|raw| split_symbols(&raw))
                .unwrap_or_else(|| vec!["AAPL".into(), "MSFT".into(), "GOOGL".into()]),
            train_lookback: parse_or(&lookup, "TRAIN_LOOKBACK", 250)?,
            train_test_size: parse_or(&lookup, "TRAIN_TEST_SIZE", 0.2)?,
            train_random_state: parse_or(&lookup, "TRAIN_RANDOM_STATE", 42)?,
            train_cv_folds: parse_or(&lookup, "TRAIN_CV_FOLDS", 3)?,
            train_l2_alpha: parse_or(&lookup, "TRAIN_L2_ALPHA", 1e-6)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> ServiceResult<()> {
        if self.market_data_retry_attempts == 0 {
            return Err(ServiceError::Config(
                "MARKET_DATA_RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_feature_completeness) {
            return Err(ServiceError::Config(
                "MIN_FEATURE_COMPLETENESS must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.train_test_size) {
            return Err(ServiceError::Config(
                "TRAIN_TEST_SIZE must be within [0, 1)".to_string(),
            ));
        }
        if self.ma_window == 0 || self.vol_window == 0 {
            return Err(ServiceError::Config(
                "MA_WINDOW and VOL_WINDOW must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> ServiceResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ServiceError::Config(format!("{key}: {e}"))),
        _ => Ok(default),
    }
}

/// Non-negative, finite seconds; negatives clamp to zero.
fn seconds<F>(lookup: &F, key: &str, default: f64) -> ServiceResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value: f64 = parse_or(lookup, key, default)?;
    if value.is_nan() {
        return Err(ServiceError::Config(format!("{key}: not a number")));
    }
    Duration::try_from_secs_f64(value.max(0.0))
        .map_err(|e| ServiceError::Config(format!("{key}: {e}")))
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(pairs: &[(&str, &str)]) -> ServiceResult<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let settings = settings_with(&[("MARKET_DATA_BASE_URL", "https://example.com")]).unwrap();
        assert_eq!(settings.market_data_retry_attempts, 3);
        assert_eq!(settings.quote_max_age_seconds, 90);
        assert_eq!(settings.candle_max_age_seconds, 600);
        assert_eq!(settings.max_close_jump, 0.5);
        assert_eq!(settings.min_feature_completeness, 0.98);
        assert_eq!(settings.market_data_retry_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let err = settings_with(&[]).unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_profile_switches_log_level() {
        let base = ("MARKET_DATA_BASE_URL", "https://example.com");
        let dev = settings_with(&[base, ("APP_ENV", "development")]).unwrap();
        let staging = settings_with(&[base, ("APP_ENV", "staging")]).unwrap();
        let prod = settings_with(&[base, ("APP_ENV", "production")]).unwrap();
        assert_eq!(dev.log_level, "debug");
        assert_eq!(staging.log_level, "info");
        assert_eq!(prod.log_level, "warn");
    }

    #[test]
    fn test_malformed_value_names_variable() {
        let err = settings_with(&[
            ("MARKET_DATA_BASE_URL", "https://example.com"),
            ("MA_WINDOW", "fourteen"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("MA_WINDOW"));
    }

    #[test]
    fn test_unrepresentable_durations_rejected() {
        for raw in ["inf", "NaN", "1e300"] {
            let err = settings_with(&[
                ("MARKET_DATA_BASE_URL", "https://example.com"),
                ("MARKET_DATA_TIMEOUT_SECONDS", raw),
            ])
            .unwrap_err();
            assert!(matches!(err, ServiceError::Config(_)));
            assert!(err.to_string().contains("MARKET_DATA_TIMEOUT_SECONDS"));
        }

        let settings = settings_with(&[
            ("MARKET_DATA_BASE_URL", "https://example.com"),
            ("MARKET_DATA_RETRY_BACKOFF_SECONDS", "-2"),
        ])
        .unwrap();
        assert_eq!(settings.market_data_retry_backoff, Duration::ZERO);
    }

    #[test]
    fn test_train_symbols_parsed() {
        let settings = settings_with(&[
            ("MARKET_DATA_BASE_URL", "https://example.com"),
            ("TRAIN_SYMBOLS", " aapl, msft ,,"),
        ])
        .unwrap();
        assert_eq!(settings.train_symbols, vec!["AAPL", "MSFT"]);
    }
}
