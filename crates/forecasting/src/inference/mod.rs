use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::config::Settings;
use common::errors::{ServiceError, ServiceResult};
use common::models::{
    AuditRecord, BatchPredictionItem, Exchange, InputDataStatus, PredictionLabel, PredictionResult,
};
use market_data::MarketDataSource;
use storage::{AuditLogger, ModelRegistry};
use tracing::{info, warn};
use uuid::Uuid;

use crate::monitoring::{DriftDetector, FreshnessTracker, LatencyTracker};
use crate::services::FeatureService;

const DEGRADED_CONFIDENCE_FACTOR: f64 = 0.7;
const RISK_VOLATILITY_SCALE: f64 = 10.0;
const FORECAST_HORIZON: &str = "5d";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferencePolicy {
    pub default_lookback: usize,
    pub quote_max_age_seconds: i64,
    pub candle_max_age_seconds: i64,
}

impl InferencePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_lookback: settings.inference_lookback,
            quote_max_age_seconds: settings.quote_max_age_seconds,
            candle_max_age_seconds: settings.candle_max_age_seconds,
        }
    }
}

/// Scores, labels and risk figures derived from one raw model output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scoring {
    pub probability_up: f64,
    pub label: PredictionLabel,
    pub confidence: f64,
    pub risk_score: f64,
    pub expected_return: f64,
}

impl Scoring {
    pub fn from_raw(raw: f64, degraded: bool, rolling_volatility: f64, return_5d: f64) -> Self {
        let probability_up = (0.5 + raw / 2.0).clamp(0.0, 1.0);
        let mut confidence = ((probability_up - 0.5).abs() * 2.0).clamp(0.0, 1.0);
        if degraded {
            confidence *= DEGRADED_CONFIDENCE_FACTOR;
        }
        Self {
            probability_up,
            label: PredictionLabel::from_probability(probability_up),
            confidence,
            risk_score: (rolling_volatility * RISK_VOLATILITY_SCALE).clamp(0.0, 1.0),
            expected_return: return_5d * (2.0 * probability_up - 1.0),
        }
    }
}

pub struct InferenceEngine {
    source: Arc<dyn MarketDataSource>,
    features: Arc<FeatureService>,
    registry: Arc<dyn ModelRegistry>,
    drift: Arc<DriftDetector>,
    freshness: Arc<FreshnessTracker>,
    latency: Arc<LatencyTracker>,
    audit: Arc<AuditLogger>,
    policy: InferencePolicy,
}

impl InferenceEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        features: Arc<FeatureService>,
        registry: Arc<dyn ModelRegistry>,
        drift: Arc<DriftDetector>,
        freshness: Arc<FreshnessTracker>,
        latency: Arc<LatencyTracker>,
        audit: Arc<AuditLogger>,
        policy: InferencePolicy,
    ) -> Self {
        Self {
            source,
            features,
            registry,
            drift,
            freshness,
            latency,
            audit,
            policy,
        }
    }

    /// Runs the gated pipeline: model, market status, quote age, candle age,
    /// then scoring and bookkeeping. Any gate failure aborts with its typed error.
    pub async fn predict(
        &self,
        symbol: &str,
        exchange: Exchange,
        lookback: Option<usize>,
        version: Option<&str>,
    ) -> ServiceResult<PredictionResult> {
        let started = Instant::now();
        let symbol = symbol.trim().to_uppercase();

        let loaded = self.registry.load_model(version).await?;

        let status = self.source.get_market_status(exchange).await?;
        if !status.data.is_open {
            return Err(ServiceError::ExchangeClosed {
                exchange: exchange.to_string(),
                session: status.data.session,
            });
        }

        let quote = self.source.get_quote(&symbol, exchange).await?;
        let quote_age = (Utc::now() - quote.data.timestamp).num_seconds();
        if quote_age > self.policy.quote_max_age_seconds {
            return Err(ServiceError::StaleQuote {
                symbol,
                age_seconds: quote_age,
                max_age_seconds: self.policy.quote_max_age_seconds,
            });
        }

        let window = lookback.unwrap_or(self.policy.default_lookback);
        let features = self
            .features
            .build_features(&symbol, exchange, Some(window))
            .await?;
        let latest = features.latest().ok_or_else(|| ServiceError::InsufficientData {
            symbol: symbol.clone(),
            requested: window,
            received: 0,
        })?;
        let candle_age = (Utc::now() - latest.timestamp).num_seconds();
        if candle_age > self.policy.candle_max_age_seconds {
            return Err(ServiceError::StaleCandle {
                symbol,
                age_seconds: candle_age,
                max_age_seconds: self.policy.candle_max_age_seconds,
            });
        }

        let x = latest
            .vector(&loaded.feature_columns)
            .map_err(|column| ServiceError::Model(format!("unknown feature column {column}")))?;
        let raw_prediction = loaded.model.predict_row(&x)?;
        let degraded = features.degraded_input || quote.envelope.is_degraded();
        let scoring = Scoring::from_raw(
            raw_prediction,
            degraded,
            latest.rolling_volatility,
            latest.return_5d,
        );

        let snapshot: BTreeMap<String, f64> = loaded
            .feature_columns
            .iter()
            .cloned()
            .zip(x.iter().copied())
            .collect();
        let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let now = Utc::now();

        self.latency.record(latency_ms);
        self.drift.record(&snapshot);
        let drift_status = self
            .drift
            .evaluate(&loaded.metadata.training_feature_stats)
            .status;
        self.freshness.mark_upstream_seen(now);
        self.freshness.mark_prediction(now);

        let request_id = Uuid::new_v4().to_string();
        self.audit
            .log_prediction(&AuditRecord {
                request_id: request_id.clone(),
                symbol: Some(symbol.clone()),
                model_version: loaded.version.clone(),
                features: snapshot.clone(),
                prediction: raw_prediction,
                label: Some(scoring.label),
                timestamp: now,
                latency_ms,
            })
            .await?;

        info!(
            "Served {:?} for {} with {} (p_up={:.3}, drift={})",
            scoring.label,
            symbol,
            loaded.version,
            scoring.probability_up,
            drift_status.as_str()
        );
        Ok(PredictionResult {
            request_id,
            symbol,
            exchange: exchange.to_string(),
            prediction: scoring.label,
            raw_prediction,
            probability_up: scoring.probability_up,
            probability_down: 1.0 - scoring.probability_up,
            confidence: scoring.confidence,
            risk_score: scoring.risk_score,
            expected_return: scoring.expected_return,
            forecast_horizon: FORECAST_HORIZON.to_string(),
            model_version: loaded.version,
            degraded_input: degraded,
            input_data_status: if degraded {
                InputDataStatus::Degraded
            } else {
                InputDataStatus::Healthy
            },
            drift_status: drift_status.as_str().to_string(),
            features: snapshot,
            inference_latency_ms: latency_ms,
            timestamp: now,
        })
    }

    /// Per-symbol results; one failing symbol never aborts the batch.
    pub async fn predict_batch(
        &self,
        symbols: &[String],
        exchange: Exchange,
        version: Option<&str>,
    ) -> Vec<BatchPredictionItem> {
        let mut items = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.trim().to_uppercase();
            let item = match self.predict(&symbol, exchange, None, version).await {
                Ok(result) => BatchPredictionItem {
                    symbol,
                    result: Some(result),
                    error_code: None,
                    error: None,
                },
                Err(e) => {
                    warn!("Batch prediction for {} failed: {}", symbol, e);
                    BatchPredictionItem {
                        symbol,
                        result: None,
                        error_code: Some(e.code().to_string()),
                        error: Some(e.to_string()),
                    }
                }
            };
            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_maps_raw_output() {
        let s = Scoring::from_raw(0.3, false, 0.02, 0.05);
        assert!((s.probability_up - 0.65).abs() < 1e-12);
        assert_eq!(s.label, PredictionLabel::Buy);
        assert!((s.confidence - 0.3).abs() < 1e-12);
        assert!((s.risk_score - 0.2).abs() < 1e-12);
        assert!((s.expected_return - 0.05 * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_scoring_clamps_and_degrades() {
        let s = Scoring::from_raw(-5.0, true, 0.5, 0.1);
        assert_eq!(s.probability_up, 0.0);
        assert_eq!(s.label, PredictionLabel::Sell);
        assert!((s.confidence - 0.7).abs() < 1e-12);
        assert_eq!(s.risk_score, 1.0);

        let hold = Scoring::from_raw(0.02, false, 0.0, 0.0);
        assert_eq!(hold.label, PredictionLabel::Hold);
    }
}
