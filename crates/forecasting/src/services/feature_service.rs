use std::sync::Arc;

use common::config::Settings;
use common::errors::{ServiceError, ServiceResult};
use common::models::{Exchange, FeaturesResult};
use market_data::MarketDataSource;
use tracing::{debug, warn};

use crate::features::FeatureEngine;

pub struct FeatureService {
    source: Arc<dyn MarketDataSource>,
    engine: FeatureEngine,
    default_lookback: usize,
    max_lookback: usize,
}

impl FeatureService {
    pub fn new(source: Arc<dyn MarketDataSource>, settings: &Settings) -> Self {
        Self {
            source,
            engine: FeatureEngine::from_settings(settings),
            default_lookback: settings.default_lookback,
            max_lookback: settings.max_lookback,
        }
    }

    pub fn resolve_window(&self, lookback: Option<usize>) -> usize {
        lookback
            .unwrap_or(self.default_lookback)
            .clamp(1, self.max_lookback.max(1))
    }

    pub async fn build_features(
        &self,
        symbol: &str,
        exchange: Exchange,
        lookback: Option<usize>,
    ) -> ServiceResult<FeaturesResult> {
        let window = self.resolve_window(lookback);
        let candles = self.source.get_candles(symbol, exchange, window).await?;

        let fundamentals = match self.source.get_fundamentals(symbol, exchange).await {
            Ok(fundamentals) => Some(fundamentals),
            Err(e) => {
                warn!("Fundamentals unavailable for {}, continuing without: {}", symbol, e);
                None
            }
        };
        let degraded_input = candles.envelope.is_degraded()
            || fundamentals.as_ref().is_some_and(|f| f.envelope.is_degraded());

        let features = self
            .engine
            .compute(&candles.data.candles, fundamentals.as_ref().map(|f| &f.data))?;
        let upstream_latest_timestamp = features
            .last()
            .map(|row| row.timestamp)
            .ok_or_else(|| ServiceError::InsufficientData {
                symbol: symbol.to_string(),
                requested: window,
                received: 0,
            })?;

        debug!(
            "Built {} feature rows for {} (degraded: {})",
            features.len(),
            candles.data.symbol,
            degraded_input
        );
        Ok(FeaturesResult {
            symbol: candles.data.symbol,
            window_used: window,
            upstream_latest_timestamp,
            degraded_input,
            features,
        })
    }
}
