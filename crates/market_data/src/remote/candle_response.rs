use chrono::{DateTime, Utc};
use common::models::{Candle, CandleSeries, UpstreamEnvelope, validate_sequence};
use serde::Deserialize;

use super::envelope_response::{ContractRules, require_symbol};
use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct CandleResponse {
    #[serde(alias = "interval_start", alias = "time", alias = "datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "open_price")]
    pub open: f64,
    #[serde(alias = "high_price")]
    pub high: f64,
    #[serde(alias = "low_price")]
    pub low: f64,
    #[serde(alias = "close_price")]
    pub close: f64,
    #[serde(alias = "volume_sum")]
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct CandleSeriesResponse {
    #[serde(default = "default_interval")]
    pub interval: String,
    pub candles: Vec<CandleResponse>,
}

fn default_interval() -> String {
    "1m".to_string()
}

impl RemoteResponse<CandleSeries> for CandleSeriesResponse {
    fn to_domain(
        &self,
        envelope: &UpstreamEnvelope,
        rules: &ContractRules,
    ) -> Result<CandleSeries, String> {
        let candles: Vec<Candle> = self
            .candles
            .iter()
            .map(|c| Candle {
                timestamp: c.timestamp,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            })
            .collect();

        for (idx, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|e| format!("candles[{idx}]: {e}"))?;
        }
        validate_sequence(&candles, rules.max_close_jump)?;

        Ok(CandleSeries {
            symbol: require_symbol(envelope)?,
            interval: self.interval.clone(),
            candles,
        })
    }
}
