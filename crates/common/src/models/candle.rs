use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Prices are strictly positive once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be > 0 (got {value})"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume must be >= 0 (got {})", self.volume));
        }
        if self.high < self.open.max(self.close).max(self.low) {
            return Err(format!("invalid high for OHLC candle at {}", self.timestamp));
        }
        if self.low > self.open.min(self.close).min(self.high) {
            return Err(format!("invalid low for OHLC candle at {}", self.timestamp));
        }
        Ok(())
    }
}

/// Validates ordering and step size across a candle sequence.
pub fn validate_sequence(candles: &[Candle], max_close_jump: f64) -> Result<(), String> {
    for pair in candles.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.timestamp <= prev.timestamp {
            return Err("candles must have strictly ascending timestamps".to_string());
        }
        if prev.close > 0.0 && (next.close - prev.close).abs() / prev.close > max_close_jump {
            return Err(format!(
                "candle close jump at {} exceeds {:.0}% single-step threshold",
                next.timestamp,
                max_close_jump * 100.0
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.timestamp)
    }
}
