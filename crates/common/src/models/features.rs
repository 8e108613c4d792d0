use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature columns the regression model is trained and served on.
pub const FEATURE_COLUMNS: [&str; 4] = ["close", "simple_return", "moving_average", "rolling_volatility"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub simple_return: f64,
    pub moving_average: f64,
    pub rolling_volatility: f64,
    #[serde(default)]
    pub return_5d: f64,
    #[serde(default)]
    pub zscore_20: f64,
    #[serde(default)]
    pub drawdown: f64,
    #[serde(default)]
    pub fund_pe_ratio: f64,
    #[serde(default)]
    pub fund_pb_ratio: f64,
    #[serde(default)]
    pub fund_market_cap: f64,
}

impl FeatureRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        let value = match column {
            "close" => self.close,
            "simple_return" => self.simple_return,
            "moving_average" => self.moving_average,
            "rolling_volatility" => self.rolling_volatility,
            "return_5d" => self.return_5d,
            "zscore_20" => self.zscore_20,
            "drawdown" => self.drawdown,
            "fund_pe_ratio" => self.fund_pe_ratio,
            "fund_pb_ratio" => self.fund_pb_ratio,
            "fund_market_cap" => self.fund_market_cap,
            _ => return None,
        };
        Some(value)
    }

    /// Values for `columns` in order, or the first unknown column name.
    pub fn vector<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<f64>, String> {
        columns
            .iter()
            .map(|c| self.value(c.as_ref()).ok_or_else(|| c.as_ref().to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesResult {
    pub symbol: String,
    pub window_used: usize,
    pub upstream_latest_timestamp: DateTime<Utc>,
    pub degraded_input: bool,
    pub features: Vec<FeatureRow>,
}

impl FeaturesResult {
    pub fn latest(&self) -> Option<&FeatureRow> {
        self.features.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
}
