use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const BUY_THRESHOLD: f64 = 0.55;
pub const SELL_THRESHOLD: f64 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PredictionLabel {
    Buy,
    Hold,
    Sell,
}

impl PredictionLabel {
    pub fn from_probability(probability_up: f64) -> Self {
        if probability_up > BUY_THRESHOLD {
            Self::Buy
        } else if probability_up < SELL_THRESHOLD {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDataStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub request_id: String,
    pub symbol: String,
    pub exchange: String,
    pub prediction: PredictionLabel,
    pub raw_prediction: f64,
    pub probability_up: f64,
    pub probability_down: f64,
    pub confidence: f64,
    pub risk_score: f64,
    pub expected_return: f64,
    pub forecast_horizon: String,
    pub model_version: String,
    pub degraded_input: bool,
    pub input_data_status: InputDataStatus,
    pub drift_status: String,
    pub features: BTreeMap<String, f64>,
    pub inference_latency_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionItem {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One line of the append-only prediction audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub model_version: String,
    pub features: BTreeMap<String, f64>,
    pub prediction: f64,
    #[serde(default)]
    pub label: Option<PredictionLabel>,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_thresholds() {
        assert_eq!(PredictionLabel::from_probability(0.56), PredictionLabel::Buy);
        assert_eq!(PredictionLabel::from_probability(0.55), PredictionLabel::Hold);
        assert_eq!(PredictionLabel::from_probability(0.45), PredictionLabel::Hold);
        assert_eq!(PredictionLabel::from_probability(0.44), PredictionLabel::Sell);
    }

    #[test]
    fn test_label_wire_format() {
        let json = serde_json::to_string(&PredictionLabel::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
    }
}
