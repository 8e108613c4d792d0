use chrono::{DateTime, Utc};
use common::models::{Quote, UpstreamEnvelope};
use serde::Deserialize;

use super::envelope_response::{ContractRules, require_symbol};
use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    pub price: f64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

impl RemoteResponse<Quote> for QuoteResponse {
    fn to_domain(&self, envelope: &UpstreamEnvelope, _rules: &ContractRules) -> Result<Quote, String> {
        if !(self.price > 0.0) {
            return Err(format!("price must be > 0 (got {})", self.price));
        }
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("previous_close", self.previous_close),
        ] {
            if let Some(v) = value.filter(|v| !(*v > 0.0)) {
                return Err(format!("{name} must be > 0 (got {v})"));
            }
        }
        if let Some(v) = self.volume.filter(|v| !(*v >= 0.0)) {
            return Err(format!("volume must be >= 0 (got {v})"));
        }

        Ok(Quote {
            symbol: require_symbol(envelope)?,
            price: self.price,
            open: self.open,
            high: self.high,
            low: self.low,
            previous_close: self.previous_close,
            volume: self.volume,
            currency: self.currency.clone(),
            timestamp: self.timestamp,
        })
    }
}
