use common::models::{DataSource, Exchange, SCHEMA_VERSION, UpstreamEnvelope};
use serde::Deserialize;

/// Checks applied on top of the wire shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractRules {
    pub max_close_jump: f64,
}

impl Default for ContractRules {
    fn default() -> Self {
        Self { max_close_jump: 0.5 }
    }
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeResponse {
    pub schema_version: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub exchange: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub exchange_status: Option<String>,
}

fn default_status() -> String {
    "ok".to_string()
}

impl EnvelopeResponse {
    pub fn validate(&self) -> Result<UpstreamEnvelope, String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!("unsupported schema_version={}", self.schema_version));
        }
        let exchange: Exchange = self.exchange.parse()?;
        let symbol = self.symbol.as_deref().map(normalize_symbol).transpose()?;

        Ok(UpstreamEnvelope {
            schema_version: self.schema_version.clone(),
            status: self.status.clone(),
            exchange,
            symbol,
            data_source: self.data_source,
            exchange_status: self.exchange_status.clone(),
        })
    }
}

/// Upper-cases and checks `^[A-Z][A-Z0-9._-]{0,19}$`.
pub fn normalize_symbol(raw: &str) -> Result<String, String> {
    let symbol = raw.trim().to_uppercase();
    let mut chars = symbol.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    let tail_ok = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !head_ok || !tail_ok || symbol.len() > 20 {
        return Err(format!("symbol format is invalid: {raw}"));
    }
    Ok(symbol)
}

pub(crate) fn require_symbol(envelope: &UpstreamEnvelope) -> Result<String, String> {
    envelope
        .symbol
        .clone()
        .ok_or_else(|| "symbol is required".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_rules() {
        assert_eq!(normalize_symbol(" brk.b ").unwrap(), "BRK.B");
        assert!(normalize_symbol("1ABC").is_err());
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("ABCDEFGHIJKLMNOPQRSTU").is_err());
        assert!(normalize_symbol("AB CD").is_err());
    }

    #[test]
    fn test_envelope_version_enforced() {
        let raw: EnvelopeResponse = serde_json::from_value(serde_json::json!({
            "schema_version": "1.0",
            "exchange": "NASDAQ",
        }))
        .unwrap();
        assert!(raw.validate().unwrap_err().contains("schema_version"));
    }

    #[test]
    fn test_cache_source_marks_degraded() {
        let raw: EnvelopeResponse = serde_json::from_value(serde_json::json!({
            "schema_version": "1.1",
            "exchange": "nse",
            "symbol": "infy",
            "data_source": "cache",
        }))
        .unwrap();
        let envelope = raw.validate().unwrap();
        assert_eq!(envelope.exchange, Exchange::Nse);
        assert_eq!(envelope.symbol.as_deref(), Some("INFY"));
        assert!(envelope.is_degraded());
    }
}
