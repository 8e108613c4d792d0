use serde_json::{Map, Value};

use super::market_data_client::Endpoint;

const MAX_SAMPLE_KEYS: usize = 8;

const FUNDAMENTAL_FIELDS: &[&str] = &[
    "market_cap",
    "pe_ratio",
    "pb_ratio",
    "forward_pe",
    "eps",
    "revenue",
    "revenue_growth",
    "ebitda",
    "net_income",
    "debt_to_equity",
    "roe",
    "sector",
    "industry",
    "country",
    "currency",
];

/// Folds the known wrapper shapes of each endpoint into one flat canonical object.
pub fn normalize_payload(endpoint: Endpoint, payload: Value) -> Value {
    let Value::Object(original) = payload else {
        return payload;
    };
    let mut normalized = original.clone();

    match endpoint {
        Endpoint::Quote => merge_wrapper(&original, "quote", &mut normalized),
        Endpoint::Intraday | Endpoint::Historical => {
            merge_wrapper(&original, "data", &mut normalized)
        }
        Endpoint::Company => merge_wrapper(&original, "company", &mut normalized),
        Endpoint::Fundamentals => {
            if original.contains_key("market_cap") && original.contains_key("pe_ratio") {
                let fields: Map<String, Value> = FUNDAMENTAL_FIELDS
                    .iter()
                    .filter_map(|key| original.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect();
                normalized.insert("fundamentals".to_string(), Value::Object(fields));
            }
        }
        Endpoint::MarketStatus => {
            if let Some(Value::Object(market)) = original.get("market_status") {
                let pick = |primary: &str, fallback: &str| {
                    market
                        .get(primary)
                        .or_else(|| market.get(fallback))
                        .cloned()
                        .unwrap_or(Value::Null)
                };
                let or_default = |key: &str, default: &str| {
                    market
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| Value::String(default.to_string()))
                };
                normalized.insert("is_open".to_string(), pick("is_open", "market_open"));
                normalized.insert("session".to_string(), or_default("session", "unknown"));
                normalized.insert("timezone".to_string(), or_default("timezone", "UTC"));
                normalized.insert(
                    "server_time_utc".to_string(),
                    pick("server_time_utc", "timestamp"),
                );
                normalized.insert(
                    "local_exchange_time".to_string(),
                    pick("local_exchange_time", "timestamp"),
                );
            }
        }
    }

    Value::Object(normalized)
}

fn merge_wrapper(original: &Map<String, Value>, wrapper: &str, target: &mut Map<String, Value>) {
    if let Some(Value::Object(inner)) = original.get(wrapper) {
        for (key, value) in inner {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Bounded sample of top-level keys, reported when a payload breaks the contract.
pub fn sample_keys(payload: &Value) -> Vec<String> {
    match payload {
        Value::Object(map) => map.keys().take(MAX_SAMPLE_KEYS).cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_wrapper_flattened() {
        let payload = json!({
            "schema_version": "1.1",
            "exchange": "NASDAQ",
            "quote": { "symbol": "AAPL", "price": 190.5 },
        });
        let normalized = normalize_payload(Endpoint::Quote, payload);
        assert_eq!(normalized["price"], 190.5);
        assert_eq!(normalized["symbol"], "AAPL");
    }

    #[test]
    fn test_flat_fundamentals_wrapped() {
        let payload = json!({ "market_cap": 1.0e12, "pe_ratio": 28.0, "sector": "Tech" });
        let normalized = normalize_payload(Endpoint::Fundamentals, payload);
        assert_eq!(normalized["fundamentals"]["pe_ratio"], 28.0);
        assert_eq!(normalized["fundamentals"]["sector"], "Tech");
    }

    #[test]
    fn test_market_status_aliases() {
        let payload = json!({
            "market_status": { "market_open": true, "timestamp": "2024-05-01T14:00:00Z" },
        });
        let normalized = normalize_payload(Endpoint::MarketStatus, payload);
        assert_eq!(normalized["is_open"], true);
        assert_eq!(normalized["session"], "unknown");
        assert_eq!(normalized["timezone"], "UTC");
        assert_eq!(normalized["server_time_utc"], "2024-05-01T14:00:00Z");
        assert_eq!(normalized["local_exchange_time"], "2024-05-01T14:00:00Z");
    }

    #[test]
    fn test_sample_keys_bounded() {
        let payload: Value = Value::Object(
            (0..20).map(|i| (format!("k{i:02}"), Value::from(i))).collect(),
        );
        assert_eq!(sample_keys(&payload).len(), MAX_SAMPLE_KEYS);
        assert!(sample_keys(&json!([1, 2])).is_empty());
    }
}
