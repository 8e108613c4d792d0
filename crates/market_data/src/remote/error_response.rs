use serde::Deserialize;

/// Body the feed returns alongside a 4xx/5xx status.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

impl ErrorResponse {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}
