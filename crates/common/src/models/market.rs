use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    #[serde(rename = "NSE")]
    Nse,
    #[serde(rename = "BSE")]
    Bse,
    #[serde(rename = "NASDAQ")]
    Nasdaq,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
            Self::Nasdaq => "NASDAQ",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "NSE" => Ok(Self::Nse),
            "BSE" => Ok(Self::Bse),
            "NASDAQ" => Ok(Self::Nasdaq),
            other => Err(format!("unknown exchange {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Cache,
}

/// Versioned wrapper every upstream response carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamEnvelope {
    pub schema_version: String,
    pub status: String,
    pub exchange: Exchange,
    pub symbol: Option<String>,
    pub data_source: Option<DataSource>,
    pub exchange_status: Option<String>,
}

impl UpstreamEnvelope {
    /// Data served from a cache/backup path rather than the live feed.
    pub fn is_degraded(&self) -> bool {
        matches!(self.data_source, Some(DataSource::Cache))
    }
}

/// A validated domain object together with the envelope it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream<T> {
    pub envelope: UpstreamEnvelope,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub pb_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub eps: Option<f64>,
    pub revenue: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub ebitda: Option<f64>,
    pub net_income: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub roe: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub session: String,
    pub timezone: String,
    pub server_time_utc: DateTime<Utc>,
    pub local_exchange_time: DateTime<Utc>,
}
