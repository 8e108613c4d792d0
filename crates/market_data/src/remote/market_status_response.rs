use chrono::{DateTime, Utc};
use common::models::{MarketStatus, UpstreamEnvelope};
use serde::Deserialize;

use super::envelope_response::ContractRules;
use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct MarketStatusResponse {
    pub is_open: bool,
    pub session: String,
    pub timezone: String,
    pub server_time_utc: DateTime<Utc>,
    pub local_exchange_time: DateTime<Utc>,
}

impl RemoteResponse<MarketStatus> for MarketStatusResponse {
    fn to_domain(
        &self,
        _envelope: &UpstreamEnvelope,
        _rules: &ContractRules,
    ) -> Result<MarketStatus, String> {
        Ok(MarketStatus {
            is_open: self.is_open,
            session: self.session.clone(),
            timezone: self.timezone.clone(),
            server_time_utc: self.server_time_utc,
            local_exchange_time: self.local_exchange_time,
        })
    }
}
