use common::models::{CompanyProfile, UpstreamEnvelope};
use serde::Deserialize;

use super::envelope_response::{ContractRules, require_symbol};
use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct CompanyResponse {
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

impl RemoteResponse<CompanyProfile> for CompanyResponse {
    fn to_domain(
        &self,
        envelope: &UpstreamEnvelope,
        _rules: &ContractRules,
    ) -> Result<CompanyProfile, String> {
        if let Some(cap) = self.market_cap.filter(|v| !(*v >= 0.0)) {
            return Err(format!("market_cap must be >= 0 (got {cap})"));
        }
        Ok(CompanyProfile {
            symbol: require_symbol(envelope)?,
            company_name: self.company_name.clone(),
            sector: self.sector.clone(),
            industry: self.industry.clone(),
            description: self.description.clone(),
            website: self.website.clone(),
            market_cap: self.market_cap,
        })
    }
}
