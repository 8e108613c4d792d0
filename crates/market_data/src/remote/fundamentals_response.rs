use common::models::{Fundamentals, UpstreamEnvelope};
use serde::Deserialize;

use super::envelope_response::{ContractRules, require_symbol};
use crate::traits::RemoteResponse;

#[derive(Debug, Clone, Deserialize)]
pub struct FundamentalsPayload {
    pub market_cap: f64,
    pub pe_ratio: f64,
    #[serde(default)]
    pub pb_ratio: Option<f64>,
    #[serde(default)]
    pub forward_pe: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub ebitda: Option<f64>,
    #[serde(default)]
    pub net_income: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FundamentalsResponse {
    pub fundamentals: FundamentalsPayload,
}

impl RemoteResponse<Fundamentals> for FundamentalsResponse {
    fn to_domain(
        &self,
        envelope: &UpstreamEnvelope,
        _rules: &ContractRules,
    ) -> Result<Fundamentals, String> {
        require_symbol(envelope)?;
        let f = self.fundamentals.clone();
        Ok(Fundamentals {
            market_cap: f.market_cap,
            pe_ratio: f.pe_ratio,
            pb_ratio: f.pb_ratio,
            forward_pe: f.forward_pe,
            eps: f.eps,
            revenue: f.revenue,
            revenue_growth: f.revenue_growth,
            ebitda: f.ebitda,
            net_income: f.net_income,
            debt_to_equity: f.debt_to_equity,
            roe: f.roe,
            sector: f.sector,
            industry: f.industry,
            country: f.country,
            currency: f.currency,
        })
    }
}
