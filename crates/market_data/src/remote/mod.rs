pub mod candle_response;
pub mod company_response;
pub mod envelope_response;
pub mod error_response;
pub mod fundamentals_response;
pub mod market_data_client;
pub mod market_status_response;
pub mod normalize;
pub mod quote_response;
pub mod transport;

pub use envelope_response::ContractRules;
pub use market_data_client::{Endpoint, MarketDataClient};
pub use transport::ReqwestTransport;
