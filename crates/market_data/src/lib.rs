pub mod remote;
pub mod traits;

pub use remote::{Endpoint, MarketDataClient, ReqwestTransport};
pub use traits::{
    DEFAULT_INTRADAY_INTERVAL, DEFAULT_INTRADAY_LIMIT, MarketDataSource, RawResponse,
    RemoteResponse, Transport, TransportError,
};
