pub mod config;
pub mod errors;
pub mod logger;
pub mod models;

pub use config::Settings;
pub use errors::{ServiceError, ServiceResult, UpstreamErrorCode};
