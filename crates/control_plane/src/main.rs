use clap::Parser;
use dotenvy::dotenv;
use tracing::{debug, error};

use common::config::Settings;
use common::logger;
use control_plane::AppContext;

use crate::cli::Cli;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    logger::setup_logger(&settings.log_level);
    debug!("Forecaster starting up...");

    let ctx = AppContext::build(settings).await?;
    match cli::run(&ctx, cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            if let Some(service) = e.downcast_ref::<common::errors::ServiceError>() {
                error!("{} failed: {}", service.code(), service);
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "error": service.code(),
                        "status": service.status_code(),
                        "details": service.details(),
                    }))?
                );
            }
            Err(e)
        }
    }
}
