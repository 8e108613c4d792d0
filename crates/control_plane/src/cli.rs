use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use common::models::{Exchange, TrainingState};
use control_plane::{AppContext, StartOutcome};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "forecaster")]
#[command(about = "Market-data to prediction pipeline", version, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train a model and register it as the active version.
    Train {
        #[arg(long)]
        version: Option<String>,
        /// Comma-separated symbols; defaults to TRAIN_SYMBOLS.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Run through the training manager and poll until the job settles.
        #[arg(long, default_value_t = false)]
        background: bool,
    },
    Predict {
        symbol: String,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        version: Option<String>,
    },
    PredictBatch {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        version: Option<String>,
    },
    /// List registered models.
    Models,
    Model {
        version: String,
    },
    Activate {
        version: String,
    },
    History,
    Drift {
        #[arg(long)]
        version: Option<String>,
    },
    Monitoring,
    Audit {
        #[arg(long)]
        limit: Option<usize>,
    },
    AuditClear,
}

fn exchange_or_default(ctx: &AppContext, raw: Option<String>) -> anyhow::Result<Exchange> {
    raw.unwrap_or_else(|| ctx.settings.default_exchange.clone())
        .parse::<Exchange>()
        .map_err(|e| anyhow!(e))
}

pub async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Train {
            version,
            symbols,
            background,
        } => {
            let mut config = ctx.training.default_config().clone();
            if !symbols.is_empty() {
                config.symbols = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
            }
            if background {
                let outcome = ctx.training.start_training(version, Some(config));
                if outcome == StartOutcome::AlreadyRunning {
                    return Ok(json!({ "status": outcome.as_str() }));
                }
                while ctx.training.status().state == TrainingState::Running {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                serde_json::to_value(ctx.training.status())?
            } else {
                let outcome = ctx.trainer.train(&config, version).await?;
                ctx.freshness.mark_model_trained(chrono::Utc::now());
                serde_json::to_value(outcome)?
            }
        }
        Command::Predict {
            symbol,
            exchange,
            lookback,
            version,
        } => {
            let exchange = exchange_or_default(ctx, exchange)?;
            let result = ctx
                .inference
                .predict(&symbol, exchange, lookback, version.as_deref())
                .await?;
            serde_json::to_value(result)?
        }
        Command::PredictBatch {
            symbols,
            exchange,
            version,
        } => {
            let exchange = exchange_or_default(ctx, exchange)?;
            let items = ctx
                .inference
                .predict_batch(&symbols, exchange, version.as_deref())
                .await;
            serde_json::to_value(items)?
        }
        Command::Models => serde_json::to_value(ctx.registry.list_models().await?)?,
        Command::Model { version } => {
            serde_json::to_value(ctx.registry.model_details(&version).await?)?
        }
        Command::Activate { version } => {
            ctx.registry
                .activate_version(&version)
                .await
                .with_context(|| format!("activating {version}"))?;
            json!({ "active_version": version })
        }
        Command::History => serde_json::to_value(ctx.registry.training_history().await?)?,
        Command::Drift { version } => {
            serde_json::to_value(ctx.drift_report(version.as_deref()).await?)?
        }
        Command::Monitoring => serde_json::to_value(ctx.monitoring().await?)?,
        Command::Audit { limit } => serde_json::to_value(ctx.audit.get_recent(limit).await?)?,
        Command::AuditClear => {
            ctx.audit.clear().await?;
            json!({ "status": "cleared" })
        }
    };
    Ok(output)
}
