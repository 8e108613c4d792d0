use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::config::Settings;
use common::errors::{ServiceError, ServiceResult};
use common::models::{
    Candle, CandleSeries, CompanyProfile, DataSource, Exchange, Fundamentals, MarketStatus, Quote,
    TrainingConfig, TrainingState, Upstream, UpstreamEnvelope,
};
use control_plane::{AppContext, ContextHandle, StartOutcome};
use market_data::MarketDataSource;
use tempfile::TempDir;

/// Serves daily AAPL-like bars ending a minute ago, a fresh quote and an open session.
struct CannedMarket {
    candles: Vec<Candle>,
}

impl CannedMarket {
    fn new(count: usize) -> Self {
        let end = Utc::now() - Duration::seconds(60);
        let candles = (0..count)
            .map(|i| {
                let close = 180.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1;
                Candle {
                    timestamp: end - Duration::days((count - 1 - i) as i64),
                    open: close - 0.5,
                    high: close + 1.5,
                    low: close - 1.5,
                    close,
                    volume: 50_000_000.0,
                }
            })
            .collect();
        Self { candles }
    }

    fn envelope(exchange: Exchange, symbol: Option<&str>) -> UpstreamEnvelope {
        UpstreamEnvelope {
            schema_version: "1.1".to_string(),
            status: "success".to_string(),
            exchange,
            symbol: symbol.map(str::to_string),
            data_source: Some(DataSource::Live),
            exchange_status: Some("open".to_string()),
        }
    }
}

#[async_trait]
impl MarketDataSource for CannedMarket {
    async fn get_quote(&self, symbol: &str, exchange: Exchange) -> ServiceResult<Upstream<Quote>> {
        Ok(Upstream {
            envelope: Self::envelope(exchange, Some(symbol)),
            data: Quote {
                symbol: symbol.to_string(),
                price: 182.5,
                open: Some(181.0),
                high: Some(183.0),
                low: Some(180.5),
                previous_close: Some(181.2),
                volume: Some(1_000_000.0),
                currency: "USD".to_string(),
                timestamp: Utc::now(),
            },
        })
    }

    async fn get_intraday(
        &self,
        symbol: &str,
        _exchange: Exchange,
        _interval: Option<&str>,
        _limit: Option<usize>,
    ) -> ServiceResult<Upstream<CandleSeries>> {
        Err(ServiceError::NotFound(format!("intraday for {symbol}")))
    }

    async fn get_historical(
        &self,
        symbol: &str,
        exchange: Exchange,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        interval: &str,
    ) -> ServiceResult<Upstream<CandleSeries>> {
        Ok(Upstream {
            envelope: Self::envelope(exchange, Some(symbol)),
            data: CandleSeries {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                candles: self.candles.clone(),
            },
        })
    }

    async fn get_fundamentals(
        &self,
        symbol: &str,
        _exchange: Exchange,
    ) -> ServiceResult<Upstream<Fundamentals>> {
        Err(ServiceError::NotFound(format!("fundamentals for {symbol}")))
    }

    async fn get_company(
        &self,
        symbol: &str,
        _exchange: Exchange,
    ) -> ServiceResult<Upstream<CompanyProfile>> {
        Err(ServiceError::NotFound(format!("company {symbol}")))
    }

    async fn get_market_status(&self, exchange: Exchange) -> ServiceResult<Upstream<MarketStatus>> {
        let now = Utc::now();
        Ok(Upstream {
            envelope: Self::envelope(exchange, None),
            data: MarketStatus {
                is_open: true,
                session: "regular".to_string(),
                timezone: "America/New_York".to_string(),
                server_time_utc: now,
                local_exchange_time: now,
            },
        })
    }
}

fn settings(dir: &TempDir) -> Settings {
    let vars: HashMap<&str, String> = HashMap::from([
        ("MARKET_DATA_BASE_URL", "http://localhost:9".to_string()),
        ("MODEL_REGISTRY_DIR", dir.path().join("models").display().to_string()),
        ("AUDIT_LOG_FILE", dir.path().join("audit/predictions.jsonl").display().to_string()),
        ("TRAIN_SYMBOLS", "AAPL".to_string()),
        ("TRAIN_LOOKBACK", "30".to_string()),
        ("INFERENCE_LOOKBACK", "30".to_string()),
        ("TRAIN_CV_FOLDS", "3".to_string()),
    ]);
    Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

async fn context(dir: &TempDir) -> AppContext {
    AppContext::with_source(settings(dir), Arc::new(CannedMarket::new(30)))
        .await
        .unwrap()
}

async fn wait_for_settled(ctx: &AppContext) -> TrainingState {
    for _ in 0..200 {
        let state = ctx.training.status().state;
        if state != TrainingState::Running {
            return state;
        }
        tokio::time::sleep(StdDuration::from_millis(25)).await;
    }
    ctx.training.status().state
}

#[tokio::test]
async fn test_train_predict_and_audit() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir).await;

    let config = TrainingConfig::from_settings(&ctx.settings);
    let outcome = ctx.trainer.train(&config, None).await.unwrap();
    assert_eq!(outcome.version, "v1");
    assert_eq!(outcome.dataset_summary.symbols, vec!["AAPL"]);

    let result = ctx
        .inference
        .predict("AAPL", Exchange::Nasdaq, None, None)
        .await
        .unwrap();
    assert_eq!(result.model_version, "v1");
    assert!(!result.degraded_input);

    let audit = ctx.audit.get_recent(Some(1)).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].model_version, "v1");
    assert_eq!(audit[0].symbol.as_deref(), Some("AAPL"));

    let report = ctx.monitoring().await.unwrap();
    assert_eq!(report.active_version.as_deref(), Some("v1"));
    assert_eq!(report.latency.recent_calls, 1);
    assert!(report.freshness.last_prediction_time.is_some());
}

#[tokio::test]
async fn test_training_manager_rejects_overlapping_jobs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir).await;

    assert_eq!(ctx.training.status().state, TrainingState::Idle);
    assert_eq!(ctx.training.start_training(None, None), StartOutcome::Started);
    assert_eq!(
        ctx.training.start_training(None, None),
        StartOutcome::AlreadyRunning
    );

    let state = wait_for_settled(&ctx).await;
    let status = ctx.training.status();
    assert_eq!(state, TrainingState::Succeeded);
    assert_eq!(status.latest_version.as_deref(), Some("v1"));
    assert!(status.completed_at.is_some());
    assert!(ctx.freshness.snapshot().model_last_trained.is_some());
}

#[tokio::test]
async fn test_training_manager_records_failure() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir).await;

    let mut config = TrainingConfig::from_settings(&ctx.settings);
    config.lookback = 500;
    assert_eq!(
        ctx.training.start_training(None, Some(config)),
        StartOutcome::Started
    );

    let state = wait_for_settled(&ctx).await;
    let status = ctx.training.status();
    assert_eq!(state, TrainingState::Failed);
    assert!(status.error.is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_context_seeds_freshness_from_history() {
    let dir = TempDir::new().unwrap();
    {
        let ctx = context(&dir).await;
        let config = TrainingConfig::from_settings(&ctx.settings);
        ctx.trainer.train(&config, None).await.unwrap();
    }

    let handle = ContextHandle::new(context(&dir).await);
    let current = handle.current();
    assert!(current.freshness.snapshot().model_last_trained.is_some());

    let replaced = handle.replace(context(&dir).await);
    assert!(Arc::ptr_eq(&replaced, &handle.current()));
    assert!(!Arc::ptr_eq(&current, &handle.current()));
}

#[tokio::test]
async fn test_reload_swaps_in_context_built_from_settings() {
    let dir = TempDir::new().unwrap();
    let handle = ContextHandle::new(context(&dir).await);
    let before = handle.current();
    assert!(before.freshness.snapshot().model_last_trained.is_none());

    let config = TrainingConfig::from_settings(&before.settings);
    before.trainer.train(&config, None).await.unwrap();

    let mut updated = settings(&dir);
    updated.inference_lookback = 45;
    let reloaded = handle.reload(updated).await.unwrap();

    assert!(Arc::ptr_eq(&reloaded, &handle.current()));
    assert!(!Arc::ptr_eq(&before, &handle.current()));
    assert_eq!(reloaded.settings.inference_lookback, 45);
    assert_eq!(before.settings.inference_lookback, 30);
    assert!(reloaded.freshness.snapshot().model_last_trained.is_some());
    assert_eq!(reloaded.registry.active_version().await.unwrap().as_deref(), Some("v1"));
}
