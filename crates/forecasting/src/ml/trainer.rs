use std::sync::Arc;

use chrono::Utc;
use common::errors::{ServiceError, ServiceResult};
use common::models::{
    Exchange, FEATURE_COLUMNS, MetricMap, ModelMetadata, ModelPackage, ModelParams, RidgeModel,
    TrainingConfig, TrainingOutcome,
};
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use storage::ModelRegistry;
use tracing::{info, warn};

use super::backtest::Backtester;
use super::dataset::{Dataset, DatasetBuilder};
use super::regression::{RegressionMetrics, fit_ridge};

pub const ALGORITHM: &str = "ridge_linear_regression";

pub struct Trainer {
    datasets: DatasetBuilder,
    registry: Arc<dyn ModelRegistry>,
    backtester: Backtester,
}

fn fit(dataset: &Dataset, indices: &[usize], params: &ModelParams) -> ServiceResult<RidgeModel> {
    fit_ridge(
        dataset.features(indices).view(),
        dataset.targets(indices).view(),
        params,
    )
}

fn predict(model: &RidgeModel, dataset: &Dataset, indices: &[usize]) -> ServiceResult<Vec<f64>> {
    indices
        .iter()
        .map(|&i| model.predict_row(&dataset.rows[i].features))
        .collect()
}

fn targets(dataset: &Dataset, indices: &[usize]) -> Vec<f64> {
    dataset.targets(indices).to_vec()
}

fn insert_metrics(metrics: &mut MetricMap, evaluated: RegressionMetrics) {
    metrics.insert("rmse".to_string(), evaluated.rmse);
    metrics.insert("mae".to_string(), evaluated.mae);
    metrics.insert("r2".to_string(), evaluated.r2);
}

/// Contiguous, near-equal partitions; the first `len % k` get one extra index.
fn array_split(indices: &[usize], k: usize) -> Vec<&[usize]> {
    let base = indices.len() / k;
    let extra = indices.len() % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        folds.push(&indices[start..start + size]);
        start += size;
    }
    folds
}

impl Trainer {
    pub fn new(datasets: DatasetBuilder, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            datasets,
            registry,
            backtester: Backtester,
        }
    }

    /// Builds the dataset, fits and evaluates a model, and registers it under
    /// `version` (or the registry's next version).
    pub async fn train(
        &self,
        config: &TrainingConfig,
        version: Option<String>,
    ) -> ServiceResult<TrainingOutcome> {
        let exchange: Exchange = config
            .exchange
            .parse()
            .map_err(ServiceError::InvalidInput)?;
        if !(0.0..1.0).contains(&config.test_size) {
            return Err(ServiceError::InvalidInput(format!(
                "test_size must be within [0, 1), got {}",
                config.test_size
            )));
        }

        let dataset = self
            .datasets
            .build(&config.symbols, exchange, config.lookback)
            .await?;
        if dataset.is_empty() {
            return Err(ServiceError::EmptyDataset);
        }

        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        let mut rng = StdRng::seed_from_u64(config.random_state);
        indices.shuffle(&mut rng);

        let split_idx = (dataset.len() as f64 * (1.0 - config.test_size)) as usize;
        let (train_idx, val_idx) = indices.split_at(split_idx.min(dataset.len()));
        if train_idx.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "{} rows leave nothing to train on with test_size {}",
                dataset.len(),
                config.test_size
            )));
        }
        let val_idx = if val_idx.is_empty() {
            warn!("Validation split is empty; evaluating on the training rows");
            train_idx
        } else {
            val_idx
        };

        let model = fit(&dataset, train_idx, &config.model_params)?;

        let mut training_metrics = MetricMap::new();
        insert_metrics(
            &mut training_metrics,
            RegressionMetrics::evaluate(&targets(&dataset, train_idx), &predict(&model, &dataset, train_idx)?),
        );

        let val_predictions = predict(&model, &dataset, val_idx)?;
        let val_targets = targets(&dataset, val_idx);
        let mut metrics = MetricMap::new();
        insert_metrics(&mut metrics, RegressionMetrics::evaluate(&val_targets, &val_predictions));

        if config.cv_folds > 1 {
            let fold_rmse = self.cross_validate(&dataset, &indices, config)?;
            if !fold_rmse.is_empty() {
                let values = Array1::from_vec(fold_rmse);
                metrics.insert("cv_rmse_mean".to_string(), values.mean().unwrap_or(0.0));
                metrics.insert("cv_rmse_std".to_string(), values.std(0.0));
            }
        }
        self.backtester
            .run(&val_predictions, &val_targets)
            .extend_metrics(&mut metrics);

        let version = match version {
            Some(v) => v,
            None => self.registry.next_version().await?,
        };
        let metadata = ModelMetadata {
            version: version.clone(),
            trained_at: Utc::now(),
            algorithm: ALGORITHM.to_string(),
            lookback: config.lookback,
            symbols: config.symbols.clone(),
            exchange: exchange.to_string(),
            test_size: config.test_size,
            random_state: config.random_state,
            cv_folds: config.cv_folds,
            model_params: config.model_params.clone(),
            training_metrics: training_metrics.clone(),
            validation_metrics: metrics.clone(),
            dataset_window: dataset.summary.window.clone(),
            training_feature_stats: dataset.feature_stats(train_idx).into_iter().collect(),
        };
        let package = ModelPackage {
            version: version.clone(),
            model,
            metadata,
            metrics: metrics.clone(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            dataset_summary: dataset.summary.clone(),
        };
        self.registry.save_model_package(&package).await?;

        info!(
            "Trained {} on {} rows: rmse={:.6} r2={:.4}",
            version,
            dataset.len(),
            metrics.get("rmse").copied().unwrap_or_default(),
            metrics.get("r2").copied().unwrap_or_default()
        );
        Ok(TrainingOutcome {
            version,
            metrics,
            training_metrics,
            dataset_summary: dataset.summary,
        })
    }

    fn cross_validate(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        config: &TrainingConfig,
    ) -> ServiceResult<Vec<f64>> {
        let mut fold_rmse = Vec::with_capacity(config.cv_folds);
        for fold in array_split(indices, config.cv_folds) {
            let rest: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|i| !fold.contains(i))
                .collect();
            if fold.is_empty() || rest.is_empty() {
                continue;
            }
            let model = fit(dataset, &rest, &config.model_params)?;
            let evaluated =
                RegressionMetrics::evaluate(&targets(dataset, fold), &predict(&model, dataset, fold)?);
            fold_rmse.push(evaluated.rmse);
        }
        Ok(fold_rmse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_split_sizes() {
        let indices: Vec<usize> = (0..10).collect();
        let folds = array_split(&indices, 3);
        let sizes: Vec<usize> = folds.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(folds[1], &[4, 5, 6]);

        let short = array_split(&indices[..2], 3);
        assert_eq!(short.iter().map(|f| f.len()).sum::<usize>(), 2);
    }
}
