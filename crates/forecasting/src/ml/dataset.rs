use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::errors::ServiceResult;
use common::models::{DatasetSummary, DatasetWindow, Exchange, FEATURE_COLUMNS, FeatureStats};
use ndarray::{Array1, Array2};
use tracing::info;

use crate::services::FeatureService;

/// One training example: canonical features at `t`, realised return at `t + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<f64>,
    pub target_next_return: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<LabeledRow>,
    pub summary: DatasetSummary,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn features(&self, indices: &[usize]) -> Array2<f64> {
        let width = FEATURE_COLUMNS.len();
        Array2::from_shape_fn((indices.len(), width), |(i, j)| {
            self.rows[indices[i]].features[j]
        })
    }

    pub fn targets(&self, indices: &[usize]) -> Array1<f64> {
        indices
            .iter()
            .map(|&i| self.rows[i].target_next_return)
            .collect()
    }

    /// Population mean and std of each feature column over `indices`.
    pub fn feature_stats(&self, indices: &[usize]) -> Vec<(String, FeatureStats)> {
        let n = indices.len().max(1) as f64;
        FEATURE_COLUMNS
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values: Vec<f64> = indices.iter().map(|&i| self.rows[i].features[j]).collect();
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (name.to_string(), FeatureStats { mean, std: variance.sqrt() })
            })
            .collect()
    }
}

pub struct DatasetBuilder {
    features: Arc<FeatureService>,
}

impl DatasetBuilder {
    pub fn new(features: Arc<FeatureService>) -> Self {
        Self { features }
    }

    /// Feature tables for every symbol, labelled with the next-period return.
    /// The last row of each symbol has no label and is dropped.
    pub async fn build(
        &self,
        symbols: &[String],
        exchange: Exchange,
        lookback: usize,
    ) -> ServiceResult<Dataset> {
        let mut rows = Vec::new();
        let mut seen = BTreeSet::new();

        for symbol in symbols {
            let result = self
                .features
                .build_features(&symbol.to_uppercase(), exchange, Some(lookback))
                .await?;
            if result.features.len() < 2 {
                continue;
            }

            for pair in result.features.windows(2) {
                let (current, next) = (&pair[0], &pair[1]);
                let features = current
                    .vector(&FEATURE_COLUMNS)
                    .unwrap_or_else(|_| vec![0.0; FEATURE_COLUMNS.len()]);
                rows.push(LabeledRow {
                    symbol: result.symbol.clone(),
                    timestamp: current.timestamp,
                    features,
                    target_next_return: next.simple_return,
                });
            }
            seen.insert(result.symbol.clone());
        }

        let window = DatasetWindow {
            start: rows.iter().map(|r| r.timestamp).min(),
            end: rows.iter().map(|r| r.timestamp).max(),
        };
        let summary = DatasetSummary {
            rows: rows.len(),
            symbols: if seen.is_empty() {
                symbols.iter().map(|s| s.to_uppercase()).collect()
            } else {
                seen.into_iter().collect()
            },
            window,
        };
        info!(
            "Built dataset with {} rows across {:?}",
            summary.rows, summary.symbols
        );
        Ok(Dataset { rows, summary })
    }
}
