use std::collections::{BTreeMap, HashMap, VecDeque};

use common::models::FeatureStats;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Healthy,
    DriftDetected,
    InsufficientSamples,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::DriftDetected => "drift_detected",
            Self::InsufficientSamples => "insufficient_samples",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub recent_mean: f64,
    pub recent_std: f64,
    pub mean_deviation_ratio: f64,
    pub std_deviation_ratio: f64,
    pub drift: bool,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub status: DriftStatus,
    pub details: BTreeMap<String, FeatureDrift>,
}

/// Rolling per-feature windows compared against a training baseline.
pub struct DriftDetector {
    threshold: f64,
    window: usize,
    recent: Mutex<HashMap<String, VecDeque<f64>>>,
}

fn population_stats(values: &VecDeque<f64>) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

impl DriftDetector {
    pub fn new(threshold: f64, window: usize) -> Self {
        Self {
            threshold,
            window: window.max(1),
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, features: &BTreeMap<String, f64>) {
        let mut recent = self.recent.lock();
        for (name, value) in features {
            let values = recent.entry(name.clone()).or_default();
            if values.len() == self.window {
                values.pop_front();
            }
            values.push_back(*value);
        }
    }

    /// Features without recent samples are reported but never flagged. A baseline
    /// none of whose features has been observed yet is `InsufficientSamples`.
    pub fn evaluate(&self, baseline: &BTreeMap<String, FeatureStats>) -> DriftReport {
        let recent = self.recent.lock();
        let empty = VecDeque::new();

        let details: BTreeMap<String, FeatureDrift> = baseline
            .iter()
            .map(|(name, stats)| {
                let values = recent.get(name).unwrap_or(&empty);
                let (recent_mean, recent_std) = population_stats(values);
                let mean_deviation_ratio =
                    (recent_mean - stats.mean).abs() / stats.mean.abs().max(EPSILON);
                let std_deviation_ratio =
                    (recent_std - stats.std).abs() / stats.std.abs().max(EPSILON);
                let drift = !values.is_empty()
                    && (mean_deviation_ratio > self.threshold || std_deviation_ratio > self.threshold);

                let report = FeatureDrift {
                    baseline_mean: stats.mean,
                    baseline_std: stats.std,
                    recent_mean,
                    recent_std,
                    mean_deviation_ratio,
                    std_deviation_ratio,
                    drift,
                    samples: values.len(),
                };
                (name.clone(), report)
            })
            .collect();

        let status = if details.values().any(|d| d.drift) {
            DriftStatus::DriftDetected
        } else if !details.is_empty() && details.values().all(|d| d.samples == 0) {
            DriftStatus::InsufficientSamples
        } else {
            DriftStatus::Healthy
        };
        DriftReport { status, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BTreeMap<String, FeatureStats> {
        BTreeMap::from([("close".to_string(), FeatureStats { mean: 100.0, std: 2.0 })])
    }

    fn sample(value: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("close".to_string(), value)])
    }

    #[test]
    fn test_tight_samples_are_healthy() {
        let detector = DriftDetector::new(0.2, 100);
        for i in 0..50 {
            detector.record(&sample(if i % 2 == 0 { 98.0 } else { 102.0 }));
        }
        let report = detector.evaluate(&baseline());
        assert_eq!(report.status, DriftStatus::Healthy);
        assert_eq!(report.details["close"].samples, 50);
    }

    #[test]
    fn test_mean_shift_detected() {
        let detector = DriftDetector::new(0.2, 100);
        for i in 0..50 {
            detector.record(&sample(if i % 2 == 0 { 128.0 } else { 132.0 }));
        }
        let report = detector.evaluate(&baseline());
        assert_eq!(report.status, DriftStatus::DriftDetected);
        assert!(report.details["close"].mean_deviation_ratio > 0.2);
    }

    #[test]
    fn test_window_is_bounded() {
        let detector = DriftDetector::new(0.2, 10);
        for i in 0..25 {
            detector.record(&sample(i as f64));
        }
        let report = detector.evaluate(&baseline());
        assert_eq!(report.details["close"].samples, 10);
        assert_eq!(report.details["close"].recent_mean, 19.5);
    }

    #[test]
    fn test_no_samples_reported_as_insufficient() {
        let detector = DriftDetector::new(0.2, 10);
        let report = detector.evaluate(&baseline());
        assert_eq!(report.status, DriftStatus::InsufficientSamples);
        assert_eq!(report.status.as_str(), "insufficient_samples");
        assert!(!report.details["close"].drift);
        assert_eq!(report.details["close"].samples, 0);
    }

    #[test]
    fn test_unobserved_feature_not_flagged() {
        let detector = DriftDetector::new(0.2, 10);
        detector.record(&sample(100.0));
        let mut stats = baseline();
        stats.insert("volume".to_string(), FeatureStats { mean: 5.0, std: 1.0 });
        let report = detector.evaluate(&stats);
        assert_eq!(report.status, DriftStatus::Healthy);
        assert_eq!(report.details["volume"].samples, 0);
        assert!(!report.details["volume"].drift);
    }

    #[test]
    fn test_empty_baseline_is_healthy() {
        let detector = DriftDetector::new(0.2, 10);
        assert_eq!(detector.evaluate(&BTreeMap::new()).status, DriftStatus::Healthy);
    }
}
