use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshnessSnapshot {
    pub upstream_last_seen: Option<DateTime<Utc>>,
    pub model_last_trained: Option<DateTime<Utc>>,
    pub last_prediction_time: Option<DateTime<Utc>>,
}

/// Last-write-wins timestamps.
#[derive(Debug, Default)]
pub struct FreshnessTracker {
    inner: Mutex<FreshnessSnapshot>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_upstream_seen(&self, at: DateTime<Utc>) {
        self.inner.lock().upstream_last_seen = Some(at);
    }

    pub fn mark_model_trained(&self, at: DateTime<Utc>) {
        self.inner.lock().model_last_trained = Some(at);
    }

    pub fn mark_prediction(&self, at: DateTime<Utc>) {
        self.inner.lock().last_prediction_time = Some(at);
    }

    pub fn snapshot(&self) -> FreshnessSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_independent() {
        let tracker = FreshnessTracker::new();
        assert_eq!(tracker.snapshot(), FreshnessSnapshot::default());

        let now = Utc::now();
        tracker.mark_prediction(now);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.last_prediction_time, Some(now));
        assert!(snapshot.upstream_last_seen.is_none());
        assert!(snapshot.model_last_trained.is_none());
    }
}
