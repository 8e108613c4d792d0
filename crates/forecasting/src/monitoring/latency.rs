use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySnapshot {
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub recent_calls: usize,
}

pub struct LatencyTracker {
    window: usize,
    samples: Mutex<VecDeque<f64>>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

impl LatencyTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    pub fn record(&self, latency_ms: f64) {
        let mut samples = self.samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(latency_ms);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return LatencySnapshot {
                avg_latency_ms: 0.0,
                p95_latency_ms: 0.0,
                recent_calls: 0,
            };
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let rank = ((0.95 * n as f64).ceil() as usize).clamp(1, n);
        LatencySnapshot {
            avg_latency_ms: round4(sorted.iter().sum::<f64>() / n as f64),
            p95_latency_ms: round4(sorted[rank - 1]),
            recent_calls: n,
        }
    }
}
