use common::models::MetricMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestReport {
    pub trades: usize,
    pub hit_rate: f64,
    pub avg_return: f64,
}

impl BacktestReport {
    pub fn extend_metrics(&self, metrics: &mut MetricMap) {
        metrics.insert("trades".to_string(), self.trades as f64);
        metrics.insert("hit_rate".to_string(), self.hit_rate);
        metrics.insert("avg_return".to_string(), self.avg_return);
    }
}

/// Long/short by the sign of each prediction, held for one period.
#[derive(Debug, Default, Clone, Copy)]
pub struct Backtester;

fn direction(value: f64) -> f64 {
    if value > 0.0 { 1.0 } else { -1.0 }
}

impl Backtester {
    pub fn run(&self, predictions: &[f64], realized: &[f64]) -> BacktestReport {
        let trades = predictions.len().min(realized.len());
        if trades == 0 {
            return BacktestReport {
                trades: 0,
                hit_rate: 0.0,
                avg_return: 0.0,
            };
        }

        let pairs = predictions.iter().zip(realized);
        let hits = pairs
            .clone()
            .filter(|(p, r)| direction(**p) == direction(**r))
            .count();
        let total_return: f64 = pairs.map(|(p, r)| direction(*p) * r).sum();

        BacktestReport {
            trades,
            hit_rate: hits as f64 / trades as f64,
            avg_return: total_return / trades as f64,
        }
    }
}
