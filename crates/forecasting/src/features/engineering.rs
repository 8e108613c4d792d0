use common::config::Settings;
use common::errors::{ServiceError, ServiceResult};
use common::models::{Candle, FeatureRow, Fundamentals};
use ta::Next;
use ta::indicators::{SimpleMovingAverage, StandardDeviation};

const RETURN_HORIZON: usize = 5;
const ZSCORE_WINDOW: usize = 20;
const DERIVED_COLUMNS: usize = 10;

/// Candle series to technical feature rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEngine {
    pub ma_window: usize,
    pub vol_window: usize,
    pub min_completeness: f64,
}

impl FeatureEngine {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ma_window: settings.ma_window,
            vol_window: settings.vol_window,
            min_completeness: settings.min_feature_completeness,
        }
    }

    pub fn compute(
        &self,
        candles: &[Candle],
        fundamentals: Option<&Fundamentals>,
    ) -> ServiceResult<Vec<FeatureRow>> {
        compute_features(
            candles,
            self.ma_window,
            self.vol_window,
            fundamentals,
            self.min_completeness,
        )
    }
}

fn window(period: usize, name: &str) -> ServiceResult<usize> {
    if period == 0 {
        return Err(ServiceError::InvalidInput(format!("{name} must be positive")));
    }
    Ok(period)
}

fn sma(period: usize, name: &str) -> ServiceResult<SimpleMovingAverage> {
    SimpleMovingAverage::new(window(period, name)?)
        .map_err(|_| ServiceError::InvalidInput(format!("invalid {name}: {period}")))
}

fn std_dev(period: usize, name: &str) -> ServiceResult<StandardDeviation> {
    StandardDeviation::new(window(period, name)?)
        .map_err(|_| ServiceError::InvalidInput(format!("invalid {name}: {period}")))
}

/// `ta` deviations divide by the count; rescale to the sample (n - 1) form.
/// Fewer than two values have no sample deviation and yield 0.
fn sample_std(population: f64, count: usize) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let n = count as f64;
    population * (n / (n - 1.0)).sqrt()
}

fn pct_change(current: f64, previous: f64) -> f64 {
    current / previous - 1.0
}

/// One row per candle, ascending by timestamp. Rolling statistics expand until their
/// window fills; standard deviations are sample ones. The first row has no return, so
/// it never enters the volatility window.
///
/// Non-finite derived values count as missing and are zeroed. The batch is rejected
/// when the complete fraction falls below `min_completeness`.
pub fn compute_features(
    candles: &[Candle],
    ma_window: usize,
    vol_window: usize,
    fundamentals: Option<&Fundamentals>,
    min_completeness: f64,
) -> ServiceResult<Vec<FeatureRow>> {
    let mut ordered: Vec<&Candle> = candles.iter().collect();
    ordered.sort_by_key(|c| c.timestamp);

    let mut moving_average = sma(ma_window, "ma_window")?;
    let mut volatility = std_dev(vol_window, "vol_window")?;
    let mut zscore_mean = sma(ZSCORE_WINDOW, "zscore window")?;
    let mut zscore_std = std_dev(ZSCORE_WINDOW, "zscore window")?;

    let pe = fundamentals.map(|f| f.pe_ratio).unwrap_or(0.0);
    let pb = fundamentals.and_then(|f| f.pb_ratio).unwrap_or(0.0);
    let market_cap = fundamentals.map(|f| f.market_cap).unwrap_or(0.0);

    let mut rows = Vec::with_capacity(ordered.len());
    let mut missing = 0usize;
    let mut running_peak = f64::MIN;

    for (idx, candle) in ordered.iter().enumerate() {
        let close = candle.close;
        let simple_return = if idx == 0 {
            0.0
        } else {
            pct_change(close, ordered[idx - 1].close)
        };
        let return_5d = if idx < RETURN_HORIZON {
            0.0
        } else {
            pct_change(close, ordered[idx - RETURN_HORIZON].close)
        };

        let mean_20 = zscore_mean.next(close);
        let std_20 = sample_std(zscore_std.next(close), (idx + 1).min(ZSCORE_WINDOW));
        let rolling_volatility = if idx == 0 {
            0.0
        } else {
            sample_std(volatility.next(simple_return), idx.min(vol_window))
        };
        let zscore_20 = if std_20 > 0.0 { (close - mean_20) / std_20 } else { 0.0 };

        running_peak = running_peak.max(close);
        let drawdown = if running_peak > 0.0 { close / running_peak - 1.0 } else { 0.0 };

        let mut values: [f64; DERIVED_COLUMNS] = [
            close,
            simple_return,
            moving_average.next(close),
            rolling_volatility,
            return_5d,
            zscore_20,
            drawdown,
            pe,
            pb,
            market_cap,
        ];
        for value in values.iter_mut().filter(|v| !v.is_finite()) {
            missing += 1;
            *value = 0.0;
        }

        let [
            close,
            simple_return,
            moving_average,
            rolling_volatility,
            return_5d,
            zscore_20,
            drawdown,
            fund_pe_ratio,
            fund_pb_ratio,
            fund_market_cap,
        ] = values;
        rows.push(FeatureRow {
            timestamp: candle.timestamp,
            close,
            simple_return,
            moving_average,
            rolling_volatility,
            return_5d,
            zscore_20,
            drawdown,
            fund_pe_ratio,
            fund_pb_ratio,
            fund_market_cap,
        });
    }

    let total = rows.len() * DERIVED_COLUMNS;
    let completeness = if total == 0 {
        1.0
    } else {
        1.0 - missing as f64 / total as f64
    };
    if completeness < min_completeness {
        return Err(ServiceError::FeatureCompleteness {
            required: min_completeness,
            actual: completeness,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn test_constant_series() {
        let rows = compute_features(&candles(&[50.0; 12]), 5, 5, None, 0.98).unwrap();
        assert_eq!(rows.len(), 12);
        for row in &rows {
            assert_eq!(row.simple_return, 0.0);
            assert_eq!(row.rolling_volatility, 0.0);
            assert!((row.moving_average - 50.0).abs() < 1e-12);
            assert_eq!(row.zscore_20, 0.0);
            assert_eq!(row.drawdown, 0.0);
        }
    }

    #[test]
    fn test_output_sorted_and_same_length() {
        let mut input = candles(&[10.0, 11.0, 12.0, 11.0, 13.0, 14.0, 15.0]);
        input.reverse();
        let rows = compute_features(&input, 3, 3, None, 0.98).unwrap();
        assert_eq!(rows.len(), input.len());
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(rows[0].close, 10.0);
    }

    #[test]
    fn test_returns_and_drawdown() {
        let rows = compute_features(&candles(&[100.0, 110.0, 99.0, 99.0, 99.0, 120.0]), 2, 2, None, 0.98)
            .unwrap();
        assert_eq!(rows[0].simple_return, 0.0);
        assert!((rows[1].simple_return - 0.1).abs() < 1e-12);
        assert!((rows[1].moving_average - 105.0).abs() < 1e-12);
        assert!((rows[2].drawdown - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert!((rows[5].return_5d - 0.2).abs() < 1e-12);
        assert_eq!(rows[4].return_5d, 0.0);
        assert!(rows[2].rolling_volatility > 0.0);
    }

    #[test]
    fn test_volatility_uses_sample_deviation_of_defined_returns() {
        let rows = compute_features(&candles(&[100.0, 110.0, 99.0]), 2, 2, None, 0.98).unwrap();
        assert_eq!(rows[0].rolling_volatility, 0.0);
        assert_eq!(rows[1].rolling_volatility, 0.0);
        assert!((rows[2].rolling_volatility - 0.1 * 2f64.sqrt()).abs() < 1e-9);

        let rows = compute_features(&candles(&[100.0, 110.0, 99.0, 99.0]), 3, 2, None, 0.98).unwrap();
        // the two-return window at row 3 holds -0.1 and 0.0
        assert!((rows[3].rolling_volatility - 0.1 / 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_zscore_uses_sample_deviation() {
        let rows = compute_features(&candles(&[100.0, 110.0, 99.0]), 2, 2, None, 0.98).unwrap();
        assert_eq!(rows[0].zscore_20, 0.0);
        // closes 100, 110: mean 105, sample std 7.0711
        assert!((rows[1].zscore_20 - 5.0 / 50f64.sqrt()).abs() < 1e-9);
        // closes 100, 110, 99: mean 103, sample std sqrt(37)
        assert!((rows[2].zscore_20 - (-4.0 / 37f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_fundamentals_broadcast() {
        let fundamentals = Fundamentals {
            market_cap: 2.5e12,
            pe_ratio: 30.0,
            pb_ratio: None,
            forward_pe: None,
            eps: None,
            revenue: None,
            revenue_growth: None,
            ebitda: None,
            net_income: None,
            debt_to_equity: None,
            roe: None,
            sector: None,
            industry: None,
            country: None,
            currency: None,
        };
        let rows = compute_features(&candles(&[1.0, 1.1, 1.2]), 2, 2, Some(&fundamentals), 0.98).unwrap();
        assert!(rows.iter().all(|r| r.fund_pe_ratio == 30.0 && r.fund_pb_ratio == 0.0));
        assert!(rows.iter().all(|r| r.fund_market_cap == 2.5e12));
    }

    #[test]
    fn test_completeness_gate() {
        let fundamentals = Fundamentals {
            market_cap: f64::NAN,
            pe_ratio: f64::INFINITY,
            pb_ratio: None,
            forward_pe: None,
            eps: None,
            revenue: None,
            revenue_growth: None,
            ebitda: None,
            net_income: None,
            debt_to_equity: None,
            roe: None,
            sector: None,
            industry: None,
            country: None,
            currency: None,
        };
        let err = compute_features(&candles(&[1.0, 1.1, 1.2]), 2, 2, Some(&fundamentals), 0.98)
            .unwrap_err();
        match err {
            ServiceError::FeatureCompleteness { required, actual } => {
                assert_eq!(required, 0.98);
                assert!((actual - 0.8).abs() < 1e-12);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(compute_features(&candles(&[1.0]), 0, 2, None, 0.98).is_err());
    }
}
