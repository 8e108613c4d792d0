use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

/// Closed-form ridge-regularised linear model. Fitting lives with the trainer;
/// this is the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    pub fit_intercept: bool,
    pub l2_alpha: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl RidgeModel {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict_row(&self, x: &[f64]) -> ServiceResult<f64> {
        if x.len() != self.coefficients.len() {
            return Err(ServiceError::Model(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                x.len()
            )));
        }
        let dot: f64 = self.coefficients.iter().zip(x).map(|(w, v)| w * v).sum();
        Ok(self.intercept + dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_row() {
        let model = RidgeModel {
            fit_intercept: true,
            l2_alpha: 0.0,
            intercept: 1.0,
            coefficients: vec![2.0, -1.0],
        };
        assert_eq!(model.predict_row(&[3.0, 4.0]).unwrap(), 3.0);
        assert!(matches!(model.predict_row(&[1.0]), Err(ServiceError::Model(_))));
    }
}
