use common::errors::{ServiceError, ServiceResult};
use common::models::{ModelParams, RidgeModel};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

const PIVOT_EPSILON: f64 = 1e-12;

/// Closed-form ridge fit: solves `(XᵀX + αI) β = Xᵀy`, with a leading ones
/// column when fitting an intercept (the intercept is regularised as well).
pub fn fit_ridge(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    params: &ModelParams,
) -> ServiceResult<RidgeModel> {
    let (n_rows, n_features) = x.dim();
    if n_rows == 0 {
        return Err(ServiceError::EmptyDataset);
    }
    if y.len() != n_rows {
        return Err(ServiceError::Model(format!(
            "design has {n_rows} rows but target has {}",
            y.len()
        )));
    }

    let offset = usize::from(params.fit_intercept);
    let design = Array2::from_shape_fn((n_rows, n_features + offset), |(i, j)| {
        if j < offset { 1.0 } else { x[[i, j - offset]] }
    });

    let gram = design.t().dot(&design) + Array2::<f64>::eye(n_features + offset) * params.l2_alpha;
    let rhs = design.t().dot(&y);
    let beta = solve(gram, rhs);

    let (intercept, coefficients): (f64, Vec<f64>) = if params.fit_intercept {
        (beta[0], beta.iter().skip(1).copied().collect())
    } else {
        (0.0, beta.to_vec())
    };
    if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
        return Err(ServiceError::Model("ridge solve produced non-finite coefficients".to_string()));
    }

    Ok(RidgeModel {
        fit_intercept: params.fit_intercept,
        l2_alpha: params.l2_alpha,
        intercept,
        coefficients,
    })
}

/// Gaussian elimination with partial pivoting. Columns whose pivot vanishes
/// keep a zero coefficient.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    let mut singular = vec![false; n];

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| a[[r1, col]].abs().total_cmp(&a[[r2, col]].abs()))
            .unwrap_or(col);
        if a[[pivot_row, col]].abs() <= PIVOT_EPSILON * scale {
            singular[col] = true;
            continue;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut beta = Array1::<f64>::zeros(n);
    for col in (0..n).rev() {
        if singular[col] {
            continue;
        }
        let tail: f64 = ((col + 1)..n).map(|k| a[[col, k]] * beta[k]).sum();
        beta[col] = (b[col] - tail) / a[[col, col]];
    }
    beta
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// R² is 0 when the target carries no variance.
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self { rmse: 0.0, mae: 0.0, r2: 0.0 };
        }
        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let mean = actual[..n].iter().sum::<f64>() / n as f64;
        let sst: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();

        Self {
            rmse: (sse / n as f64).sqrt(),
            mae: residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64,
            r2: if sst > 0.0 { 1.0 - sse / sst } else { 0.0 },
        }
    }
}
