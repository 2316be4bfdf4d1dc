use super::{Estimator, Predictor, check_fit_input};
use crate::linalg::{center_columns, mean, solve};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative ridge added to the normal equations of ordinary least squares.
///
/// One-hot blocks are collinear with the intercept, so the plain Gram matrix
/// is singular; this keeps it solvable without visibly changing the fit.
const OLS_JITTER: f64 = 1e-8;

/// Coefficients of a fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl Predictor for LinearModel {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.intercept + row.iter().zip(&self.coef).map(|(x, w)| x * w).sum::<f64>()
    }
}

/// Ordinary least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

impl Estimator for LinearRegression {
    type Fitted = LinearModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<LinearModel> {
        check_fit_input("Linear Regression", x, y)?;
        if self.fit_intercept {
            solve_penalized(x, y, Penalty::Relative(OLS_JITTER), "Linear Regression")
        } else {
            let gram = x.t().dot(&x);
            let rhs = x.t().dot(&y);
            let coef = solve(jittered(gram), rhs)
                .ok_or_else(|| PipelineError::training("Linear Regression", "singular normal equations"))?;
            Ok(LinearModel {
                coef: coef.to_vec(),
                intercept: 0.0,
            })
        }
    }
}

/// Least squares with an L2 penalty on the coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ridge {
    pub alpha: f64,
}

impl Default for Ridge {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Estimator for Ridge {
    type Fitted = LinearModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<LinearModel> {
        check_fit_input("Ridge", x, y)?;
        if !(self.alpha >= 0.0) {
            return Err(PipelineError::training("Ridge", "alpha must be non-negative"));
        }
        solve_penalized(x, y, Penalty::Absolute(self.alpha), "Ridge")
    }
}

/// Least squares with an L1 penalty, fitted by cyclic coordinate descent.
///
/// Minimizes `1/(2n) * ||y - Xw - b||^2 + alpha * ||w||_1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lasso {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for Lasso {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl Estimator for Lasso {
    type Fitted = LinearModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<LinearModel> {
        check_fit_input("Lasso", x, y)?;
        if !(self.alpha >= 0.0) {
            return Err(PipelineError::training("Lasso", "alpha must be non-negative"));
        }

        let n = x.nrows() as f64;
        let p = x.ncols();
        let (x_mean, xc) = center_columns(x);
        let y_mean = mean(y);
        let mut residual: Array1<f64> = y.mapv(|v| v - y_mean);

        let norms: Vec<f64> = xc
            .axis_iter(Axis(1))
            .map(|col| col.dot(&col) / n)
            .collect();
        let mut coef = vec![0.0; p];

        let mut converged = false;
        for iter in 0..self.max_iter {
            let mut max_change = 0.0f64;
            let mut max_coef = 0.0f64;

            for j in 0..p {
                if norms[j] == 0.0 {
                    continue;
                }
                let col = xc.column(j);
                let old = coef[j];
                let rho = col.dot(&residual) / n + norms[j] * old;
                let new = soft_threshold(rho, self.alpha) / norms[j];

                if new != old {
                    residual.scaled_add(old - new, &col);
                    coef[j] = new;
                }
                max_change = max_change.max((new - old).abs());
                max_coef = max_coef.max(new.abs());
            }

            if max_change <= self.tol * max_coef.max(1.0) {
                debug!("Lasso converged after {} iterations", iter + 1);
                converged = true;
                break;
            }
        }
        if !converged {
            debug!("Lasso stopped at max_iter={}", self.max_iter);
        }

        let intercept = y_mean - x_mean.iter().zip(&coef).map(|(m, w)| m * w).sum::<f64>();
        Ok(LinearModel { coef, intercept })
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

enum Penalty {
    /// Fixed diagonal term.
    Absolute(f64),
    /// Diagonal term scaled by the mean diagonal of the Gram matrix.
    Relative(f64),
}

/// Solve the centered normal equations `(Xc'Xc + lambda I) w = Xc'yc`.
fn solve_penalized(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    penalty: Penalty,
    model: &str,
) -> Result<LinearModel> {
    let (x_mean, xc) = center_columns(x);
    let y_mean = mean(y);
    let yc = y.mapv(|v| v - y_mean);

    let mut gram = xc.t().dot(&xc);
    let rhs = xc.t().dot(&yc);

    let lambda = match penalty {
        Penalty::Absolute(alpha) => alpha,
        Penalty::Relative(scale) => {
            let p = gram.nrows().max(1) as f64;
            let trace = gram.diag().sum();
            scale * if trace > 0.0 { trace / p } else { 1.0 }
        }
    };
    gram.diag_mut().mapv_inplace(|d| d + lambda);

    let coef = solve(gram, rhs)
        .ok_or_else(|| PipelineError::training(model, "singular normal equations"))?;
    let intercept = y_mean - x_mean.dot(&coef);

    Ok(LinearModel {
        coef: coef.to_vec(),
        intercept,
    })
}

fn jittered(mut gram: Array2<f64>) -> Array2<f64> {
    let p = gram.nrows().max(1) as f64;
    let trace = gram.diag().sum();
    let lambda = OLS_JITTER * if trace > 0.0 { trace / p } else { 1.0 };
    gram.diag_mut().mapv_inplace(|d| d + lambda);
    gram
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.0],
            [2.0, 1.0],
            [3.0, 0.0],
            [4.0, 1.0],
            [5.0, 0.0],
            [6.0, 1.0],
        ];
        let y = x.rows().into_iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 1.0).collect();
        (x, y)
    }

    #[test]
    fn test_ols_recovers_coefficients() {
        let (x, y) = data();
        let model = LinearRegression::default().fit(x.view(), y.view()).unwrap();
        assert!((model.coef[0] - 2.0).abs() < 1e-6);
        assert!((model.coef[1] + 3.0).abs() < 1e-6);
        assert!((model.intercept - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ols_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let model = LinearRegression {
            fit_intercept: false,
        }
        .fit(x.view(), y.view())
        .unwrap();
        assert_eq!(model.intercept, 0.0);
        assert!((model.coef[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_ols_handles_collinear_indicators() {
        // Two indicators that always sum to one, like a one-hot block
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let y = array![10.0, 20.0, 10.0, 20.0];
        let model = LinearRegression::default().fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_ridge_shrinks_toward_zero() {
        let (x, y) = data();
        let ols = LinearRegression::default().fit(x.view(), y.view()).unwrap();
        let ridge = Ridge { alpha: 10.0 }.fit(x.view(), y.view()).unwrap();
        assert!(ridge.coef[0].abs() < ols.coef[0].abs());
    }

    #[test]
    fn test_lasso_zeroes_weak_coefficients() {
        let (x, y) = data();
        let strong = Lasso {
            alpha: 100.0,
            ..Lasso::default()
        }
        .fit(x.view(), y.view())
        .unwrap();
        assert_eq!(strong.coef, vec![0.0, 0.0]);
        assert!((strong.intercept - y.mean().unwrap()).abs() < 1e-12);

        let weak = Lasso {
            alpha: 0.001,
            max_iter: 10_000,
            tol: 1e-10,
        }
        .fit(x.view(), y.view())
        .unwrap();
        assert!((weak.coef[0] - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_negative_alpha_is_rejected() {
        let (x, y) = data();
        assert!(Ridge { alpha: -1.0 }.fit(x.view(), y.view()).is_err());
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
