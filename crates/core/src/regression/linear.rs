//! Ordinary least squares
//!
//! Fits on centered data by solving the normal equations; the intercept is
//! recovered from the column means.

use super::{check_training_input, Estimator, FittedModel, ModelFamily, Params};
use crate::error::{Error, Result};
use crate::models::FeatureMatrix;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Linear regression estimator
#[derive(Debug, Clone, Copy)]
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

/// Fitted linear model: `y = x · coefficients + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(Error::InvalidModel(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidModel("non-finite coefficient".into()));
        }
        Ok(())
    }

    pub(crate) fn predict_rows(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        if self.coefficients.len() != x.ncols() {
            return Err(Error::InvalidModel(format!(
                "{} coefficients for {} input columns",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        let coefficients = ArrayView1::from(&self.coefficients[..]);
        Ok(x.values().dot(&coefficients) + self.intercept)
    }
}

impl Estimator for LinearRegression {
    fn family(&self) -> ModelFamily {
        ModelFamily::LinearRegression
    }

    fn params(&self) -> Params {
        Params::from([("fit_intercept".to_string(), self.fit_intercept.to_string())])
    }

    fn fit(&self, x: &FeatureMatrix, y: &Array1<f64>) -> Result<FittedModel> {
        check_training_input(self.family(), x, y)?;

        let xs = x.values();
        let (x_mean, y_mean) = if self.fit_intercept {
            let x_mean = xs
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(xs.ncols()));
            (x_mean, y.mean().unwrap_or(0.0))
        } else {
            (Array1::zeros(xs.ncols()), 0.0)
        };

        let xc = xs - &x_mean;
        let yc = y - y_mean;

        let gram = xc.t().dot(&xc);
        let rhs = xc.t().dot(&yc);
        let coefficients = solve(gram, rhs).ok_or_else(|| Error::Fit {
            family: self.family().to_string(),
            reason: "normal equations are singular (collinear or constant features)".into(),
        })?;
        let intercept = y_mean - x_mean.dot(&coefficients);

        Ok(FittedModel::LinearRegression(LinearModel {
            feature_names: x.names().to_vec(),
            coefficients: coefficients.to_vec(),
            intercept,
        }))
    }
}

/// Gaussian elimination with partial pivoting; `None` when singular
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let tolerance = scale * n as f64 * f64::EPSILON;

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= tolerance {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in col + 1..n {
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

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
