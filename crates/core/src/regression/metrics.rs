//! Evaluation metrics for regression runs

use crate::error::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics computed from one model's predictions on one evaluation subset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl EvaluationMetrics {
    /// Metric keys and values in logging order
    pub fn pairs(&self) -> [(&'static str, f64); 3] {
        [("rmse", self.rmse), ("mae", self.mae), ("r2", self.r2)]
    }
}

/// Compute RMSE, MAE and R² against the actual values' own mean
///
/// A constant `actual` yields R² = 1 for a perfect fit and 0 otherwise.
pub fn evaluate(actual: &Array1<f64>, predicted: &Array1<f64>) -> Result<EvaluationMetrics> {
    if actual.len() != predicted.len() {
        return Err(Error::Metrics(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    let Some(mean) = actual.mean() else {
        return Err(Error::Metrics("no evaluation rows".into()));
    };

    let n = actual.len() as f64;
    let residuals = actual - predicted;
    let ss_res = residuals.mapv(|r| r * r).sum();
    let ss_tot = actual.mapv(|a| (a - mean) * (a - mean)).sum();

    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(EvaluationMetrics {
        rmse: (ss_res / n).sqrt(),
        mae: residuals.mapv(f64::abs).sum() / n,
        r2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let actual = Array1::from(vec![1.0, 2.0, 3.0]);
        let metrics = evaluate(&actual, &actual).unwrap();

        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn test_known_values() {
        let actual = Array1::from(vec![3.0, -0.5, 2.0, 7.0]);
        let predicted = Array1::from(vec![2.5, 0.0, 2.0, 8.0]);
        let metrics = evaluate(&actual, &predicted).unwrap();

        assert!((metrics.rmse - 0.375_f64.sqrt()).abs() < 1e-12);
        assert!((metrics.mae - 0.5).abs() < 1e-12);
        assert!((metrics.r2 - 0.948_608_137_044_967_9).abs() < 1e-12);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        let actual = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let predicted = Array1::from(vec![2.5; 4]);
        assert!(evaluate(&actual, &predicted).unwrap().r2.abs() < 1e-12);
    }

    #[test]
    fn test_constant_actuals() {
        let actual = Array1::from(vec![2.0; 3]);
        assert_eq!(evaluate(&actual, &actual).unwrap().r2, 1.0);
        assert_eq!(
            evaluate(&actual, &Array1::from(vec![1.0, 2.0, 3.0])).unwrap().r2,
            0.0
        );
    }

    #[test]
    fn test_rejects_mismatched_or_empty_input() {
        let actual = Array1::from(vec![1.0, 2.0]);
        assert!(evaluate(&actual, &Array1::from(vec![1.0])).is_err());
        assert!(evaluate(&Array1::from(vec![]), &Array1::from(vec![])).is_err());
    }
}
