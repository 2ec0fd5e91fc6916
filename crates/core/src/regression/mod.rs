//! Regression models and evaluation
//!
//! Estimators are configured with hyperparameters and produce a
//! [`FittedModel`]. Fitted models are immutable, serializable and expose
//! prediction through the [`Regressor`] capability.

mod linear;
mod metrics;
mod tree;

pub use linear::{LinearModel, LinearRegression};
pub use metrics::{evaluate, EvaluationMetrics};
pub use tree::{DecisionTreeRegressor, TreeModel, TreeNode, DEFAULT_MAX_DEPTH};

use crate::error::{Error, Result};
use crate::models::FeatureMatrix;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hyperparameters as logged to the tracker
pub type Params = BTreeMap<String, String>;

/// Model family identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    LinearRegression,
    DecisionTree,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "LinearRegression",
            ModelFamily::DecisionTree => "DecisionTree",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for untrained model configurations
pub trait Estimator: Send + Sync {
    /// Model family produced by this estimator
    fn family(&self) -> ModelFamily;

    /// Hyperparameters to record with the run
    fn params(&self) -> Params;

    /// Fit on the given rows and targets
    fn fit(&self, x: &FeatureMatrix, y: &Array1<f64>) -> Result<FittedModel>;
}

/// Trait for anything that can predict targets for feature rows
pub trait Regressor: Send + Sync {
    /// Model family of the fitted model
    fn family(&self) -> ModelFamily;

    /// Column names the model was fitted on, in order
    fn feature_names(&self) -> &[String];

    /// Predict one value per row
    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>>;
}

/// A trained model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "model")]
pub enum FittedModel {
    LinearRegression(LinearModel),
    DecisionTree(TreeModel),
}

impl FittedModel {
    /// Structural checks for artifacts read back from storage
    pub fn validate(&self) -> Result<()> {
        match self {
            FittedModel::LinearRegression(m) => m.validate(),
            FittedModel::DecisionTree(m) => m.validate(),
        }
    }
}

impl Regressor for FittedModel {
    fn family(&self) -> ModelFamily {
        match self {
            FittedModel::LinearRegression(_) => ModelFamily::LinearRegression,
            FittedModel::DecisionTree(_) => ModelFamily::DecisionTree,
        }
    }

    fn feature_names(&self) -> &[String] {
        match self {
            FittedModel::LinearRegression(m) => &m.feature_names,
            FittedModel::DecisionTree(m) => &m.feature_names,
        }
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        check_columns(self.feature_names(), x)?;
        match self {
            FittedModel::LinearRegression(m) => m.predict_rows(x),
            FittedModel::DecisionTree(m) => m.predict_rows(x),
        }
    }
}

/// Prediction input must carry exactly the fit-time columns, in order
fn check_columns(expected: &[String], x: &FeatureMatrix) -> Result<()> {
    if expected != x.names() {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            actual: x.names().to_vec(),
        });
    }
    Ok(())
}

/// Shared input validation for `fit`
fn check_training_input(family: ModelFamily, x: &FeatureMatrix, y: &Array1<f64>) -> Result<()> {
    let fail = |reason: String| Error::Fit {
        family: family.to_string(),
        reason,
    };
    if x.nrows() == 0 {
        return Err(fail("no training rows".into()));
    }
    if x.nrows() != y.len() {
        return Err(fail(format!("{} rows but {} targets", x.nrows(), y.len())));
    }
    if x.values().iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(fail("training data contains non-finite values".into()));
    }
    Ok(())
}
