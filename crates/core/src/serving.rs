//! Model handle for the prediction service
//!
//! The handle is resolved once at startup and never changes afterwards.
//! A failed load leaves the handle degraded until the process restarts.

use crate::models::FeatureRecord;
use crate::regression::Regressor;
use crate::tracking::TrackingStore;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors surfaced by [`ModelHandle::predict`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    /// No model was loaded at startup
    #[error("model not available")]
    ModelUnavailable,

    /// The model raised an error or produced unusable output
    #[error("prediction failed: {0}")]
    Failed(String),
}

/// Startup outcome of the service
#[derive(Clone)]
pub enum ServiceState {
    Ready {
        model: Arc<dyn Regressor>,
        name: String,
        version: u32,
    },
    Degraded {
        reason: String,
    },
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Ready {
                model,
                name,
                version,
            } => f
                .debug_struct("Ready")
                .field("family", &model.family())
                .field("name", name)
                .field("version", version)
                .finish(),
            ServiceState::Degraded { reason } => {
                f.debug_struct("Degraded").field("reason", reason).finish()
            }
        }
    }
}

/// Immutable, once-initialized reference to the served model
#[derive(Debug, Clone)]
pub struct ModelHandle {
    state: ServiceState,
}

impl ModelHandle {
    /// Resolve (name, version) against the registry; never fails
    pub fn load(store: &dyn TrackingStore, name: &str, version: u32) -> Self {
        match store.load_model(name, version) {
            Ok(model) => {
                info!(
                    model_name = %name,
                    version,
                    family = %model.family(),
                    "Model loaded"
                );
                Self::ready(Arc::new(model), name, version)
            }
            Err(e) => {
                error!(model_name = %name, version, error = %e, "Failed to load model");
                Self::degraded(e.to_string())
            }
        }
    }

    pub fn ready(model: Arc<dyn Regressor>, name: impl Into<String>, version: u32) -> Self {
        Self {
            state: ServiceState::Ready {
                model,
                name: name.into(),
                version,
            },
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Degraded {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ServiceState::Ready { .. })
    }

    /// Load failure reason when degraded
    pub fn degraded_reason(&self) -> Option<&str> {
        match &self.state {
            ServiceState::Degraded { reason } => Some(reason),
            ServiceState::Ready { .. } => None,
        }
    }

    /// Predict the median house value for one record
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictError> {
        let ServiceState::Ready { model, .. } = &self.state else {
            return Err(PredictError::ModelUnavailable);
        };

        let output = model
            .predict(&record.to_matrix())
            .map_err(|e| PredictError::Failed(e.to_string()))?;

        match output.as_slice() {
            Some(&[value]) if value.is_finite() => Ok(value),
            Some(&[value]) => Err(PredictError::Failed(format!(
                "model produced non-finite value {value}"
            ))),
            _ => Err(PredictError::Failed(format!(
                "expected 1 prediction, got {}",
                output.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::FeatureMatrix;
    use crate::regression::{FittedModel, LinearModel, ModelFamily};
    use crate::tracking::{start_run, MemoryStore, RunStatus};
    use ndarray::Array1;

    /// Regressor returning a fixed output regardless of input
    struct FixedOutput(Vec<f64>);

    impl Regressor for FixedOutput {
        fn family(&self) -> ModelFamily {
            ModelFamily::LinearRegression
        }

        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn predict(&self, _x: &FeatureMatrix) -> Result<Array1<f64>> {
            Ok(Array1::from(self.0.clone()))
        }
    }

    #[test]
    fn test_degraded_handle_rejects_every_request() {
        let handle = ModelHandle::degraded("registry unreachable");
        let record = FeatureRecord::sample();

        assert!(!handle.is_ready());
        assert_eq!(handle.degraded_reason(), Some("registry unreachable"));
        for _ in 0..3 {
            assert_eq!(handle.predict(&record), Err(PredictError::ModelUnavailable));
        }
    }

    #[test]
    fn test_ready_handle_returns_single_value() {
        let handle = ModelHandle::ready(Arc::new(FixedOutput(vec![4.2])), "m", 1);
        assert_eq!(handle.predict(&FeatureRecord::sample()), Ok(4.2));
    }

    #[test]
    fn test_unusable_output_is_a_failure() {
        for output in [vec![], vec![1.0, 2.0], vec![f64::NAN], vec![f64::INFINITY]] {
            let handle = ModelHandle::ready(Arc::new(FixedOutput(output)), "m", 1);
            assert!(matches!(
                handle.predict(&FeatureRecord::sample()),
                Err(PredictError::Failed(_))
            ));
        }
    }

    #[test]
    fn test_load_missing_model_degrades() {
        let store = MemoryStore::new();
        let handle = ModelHandle::load(&store, "california-housing-regressor", 1);

        assert!(!handle.is_ready());
        assert!(handle.degraded_reason().unwrap().contains("not registered"));
    }

    #[test]
    fn test_load_registered_model() {
        let store = MemoryStore::new();
        let scope = start_run(&store, "exp", "DecisionTree").unwrap();
        scope
            .log_model(&crate::tracking::tests::tiny_model())
            .unwrap();
        let run = scope.finish(RunStatus::Finished).unwrap();
        store.register_model("regressor", &run.run_id).unwrap();

        let handle = ModelHandle::load(&store, "regressor", 1);
        assert!(handle.is_ready());

        let value = handle.predict(&FeatureRecord::sample()).unwrap();
        assert_eq!(value, 4.526);
    }

    fn inconsistent_linear_model() -> FittedModel {
        FittedModel::LinearRegression(LinearModel {
            feature_names: FeatureRecord::sample().to_matrix().names().to_vec(),
            coefficients: vec![1.0; 7],
            intercept: 0.0,
        })
    }

    #[test]
    fn test_inconsistent_artifact_fails_prediction() {
        let handle = ModelHandle::ready(Arc::new(inconsistent_linear_model()), "m", 1);
        assert!(matches!(
            handle.predict(&FeatureRecord::sample()),
            Err(PredictError::Failed(_))
        ));
    }

    #[test]
    fn test_load_inconsistent_artifact_degrades() {
        let store = MemoryStore::new();
        let scope = start_run(&store, "exp", "LinearRegression").unwrap();
        scope.log_model(&inconsistent_linear_model()).unwrap();
        let run = scope.finish(RunStatus::Finished).unwrap();
        store.register_model("regressor", &run.run_id).unwrap();

        let handle = ModelHandle::load(&store, "regressor", 1);

        assert!(!handle.is_ready());
        assert!(handle
            .degraded_reason()
            .unwrap()
            .contains("invalid model artifact"));
    }
}
