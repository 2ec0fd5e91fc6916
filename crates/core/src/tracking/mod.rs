//! Experiment tracking and model registry
//!
//! This module provides:
//! - The narrow [`TrackingStore`] interface used by training and serving
//! - Run-scoped logging through [`RunScope`]
//! - A file-backed store (default) and an in-memory store
//! - SHA-256 checksums binding registry entries to model artifacts

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::regression::{FittedModel, ModelFamily, Params};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Tracking location used when none is configured
pub const DEFAULT_TRACKING_URI: &str = "file:./mlruns";

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One training-and-evaluation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Family of the logged model artifact, if any
    pub model_family: Option<ModelFamily>,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, experiment: &str, run_name: &str) -> Self {
        Self {
            run_id: run_id.into(),
            run_name: run_name.to_string(),
            experiment: experiment.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            model_family: None,
        }
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn has_model(&self) -> bool {
        self.model_family.is_some()
    }
}

/// Registered model reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub run_id: String,
    pub family: ModelFamily,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Tracking and registry backend
pub trait TrackingStore: Send + Sync {
    /// Create a new run in `Running` status
    fn create_run(&self, experiment: &str, run_name: &str) -> Result<RunRecord>;

    /// Record a hyperparameter on a run
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Record a numeric metric on a run
    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()>;

    /// Persist the fitted model as the run's artifact
    fn log_model(&self, run_id: &str, model: &FittedModel) -> Result<()>;

    /// Close a run with its final status
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()>;

    fn get_run(&self, run_id: &str) -> Result<RunRecord>;

    /// Runs of an experiment, oldest first
    fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>>;

    /// Register the run's artifact under `name` with the next version number
    fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion>;

    /// Registered versions of `name`, ascending
    fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;

    /// Load a registered artifact, verifying its checksum
    fn load_model(&self, name: &str, version: u32) -> Result<FittedModel>;
}

/// Open the store behind a tracking URI (`file:<path>`, `file://<path>` or a path)
pub fn open_store(tracking_uri: &str) -> Result<FileStore> {
    let path = if let Some(rest) = tracking_uri.strip_prefix("file://") {
        rest
    } else if let Some(rest) = tracking_uri.strip_prefix("file:") {
        rest
    } else if tracking_uri.contains("://") {
        return Err(Error::UnsupportedTrackingUri(tracking_uri.to_string()));
    } else {
        tracking_uri
    };

    if path.is_empty() {
        return Err(Error::UnsupportedTrackingUri(tracking_uri.to_string()));
    }
    FileStore::open(path)
}

/// Run-scoped logging context
pub struct RunScope<'a> {
    store: &'a dyn TrackingStore,
    record: RunRecord,
}

/// Start a run and return its logging scope
pub fn start_run<'a>(
    store: &'a dyn TrackingStore,
    experiment: &str,
    run_name: &str,
) -> Result<RunScope<'a>> {
    let record = store.create_run(experiment, run_name)?;
    debug!(run_id = %record.run_id, run_name, experiment, "Run started");
    Ok(RunScope { store, record })
}

impl<'a> RunScope<'a> {
    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    pub fn log_params(&self, params: &Params) -> Result<()> {
        for (key, value) in params {
            self.store.log_param(self.run_id(), key, value)?;
        }
        Ok(())
    }

    pub fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.store.log_metric(self.run_id(), key, value)
    }

    pub fn log_model(&self, model: &FittedModel) -> Result<()> {
        self.store.log_model(self.run_id(), model)
    }

    /// End the run and return its stored record
    pub fn finish(self, status: RunStatus) -> Result<RunRecord> {
        self.store.end_run(self.run_id(), status)?;
        self.store.get_run(self.run_id())
    }

    /// Mark the run failed; errors while doing so are only logged
    pub fn abort(self) {
        if let Err(e) = self.store.end_run(self.run_id(), RunStatus::Failed) {
            warn!(run_id = %self.record.run_id, error = %e, "Failed to mark run as failed");
        }
    }
}

/// Hex-encoded SHA-256 of an artifact
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// 32 hex characters, unique within the process and across restarts
pub(crate) fn new_run_id(experiment: &str, run_name: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut hasher = Sha256::new();
    hasher.update(experiment.as_bytes());
    hasher.update(run_name.as_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    let mut id = hex::encode(hasher.finalize());
    id.truncate(32);
    id
}

pub(crate) fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty() && run_id.chars().all(|c| c.is_ascii_hexdigit())
}

pub(crate) fn validate_model_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidModelName(name.to_string()))
    }
}

/// Serialized form of an artifact; checksums are taken over these bytes
pub(crate) fn encode_model(model: &FittedModel) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(model)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::FeatureRecord;
    use crate::regression::{DecisionTreeRegressor, Estimator, LinearRegression};
    use ndarray::Array1;

    pub(crate) fn tiny_model() -> FittedModel {
        DecisionTreeRegressor::default()
            .fit(&FeatureRecord::sample().to_matrix(), &Array1::from(vec![4.526]))
            .unwrap()
    }

    /// Exercise the shared store contract
    pub(crate) fn check_store_contract(store: &dyn TrackingStore) {
        let scope = start_run(store, "exp", "LinearRegression").unwrap();
        let run_id = scope.run_id().to_string();
        scope
            .log_params(&LinearRegression::default().params())
            .unwrap();
        scope.log_metric("r2", 0.61).unwrap();
        scope.log_model(&tiny_model()).unwrap();
        let record = scope.finish(RunStatus::Finished).unwrap();

        assert_eq!(record.status, RunStatus::Finished);
        assert_eq!(record.metric("r2"), Some(0.61));
        assert_eq!(record.params["fit_intercept"], "true");
        assert!(record.ended_at.is_some());
        assert!(record.has_model());

        let bare = store.create_run("exp", "DecisionTree").unwrap();
        assert!(matches!(
            store.register_model("regressor", &bare.run_id),
            Err(Error::ArtifactMissing(_))
        ));

        let v1 = store.register_model("regressor", &run_id).unwrap();
        let v2 = store.register_model("regressor", &run_id).unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(v1.checksum, v2.checksum);

        let versions = store.list_versions("regressor").unwrap();
        assert_eq!(
            versions.iter().map(|v| v.version).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(store.list_versions("unknown").unwrap().is_empty());

        assert_eq!(store.load_model("regressor", 1).unwrap(), tiny_model());
        assert!(matches!(
            store.load_model("regressor", 3),
            Err(Error::ModelNotFound { version: 3, .. })
        ));

        let runs = store.list_runs("exp").unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, run_id);
        assert!(store.list_runs("other").unwrap().is_empty());

        assert!(matches!(
            store.get_run("0123abcd"),
            Err(Error::RunNotFound(_))
        ));
    }

    #[test]
    fn test_open_store_accepts_file_uris() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mlruns");

        let uri = format!("file:{}", path.display());
        assert_eq!(open_store(&uri).unwrap().root(), path.as_path());

        let uri = format!("file://{}", path.display());
        assert_eq!(open_store(&uri).unwrap().root(), path.as_path());

        assert_eq!(
            open_store(path.to_str().unwrap()).unwrap().root(),
            path.as_path()
        );
    }

    #[test]
    fn test_open_store_rejects_other_schemes() {
        assert!(matches!(
            open_store("http://tracking:5000"),
            Err(Error::UnsupportedTrackingUri(_))
        ));
        assert!(matches!(
            open_store("file:"),
            Err(Error::UnsupportedTrackingUri(_))
        ));
    }

    #[test]
    fn test_run_ids_are_unique_hex() {
        let a = new_run_id("exp", "run");
        let b = new_run_id("exp", "run");

        assert_eq!(a.len(), 32);
        assert!(is_valid_run_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_model_name_validation() {
        assert!(validate_model_name("california-housing-regressor").is_ok());
        assert!(validate_model_name("v1.2_model").is_ok());
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("../escape").is_err());
        assert!(validate_model_name("a/b").is_err());
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            compute_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
