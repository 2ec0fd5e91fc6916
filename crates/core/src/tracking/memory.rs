//! In-process tracking store

use super::{
    compute_checksum, encode_model, new_run_id, validate_model_name, ModelVersion, RunRecord,
    RunStatus, TrackingStore,
};
use crate::error::{Error, Result};
use crate::regression::{FittedModel, Regressor};
use chrono::Utc;
use dashmap::DashMap;

/// Tracking store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: DashMap<String, RunRecord>,
    /// Encoded artifact bytes by run id
    artifacts: DashMap<String, Vec<u8>>,
    registry: DashMap<String, Vec<ModelVersion>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_run(&self, run_id: &str, update: impl FnOnce(&mut RunRecord)) -> Result<()> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        update(run.value_mut());
        Ok(())
    }
}

impl TrackingStore for MemoryStore {
    fn create_run(&self, experiment: &str, run_name: &str) -> Result<RunRecord> {
        let record = RunRecord::new(new_run_id(experiment, run_name), experiment, run_name);
        self.runs.insert(record.run_id.clone(), record.clone());
        Ok(record)
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.update_run(run_id, |run| {
            run.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.update_run(run_id, |run| {
            run.metrics.insert(key.to_string(), value);
        })
    }

    fn log_model(&self, run_id: &str, model: &FittedModel) -> Result<()> {
        let bytes = encode_model(model)?;
        let family = model.family();
        self.update_run(run_id, |run| run.model_family = Some(family))?;
        self.artifacts.insert(run_id.to_string(), bytes);
        Ok(())
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.update_run(run_id, |run| {
            run.status = status;
            run.ended_at = Some(Utc::now());
        })
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.runs
            .get(run_id)
            .map(|run| run.clone())
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|entry| entry.experiment == experiment)
            .map(|entry| entry.value().clone())
            .collect();
        runs.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        Ok(runs)
    }

    fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion> {
        validate_model_name(name)?;
        let run = self.get_run(run_id)?;
        let (Some(family), Some(bytes)) = (run.model_family, self.artifacts.get(run_id)) else {
            return Err(Error::ArtifactMissing(run_id.to_string()));
        };
        let checksum = compute_checksum(&bytes);

        // The entry guard serializes concurrent registrations of one name
        let mut versions = self.registry.entry(name.to_string()).or_default();
        let entry = ModelVersion {
            name: name.to_string(),
            version: versions.last().map_or(1, |latest| latest.version + 1),
            run_id: run_id.to_string(),
            family,
            checksum,
            created_at: Utc::now(),
        };
        versions.push(entry.clone());
        Ok(entry)
    }

    fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        Ok(self
            .registry
            .get(name)
            .map(|versions| versions.clone())
            .unwrap_or_default())
    }

    fn load_model(&self, name: &str, version: u32) -> Result<FittedModel> {
        let entry = self
            .registry
            .get(name)
            .and_then(|versions| versions.iter().find(|v| v.version == version).cloned())
            .ok_or_else(|| Error::ModelNotFound {
                name: name.to_string(),
                version,
            })?;

        let bytes = self
            .artifacts
            .get(&entry.run_id)
            .map(|bytes| bytes.clone())
            .ok_or_else(|| Error::ArtifactMissing(entry.run_id.clone()))?;

        let actual = compute_checksum(&bytes);
        if actual != entry.checksum {
            return Err(Error::ChecksumMismatch {
                name: name.to_string(),
                version,
                expected: entry.checksum,
                actual,
            });
        }
        let model: FittedModel = serde_json::from_slice(&bytes)?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::tests::{check_store_contract, tiny_model};
    use std::sync::Arc;

    #[test]
    fn test_memory_store_contract() {
        check_store_contract(&MemoryStore::new());
    }

    #[test]
    fn test_unknown_run_is_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.log_model("feedface", &tiny_model()),
            Err(Error::RunNotFound(_))
        ));
        assert!(matches!(
            store.register_model("regressor", "feedface"),
            Err(Error::RunNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_registration_assigns_distinct_versions() {
        let store = Arc::new(MemoryStore::new());
        let run = store.create_run("exp", "LinearRegression").unwrap();
        store.log_model(&run.run_id, &tiny_model()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let run_id = run.run_id.clone();
                std::thread::spawn(move || store.register_model("regressor", &run_id).unwrap())
            })
            .collect();

        let mut versions: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().version)
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=8).collect::<Vec<_>>());
    }
}
