//! File-backed tracking store
//!
//! Layout under the root directory:
//!
//! ```text
//! runs/<run_id>/run.json
//! runs/<run_id>/artifacts/model.json
//! registry/<model_name>/version-<n>.json
//! ```

use super::{
    compute_checksum, encode_model, is_valid_run_id, new_run_id, validate_model_name,
    ModelVersion, RunRecord, RunStatus, TrackingStore,
};
use crate::error::{Error, Result};
use crate::regression::{FittedModel, Regressor};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Concurrent registrations of one name tried before giving up
const MAX_REGISTER_ATTEMPTS: usize = 32;

/// Tracking store persisted as JSON files
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("runs"))?;
        fs::create_dir_all(root.join("registry"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    fn run_file(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("run.json")
    }

    fn artifact_file(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("artifacts").join("model.json")
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join("registry").join(name)
    }

    fn version_file(&self, name: &str, version: u32) -> PathBuf {
        self.model_dir(name).join(format!("version-{version}.json"))
    }

    fn read_run(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.run_file(run_id);
        if !is_valid_run_id(run_id) || !path.exists() {
            return Err(Error::RunNotFound(run_id.to_string()));
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    fn write_run(&self, record: &RunRecord) -> Result<()> {
        write_atomic(
            &self.run_file(&record.run_id),
            &serde_json::to_vec_pretty(record)?,
        )
    }

    fn update_run(&self, run_id: &str, update: impl FnOnce(&mut RunRecord)) -> Result<()> {
        let mut record = self.read_run(run_id)?;
        update(&mut record);
        self.write_run(&record)
    }
}

impl TrackingStore for FileStore {
    fn create_run(&self, experiment: &str, run_name: &str) -> Result<RunRecord> {
        let record = RunRecord::new(new_run_id(experiment, run_name), experiment, run_name);
        fs::create_dir_all(self.run_dir(&record.run_id).join("artifacts"))?;
        self.write_run(&record)?;
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
        // Fails with RunNotFound before anything is written
        self.read_run(run_id)?;

        let bytes = encode_model(model)?;
        let path = self.artifact_file(run_id);
        write_atomic(&path, &bytes)?;
        debug!(run_id, path = %path.display(), size = bytes.len(), "Model artifact logged");

        let family = model.family();
        self.update_run(run_id, |run| run.model_family = Some(family))
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.update_run(run_id, |run| {
            run.status = status;
            run.ended_at = Some(Utc::now());
        })
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.read_run(run_id)
    }

    fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.root.join("runs"))? {
            let entry = entry?;
            let run_id = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_dir() || !is_valid_run_id(&run_id) {
                continue;
            }
            let record = self.read_run(&run_id)?;
            if record.experiment == experiment {
                runs.push(record);
            }
        }
        runs.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        Ok(runs)
    }

    fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion> {
        validate_model_name(name)?;
        let run = self.read_run(run_id)?;
        let Some(family) = run.model_family else {
            return Err(Error::ArtifactMissing(run_id.to_string()));
        };
        let checksum = compute_checksum(&fs::read(self.artifact_file(run_id))?);

        let model_dir = self.model_dir(name);
        fs::create_dir_all(&model_dir)?;

        for _ in 0..MAX_REGISTER_ATTEMPTS {
            let next = self
                .list_versions(name)?
                .last()
                .map_or(1, |latest| latest.version + 1);
            let entry = ModelVersion {
                name: name.to_string(),
                version: next,
                run_id: run_id.to_string(),
                family,
                checksum: checksum.clone(),
                created_at: Utc::now(),
            };

            // Written in full under a private name, then linked into place;
            // the link fails if another registration took this version
            let pending = model_dir.join(format!(".pending-{}.json", new_run_id(name, run_id)));
            let mut file = File::create(&pending)?;
            file.write_all(&serde_json::to_vec_pretty(&entry)?)?;
            file.sync_all()?;
            let linked = fs::hard_link(&pending, self.version_file(name, next));
            fs::remove_file(&pending)?;

            match linked {
                Ok(()) => {
                    info!(
                        model_name = %name,
                        version = next,
                        run_id,
                        checksum = %entry.checksum,
                        "Model registered"
                    );
                    return Ok(entry);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(model_name = %name, version = next, "Version taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::RegistryConflict(name.to_string()))
    }

    fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        validate_model_name(name)?;
        let dir = self.model_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_version = path
                .file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.starts_with("version-") && f.ends_with(".json"));
            if is_version {
                versions.push(serde_json::from_slice::<ModelVersion>(&fs::read(&path)?)?);
            }
        }
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    fn load_model(&self, name: &str, version: u32) -> Result<FittedModel> {
        validate_model_name(name)?;
        let path = self.version_file(name, version);
        if !path.exists() {
            return Err(Error::ModelNotFound {
                name: name.to_string(),
                version,
            });
        }
        let entry: ModelVersion = serde_json::from_slice(&fs::read(path)?)?;

        let artifact = self.artifact_file(&entry.run_id);
        if !artifact.exists() {
            return Err(Error::ArtifactMissing(entry.run_id));
        }
        let bytes = fs::read(artifact)?;

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

/// Write to a temp file first, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::tests::{check_store_contract, tiny_model};
    use crate::tracking::start_run;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_contract() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("mlruns")).unwrap();
        check_store_contract(&store);
    }

    #[test]
    fn test_registry_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mlruns");

        let run_id = {
            let store = FileStore::open(&root).unwrap();
            let scope = start_run(&store, "exp", "DecisionTree").unwrap();
            scope.log_model(&tiny_model()).unwrap();
            let run_id = scope.run_id().to_string();
            scope.finish(RunStatus::Finished).unwrap();
            store.register_model("regressor", &run_id).unwrap();
            run_id
        };

        let reopened = FileStore::open(&root).unwrap();
        assert_eq!(reopened.load_model("regressor", 1).unwrap(), tiny_model());
        assert_eq!(reopened.register_model("regressor", &run_id).unwrap().version, 2);
    }

    #[test]
    fn test_tampered_artifact_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let scope = start_run(&store, "exp", "DecisionTree").unwrap();
        scope.log_model(&tiny_model()).unwrap();
        let run_id = scope.run_id().to_string();
        store.register_model("regressor", &run_id).unwrap();

        let artifact = store.artifact_file(&run_id);
        let mut text = fs::read_to_string(&artifact).unwrap();
        text.push('\n');
        fs::write(&artifact, text).unwrap();

        assert!(matches!(
            store.load_model("regressor", 1),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_path_like_run_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.get_run("../registry"),
            Err(Error::RunNotFound(_))
        ));
        assert!(matches!(
            store.log_metric("../x", "r2", 1.0),
            Err(Error::RunNotFound(_))
        ));
    }

    #[test]
    fn test_structurally_invalid_artifact_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let broken = FittedModel::DecisionTree(crate::regression::TreeModel {
            feature_names: vec!["MedInc".into()],
            nodes: Vec::new(),
        });

        let scope = start_run(&store, "exp", "DecisionTree").unwrap();
        scope.log_model(&broken).unwrap();
        let run_id = scope.run_id().to_string();
        store.register_model("regressor", &run_id).unwrap();

        assert!(matches!(
            store.load_model("regressor", 1),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn test_concurrent_registration_assigns_distinct_versions() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let scope = start_run(&store, "exp", "DecisionTree").unwrap();
        scope.log_model(&tiny_model()).unwrap();
        let run_id = scope.run_id().to_string();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let run_id = run_id.clone();
                std::thread::spawn(move || store.register_model("regressor", &run_id).unwrap())
            })
            .collect();

        let mut versions: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().version)
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=8).collect::<Vec<_>>());

        let listed = store.list_versions("regressor").unwrap();
        assert_eq!(listed.len(), 8);
        assert!(fs::read_dir(store.model_dir("regressor"))
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().starts_with(".pending")));
    }
}
