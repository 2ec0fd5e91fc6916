//! Training and selection pipeline
//!
//! Loads the dataset, splits it once, trains each candidate under its own
//! tracked run, picks the candidate with the best R² and registers it.

use crate::dataset::{
    load_dataset, train_test_split, Dataset, Split, DEFAULT_DATASET_PATH, DEFAULT_SPLIT_SEED,
    DEFAULT_TEST_SIZE,
};
use crate::error::{Error, Result};
use crate::regression::{
    evaluate, DecisionTreeRegressor, Estimator, EvaluationMetrics, LinearRegression, ModelFamily,
    Regressor, DEFAULT_MAX_DEPTH,
};
use crate::tracking::{start_run, ModelVersion, RunRecord, RunStatus, TrackingStore};
use ndarray::Array1;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Experiment the runs are logged under
pub const DEFAULT_EXPERIMENT: &str = "California Housing Prediction";

/// Registry name of the promoted model
pub const DEFAULT_MODEL_NAME: &str = "california-housing-regressor";

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dataset_path: PathBuf,
    pub experiment: String,
    pub model_name: String,
    pub test_size: f64,
    pub seed: u64,
    pub max_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            experiment: DEFAULT_EXPERIMENT.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SPLIT_SEED,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of one candidate's run
#[derive(Debug, Clone)]
pub struct CandidateRun {
    pub family: ModelFamily,
    pub run: RunRecord,
    pub metrics: EvaluationMetrics,
    /// Predictions on the evaluation subset, in split order
    pub predictions: Array1<f64>,
}

/// Result of a full pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub runs: Vec<CandidateRun>,
    pub best_index: usize,
    pub registered: ModelVersion,
}

impl PipelineReport {
    pub fn best(&self) -> &CandidateRun {
        &self.runs[self.best_index]
    }
}

/// Trains candidate estimators against a tracking store
pub struct TrainingPipeline<'a> {
    store: &'a dyn TrackingStore,
    config: PipelineConfig,
    candidates: Vec<Box<dyn Estimator>>,
}

impl<'a> TrainingPipeline<'a> {
    /// Pipeline with the standard candidates: OLS first, then the tree
    pub fn new(store: &'a dyn TrackingStore, config: PipelineConfig) -> Self {
        let candidates: Vec<Box<dyn Estimator>> = vec![
            Box::new(LinearRegression::default()),
            Box::new(DecisionTreeRegressor::with_max_depth(config.max_depth)),
        ];
        Self {
            store,
            config,
            candidates,
        }
    }

    /// Replace the candidate list; order is training order
    pub fn with_candidates(mut self, candidates: Vec<Box<dyn Estimator>>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured dataset and run the pipeline on it
    pub fn run(&self) -> Result<PipelineReport> {
        let dataset = load_dataset(&self.config.dataset_path)?;
        self.run_on(&dataset)
    }

    /// Split, train every candidate, select and register the best one
    pub fn run_on(&self, dataset: &Dataset) -> Result<PipelineReport> {
        let split = train_test_split(dataset, self.config.test_size, self.config.seed)?;
        info!(
            experiment = %self.config.experiment,
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            seed = self.config.seed,
            "Dataset split"
        );

        let mut runs = Vec::with_capacity(self.candidates.len());
        for estimator in &self.candidates {
            runs.push(self.train_candidate(estimator.as_ref(), &split)?);
        }

        let scores: Vec<f64> = runs.iter().map(|c| c.metrics.r2).collect();
        let best_index = select_best(&scores).ok_or_else(|| Error::Fit {
            family: "pipeline".to_string(),
            reason: "no candidate produced a finite R²".to_string(),
        })?;
        let best = &runs[best_index];
        info!(
            best_model = %best.family,
            r2 = best.metrics.r2,
            run_id = %best.run.run_id,
            "Best model selected"
        );

        let registered = self
            .store
            .register_model(&self.config.model_name, &best.run.run_id)?;

        Ok(PipelineReport {
            runs,
            best_index,
            registered,
        })
    }

    /// One tracked run; a failure marks the run failed and is returned
    fn train_candidate(&self, estimator: &dyn Estimator, split: &Split) -> Result<CandidateRun> {
        let family = estimator.family();
        let scope = start_run(self.store, &self.config.experiment, family.as_str())?;
        let started = Instant::now();

        let outcome = (|| -> Result<(EvaluationMetrics, Array1<f64>)> {
            let model = estimator.fit(split.train.features(), split.train.target())?;
            let predictions = model.predict(split.test.features())?;
            let metrics = evaluate(split.test.target(), &predictions)?;

            scope.log_params(&estimator.params())?;
            for (key, value) in metrics.pairs() {
                scope.log_metric(key, value)?;
            }
            scope.log_model(&model)?;
            Ok((metrics, predictions))
        })();

        match outcome {
            Ok((metrics, predictions)) => {
                let run = scope.finish(RunStatus::Finished)?;
                info!(
                    run_name = %family,
                    run_id = %run.run_id,
                    rmse = metrics.rmse,
                    mae = metrics.mae,
                    r2 = metrics.r2,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run finished"
                );
                Ok(CandidateRun {
                    family,
                    run,
                    metrics,
                    predictions,
                })
            }
            Err(e) => {
                error!(run_name = %family, run_id = %scope.run_id(), error = %e, "Run failed");
                scope.abort();
                Err(e)
            }
        }
    }
}

/// Index of the winning score
///
/// Strictly greater R² wins, so an exact tie keeps the earlier candidate.
/// Non-finite scores are never selected.
pub fn select_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            warn!(index, score, "Ignoring candidate with non-finite R²");
            continue;
        }
        if best.map_or(true, |b| score > scores[b]) {
            best = Some(index);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::synthetic_dataset;
    use crate::dataset::write_dataset;
    use crate::models::FeatureMatrix;
    use crate::regression::{FittedModel, Params};
    use crate::tracking::MemoryStore;
    use tempfile::TempDir;

    struct BrokenEstimator;

    impl Estimator for BrokenEstimator {
        fn family(&self) -> ModelFamily {
            ModelFamily::LinearRegression
        }

        fn params(&self) -> Params {
            Params::new()
        }

        fn fit(&self, _x: &FeatureMatrix, _y: &Array1<f64>) -> Result<FittedModel> {
            Err(Error::Fit {
                family: "LinearRegression".into(),
                reason: "boom".into(),
            })
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            experiment: "test-experiment".into(),
            model_name: "test-regressor".into(),
            max_depth: 4,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_pipeline_registers_best_candidate() {
        let store = MemoryStore::new();
        let report = TrainingPipeline::new(&store, config())
            .run_on(&synthetic_dataset(200))
            .unwrap();

        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.runs[0].family, ModelFamily::LinearRegression);
        assert_eq!(report.runs[1].family, ModelFamily::DecisionTree);

        // The synthetic target is exactly linear
        assert_eq!(report.best().family, ModelFamily::LinearRegression);
        assert!(report.best().metrics.r2 > 0.999);
        assert_eq!(report.registered.version, 1);
        assert_eq!(report.registered.run_id, report.best().run.run_id);

        for candidate in &report.runs {
            let run = store.get_run(&candidate.run.run_id).unwrap();
            assert_eq!(run.status, RunStatus::Finished);
            assert_eq!(run.run_name, candidate.family.as_str());
            assert_eq!(run.metric("r2"), Some(candidate.metrics.r2));
            assert!(run.metric("rmse").is_some());
            assert!(run.metric("mae").is_some());
            assert!(run.has_model());
        }
        let tree_run = store.get_run(&report.runs[1].run.run_id).unwrap();
        assert_eq!(tree_run.params["max_depth"], "4");
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = synthetic_dataset(150);
        let store = MemoryStore::new();
        let pipeline = TrainingPipeline::new(&store, config());

        let first = pipeline.run_on(&dataset).unwrap();
        let second = pipeline.run_on(&dataset).unwrap();

        for (a, b) in first.runs.iter().zip(&second.runs) {
            assert_eq!(a.family, b.family);
            assert!((a.metrics.r2 - b.metrics.r2).abs() < 1e-12);
            assert!((a.metrics.rmse - b.metrics.rmse).abs() < 1e-12);
            assert!((a.metrics.mae - b.metrics.mae).abs() < 1e-12);
        }
        assert_eq!(second.registered.version, 2);
    }

    #[test]
    fn test_registered_model_matches_in_process_predictions() {
        let dataset = synthetic_dataset(120);
        let store = MemoryStore::new();
        let cfg = config();
        let report = TrainingPipeline::new(&store, cfg.clone())
            .run_on(&dataset)
            .unwrap();

        let loaded = store
            .load_model(&cfg.model_name, report.registered.version)
            .unwrap();
        let split = train_test_split(&dataset, cfg.test_size, cfg.seed).unwrap();

        assert_eq!(
            loaded.predict(split.test.features()).unwrap(),
            report.best().predictions
        );
    }

    #[test]
    fn test_missing_dataset_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let cfg = PipelineConfig {
            dataset_path: dir.path().join("missing.csv"),
            ..config()
        };

        let err = TrainingPipeline::new(&store, cfg).run().unwrap_err();
        assert!(matches!(err, Error::DatasetMissing { .. }));
        assert!(store.list_runs("test-experiment").unwrap().is_empty());
    }

    #[test]
    fn test_run_reads_dataset_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("housing.csv");
        write_dataset(&path, &synthetic_dataset(80)).unwrap();

        let store = MemoryStore::new();
        let cfg = PipelineConfig {
            dataset_path: path,
            ..config()
        };
        let report = TrainingPipeline::new(&store, cfg).run().unwrap();
        assert_eq!(report.registered.name, "test-regressor");
    }

    #[test]
    fn test_first_failure_aborts_pipeline() {
        let store = MemoryStore::new();
        let pipeline = TrainingPipeline::new(&store, config()).with_candidates(vec![
            Box::new(BrokenEstimator),
            Box::new(DecisionTreeRegressor::default()),
        ]);

        let err = pipeline.run_on(&synthetic_dataset(60)).unwrap_err();
        assert!(matches!(err, Error::Fit { .. }));

        let runs = store.list_runs("test-experiment").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(store.list_versions("test-regressor").unwrap().is_empty());
    }

    #[test]
    fn test_select_best_prefers_strictly_greater() {
        assert_eq!(select_best(&[0.6, 0.7]), Some(1));
        assert_eq!(select_best(&[0.7, 0.6]), Some(0));
    }

    #[test]
    fn test_select_best_is_order_independent() {
        let scores = [0.58, 0.61];
        let forward = select_best(&scores).unwrap();
        let reversed = select_best(&[scores[1], scores[0]]).unwrap();
        assert_eq!(scores[forward], [scores[1], scores[0]][reversed]);
    }

    #[test]
    fn test_select_best_tie_keeps_first() {
        assert_eq!(select_best(&[0.5, 0.5]), Some(0));
    }

    #[test]
    fn test_select_best_skips_nan() {
        assert_eq!(select_best(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(select_best(&[0.1, f64::NAN]), Some(0));
        assert_eq!(select_best(&[f64::NAN]), None);
        assert_eq!(select_best(&[]), None);
    }
}
