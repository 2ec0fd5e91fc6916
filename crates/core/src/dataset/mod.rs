//! Dataset persistence and train/evaluation splitting
//!
//! The dataset lives in a header-first CSV file with the eight feature
//! columns followed by the target column. Columns are always resolved by
//! name, never by position.

mod acquire;

pub use acquire::{
    acquire_dataset, extract_table, parse_census_table, AcquireReport, DEFAULT_ARCHIVE_SHA256,
    DEFAULT_DATASET_URL, EXPECTED_ROWS,
};

use crate::error::{Error, Result};
use crate::models::{canonical_names, FeatureMatrix, FEATURE_COLUMNS, TARGET_COLUMN};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// Default location of the acquired dataset
pub const DEFAULT_DATASET_PATH: &str = "data/raw/housing.csv";

/// Default share of rows held out for evaluation
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Default split seed
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Feature rows paired with their targets
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: FeatureMatrix,
    target: Array1<f64>,
}

impl Dataset {
    pub fn new(features: FeatureMatrix, target: Array1<f64>) -> Result<Self> {
        if features.nrows() != target.len() {
            return Err(Error::InvalidDataset(format!(
                "{} feature rows but {} targets",
                features.nrows(),
                target.len()
            )));
        }
        Ok(Self { features, target })
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Copy the given rows into a new dataset
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(rows),
            target: rows.iter().map(|&i| self.target[i]).collect(),
        }
    }
}

/// Disjoint training and evaluation subsets
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Load the dataset file written by acquisition
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::DatasetMissing {
            path: path.to_path_buf(),
        });
    }

    let df = CsvReader::from_path(path)?.has_header(true).finish()?;
    if df.height() == 0 {
        return Err(Error::InvalidDataset(format!(
            "{} contains no rows",
            path.display()
        )));
    }

    let mut values = Array2::zeros((df.height(), FEATURE_COLUMNS.len()));
    for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
        let column = required_column(&df, name)?;
        values.column_mut(j).assign(&Array1::from(column));
    }
    let target = Array1::from(required_column(&df, TARGET_COLUMN)?);

    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded dataset"
    );

    Dataset::new(FeatureMatrix::new(canonical_names(), values)?, target)
}

/// Write the dataset as CSV via a temp file, creating the parent directory if needed
pub fn write_dataset(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let features = dataset.features();
    let mut columns: Vec<Series> = features
        .names()
        .iter()
        .zip(features.values().columns())
        .map(|(name, column)| Series::new(name.as_str(), column.to_vec()))
        .collect();
    columns.push(Series::new(TARGET_COLUMN, dataset.target().to_vec()));

    let mut df = DataFrame::new(columns)?;
    let tmp_path = path.with_extension("csv.tmp");
    let mut file = File::create(&tmp_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    debug!(path = %path.display(), rows = dataset.len(), "Wrote dataset");
    Ok(())
}

/// Seeded shuffle split; the evaluation share is `ceil(n * test_size)` rows
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidDataset(format!(
            "test size must be in (0, 1), got {test_size}"
        )));
    }

    let n = dataset.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidDataset(format!(
            "cannot split {n} rows with test size {test_size}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_indices, train_indices) = indices.split_at(n_test);

    Ok(Split {
        train: dataset.select_rows(train_indices),
        test: dataset.select_rows(test_indices),
        train_indices: train_indices.to_vec(),
        test_indices: test_indices.to_vec(),
    })
}

fn required_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    column_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                Error::InvalidDataset(format!("missing value in column '{name}' at row {row}"))
            })
        })
        .collect()
}

pub(crate) fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| Error::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}
