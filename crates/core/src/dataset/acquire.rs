//! Dataset acquisition
//!
//! Downloads the StatLib California housing archive, unpacks the census
//! table and derives the block-group features used for training.

use super::{column_values, write_dataset, Dataset};
use crate::error::{Error, Result};
use crate::models::{canonical_names, FeatureMatrix};
use crate::tracking::compute_checksum;
use flate2::read::GzDecoder;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::Serialize;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{info, warn};
use url::Url;

/// StatLib `cal_housing.tgz` (1990 census, 20 640 block groups)
pub const DEFAULT_DATASET_URL: &str = "https://ndownloader.figshare.com/files/5976036";

/// SHA-256 of the archive behind `DEFAULT_DATASET_URL`
pub const DEFAULT_ARCHIVE_SHA256: &str =
    "aaa5c9a6afe2225cc2aed2723682ae403280c4a3695a2ddda4ffb5d8215ea681";

/// Rows in the published table
pub const EXPECTED_ROWS: usize = 20_640;

/// Archive member holding the census table
const ARCHIVE_MEMBER: &str = "cal_housing.data";

/// Columns of the headerless census table, in file order
const RAW_COLUMNS: [&str; 9] = [
    "longitude",
    "latitude",
    "housingMedianAge",
    "totalRooms",
    "totalBedrooms",
    "population",
    "households",
    "medianIncome",
    "medianHouseValue",
];

/// Target values are expressed in hundreds of thousands of dollars
const TARGET_SCALE: f64 = 100_000.0;

/// Outcome of an acquisition run
#[derive(Debug, Clone, Serialize)]
pub struct AcquireReport {
    pub path: PathBuf,
    pub rows: usize,
    /// SHA-256 of the downloaded archive
    pub archive_sha256: String,
}

/// Download the archive, derive features and write the dataset file
///
/// Re-running overwrites the destination.
pub async fn acquire_dataset(url: &str, dest: impl AsRef<Path>) -> Result<AcquireReport> {
    let pinned = url == DEFAULT_DATASET_URL;
    let url = Url::parse(url)?;
    info!(url = %url, "Fetching housing dataset");

    let response = reqwest::get(url.clone()).await?;
    if !response.status().is_success() {
        return Err(Error::DownloadStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes().await?;

    let archive_sha256 = compute_checksum(&bytes);
    if pinned && archive_sha256 != DEFAULT_ARCHIVE_SHA256 {
        return Err(Error::ArchiveChecksum {
            expected: DEFAULT_ARCHIVE_SHA256.to_string(),
            actual: archive_sha256,
        });
    }

    let dest = dest.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<AcquireReport> {
        let table = extract_table(&bytes)?;
        let dataset = parse_census_table(&table)?;
        if dataset.len() != EXPECTED_ROWS {
            warn!(
                rows = dataset.len(),
                expected = EXPECTED_ROWS,
                "Archive row count differs from the published table"
            );
        }
        write_dataset(&dest, &dataset)?;
        info!(path = %dest.display(), rows = dataset.len(), "Dataset saved");
        Ok(AcquireReport {
            path: dest,
            rows: dataset.len(),
            archive_sha256,
        })
    })
    .await?
}

/// Read the census table out of a gzipped tar archive
pub fn extract_table(archive: &[u8]) -> Result<Vec<u8>> {
    let mut archive = Archive::new(GzDecoder::new(archive));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_table = entry
            .path()?
            .file_name()
            .is_some_and(|name| name == ARCHIVE_MEMBER);
        if is_table {
            let mut table = Vec::new();
            entry.read_to_end(&mut table)?;
            return Ok(table);
        }
    }
    Err(Error::InvalidDataset(format!(
        "archive has no {ARCHIVE_MEMBER} member"
    )))
}

/// Parse the headerless census table into the training schema
pub fn parse_census_table(bytes: &[u8]) -> Result<Dataset> {
    let mut df = CsvReader::new(Cursor::new(bytes.to_vec()))
        .has_header(false)
        .finish()?;
    if df.width() != RAW_COLUMNS.len() {
        return Err(Error::InvalidDataset(format!(
            "census table has {} columns, expected {}",
            df.width(),
            RAW_COLUMNS.len()
        )));
    }
    df.set_column_names(&RAW_COLUMNS)?;

    let columns = RAW_COLUMNS
        .iter()
        .map(|name| column_values(&df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut features = Vec::with_capacity(df.height() * 8);
    let mut target = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let raw: Option<Vec<f64>> = columns.iter().map(|column| column[i]).collect();
        let (row, value) = raw.as_deref().and_then(derive_row).ok_or_else(|| {
            Error::InvalidDataset(format!("census table row {} is incomplete or invalid", i + 1))
        })?;
        features.extend_from_slice(&row);
        target.push(value);
    }

    if target.is_empty() {
        return Err(Error::InvalidDataset("census table has no rows".into()));
    }

    let values = Array2::from_shape_vec((target.len(), 8), features)
        .map_err(|e| Error::InvalidDataset(e.to_string()))?;
    Dataset::new(
        FeatureMatrix::new(canonical_names(), values)?,
        Array1::from(target),
    )
}

/// Map one raw row (in `RAW_COLUMNS` order) to features and target
fn derive_row(raw: &[f64]) -> Option<([f64; 8], f64)> {
    if raw.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let [longitude, latitude, age, rooms, bedrooms, population, households, income, value] =
        <[f64; 9]>::try_from(raw).ok()?;
    if households <= 0.0 {
        return None;
    }

    let features = [
        income,
        age,
        rooms / households,
        bedrooms / households,
        population,
        population / households,
        latitude,
        longitude,
    ];
    Some((features, value / TARGET_SCALE))
}
