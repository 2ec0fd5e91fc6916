//! Error types for the housing core library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by acquisition, training, tracking and serving
#[derive(Error, Debug)]
pub enum Error {
    /// Dataset file is absent
    #[error("dataset not found at {}\nRun `housing fetch` first to download it", path.display())]
    DatasetMissing { path: PathBuf },

    /// A required column is not present in the dataset
    #[error("dataset is missing required column '{0}'")]
    MissingColumn(String),

    /// Dataset content cannot be used
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Model fitting failed
    #[error("failed to fit {family}: {reason}")]
    Fit { family: String, reason: String },

    /// Prediction input does not match the columns the model was fitted on
    #[error("feature mismatch: model expects {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Metric computation received unusable inputs
    #[error("cannot compute metrics: {0}")]
    Metrics(String),

    /// Download returned a non-success status
    #[error("download from {url} failed with status {status}")]
    DownloadStatus { url: String, status: u16 },

    /// Downloaded archive is not the pinned release
    #[error("archive checksum mismatch: expected {expected}, got {actual}")]
    ArchiveChecksum { expected: String, actual: String },

    /// Tracking URI scheme is not supported
    #[error("unsupported tracking URI '{0}' (expected file:<path> or a plain path)")]
    UnsupportedTrackingUri(String),

    /// Name cannot be used as a registry key
    #[error("invalid model name '{0}' (use letters, digits, '-', '_' or '.')")]
    InvalidModelName(String),

    /// Run does not exist in the tracking store
    #[error("run '{0}' not found")]
    RunNotFound(String),

    /// Run has no model artifact to register
    #[error("run '{0}' has no logged model artifact")]
    ArtifactMissing(String),

    /// Model artifact is structurally unusable
    #[error("invalid model artifact: {0}")]
    InvalidModel(String),

    /// No free version number could be claimed
    #[error("could not allocate a new version of model '{0}' under concurrent registration")]
    RegistryConflict(String),

    /// Registered model version does not exist
    #[error("model '{name}' version {version} is not registered")]
    ModelNotFound { name: String, version: u32 },

    /// Stored artifact does not match the registry checksum
    #[error("checksum mismatch for model '{name}' version {version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        version: u32,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV / dataframe error
    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Background task failed to complete
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
