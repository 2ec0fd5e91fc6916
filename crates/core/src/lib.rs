//! Core library for the California housing price predictor
//!
//! This crate provides the core functionality for:
//! - Dataset acquisition, persistence and splitting
//! - Linear and decision-tree regressors with evaluation metrics
//! - Experiment tracking and a versioned model registry
//! - The train, select and register pipeline
//! - The serving model handle, health checks and observability

pub mod dataset;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod regression;
pub mod serving;
pub mod tracking;

pub use error::{Error, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{PipelineConfig, PipelineReport, TrainingPipeline};
pub use serving::{ModelHandle, PredictError, ServiceState};
