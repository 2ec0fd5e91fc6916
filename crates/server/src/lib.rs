//! HTTP prediction service for the California housing regressor

pub mod api;
pub mod config;
