//! Health and readiness reporting for the prediction service

use crate::serving::{ModelHandle, ServiceState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Component name of the served model
pub const MODEL_COMPONENT: &str = "model";

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is up but cannot do its job
    Degraded,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy(message: Option<String>) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        if components
            .values()
            .any(|c| c.status == ComponentStatus::Degraded)
        {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Health derived from the model handle
pub fn health(handle: &ModelHandle) -> HealthResponse {
    let model = match handle.state() {
        ServiceState::Ready { name, version, .. } => {
            ComponentHealth::healthy(Some(format!("{name} version {version}")))
        }
        ServiceState::Degraded { reason } => ComponentHealth::degraded(reason.clone()),
    };

    let components = HashMap::from([(MODEL_COMPONENT.to_string(), model)]);
    let status = HealthResponse::compute_status(&components);
    HealthResponse { status, components }
}

/// Ready only when a model is loaded
pub fn readiness(handle: &ModelHandle) -> ReadinessResponse {
    match handle.degraded_reason() {
        None => ReadinessResponse {
            ready: true,
            reason: None,
        },
        Some(reason) => ReadinessResponse {
            ready: false,
            reason: Some(format!("Model not loaded: {reason}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::tests::tiny_model;
    use std::sync::Arc;

    #[test]
    fn test_ready_handle_is_healthy() {
        let handle = ModelHandle::ready(Arc::new(tiny_model()), "regressor", 3);
        let health = health(&handle);

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(
            health.components[MODEL_COMPONENT].message.as_deref(),
            Some("regressor version 3")
        );
        assert!(readiness(&handle).ready);
    }

    #[test]
    fn test_degraded_handle_is_not_ready() {
        let handle = ModelHandle::degraded("model 'x' version 1 is not registered");
        let health = health(&handle);

        assert_eq!(health.status, ComponentStatus::Degraded);
        let readiness = readiness(&handle);
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains("not registered"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(health(&ModelHandle::degraded("down"))).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["components"]["model"]["message"], "down");
    }
}
