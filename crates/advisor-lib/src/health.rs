//! Health reporting
//!
//! Model availability is decided once at startup and never changes, so
//! health is a pure function of the registry rather than a mutable
//! registry of check results. One missing model degrades the service (the
//! other endpoint still works); both missing makes it unhealthy.

use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
        }
    }

    pub fn disabled(what: &str) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: Some(format!("{what} not configured, running without it")),
        }
    }
}

/// Component names reported by the health endpoint
pub mod components {
    pub const CROP_MODEL: &str = "crop_model";
    pub const DISEASE_MODEL: &str = "disease_model";
    pub const GENERATION: &str = "generation";
    pub const HISTORY: &str = "history";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Snapshot of collaborator configuration, fixed at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collaborators {
    pub generation_configured: bool,
    pub history_configured: bool,
}

/// Compute the health response from the registry's load outcomes.
pub fn health_of(registry: &ModelRegistry, collaborators: Collaborators) -> HealthResponse {
    let mut components = HashMap::new();

    components.insert(
        components::CROP_MODEL.to_string(),
        model_health(registry.crop_slot().unavailable_reason()),
    );
    components.insert(
        components::DISEASE_MODEL.to_string(),
        model_health(registry.disease_slot().unavailable_reason()),
    );
    components.insert(
        components::GENERATION.to_string(),
        collaborator_health("generation service", collaborators.generation_configured),
    );
    components.insert(
        components::HISTORY.to_string(),
        collaborator_health("history store", collaborators.history_configured),
    );

    // Overall status follows the models only: collaborators always degrade
    // gracefully inside successful responses
    let status = match (registry.crop_available(), registry.disease_available()) {
        (true, true) => ComponentStatus::Healthy,
        (false, false) => ComponentStatus::Unhealthy,
        _ => ComponentStatus::Degraded,
    };

    HealthResponse { status, components }
}

/// Ready once at least one model serves requests. A failed load is
/// permanent, so readiness never flips after startup.
pub fn readiness_of(registry: &ModelRegistry) -> ReadinessResponse {
    if registry.crop_available() || registry.disease_available() {
        ReadinessResponse {
            ready: true,
            reason: None,
        }
    } else {
        ReadinessResponse {
            ready: false,
            reason: Some("No model artifacts loaded".to_string()),
        }
    }
}

fn model_health<T: AsRef<str>>(unavailable_reason: Option<T>) -> ComponentHealth {
    match unavailable_reason {
        None => ComponentHealth::healthy(),
        Some(reason) => ComponentHealth::unhealthy(reason.as_ref()),
    }
}

fn collaborator_health(what: &str, configured: bool) -> ComponentHealth {
    if configured {
        ComponentHealth::healthy()
    } else {
        ComponentHealth::disabled(what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_registry_is_unhealthy_and_not_ready() {
        let registry = ModelRegistry::unavailable("missing artifacts");
        let health = health_of(&registry, Collaborators::default());

        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::CROP_MODEL].status,
            ComponentStatus::Unhealthy
        );
        assert_eq!(
            health.components[components::DISEASE_MODEL].status,
            ComponentStatus::Unhealthy
        );

        let readiness = readiness_of(&registry);
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[test]
    fn test_unconfigured_collaborators_do_not_degrade_status() {
        let registry = ModelRegistry::unavailable("missing artifacts");
        let health = health_of(&registry, Collaborators::default());

        // Collaborators report healthy-with-message, and only the models
        // drive the overall status
        assert!(health.components[components::GENERATION]
            .status
            .is_operational());
        assert!(health.components[components::HISTORY]
            .status
            .is_operational());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ComponentStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
