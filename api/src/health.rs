//! Backs `/health`, `/health/live`, `/health/ready`, `/health/metrics`.
//! Subsystems report their own component status into a shared registry
//! backed by a `OnceLock`-initialized multi-component map.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

/// Components whose health affects the overall status. `store` is the only
/// one that can push the whole system to `unhealthy`; the rest only ever
/// degrade the report.
pub const NON_ESSENTIAL_COMPONENTS: &[&str] = &["ai_processor", "stock_enricher", "inbox_ingestor", "browser_pool"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

pub struct HealthRegistry {
    components: Mutex<HashMap<String, ComponentStatus>>,
    started_at: Instant,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub components: HashMap<String, ComponentStatus>,
    pub uptime_sec: u64,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self { components: Mutex::new(HashMap::new()), started_at: Instant::now() }
    }

    pub fn set(&self, component: &str, status: ComponentStatus) {
        self.components.lock().unwrap().insert(component.to_string(), status);
    }

    pub fn report(&self) -> HealthReport {
        let components = self.components.lock().unwrap().clone();
        let store_down = components.get("store") == Some(&ComponentStatus::Unhealthy);
        let any_non_essential_unhealthy = NON_ESSENTIAL_COMPONENTS
            .iter()
            .any(|c| matches!(components.get(*c), Some(ComponentStatus::Unhealthy) | Some(ComponentStatus::Degraded)));

        let status = if store_down {
            OverallStatus::Unhealthy
        } else if any_non_essential_unhealthy {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        };

        HealthReport { status, components, uptime_sec: self.started_at.elapsed().as_secs() }
    }

    pub fn is_ready(&self) -> bool {
        self.report().status != OverallStatus::Unhealthy
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_when_nothing_reported() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.report().status, OverallStatus::Healthy);
    }

    #[test]
    fn store_down_is_unhealthy_regardless_of_others() {
        let registry = HealthRegistry::new();
        registry.set("store", ComponentStatus::Unhealthy);
        registry.set("ai_processor", ComponentStatus::Healthy);
        assert_eq!(registry.report().status, OverallStatus::Unhealthy);
    }

    #[test]
    fn non_essential_unhealthy_degrades_not_fails() {
        let registry = HealthRegistry::new();
        registry.set("store", ComponentStatus::Healthy);
        registry.set("ai_processor", ComponentStatus::Unhealthy);
        assert_eq!(registry.report().status, OverallStatus::Degraded);
        assert!(registry.is_ready());
    }
}
