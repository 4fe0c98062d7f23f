//! Health reporting
//!
//! Components register by name and are updated by whoever observes them (the
//! scheduler after each cycle, the server on each health request). The overall status is
//! the worst component status.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Name of the queue store component
pub const QUEUE_STORE_COMPONENT: &str = "queue_store";

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> u16 {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub timestamp: SystemTime,
    pub components: Vec<ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Component health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub last_check: SystemTime,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Healthy, None)
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Unhealthy, Some(message.into()))
    }

    fn with_status(name: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self { name: name.into(), status, message, last_check: SystemTime::now() }
    }
}

/// Health checker service
pub struct HealthChecker {
    start_time: SystemTime,
    version: String,
    components: Arc<RwLock<Vec<ComponentHealth>>>,
}

impl HealthChecker {
    /// Create a new health checker
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            start_time: SystemTime::now(),
            version: version.into(),
            components: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a component, initially healthy. Re-registering is a no-op.
    pub async fn register_component(&self, name: impl Into<String>) {
        let name = name.into();
        let mut components = self.components.write().await;
        if !components.iter().any(|c| c.name == name) {
            components.push(ComponentHealth::healthy(name));
        }
    }

    /// Update component health status
    pub async fn update_component(&self, name: &str, status: HealthStatus, message: Option<String>) {
        let mut components = self.components.write().await;

        if let Some(component) = components.iter_mut().find(|c| c.name == name) {
            component.status = status;
            component.message = message;
            component.last_check = SystemTime::now();
        }
    }

    /// Replace a component's state with a fresh check result
    pub async fn record(&self, health: ComponentHealth) {
        self.update_component(&health.name, health.status, health.message).await;
    }

    /// Get current health status
    pub async fn check_health(&self) -> HealthCheck {
        let components = self.components.read().await.clone();

        let status = if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let uptime = self.start_time.elapsed().unwrap_or(Duration::from_secs(0)).as_secs();

        HealthCheck {
            status,
            timestamp: SystemTime::now(),
            components,
            version: self.version.clone(),
            uptime_seconds: uptime,
        }
    }

    /// Perform readiness check (can accept traffic)
    pub async fn readiness_check(&self) -> bool {
        self.check_health().await.status != HealthStatus::Unhealthy
    }
}

/// Built-in health checks
pub mod checks {
    use super::*;
    use crate::queue_store::OrderedQueueStore;

    /// Ping the queue store, bounded by `timeout`
    pub async fn check_store<S>(store: &S, timeout: Duration) -> ComponentHealth
    where
        S: OrderedQueueStore + ?Sized,
    {
        match tokio::time::timeout(timeout, store.ping()).await {
            Ok(Ok(())) => ComponentHealth::healthy(QUEUE_STORE_COMPONENT),
            Ok(Err(e)) => ComponentHealth::unhealthy(QUEUE_STORE_COMPONENT, e.to_string()),
            Err(_) => ComponentHealth::unhealthy(
                QUEUE_STORE_COMPONENT,
                format!("Ping timed out after {:?}", timeout),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue_store::MemoryQueueStore;

    #[tokio::test]
    async fn test_health_checker() {
        let checker = HealthChecker::new("1.0.0");

        checker.register_component(QUEUE_STORE_COMPONENT).await;
        checker.register_component(QUEUE_STORE_COMPONENT).await;

        let health = checker.check_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.components.len(), 1);
    }

    #[tokio::test]
    async fn test_component_health() {
        let checker = HealthChecker::new("1.0.0");

        checker.register_component("scheduler").await;
        checker
            .update_component("scheduler", HealthStatus::Degraded, Some("Slow cycle".to_string()))
            .await;

        let health = checker.check_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.status.to_http_status(), 200);
    }

    #[tokio::test]
    async fn test_readiness_check() {
        let checker = HealthChecker::new("1.0.0");
        assert!(checker.readiness_check().await);

        checker.register_component(QUEUE_STORE_COMPONENT).await;
        checker.record(ComponentHealth::unhealthy(QUEUE_STORE_COMPONENT, "down")).await;

        assert!(!checker.readiness_check().await);
        assert_eq!(checker.check_health().await.status.to_http_status(), 503);
    }

    #[tokio::test]
    async fn test_check_store() {
        let store = MemoryQueueStore::new();
        let health = checks::check_store(&store, Duration::from_secs(1)).await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.name, QUEUE_STORE_COMPONENT);
    }
}
