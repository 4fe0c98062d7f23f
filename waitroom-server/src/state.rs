//! Shared request state
//!
//! Holds no queue data; everything lives in the store behind the engine.

use std::sync::Arc;
use std::time::Duration;
use waitroom_core::health::HealthChecker;
use waitroom_core::{AdmissionEngine, OrderedQueueStore};

/// Server state shared across requests
#[derive(Clone)]
pub struct AppState {
    pub engine: AdmissionEngine<dyn OrderedQueueStore>,

    pub health: Arc<HealthChecker>,

    /// Max-Age of the token cookie set by `/touch`
    pub cookie_max_age: Duration,

    /// Deadline for the store ping behind `/health`
    pub health_timeout: Duration,
}

impl AppState {
    pub fn new(engine: AdmissionEngine<dyn OrderedQueueStore>, health: Arc<HealthChecker>) -> Self {
        Self {
            engine,
            health,
            cookie_max_age: Duration::from_secs(300),
            health_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_cookie_max_age(mut self, max_age: Duration) -> Self {
        self.cookie_max_age = max_age;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}
