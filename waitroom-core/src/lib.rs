//! Waitroom core
//!
//! A virtual waiting room: users register into named queues, a scheduler
//! promotes them in arrival order, and callers check admission with a
//! per-user token.

pub mod admission;
pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod queue_store;
pub mod scheduler;
pub mod shutdown;
pub mod test_utils;
pub mod token;

pub use admission::{AdmissionEngine, AdmissionError, AdmissionResult, WaitRank, DEFAULT_QUEUE};
pub use config::{Config, ConfigError, StoreBackend};
pub use logging::{init_logging, LogLevel};
pub use queue_store::{MemoryQueueStore, OrderedQueueStore, QueueStoreError, SqliteQueueStore};
pub use scheduler::{AdmissionScheduler, CycleReport, SchedulerConfig};
pub use token::{QueueToken, TokenError, TokenIssuer};

use std::sync::Arc;

/// Open the queue store selected by `config`
pub fn open_store(config: &config::StoreConfig) -> Result<Arc<dyn OrderedQueueStore>, QueueStoreError> {
    match (config.backend, &config.path) {
        (StoreBackend::Memory, _) => Ok(Arc::new(MemoryQueueStore::new())),
        (StoreBackend::Sqlite, Some(path)) => Ok(Arc::new(SqliteQueueStore::open(path, config.pool_size)?)),
        (StoreBackend::Sqlite, None) => {
            Err(QueueStoreError::Unavailable("sqlite backend requires a database path".to_string()))
        }
    }
}

/// Build an engine over `store` using the token and store settings in `config`
pub fn build_engine(
    config: &Config,
    store: Arc<dyn OrderedQueueStore>,
) -> Result<AdmissionEngine<dyn OrderedQueueStore>, TokenError> {
    let tokens = TokenIssuer::new(config.token.namespace.clone(), &config.token.algorithm)?;
    Ok(AdmissionEngine::new(store)
        .with_token_issuer(tokens)
        .with_store_timeout(config.store.operation_timeout))
}
