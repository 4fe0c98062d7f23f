//! Admission scheduler
//!
//! Periodically promotes a fixed batch of waiting users in every queue that
//! currently has waiters. Cycles are independent: each one re-scans the
//! store, so a missed or failed cycle is simply made up by the next.

use crate::admission::{AdmissionEngine, AdmissionResult};
use crate::health::{ComponentHealth, HealthChecker, QUEUE_STORE_COMPONENT};
use crate::metrics::{record_counter, Timer, SCHEDULER_CYCLES, SCHEDULER_CYCLE_DURATION, SCHEDULER_FAILURES};
use crate::queue_store::OrderedQueueStore;
use crate::shutdown::ShutdownSignal;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Scheduler settings, read once when the scheduler is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether cycles actually admit anyone
    pub enabled: bool,

    /// Delay before the first cycle
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Delay between the end of one cycle and the start of the next
    #[serde(with = "humantime_serde")]
    pub fixed_delay: Duration,

    /// Users promoted per queue per cycle
    pub batch_size: usize,

    /// Keys requested per store scan page
    pub scan_page_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(5),
            fixed_delay: Duration::from_secs(15),
            batch_size: 3,
            scan_page_size: 100,
        }
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The scheduler is disabled and did nothing
    pub skipped: bool,
    pub queues_scanned: usize,
    pub queues_failed: usize,
    pub admitted: usize,
}

pub struct AdmissionScheduler<S: OrderedQueueStore + ?Sized> {
    engine: AdmissionEngine<S>,
    config: SchedulerConfig,
    health: Option<Arc<HealthChecker>>,
}

impl<S: OrderedQueueStore + ?Sized> AdmissionScheduler<S> {
    pub fn new(engine: AdmissionEngine<S>, config: SchedulerConfig) -> Self {
        Self { engine, config, health: None }
    }

    /// Report store health to `health` after every cycle
    pub fn with_health(mut self, health: Arc<HealthChecker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one cycle, honoring the `enabled` flag
    pub async fn run_cycle(&self) -> AdmissionResult<CycleReport> {
        if !self.config.enabled {
            debug!("Admission scheduling skipped");
            return Ok(CycleReport { skipped: true, ..CycleReport::default() });
        }

        self.sweep(self.config.batch_size).await
    }

    /// Admit up to `batch_size` users in every waiting queue, regardless of
    /// the `enabled` flag.
    ///
    /// A failure on one queue is logged and counted; the sweep moves on. Only
    /// a failure to enumerate queues aborts it.
    pub async fn sweep(&self, batch_size: usize) -> AdmissionResult<CycleReport> {
        let timer = Timer::new(SCHEDULER_CYCLE_DURATION);
        let mut report = CycleReport::default();

        let mut names = std::pin::pin!(self.engine.queue_names(self.config.scan_page_size));

        loop {
            let name = match names.try_next().await {
                Ok(Some(name)) => name,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to enumerate queues");
                    self.report_health(ComponentHealth::unhealthy(QUEUE_STORE_COMPONENT, e.to_string()))
                        .await;
                    return Err(e);
                }
            };

            report.queues_scanned += 1;
            match self.engine.admit(&name, batch_size).await {
                Ok(admitted) => {
                    report.admitted += admitted;
                    info!(
                        queue = %name,
                        tried = batch_size,
                        admitted,
                        "Tried {} and allowed {} members of {} queue",
                        batch_size,
                        admitted,
                        name
                    );
                }
                Err(e) => {
                    report.queues_failed += 1;
                    record_counter(SCHEDULER_FAILURES, 1);
                    warn!(queue = %name, error = %e, "Failed to admit users");
                }
            }
        }

        let elapsed_ms = timer.stop();
        record_counter(SCHEDULER_CYCLES, 1);
        debug!(
            queues = report.queues_scanned,
            failed = report.queues_failed,
            admitted = report.admitted,
            elapsed_ms,
            "Scheduler cycle finished"
        );

        let health = if report.queues_failed == 0 {
            ComponentHealth::healthy(QUEUE_STORE_COMPONENT)
        } else {
            ComponentHealth::degraded(
                QUEUE_STORE_COMPONENT,
                format!("{} of {} queues failed last cycle", report.queues_failed, report.queues_scanned),
            )
        };
        self.report_health(health).await;

        Ok(report)
    }

    async fn report_health(&self, component: ComponentHealth) {
        if let Some(health) = &self.health {
            health.record(component).await;
        }
    }

    /// Run cycles until `shutdown` fires.
    ///
    /// A cycle already in progress is allowed to finish.
    pub async fn run(self, mut shutdown: broadcast::Receiver<ShutdownSignal>) {
        info!(
            enabled = self.config.enabled,
            initial_delay = ?self.config.initial_delay,
            fixed_delay = ?self.config.fixed_delay,
            batch_size = self.config.batch_size,
            "Admission scheduler started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.config.initial_delay) => {}
            _ = shutdown.recv() => {
                info!("Admission scheduler stopped before first cycle");
                return;
            }
        }

        loop {
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "Scheduler cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.fixed_delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Admission scheduler stopped");
    }
}

impl<S: OrderedQueueStore + ?Sized + 'static> AdmissionScheduler<S> {
    /// Run on a background task
    pub fn spawn(self, shutdown: broadcast::Receiver<ShutdownSignal>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
