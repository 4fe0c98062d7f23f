//! Metrics for observability
//!
//! Everything goes through the `metrics` facade. Nothing is exported unless
//! the embedding binary installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Successful registrations
pub const REGISTRATIONS_TOTAL: &str = "waitroom.registrations.total";
/// Registrations refused because the user was already waiting
pub const REGISTRATIONS_REJECTED: &str = "waitroom.registrations.rejected";
/// Users moved from a wait set to a proceed set
pub const ADMISSIONS_TOTAL: &str = "waitroom.admissions.total";
/// Completed scheduler cycles
pub const SCHEDULER_CYCLES: &str = "waitroom.scheduler.cycles";
/// Per-queue failures inside scheduler cycles
pub const SCHEDULER_FAILURES: &str = "waitroom.scheduler.failures";
/// Scheduler cycle duration
pub const SCHEDULER_CYCLE_DURATION: &str = "waitroom.scheduler.cycle.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(REGISTRATIONS_TOTAL, "Number of users added to a wait set");
    describe_counter!(REGISTRATIONS_REJECTED, "Number of duplicate registrations refused");
    describe_counter!(ADMISSIONS_TOTAL, "Number of users promoted to a proceed set");

    describe_counter!(SCHEDULER_CYCLES, "Number of completed scheduler cycles");
    describe_counter!(SCHEDULER_FAILURES, "Number of queues that failed during a scheduler cycle");
    describe_histogram!(SCHEDULER_CYCLE_DURATION, "Scheduler cycle duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Start timing
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer, record the duration and return it in milliseconds
    pub fn stop(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        record_histogram(self.name, elapsed_ms);
        elapsed_ms
    }
}
