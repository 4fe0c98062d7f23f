//! Async test helpers
//!
//! Timeout wrappers and task management for tests that drive the engine,
//! the scheduler or a running server.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that should fail fast (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    Elapsed,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Run a future with a timeout, returning Ok(result) or Err on timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future).await.map_err(|_| TimeoutError::Elapsed)
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Helper to assert a future does NOT complete within duration
pub async fn assert_times_out<F, T>(duration: Duration, future: F)
where
    F: Future<Output = T>,
{
    if timeout(duration, future).await.is_ok() {
        panic!("Expected future to time out, but it completed within {:?}", duration);
    }
}

/// Spawn every future and wait for all of them, in spawn order
pub async fn join_all_spawned<F, T>(futures: impl IntoIterator<Item = F>) -> Vec<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<JoinHandle<T>> = futures.into_iter().map(tokio::spawn).collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(value) => results.push(value),
            Err(e) => panic!("Spawned test task failed: {}", e),
        }
    }
    results
}

/// Spawn a background task that is aborted when the handle is dropped
pub fn spawn_test_task<F>(future: F) -> TestTaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TestTaskHandle { handle: Some(tokio::spawn(future)) }
}

/// Handle for a test task that aborts on drop
pub struct TestTaskHandle {
    handle: Option<JoinHandle<()>>,
}

impl TestTaskHandle {
    /// Wait for the task to complete
    pub async fn join(mut self) -> Result<(), tokio::task::JoinError> {
        match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    }

    /// Abort the task
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl Drop for TestTaskHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_with_timeout() {
        assert_eq!(with_timeout(SHORT_TEST_TIMEOUT, async { 7 }).await, Ok(7));
        assert_eq!(
            with_timeout(Duration::from_millis(5), std::future::pending::<()>()).await,
            Err(TimeoutError::Elapsed)
        );
    }

    #[tokio::test]
    async fn test_assert_completes_within() {
        let future = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
        };

        let result = assert_completes_within(Duration::from_millis(100), future).await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_assert_times_out() {
        assert_times_out(Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(10))).await;
    }

    #[tokio::test]
    async fn test_join_all_spawned_keeps_order() {
        let results = join_all_spawned((0..5u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(5 * (5 - i))).await;
            i
        }))
        .await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_dropped_task_is_aborted() {
        let finished = Arc::new(AtomicBool::new(false));

        let handle = {
            let finished = finished.clone();
            spawn_test_task(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.store(true, Ordering::SeqCst);
            })
        };
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_join_waits_for_completion() {
        let handle = spawn_test_task(async {});
        handle.join().await.unwrap();
    }
}
