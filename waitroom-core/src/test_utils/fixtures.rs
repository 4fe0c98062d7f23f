//! Test fixtures for creating engines and pre-populated queues

use crate::admission::{AdmissionEngine, WaitRank};
use crate::queue_store::{MemoryQueueStore, OrderedQueueStore};
use std::sync::Arc;

/// Engine over a fresh in-memory store
pub fn memory_engine() -> AdmissionEngine<MemoryQueueStore> {
    AdmissionEngine::new(Arc::new(MemoryQueueStore::new()))
}

/// Engine over a fresh in-memory store, typed as a trait object
pub fn dyn_memory_engine() -> AdmissionEngine<dyn OrderedQueueStore> {
    let store: Arc<dyn OrderedQueueStore> = Arc::new(MemoryQueueStore::new());
    AdmissionEngine::new(store)
}

/// Builder for a queue with registered users
pub struct TestQueueBuilder {
    queue: String,
    users: Vec<i64>,
    admitted: usize,
}

impl TestQueueBuilder {
    pub fn new(queue: impl Into<String>) -> Self {
        Self { queue: queue.into(), users: Vec::new(), admitted: 0 }
    }

    /// Register these users, in this order
    pub fn with_users(mut self, users: impl IntoIterator<Item = i64>) -> Self {
        self.users.extend(users);
        self
    }

    /// Promote the first `count` users after registering
    pub fn with_admitted(mut self, count: usize) -> Self {
        self.admitted = count;
        self
    }

    /// Register and promote against `engine`, returning each registration's rank.
    ///
    /// Panics on any engine error; fixtures are for tests only.
    pub async fn build<S>(self, engine: &AdmissionEngine<S>) -> Vec<WaitRank>
    where
        S: OrderedQueueStore + ?Sized,
    {
        let mut ranks = Vec::with_capacity(self.users.len());
        for user in &self.users {
            match engine.register(&self.queue, *user).await {
                Ok(rank) => ranks.push(rank),
                Err(e) => panic!("Fixture registration of {} failed: {}", user, e),
            }
        }

        if self.admitted > 0 {
            if let Err(e) = engine.admit(&self.queue, self.admitted).await {
                panic!("Fixture admission in {} failed: {}", self.queue, e);
            }
        }

        ranks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_builder() {
        let engine = memory_engine();

        let ranks =
            TestQueueBuilder::new("default").with_users([10, 20, 30]).with_admitted(1).build(&engine).await;

        assert_eq!(ranks, vec![WaitRank::Position(1), WaitRank::Position(2), WaitRank::Position(3)]);
        assert!(engine.is_admitted("default", 10).await.unwrap());
        assert_eq!(engine.wait_rank("default", 30).await.unwrap(), WaitRank::Position(2));
    }

    #[tokio::test]
    async fn test_dyn_engine() {
        let engine = dyn_memory_engine();
        TestQueueBuilder::new("q").with_users([1]).build(&engine).await;
        assert_eq!(engine.wait_rank("q", 1).await.unwrap(), WaitRank::Position(1));
    }
}
