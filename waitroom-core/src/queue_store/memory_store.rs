//! In-Memory Queue Store
//!
//! Sorted sets held in process memory. Every operation takes the store lock
//! exactly once, which makes each one atomic with respect to all others.
//! Waiting for the lock honors the caller's deadline; once held, the work
//! finishes without yielding, so a call either applies fully or not at all.

use super::deadline::CallDeadline;
use super::errors::QueueStoreResult;
use super::keys::KeyPattern;
use super::{unix_timestamp, OrderedQueueStore, ScanCursor, ScanPage, ScoredMember};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordering key: score first, then insertion sequence
type OrderKey = (i64, u64, String);

/// One sorted set
#[derive(Debug, Default)]
struct SortedSet {
    order: BTreeSet<OrderKey>,
    members: HashMap<String, (i64, u64)>,
}

impl SortedSet {
    fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    fn insert(&mut self, member: &str, score: i64, seq: u64) {
        self.members.insert(member.to_string(), (score, seq));
        self.order.insert((score, seq, member.to_string()));
    }

    /// Replace the score of an existing member, keeping its sequence
    fn rescore(&mut self, member: &str, score: i64) {
        if let Some((old_score, seq)) = self.members.get(member).copied() {
            self.order.remove(&(old_score, seq, member.to_string()));
            self.order.insert((score, seq, member.to_string()));
            self.members.insert(member.to_string(), (score, seq));
        }
    }

    fn rank(&self, member: &str) -> Option<u64> {
        let (score, seq) = self.members.get(member).copied()?;
        let position = self.order.range(..(score, seq, member.to_string())).count();
        Some(position as u64)
    }

    fn pop_min(&mut self, count: usize) -> Vec<ScoredMember> {
        let mut popped = Vec::with_capacity(count.min(self.order.len()));
        while popped.len() < count {
            let Some((score, _seq, member)) = self.order.pop_first() else {
                break;
            };
            self.members.remove(&member);
            popped.push(ScoredMember { member, score });
        }
        popped
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn max_score(&self) -> Option<i64> {
        self.order.last().map(|(score, _, _)| *score)
    }
}

#[derive(Debug, Default)]
struct Inner {
    sets: BTreeMap<String, SortedSet>,
    next_seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn add_if_absent(&mut self, key: &str, member: &str, score: i64) -> bool {
        if self.sets.get(key).is_some_and(|set| set.contains(member)) {
            return false;
        }

        let seq = self.next_seq();
        self.sets.entry(key.to_string()).or_default().insert(member, score, seq);
        true
    }

    fn pop_min(&mut self, key: &str, count: usize) -> Vec<ScoredMember> {
        let Some(set) = self.sets.get_mut(key) else {
            return Vec::new();
        };
        let popped = set.pop_min(count);
        if set.is_empty() {
            // An empty sorted set does not exist
            self.sets.remove(key);
        }
        popped
    }

    fn add_many(&mut self, key: &str, entries: Vec<ScoredMember>) -> usize {
        let mut inserted = 0;
        for entry in entries {
            let seq = self.next_seq();
            let set = self.sets.entry(key.to_string()).or_default();
            if set.contains(&entry.member) {
                set.rescore(&entry.member, entry.score);
            } else {
                set.insert(&entry.member, entry.score, seq);
                inserted += 1;
            }
        }
        inserted
    }
}

/// In-memory ordered queue store
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryQueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn read(&self) -> QueueStoreResult<RwLockReadGuard<'_, Inner>> {
        let deadline = CallDeadline::capture();
        match deadline.at() {
            Some(at) => tokio::time::timeout_at(at, self.inner.read()).await.map_err(|_| deadline.timeout()),
            None => Ok(self.inner.read().await),
        }
    }

    async fn write(&self) -> QueueStoreResult<RwLockWriteGuard<'_, Inner>> {
        let deadline = CallDeadline::capture();
        match deadline.at() {
            Some(at) => tokio::time::timeout_at(at, self.inner.write()).await.map_err(|_| deadline.timeout()),
            None => Ok(self.inner.write().await),
        }
    }

    /// Number of members under `key`
    pub async fn len(&self, key: &str) -> usize {
        let inner = self.inner.read().await;
        inner.sets.get(key).map(|set| set.order.len()).unwrap_or(0)
    }

    /// Members under `key` in ascending order
    pub async fn members(&self, key: &str) -> Vec<ScoredMember> {
        let inner = self.inner.read().await;
        inner
            .sets
            .get(key)
            .map(|set| {
                set.order
                    .iter()
                    .map(|(score, _, member)| ScoredMember::new(member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderedQueueStore for MemoryQueueStore {
    async fn add_if_absent(&self, key: &str, member: &str, score: i64) -> QueueStoreResult<bool> {
        let mut inner = self.write().await?;
        Ok(inner.add_if_absent(key, member, score))
    }

    async fn append_if_absent(&self, key: &str, member: &str) -> QueueStoreResult<bool> {
        let mut inner = self.write().await?;
        let tail = inner.sets.get(key).and_then(SortedSet::max_score).unwrap_or(i64::MIN);
        Ok(inner.add_if_absent(key, member, unix_timestamp().max(tail)))
    }

    async fn rank(&self, key: &str, member: &str) -> QueueStoreResult<Option<u64>> {
        let inner = self.read().await?;
        Ok(inner.sets.get(key).and_then(|set| set.rank(member)))
    }

    async fn pop_min(&self, key: &str, count: usize) -> QueueStoreResult<Vec<ScoredMember>> {
        let mut inner = self.write().await?;
        Ok(inner.pop_min(key, count))
    }

    async fn add_many(&self, key: &str, entries: Vec<ScoredMember>) -> QueueStoreResult<usize> {
        let mut inner = self.write().await?;
        Ok(inner.add_many(key, entries))
    }

    async fn transfer_min(
        &self,
        from: &str,
        to: &str,
        count: usize,
        score: i64,
    ) -> QueueStoreResult<Vec<ScoredMember>> {
        let mut inner = self.write().await?;

        let popped = inner.pop_min(from, count);
        let moved = popped.iter().map(|entry| ScoredMember::new(entry.member.clone(), score)).collect();
        inner.add_many(to, moved);

        Ok(popped)
    }

    async fn scan_keys(
        &self,
        pattern: &KeyPattern,
        cursor: ScanCursor,
        count: usize,
    ) -> QueueStoreResult<ScanPage> {
        let inner = self.read().await?;
        let count = count.max(1);

        let lower = match cursor.position() {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };

        let mut keys = Vec::new();
        let mut last_visited = None;
        let mut exhausted = true;

        // Like a SCAN COUNT hint, `count` bounds the keys visited, not the matches
        for (visited, key) in inner.sets.range((lower, Bound::Unbounded)).map(|(k, _)| k).enumerate() {
            if visited == count {
                exhausted = false;
                break;
            }
            if pattern.matches(key) {
                keys.push(key.clone());
            }
            last_visited = Some(key.clone());
        }

        let next = match (exhausted, last_visited) {
            (false, Some(key)) => Some(ScanCursor::after(key)),
            _ => None,
        };

        Ok(ScanPage { keys, next })
    }
}
