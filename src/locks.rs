//! Per-topic write serialization
//!
//! Every read-modify-write of a topic document happens while holding that
//! topic's lock. Lock entries are dropped again once nobody holds them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held lock on one topic
pub struct TopicGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of async mutexes keyed by topic id
#[derive(Clone, Default)]
pub struct TopicLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl TopicLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, topic_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        // forget locks nobody is holding or waiting on
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(topic_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Lock one topic
    pub async fn lock(&self, topic_id: &str) -> TopicGuard {
        let lock = self.entry(topic_id);
        TopicGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Lock two topics in id order so concurrent pairs cannot deadlock
    pub async fn lock_pair(&self, a: &str, b: &str) -> (TopicGuard, Option<TopicGuard>) {
        if a == b {
            return (self.lock(a).await, None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(first).await;
        let second = self.lock(second).await;
        (first, Some(second))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }
}
