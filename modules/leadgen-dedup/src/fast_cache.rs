use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::traits::{FastCache, KeyTtl};

/// In-process presence cache. Each key maps to its expiry deadline,
/// `None` meaning no expiry was set. Expired keys are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryFastCache {
    entries: DashMap<String, Option<Instant>>,
}

impl MemoryFastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a key with no expiry. Only the housekeeping sweep removes these.
    pub fn insert_without_expiry(&self, key: &str) {
        self.entries.insert(key.to_string(), None);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_deadline(&self, key: &str) -> Option<Option<Instant>> {
        let now = Instant::now();
        let deadline = *self.entries.get(key)?;
        if is_expired(deadline, now) {
            self.entries
                .remove_if(key, |_, current| is_expired(*current, now));
            return None;
        }
        Some(deadline)
    }
}

fn is_expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| d <= now)
}

#[async_trait]
impl FastCache for MemoryFastCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_deadline(key).is_some())
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;
        self.entries.insert(key.to_string(), Some(deadline));
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        Ok(match self.live_deadline(key) {
            None => KeyTtl::Missing,
            Some(None) => KeyTtl::Persistent,
            Some(Some(deadline)) => {
                KeyTtl::Expires(deadline.saturating_duration_since(Instant::now()))
            }
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !is_expired(*e.value(), now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, deadline| !is_expired(*deadline, now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
