//! In-process session store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::store::SessionStore;
use crate::error::Result;

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// DashMap-backed store with lazy TTL eviction.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            drop(entry); // Release the shard lock before removing
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemorySessionStore::new();
        store.set_ex("session:a", "one", 60).await.unwrap();
        assert_eq!(store.get("session:a").await.unwrap().as_deref(), Some("one"));

        store.set_ex("session:a", "two", 60).await.unwrap();
        assert_eq!(store.get("session:a").await.unwrap().as_deref(), Some("two"));

        store.delete("session:a").await.unwrap();
        assert_eq!(store.get("session:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted() {
        let store = MemorySessionStore::new();
        store.set_ex("gone", "x", 0).await.unwrap();
        store.set_ex("kept", "y", 60).await.unwrap();

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);

        store.set_ex("gone", "x", 0).await.unwrap();
        assert_eq!(store.get("gone").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
