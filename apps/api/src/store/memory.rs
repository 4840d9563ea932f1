//! In-process `KvBackend` backed by an LRU map with per-entry expiry.
//!
//! Expiry is measured on the tokio clock, so tests can move time with
//! `tokio::time::pause` / `advance`. Contents never survive a restart and are
//! not shared between instances.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KvBackend, StoreError, WindowCount};

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct MemoryKv {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryKv {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of live entries.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries.iter().filter(|(_, e)| e.is_live(now)).count()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let found = entries
            .get(key)
            .map(|entry| (entry.is_live(now), entry.value.clone()));

        match found {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.put(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, StoreError> {
        let pattern = Pattern::new(pattern)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn incr_windowed(
        &self,
        key: &str,
        delta: i64,
        window: Duration,
    ) -> Result<WindowCount, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let (current, expires_at) = match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    StoreError::Unavailable(format!("value at '{key}' is not an integer"))
                })?;
                (current, entry.expires_at)
            }
            _ => (0, now + window),
        };

        let count = current + delta;
        entries.put(
            key.to_string(),
            MemoryEntry {
                value: count.to_string(),
                expires_at,
            },
        );

        Ok(WindowCount {
            count,
            resets_in: expires_at.saturating_duration_since(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn seeded(keys: &[&str]) -> MemoryKv {
        let kv = MemoryKv::default();
        for key in keys {
            kv.set_ex(key, "v", Duration::from_secs(60)).await.unwrap();
        }
        kv
    }

    #[tokio::test]
    async fn test_delete_matching_wildcards() {
        let kv = seeded(&[
            "rate_limit:per_caller:user-1",
            "rate_limit:per_caller:user-12",
            "interview_context:1",
        ])
        .await;

        assert_eq!(kv.delete_matching("rate_limit:*:user-?").await.unwrap(), 1);
        assert_eq!(kv.get("rate_limit:per_caller:user-12").await.unwrap().as_deref(), Some("v"));
        assert_eq!(kv.delete_matching("*").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_matching_character_class() {
        let kv = seeded(&["analysis:a1", "analysis:b1", "analysis:c1"]).await;

        assert_eq!(kv.delete_matching("analysis:[ab]*").await.unwrap(), 2);
        assert_eq!(kv.get("analysis:c1").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_malformed_pattern_is_an_error() {
        let kv = seeded(&["analysis:a1"]).await;

        assert_matches!(kv.delete_matching("analysis:[").await, Err(StoreError::Pattern(_)));
        assert_eq!(kv.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let kv = MemoryKv::default();
        kv.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_windowed_keeps_window_until_expiry() {
        let kv = MemoryKv::default();
        let window = Duration::from_secs(60);

        let first = kv.incr_windowed("c", 1, window).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.resets_in, window);

        tokio::time::advance(Duration::from_secs(20)).await;
        let second = kv.incr_windowed("c", 1, window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.resets_in, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        let restarted = kv.incr_windowed("c", 1, window).await.unwrap();
        assert_eq!(restarted.count, 1);
        assert_eq!(restarted.resets_in, window);
    }

    #[tokio::test]
    async fn test_delete_matching_counts_removed_keys() {
        let kv = MemoryKv::default();
        let ttl = Duration::from_secs(60);
        kv.set_ex("analysis:1", "a", ttl).await.unwrap();
        kv.set_ex("analysis:2", "b", ttl).await.unwrap();
        kv.set_ex("interview_context:1", "c", ttl).await.unwrap();

        assert_eq!(kv.delete_matching("analysis:*").await.unwrap(), 2);
        assert_eq!(kv.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let kv = MemoryKv::new(2);
        let ttl = Duration::from_secs(60);
        kv.set_ex("a", "1", ttl).await.unwrap();
        kv.set_ex("b", "2", ttl).await.unwrap();
        kv.set_ex("c", "3", ttl).await.unwrap();

        assert_eq!(kv.get("a").await.unwrap(), None);
        assert_eq!(kv.get("c").await.unwrap().as_deref(), Some("3"));
    }
}
