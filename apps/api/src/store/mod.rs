//! Storage collaborators.
//!
//! - `KvBackend`: string key/value with TTLs and windowed counters (Redis in
//!   production, an LRU map in-process). Shared by the cache and the limiter.
//! - `CacheStore`: typed, best-effort cache/session layer over a `KvBackend`.
//! - `RecordStore`: durable analysis/interview records keyed by id.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod cache;
pub mod memory;
pub mod records;
pub mod redis;

pub use cache::{CacheStore, TtlClass};
pub use memory::MemoryKv;
#[cfg(test)]
pub use records::MemoryRecordStore;
pub use records::{PgRecordStore, RecordKind, RecordStore};
pub use self::redis::RedisKv;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid key pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Counter state returned by an atomic windowed increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: i64,
    /// Time left before the window expires and the counter starts over.
    pub resets_in: Duration,
}

/// Minimal key/value surface needed by the cache and the rate limiter.
/// Every operation is atomic per key.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes every key matching a Redis-style glob pattern (`*`, `?` and
    /// `[...]` classes).
    async fn delete_matching(&self, pattern: &str) -> Result<u64, StoreError>;

    /// Adds `delta` to the counter at `key`. The first write starts a window
    /// of length `window`; later writes inside the window leave it untouched.
    async fn incr_windowed(
        &self,
        key: &str,
        delta: i64,
        window: Duration,
    ) -> Result<WindowCount, StoreError>;
}
