//! Best-effort cache and session store.
//!
//! The primary backend (Redis) is an accelerator, not a dependency: `get`
//! reports a miss and `set` reports "not stored" when it is unreachable, and
//! neither ever returns an error. Writes that miss the primary land in an
//! in-process fallback map so a single process keeps session continuity
//! through a Redis outage.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{KvBackend, MemoryKv};

/// Expiry classes for cached values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Analysis results and report copies (long window).
    Analysis,
    /// Interview session context (bounded live-interview window).
    Session,
}

pub struct CacheStore {
    primary: Option<Arc<dyn KvBackend>>,
    fallback: MemoryKv,
    analysis_ttl: Duration,
    session_ttl: Duration,
}

impl CacheStore {
    pub fn new(
        primary: Option<Arc<dyn KvBackend>>,
        analysis_ttl: Duration,
        session_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            fallback: MemoryKv::default(),
            analysis_ttl,
            session_ttl,
        }
    }

    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Analysis => self.analysis_ttl,
            TtlClass::Session => self.session_ttl,
        }
    }

    /// Returns the cached value, or `None` on miss, expiry, backend failure or
    /// an undecodable payload.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry '{key}': {e}");
                None
            }
        }
    }

    /// Stores `value` under `key`. Returns `true` only when the primary
    /// backend accepted the write.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, class: TtlClass) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot serialize cache entry '{key}': {e}");
                return false;
            }
        };
        let ttl = self.ttl(class);

        if let Some(primary) = &self.primary {
            match primary.set_ex(key, &raw, ttl).await {
                Ok(()) => {
                    debug!("Cached '{key}' for {}s", ttl.as_secs());
                    return true;
                }
                Err(e) => warn!("Cache write failed for '{key}', using in-process fallback: {e}"),
            }
        }

        // MemoryKv never fails
        let _ = self.fallback.set_ex(key, &raw, ttl).await;
        false
    }

    /// Removes every key matching `pattern` from both layers.
    #[allow(dead_code)]
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let mut removed = 0;
        if let Some(primary) = &self.primary {
            match primary.delete_matching(pattern).await {
                Ok(n) => removed += n,
                Err(e) => warn!("Cache invalidation failed for '{pattern}': {e}"),
            }
        }
        removed + self.fallback.delete_matching(pattern).await.unwrap_or(0)
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(Some(raw)) => return Some(raw),
                Ok(None) => {}
                Err(e) => warn!("Cache read failed for '{key}', treating as miss: {e}"),
            }
        }
        self.fallback.get(key).await.ok().flatten()
    }
}

/// Cache key layout.
pub mod keys {
    use super::Uuid;

    pub fn analysis(analysis_id: Uuid) -> String {
        format!("analysis:{analysis_id}")
    }

    pub fn analysis_result(fingerprint: &str) -> String {
        format!("analysis_result:{fingerprint}")
    }

    pub fn interview_context(interview_id: Uuid) -> String {
        format!("interview_context:{interview_id}")
    }

    pub fn rate_limit(scope: &str, identity: &str) -> String {
        format!("rate_limit:{scope}:{identity}")
    }
}

/// SHA-256 hex digest over the given parts. Each part is length-prefixed so
/// `["ab", "c"]` and `["a", "bc"]` produce different fingerprints.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
