//! Fixed-window rate limiter with two independent scopes.
//!
//! - per-caller: 5 analyses per caller per day (default)
//! - global: 100 analyses per hour across all callers (default)
//!
//! `allow` + `increment` are the two-call inspection surface. On their own they
//! race: concurrent requests can all observe "below limit" before any of them
//! increments. `acquire` is the path used to admit work: it increments first
//! and judges the value the store returned, so the check and the increment are
//! one atomic store operation per scope.
//!
//! Any backend failure fails OPEN.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::LimitConfig;
use crate::store::cache::keys;
use crate::store::KvBackend;

/// Identity used for the global counter.
const GLOBAL_IDENTITY: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PerCaller,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::PerCaller => "per_caller",
            Scope::Global => "global",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} rate limit exceeded ({count}/{limit}), retry after {}s", .scope.as_str(), .retry_after.as_secs())]
pub struct RateLimitExceeded {
    pub scope: Scope,
    pub count: u64,
    pub limit: u64,
    pub retry_after: Duration,
}

pub struct RateLimiter {
    backend: Arc<dyn KvBackend>,
    per_caller: LimitConfig,
    global: LimitConfig,
}

impl RateLimiter {
    pub fn new(backend: Arc<dyn KvBackend>, per_caller: LimitConfig, global: LimitConfig) -> Self {
        Self {
            backend,
            per_caller,
            global,
        }
    }

    fn limit(&self, scope: Scope) -> LimitConfig {
        match scope {
            Scope::PerCaller => self.per_caller,
            Scope::Global => self.global,
        }
    }

    fn key(scope: Scope, identity: &str) -> String {
        match scope {
            Scope::PerCaller => keys::rate_limit(scope.as_str(), identity),
            Scope::Global => keys::rate_limit(scope.as_str(), GLOBAL_IDENTITY),
        }
    }

    /// Reports whether `identity` is still under the limit for `scope`,
    /// without consuming anything.
    #[allow(dead_code)]
    pub async fn allow(&self, identity: &str, scope: Scope) -> (bool, u64) {
        let limit = self.limit(scope);
        match self.backend.get(&Self::key(scope, identity)).await {
            Ok(Some(raw)) => {
                let count = raw.parse::<u64>().unwrap_or(0);
                (count < limit.max_requests, count)
            }
            Ok(None) => (true, 0),
            Err(e) => {
                warn!("Rate limit check failed for {}, allowing: {e}", scope.as_str());
                (true, 0)
            }
        }
    }

    /// Counts one request against `scope` and returns the new count
    /// (0 when the backend is unreachable).
    #[allow(dead_code)]
    pub async fn increment(&self, identity: &str, scope: Scope) -> u64 {
        let limit = self.limit(scope);
        match self
            .backend
            .incr_windowed(&Self::key(scope, identity), 1, limit.window)
            .await
        {
            Ok(counter) => counter.count.max(0) as u64,
            Err(e) => {
                warn!("Rate limit increment failed for {}: {e}", scope.as_str());
                0
            }
        }
    }

    /// Admits one request if both scopes have room, consuming one slot in
    /// each. A request rejected by the global scope gets its per-caller slot
    /// back.
    pub async fn acquire(&self, identity: &str) -> Result<(), RateLimitExceeded> {
        self.take(identity, Scope::PerCaller).await?;

        if let Err(rejected) = self.take(identity, Scope::Global).await {
            self.refund(identity, Scope::PerCaller).await;
            return Err(rejected);
        }
        Ok(())
    }

    async fn take(&self, identity: &str, scope: Scope) -> Result<(), RateLimitExceeded> {
        let limit = self.limit(scope);
        let key = Self::key(scope, identity);

        let counter = match self.backend.incr_windowed(&key, 1, limit.window).await {
            Ok(counter) => counter,
            Err(e) => {
                warn!("Rate limiter unavailable for {}, allowing: {e}", scope.as_str());
                return Ok(());
            }
        };

        let count = counter.count.max(0) as u64;
        if count <= limit.max_requests {
            return Ok(());
        }

        // Keep the counter pinned at the limit so rejected attempts do not
        // inflate it.
        self.refund(identity, scope).await;

        let retry_after = if counter.resets_in.is_zero() {
            limit.window
        } else {
            counter.resets_in
        };
        Err(RateLimitExceeded {
            scope,
            count: limit.max_requests,
            limit: limit.max_requests,
            retry_after,
        })
    }

    async fn refund(&self, identity: &str, scope: Scope) {
        let limit = self.limit(scope);
        if let Err(e) = self
            .backend
            .incr_windowed(&Self::key(scope, identity), -1, limit.window)
            .await
        {
            warn!("Rate limit refund failed for {}: {e}", scope.as_str());
        }
    }
}
