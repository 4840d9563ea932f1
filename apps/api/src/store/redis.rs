//! Redis `KvBackend`.
//!
//! One multiplexed connection is shared by all requests. It is opened lazily
//! and dropped after an I/O failure so the next call reconnects. Every command
//! is bounded by `op_timeout`: a slow Redis must look like a miss to callers,
//! never like a hang.
//!
//! The connection slot is only locked to read or replace it, never across a
//! connect. After a failed connect or a timed-out command, calls fail
//! immediately until `CONNECT_BACKOFF` has passed.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult, Script};
use tokio::time::Instant;
use tracing::{info, warn};

use super::{KvBackend, StoreError, WindowCount};

/// INCRBY plus "start the window if none is running", as one atomic step.
/// Returns `{count, remaining_ms}`.
const INCR_WINDOWED_LUA: &str = r#"
local count = redis.call('INCRBY', KEYS[1], ARGV[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
  ttl = tonumber(ARGV[2])
end
return {count, ttl}
"#;

const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Slot {
    conn: Option<MultiplexedConnection>,
    /// Calls made before this instant fail without touching the network.
    retry_at: Option<Instant>,
}

pub struct RedisKv {
    client: redis::Client,
    slot: Mutex<Slot>,
    op_timeout: Duration,
    incr_script: Script,
}

impl RedisKv {
    pub fn new(client: redis::Client, op_timeout: Duration) -> Self {
        Self {
            client,
            slot: Mutex::new(Slot::default()),
            op_timeout,
            incr_script: Script::new(INCR_WINDOWED_LUA),
        }
    }

    /// Round-trips a PING. Used at startup to log reachability.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run(|mut conn| async move { redis::cmd("PING").query_async::<_, String>(&mut conn).await })
            .await
            .map(|_| ())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        {
            let slot = self.slot();
            if let Some(conn) = slot.conn.as_ref() {
                return Ok(conn.clone());
            }
            if slot.retry_at.is_some_and(|at| Instant::now() < at) {
                return Err(StoreError::Unavailable("redis reconnect backing off".into()));
            }
        }

        // Concurrent callers may each connect; the first one stored wins.
        let connected = tokio::time::timeout(
            self.op_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;

        let conn = match connected {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.back_off();
                return Err(StoreError::Redis(e));
            }
            Err(_) => {
                self.back_off();
                return Err(StoreError::Timeout(self.op_timeout));
            }
        };

        let mut slot = self.slot();
        if let Some(existing) = slot.conn.as_ref() {
            return Ok(existing.clone());
        }
        info!("Redis connection established");
        slot.conn = Some(conn.clone());
        slot.retry_at = None;
        Ok(conn)
    }

    /// Drops the shared connection and holds off reconnecting for a while.
    fn back_off(&self) {
        let mut slot = self.slot();
        slot.conn = None;
        slot.retry_at = Some(Instant::now() + CONNECT_BACKOFF);
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;

        match tokio::time::timeout(self.op_timeout, op(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    warn!("Redis connection lost: {e}");
                    self.back_off();
                }
                Err(StoreError::Redis(e))
            }
            Err(_) => {
                self.back_off();
                Err(StoreError::Timeout(self.op_timeout))
            }
        }
    }
}

#[async_trait]
impl KvBackend for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        self.run(|mut conn| async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, StoreError> {
        let pattern = pattern.to_string();
        self.run(|mut conn| async move {
            let mut keys: Vec<String> = Vec::new();
            {
                let mut iter = conn.scan_match::<_, String>(pattern).await?;
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
            }
            if keys.is_empty() {
                return Ok(0);
            }
            conn.del::<_, u64>(keys).await
        })
        .await
    }

    async fn incr_windowed(
        &self,
        key: &str,
        delta: i64,
        window: Duration,
    ) -> Result<WindowCount, StoreError> {
        let key = key.to_string();
        let window_ms = window.as_millis().max(1) as u64;
        let script = &self.incr_script;

        let (count, remaining_ms) = self
            .run(|mut conn| async move {
                script
                    .key(key)
                    .arg(delta)
                    .arg(window_ms)
                    .invoke_async::<_, (i64, i64)>(&mut conn)
                    .await
            })
            .await?;

        Ok(WindowCount {
            count,
            resets_in: Duration::from_millis(remaining_ms.max(0) as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    use super::*;

    /// Accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("redis://{addr}")
    }

    #[tokio::test]
    async fn test_unresponsive_server_does_not_queue_concurrent_callers() {
        let client = redis::Client::open(silent_server().await).unwrap();
        let kv = Arc::new(RedisKv::new(client, Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let calls: Vec<_> = (0..10)
            .map(|_| {
                let kv = kv.clone();
                tokio::spawn(async move { kv.get("k").await })
            })
            .collect();
        for call in calls {
            assert!(call.await.unwrap().is_err());
        }
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(1), "10 concurrent gets took {elapsed:?}");

        // Inside the backoff window the next call does not touch the network
        let started = std::time::Instant::now();
        assert_matches!(kv.get("k").await, Err(StoreError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
