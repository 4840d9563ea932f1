//! LLM client: the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: No other module may call a model API directly.
//! Pipeline stages and interview operations go through `OracleClient`, which
//! owns retry, backoff and per-call timeouts. Backends perform exactly one
//! attempt and report whether a failure is worth retrying.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::OracleConfig;

pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicBackend;

/// Default output cap for structured stage calls.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM call failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<OracleError>,
    },
}

impl OracleError {
    /// Transport failures, timeouts, 429 and 5xx are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Http(_) | OracleError::Timeout(_) | OracleError::EmptyContent => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::Exhausted { .. } => false,
        }
    }
}

/// One prompt for one backend attempt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Which operation is calling. Used for logs and by test doubles.
    pub label: &'static str,
    pub system: &'static str,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(label: &'static str, system: &'static str, prompt: String) -> Self {
        Self {
            label,
            system,
            prompt,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A text-generation backend. Performs exactly one attempt per call.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError>;
}

/// Retry schedule: attempt `k` (k ≥ 2) waits `base_delay * 2^(k-2)`, plus up
/// to `jitter` of that delay at random.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub call_timeout: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    /// Delay slept before `attempt` (1-based). Zero for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);

        if self.jitter > 0.0 {
            let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
            delay.mul_f64(1.0 + extra)
        } else {
            delay
        }
    }
}

impl From<OracleConfig> for RetryPolicy {
    fn from(config: OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            call_timeout: config.call_timeout,
            jitter: config.jitter,
        }
    }
}

/// The text oracle used by every stage. Cheap to clone.
#[derive(Clone)]
pub struct OracleClient {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

impl OracleClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Sends the request, retrying transient failures with exponential
    /// backoff. Each attempt is bounded by the policy's call timeout.
    pub async fn generate(&self, request: CompletionRequest) -> Result<String, OracleError> {
        let mut last_error: Option<OracleError> = None;
        let mut attempts = 0;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_before(attempt);
                warn!(
                    "{} call attempt {} failed, retrying after {}ms...",
                    request.label,
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            attempts = attempt;

            let outcome =
                tokio::time::timeout(self.policy.call_timeout, self.backend.complete(&request))
                    .await
                    .unwrap_or(Err(OracleError::Timeout(self.policy.call_timeout)));

            match outcome {
                Ok(text) => {
                    debug!(
                        "{} call succeeded on attempt {attempt} ({} chars)",
                        request.label,
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    warn!("{} call attempt {attempt} failed: {e}", request.label);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("{} call failed with non-retryable error: {e}", request.label);
                    last_error = Some(e);
                    break;
                }
            }
        }

        let source = last_error.unwrap_or(OracleError::EmptyContent);
        error!(
            "{} call giving up after {attempts} attempt(s): {source}",
            request.label
        );
        Err(OracleError::Exhausted {
            attempts,
            source: Box::new(source),
        })
    }
}
