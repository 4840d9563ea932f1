//! Test doubles injected through the collaborator traits.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::LimitConfig;
use crate::llm_client::{CompletionBackend, CompletionRequest, OracleClient, OracleError, RetryPolicy};
use crate::orchestrator::Orchestrator;
use crate::profiles::{ProfileError, ProfileFacts, ProfileSource, RepositoryFact};
use crate::rate_limit::RateLimiter;
use crate::store::{
    CacheStore, KvBackend, MemoryKv, MemoryRecordStore, StoreError, WindowCount,
};

// ────────────────────────────────────────────────────────────────────────────
// Key/value backend that is always down
// ────────────────────────────────────────────────────────────────────────────

pub struct FailingKv;

#[async_trait]
impl KvBackend for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn incr_windowed(
        &self,
        _key: &str,
        _delta: i64,
        _window: Duration,
    ) -> Result<WindowCount, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted oracle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Fail(u16),
    Hang,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Step>,
    fallback: Option<Step>,
}

struct Call {
    at: Instant,
    request: CompletionRequest,
}

/// Oracle backend scripted per request label. Queued steps are consumed
/// first, then the label's fallback step repeats. Unscripted labels answer
/// `{}`.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<&'static str, Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, label: &'static str, step: Step) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(label)
            .or_default()
            .queue
            .push_back(step);
        self
    }

    fn always(self, label: &'static str, step: Step) -> Self {
        self.scripts.lock().unwrap().entry(label).or_default().fallback = Some(step);
        self
    }

    pub fn respond(self, label: &'static str, text: &str) -> Self {
        self.push(label, Step::Reply(text.to_string()))
    }

    pub fn respond_always(self, label: &'static str, text: &str) -> Self {
        self.always(label, Step::Reply(text.to_string()))
    }

    /// Queues `n` retryable 503 failures.
    pub fn fail_times(self, label: &'static str, n: usize) -> Self {
        (0..n).fold(self, |backend, _| backend.push(label, Step::Fail(503)))
    }

    pub fn fail_always(self, label: &'static str) -> Self {
        self.always(label, Step::Fail(503))
    }

    /// Queues one failure with the given status.
    pub fn reject(self, label: &'static str, status: u16) -> Self {
        self.push(label, Step::Fail(status))
    }

    /// Queues `n` calls that never complete.
    pub fn hang_times(self, label: &'static str, n: usize) -> Self {
        (0..n).fold(self, |backend, _| backend.push(label, Step::Hang))
    }

    pub fn calls(&self, label: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.label == label)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_order(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|c| c.request.label).collect()
    }

    pub fn call_instants(&self, label: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.label == label)
            .map(|c| c.at)
            .collect()
    }

    pub fn requests(&self, label: &str) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.label == label)
            .map(|c| c.request.clone())
            .collect()
    }

    pub fn prompts(&self, label: &str) -> Vec<String> {
        self.requests(label).into_iter().map(|r| r.prompt).collect()
    }

    fn next_step(&self, label: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(label) {
            Some(script) => script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| Step::Reply("{}".into())),
            None => Step::Reply("{}".into()),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        self.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            request: request.clone(),
        });

        match self.next_step(request.label) {
            Step::Reply(text) => Ok(text),
            Step::Fail(status) => Err(OracleError::Api {
                status,
                message: "scripted failure".into(),
            }),
            Step::Hang => std::future::pending().await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

/// Serves fixed facts per URL; unknown URLs are a 404.
#[derive(Default)]
pub struct StaticProfiles {
    facts: HashMap<String, ProfileFacts>,
}

impl StaticProfiles {
    pub fn github(url: &str, username: &str) -> Self {
        let mut facts = HashMap::new();
        facts.insert(
            url.to_string(),
            ProfileFacts::Github {
                username: username.to_string(),
                name: None,
                bio: Some("Backend engineer".into()),
                public_repos: 12,
                followers: 40,
                repositories: vec![RepositoryFact {
                    name: "django-orders".into(),
                    description: Some("Order service".into()),
                    language: Some("Python".into()),
                    stars: 25,
                }],
            },
        );
        Self { facts }
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn fetch(&self, url: &str) -> Result<ProfileFacts, ProfileError> {
        self.facts.get(url).cloned().ok_or(ProfileError::Api(404))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator harness
// ────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub backend: Arc<ScriptedBackend>,
    pub records: Arc<MemoryRecordStore>,
    pub kv: Arc<MemoryKv>,
}

impl Harness {
    pub const BASE_DELAY: Duration = Duration::from_millis(500);
    pub const ANALYSIS_TTL: Duration = Duration::from_secs(86_400);
    pub const SESSION_TTL: Duration = Duration::from_secs(7_200);

    /// In-memory cache and limiter, 5/day per caller and 100/hour global.
    pub fn new(backend: ScriptedBackend) -> Self {
        let kv = Arc::new(MemoryKv::default());
        Self::build(backend, kv.clone(), kv)
    }

    /// Cache and limiter backends both unreachable.
    pub fn with_failing_kv(backend: ScriptedBackend) -> Self {
        Self::build(backend, Arc::new(FailingKv), Arc::new(MemoryKv::default()))
    }

    fn build(backend: ScriptedBackend, primary: Arc<dyn KvBackend>, kv: Arc<MemoryKv>) -> Self {
        let backend = Arc::new(backend);
        let records = Arc::new(MemoryRecordStore::new());

        let oracle = OracleClient::new(
            backend.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Self::BASE_DELAY,
                call_timeout: Duration::from_secs(30),
                jitter: 0.0,
            },
        );
        let cache = CacheStore::new(Some(primary.clone()), Self::ANALYSIS_TTL, Self::SESSION_TTL);
        let limiter = RateLimiter::new(
            primary,
            LimitConfig {
                max_requests: 5,
                window: Duration::from_secs(86_400),
            },
            LimitConfig {
                max_requests: 100,
                window: Duration::from_secs(3_600),
            },
        );
        let profiles = Arc::new(StaticProfiles::github("https://github.com/janedoe", "janedoe"));

        let orchestrator = Orchestrator::new(oracle, cache, limiter, records.clone(), profiles);
        Self {
            orchestrator,
            backend,
            records,
            kv,
        }
    }
}
