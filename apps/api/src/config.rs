use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Deployment profile. Production forbids the auth-disabled mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

/// How callers are identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer JWT signed with `JWT_SECRET`.
    Jwt { secret: String },
    /// Every request runs as `DEV_USER_ID`. Local testing only.
    Disabled { dev_user_id: String },
}

/// Quota for one rate-limit scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    pub max_requests: u64,
    pub window: Duration,
}

/// Retry and timeout policy for text-generation calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub call_timeout: Duration,
    /// Fraction of each backoff delay added as random jitter (0.0 disables).
    pub jitter: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub app_env: AppEnv,
    pub auth: AuthMode,
    pub per_caller_limit: LimitConfig,
    pub global_limit: LimitConfig,
    pub analysis_ttl: Duration,
    pub session_ttl: Duration,
    pub oracle: OracleConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let app_env = match optional_env("APP_ENV", "development").as_str() {
            "production" | "prod" => AppEnv::Production,
            "development" | "dev" | "test" => AppEnv::Development,
            other => bail!("APP_ENV must be 'development' or 'production', got '{other}'"),
        };

        let auth = match optional_env("AUTH_MODE", "jwt").as_str() {
            "jwt" => AuthMode::Jwt {
                secret: require_env("JWT_SECRET")?,
            },
            "disabled" => AuthMode::Disabled {
                dev_user_id: optional_env("DEV_USER_ID", "local-dev-user"),
            },
            other => bail!("AUTH_MODE must be 'jwt' or 'disabled', got '{other}'"),
        };

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
            app_env,
            auth,
            per_caller_limit: LimitConfig {
                max_requests: parse_env("RATE_LIMIT_PER_CALLER", 5)?,
                window: Duration::from_secs(parse_env("RATE_LIMIT_PER_CALLER_WINDOW_SECS", 86_400)?),
            },
            global_limit: LimitConfig {
                max_requests: parse_env("RATE_LIMIT_GLOBAL", 100)?,
                window: Duration::from_secs(parse_env("RATE_LIMIT_GLOBAL_WINDOW_SECS", 3_600)?),
            },
            analysis_ttl: Duration::from_secs(parse_env("CACHE_TTL_ANALYSIS_SECS", 86_400)?),
            session_ttl: Duration::from_secs(parse_env("CACHE_TTL_SESSION_SECS", 7_200)?),
            oracle: OracleConfig {
                max_attempts: parse_env("ORACLE_MAX_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(parse_env("ORACLE_BASE_DELAY_MS", 1_000)?),
                call_timeout: Duration::from_secs(parse_env("ORACLE_TIMEOUT_SECS", 60)?),
                jitter: parse_env("ORACLE_JITTER", 0.1)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations that must never reach a running process.
    pub fn validate(&self) -> Result<()> {
        if self.app_env == AppEnv::Production && matches!(self.auth, AuthMode::Disabled { .. }) {
            bail!("AUTH_MODE=disabled is not permitted when APP_ENV=production");
        }
        if self.oracle.max_attempts == 0 {
            bail!("ORACLE_MAX_ATTEMPTS must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.oracle.jitter) {
            bail!("ORACLE_JITTER must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
