use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub log_level: String,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
}

/// Knobs consumed by the engine, watchdog and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Upper bound on actions claimed in a single pass.
    pub max_actions_per_sync: usize,
    /// An IN_FLIGHT action untouched for longer than this is considered stuck.
    pub in_flight_timeout_ms: u64,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    /// Attempt ceiling for unclassified errors before they become permanent.
    pub max_attempts: u32,
    pub processor_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_actions_per_sync: 50,
            in_flight_timeout_ms: 10 * 60 * 1000,
            base_backoff_ms: 30_000,
            max_backoff_ms: 60 * 60 * 1000,
            jitter_min: 0.8,
            jitter_max: 1.2,
            max_attempts: 10,
            processor_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_actions_per_sync == 0 {
            return Err("max_actions_per_sync must be at least 1".into());
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.base_backoff_ms, self.max_backoff_ms
            ));
        }
        if !(self.jitter_min > 0.0) || !self.jitter_max.is_finite() {
            return Err("jitter bounds must be positive and finite".into());
        }
        if self.jitter_min > self.jitter_max {
            return Err(format!(
                "jitter_min ({}) exceeds jitter_max ({})",
                self.jitter_min, self.jitter_max
            ));
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.processor_timeout.is_zero() {
            return Err("processor_timeout must be greater than zero".into());
        }
        // A call still running past the in-flight timeout would be reset under it.
        if self.processor_timeout >= Duration::from_millis(self.in_flight_timeout_ms) {
            return Err(format!(
                "processor_timeout ({}ms) must be shorter than in_flight_timeout_ms ({})",
                self.processor_timeout.as_millis(),
                self.in_flight_timeout_ms
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Periodic cadence between passes.
    pub interval: Duration,
    /// First wait after a failed pass, doubled for each further failure.
    pub failure_backoff: Duration,
    /// Ceiling for the outer backoff applied after failed passes.
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            failure_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let api_base_url = env_or("OUTBOX_API_BASE_URL", "http://127.0.0.1:8080");
        let log_level = env_or("OUTBOX_LOG_LEVEL", "info");

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            max_actions_per_sync: env_parse(
                "OUTBOX_MAX_ACTIONS_PER_SYNC",
                defaults.max_actions_per_sync,
            )?,
            in_flight_timeout_ms: env_parse(
                "OUTBOX_IN_FLIGHT_TIMEOUT_MS",
                defaults.in_flight_timeout_ms,
            )?,
            base_backoff_ms: env_parse("OUTBOX_BASE_BACKOFF_MS", defaults.base_backoff_ms)?,
            max_backoff_ms: env_parse("OUTBOX_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
            jitter_min: env_parse("OUTBOX_JITTER_MIN", defaults.jitter_min)?,
            jitter_max: env_parse("OUTBOX_JITTER_MAX", defaults.jitter_max)?,
            max_attempts: env_parse("OUTBOX_MAX_ATTEMPTS", defaults.max_attempts)?,
            processor_timeout: Duration::from_secs(env_parse(
                "OUTBOX_PROCESSOR_TIMEOUT_SECS",
                defaults.processor_timeout.as_secs(),
            )?),
        };
        sync.validate()?;

        let scheduler_defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            interval: Duration::from_secs(env_parse(
                "OUTBOX_SYNC_INTERVAL_SECS",
                scheduler_defaults.interval.as_secs(),
            )?),
            failure_backoff: Duration::from_secs(env_parse(
                "OUTBOX_SCHEDULER_FAILURE_BACKOFF_SECS",
                scheduler_defaults.failure_backoff.as_secs(),
            )?),
            max_backoff: Duration::from_secs(env_parse(
                "OUTBOX_SCHEDULER_MAX_BACKOFF_SECS",
                scheduler_defaults.max_backoff.as_secs(),
            )?),
        };

        Ok(Config {
            database_url,
            api_base_url,
            log_level,
            sync,
            scheduler,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}
