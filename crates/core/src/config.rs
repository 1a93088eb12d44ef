use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key/value view over the process environment (or a fixed map in tests).
///
/// When a profile is set (e.g. `PROD`), every key is first looked up as
/// `{PROFILE}_{KEY}`, falling back to `{KEY}`.
struct EnvReader<'a> {
    profile: String,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvReader<'a> {
    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            let prefixed = format!("{}_{}", self.profile, key);
            if let Some(v) = (self.lookup)(&prefixed).filter(|s| !s.is_empty()) {
                return Some(v);
            }
        }
        (self.lookup)(key).filter(|s| !s.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.opt(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.opt(key) {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key, value: v }),
            None => Ok(default),
        }
    }

    fn duration(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.opt(key) {
            Some(v) => parse_duration(v.trim()).ok_or(ConfigError::Invalid { key, value: v }),
            None => Ok(default),
        }
    }
}

/// Parse human-friendly durations like "500ms", "90s", "2m", "1h30m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut has_unit = false;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }
        let n: u64 = num_buf.parse().ok()?;
        num_buf.clear();
        let unit_ms = match ch {
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'h' => 3_600_000,
            'm' => 60_000,
            's' => 1_000,
            'd' => 86_400_000,
            _ => return None,
        };
        total_ms = total_ms.checked_add(n.checked_mul(unit_ms)?)?;
        has_unit = true;
    }

    if !num_buf.is_empty() {
        // Trailing digits with no unit
        return None;
    }

    if has_unit && total_ms > 0 {
        Some(Duration::from_millis(total_ms))
    } else {
        None
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from the `HERALD_PROFILE` env var.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_lookup(&lookup)
    }

    /// Build config from a fixed key/value map instead of the process env.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| vars.get(key).cloned();
        Self::from_lookup(&lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let profile = lookup("HERALD_PROFILE").unwrap_or_default().to_uppercase();
        let env = EnvReader { profile: profile.clone(), lookup };
        Ok(Self {
            profile,
            server: ServerConfig::from_env(&env)?,
            postgres: PostgresConfig::from_env(&env)?,
            redis: RedisConfig::from_env(&env),
            delivery: DeliveryConfig::from_env(&env)?,
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!("  postgres:  host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  redis:     addr={}", self.redis.addr);
        tracing::info!(
            "  delivery:  webhook={}, interval={:?}, batch={}, attempts={}",
            self.delivery.webhook_url,
            self.delivery.send_interval,
            self.delivery.batch_size,
            self.delivery.max_attempts
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long shutdown waits for the scheduler and HTTP server to drain.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    fn from_env(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: env.or("SERVER_HOST", "0.0.0.0"),
            port: env.parse("SERVER_PORT", 8080)?,
            shutdown_timeout: env.duration("SHUTDOWN_TIMEOUT", Duration::from_secs(30))?,
        })
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: env.opt("DATABASE_URL"),
            host: env.or("PG_HOST", "localhost"),
            port: env.parse("PG_PORT", 5432)?,
            database: env.or("PG_DATABASE", "herald"),
            username: env.opt("PG_USERNAME"),
            password: env.opt("PG_PASSWORD"),
            ssl_mode: env.or("PG_SSL_MODE", "disable"),
            max_connections: env.parse("PG_MAX_CONNECTIONS", 10)?,
        })
    }

    /// PostgreSQL section alone, for commands that never deliver.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let profile = lookup("HERALD_PROFILE").unwrap_or_default().to_uppercase();
        Self::from_env(&EnvReader { profile, lookup: &lookup })
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

// ── Redis ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `host:port` or a full `redis://` / `rediss://` URL.
    pub addr: String,
}

impl RedisConfig {
    fn from_env(env: &EnvReader<'_>) -> Self {
        Self {
            addr: env.or("REDIS_ADDR", "127.0.0.1:6379"),
        }
    }

    pub fn url(&self) -> String {
        if self.addr.starts_with("redis://") || self.addr.starts_with("rediss://") {
            self.addr.clone()
        } else {
            format!("redis://{}/0", self.addr)
        }
    }
}

// ── Delivery ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub webhook_url: String,
    pub send_interval: Duration,
    pub batch_size: u32,
    /// Body limit in bytes; longer messages are never attempted.
    pub max_message_length: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub cache_key_prefix: String,
}

impl DeliveryConfig {
    fn from_env(env: &EnvReader<'_>) -> Result<Self, ConfigError> {
        let batch_size = env.parse("SEND_BATCH_SIZE", 2u32)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "SEND_BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        let max_attempts = env.parse("MAX_ATTEMPTS", 3u32)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            webhook_url: env.required("WEBHOOK_URL")?,
            send_interval: env.duration("SEND_INTERVAL", Duration::from_secs(120))?,
            batch_size,
            max_message_length: env.parse("MAX_MESSAGE_LENGTH", 160usize)?,
            max_attempts,
            retry_base_delay: env.duration("RETRY_BASE_DELAY", Duration::from_secs(1))?,
            cache_key_prefix: env.or("CACHE_KEY_PREFIX", "herald:msg:sent"),
        })
    }
}
