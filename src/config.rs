//! Runtime configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! Everything is read from the process environment once at startup (a `.env`
//! file is honored via `dotenvy` in `main`). The resulting `Config` is shared
//! read-only through `AppState`.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_SHARED_SECRET: &str = "password";
const DEFAULT_LOGIN_RATE_LIMIT: usize = 10;
const DEFAULT_LOGIN_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_LOGIN_RATE_GLOBAL: usize = 300;
const DEFAULT_SESSION_CHECK_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// How submitted passwords are checked against directory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Every account accepts one shared secret. Demo deployments only.
    SharedSecret,
    /// Per-account Argon2 password hashes.
    Argon2,
}

impl CredentialMode {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "shared-secret" | "shared_secret" | "mock" => Some(Self::SharedSecret),
            "argon2" | "hashed" => Some(Self::Argon2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// PostgreSQL URL. When absent, users and sessions live in memory.
    pub database_url: Option<String>,
    /// Root of the site content (`pages/` overrides and `assets/`).
    pub site_dir: PathBuf,
    pub cookie_secure: bool,
    pub session_ttl: Duration,
    pub credentials: CredentialMode,
    /// Shared secret in `SharedSecret` mode; initial password for seeded
    /// accounts in `Argon2` mode.
    pub shared_secret: String,
    /// Artificial delay inside login/register/check to mimic a remote backend.
    pub simulated_latency: Duration,
    pub login_rate_limit: usize,
    pub login_rate_global: usize,
    pub login_rate_window: Duration,
    /// How long a request waits for session validation before guards see the
    /// session as still loading.
    pub session_check_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            site_dir: default_site_dir(),
            cookie_secure: false,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            credentials: CredentialMode::SharedSecret,
            shared_secret: DEFAULT_SHARED_SECRET.to_owned(),
            simulated_latency: Duration::ZERO,
            login_rate_limit: DEFAULT_LOGIN_RATE_LIMIT,
            login_rate_global: DEFAULT_LOGIN_RATE_GLOBAL,
            login_rate_window: Duration::from_secs(DEFAULT_LOGIN_RATE_WINDOW_SECS),
            session_check_timeout: Duration::from_millis(DEFAULT_SESSION_CHECK_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns an error when a key is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let credentials = match std::env::var("AUTH_CREDENTIALS") {
            Ok(raw) => CredentialMode::parse(&raw).ok_or(ConfigError::Invalid { key: "AUTH_CREDENTIALS", value: raw })?,
            Err(_) => defaults.credentials,
        };

        Ok(Self {
            port: env_parse_strict("PORT", defaults.port)?,
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            site_dir: std::env::var("SITE_DIR").map_or(defaults.site_dir, PathBuf::from),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(defaults.cookie_secure),
            session_ttl: Duration::from_secs(env_parse_strict("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?),
            credentials,
            shared_secret: std::env::var("AUTH_SHARED_SECRET").unwrap_or(defaults.shared_secret),
            simulated_latency: Duration::from_millis(env_parse("AUTH_SIMULATED_LATENCY_MS", 0)),
            login_rate_limit: env_parse("LOGIN_RATE_LIMIT", defaults.login_rate_limit),
            login_rate_global: env_parse("LOGIN_RATE_GLOBAL", defaults.login_rate_global),
            login_rate_window: Duration::from_secs(env_parse("LOGIN_RATE_WINDOW_SECS", DEFAULT_LOGIN_RATE_WINDOW_SECS)),
            session_check_timeout: Duration::from_millis(env_parse(
                "SESSION_CHECK_TIMEOUT_MS",
                DEFAULT_SESSION_CHECK_TIMEOUT_MS,
            )),
        })
    }
}

fn default_site_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("site")
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Parse `key`, silently falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_strict<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
