//! Bot configuration read from the environment

use crate::acl::UserId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Connection parameters for the CouchPotato API
#[derive(Debug, Clone)]
pub struct CouchPotatoConfig {
    pub hostname: String,
    pub port: u16,
    pub api_key: String,
    pub url_base: String,
    pub ssl: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CouchPotatoConfig {
    /// Base URL for API calls, e.g. `http://localhost:5050/couchpotato/api/<key>`
    pub fn api_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let base = self.url_base.trim_matches('/');
        if base.is_empty() {
            format!("{scheme}://{}:{}/api/{}", self.hostname, self.port, self.api_key)
        } else {
            format!(
                "{scheme}://{}:{}/{base}/api/{}",
                self.hostname, self.port, self.api_key
            )
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    /// Shared password for `/auth`
    pub password: String,
    /// May be unset on first boot; `/auth` then prompts the first user to configure it
    pub owner: Option<UserId>,
    pub acl_path: PathBuf,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub couchpotato: CouchPotatoConfig,
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(150);

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let owner = match get("BOT_OWNER") {
            Some(raw) => Some(parse(raw, "BOT_OWNER")?),
            None => None,
        };

        let couchpotato = CouchPotatoConfig {
            hostname: require("COUCHPOTATO_HOST")?,
            port: get("COUCHPOTATO_PORT")
                .map(|raw| parse(raw, "COUCHPOTATO_PORT"))
                .transpose()?
                .unwrap_or(5050),
            api_key: require("COUCHPOTATO_API_KEY")?,
            url_base: get("COUCHPOTATO_URL_BASE").unwrap_or_default(),
            ssl: get("COUCHPOTATO_SSL")
                .map(|raw| parse_bool(&raw, "COUCHPOTATO_SSL"))
                .transpose()?
                .unwrap_or(false),
            username: get("COUCHPOTATO_USERNAME"),
            password: get("COUCHPOTATO_PASSWORD"),
        };

        Ok(Self {
            telegram_token: require("TELEGRAM_BOT_TOKEN")?,
            password: require("BOT_PASSWORD")?,
            owner,
            acl_path: get("BOT_ACL_PATH").map_or_else(|| PathBuf::from("acl.json"), PathBuf::from),
            session_ttl: seconds(get("SESSION_TTL_SECS"), "SESSION_TTL_SECS")?
                .unwrap_or(DEFAULT_SESSION_TTL),
            sweep_interval: seconds(get("SESSION_SWEEP_SECS"), "SESSION_SWEEP_SECS")?
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
            couchpotato,
        })
    }
}

fn parse<T: std::str::FromStr>(raw: String, name: &'static str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: raw })
}

fn parse_bool(raw: &str, name: &'static str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

fn seconds(raw: Option<String>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    raw.map(|raw| parse::<u64>(raw, name).map(Duration::from_secs))
        .transpose()
}
