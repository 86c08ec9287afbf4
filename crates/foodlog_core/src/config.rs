//! Process configuration.
//!
//! # Responsibility
//! - Read every external-collaborator setting once, at process start.
//! - Hand immutable setting values to the adapters at construction.
//!
//! # Invariants
//! - Configuration is environment-only; nothing re-reads the environment
//!   after startup.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "foodlog.db";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const DEFAULT_REMOTE_BASE_URL: &str = "https://api.notion.com";
const DEFAULT_RESOLVER_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar { name: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(name) => write!(f, "required environment variable `{name}` is not set"),
            Self::InvalidVar { name, value } => {
                write!(f, "environment variable `{name}` has invalid value `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Remote store (Notion) connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub token: String,
    pub main_database_id: String,
    pub food_database_id: String,
    pub base_url: String,
}

/// Generative resolver (LLM) connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Full process configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub remote: RemoteSettings,
    pub resolver: ResolverSettings,
    pub db_path: PathBuf,
    pub log_dir: Option<String>,
    pub log_level: Option<String>,
    pub poll_interval_secs: u64,
}

impl Config {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    /// - `MissingVar` when a required credential or database id is absent.
    /// - `InvalidVar` when a numeric setting does not parse.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Exists so tests can exercise parsing without mutating process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |name: &'static str| -> ConfigResult<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(ConfigError::MissingVar(name)),
            }
        };

        let poll_interval_secs = match lookup("FOODLOG_POLL_INTERVAL_SECS") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar {
                    name: "FOODLOG_POLL_INTERVAL_SECS",
                    value,
                })?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            remote: RemoteSettings {
                token: required("NOTION_TOKEN")?,
                main_database_id: required("NOTION_MAIN_DATABASE_ID")?,
                food_database_id: required("NOTION_FOOD_DATABASE_ID")?,
                base_url: lookup("NOTION_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_REMOTE_BASE_URL.to_string()),
            },
            resolver: ResolverSettings {
                api_key: required("LLM_API_KEY")?,
                model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: lookup("LLM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_RESOLVER_BASE_URL.to_string()),
            },
            db_path: lookup("FOODLOG_DB_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            log_dir: lookup("FOODLOG_LOG_DIR"),
            log_level: lookup("FOODLOG_LOG_LEVEL"),
            poll_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("NOTION_TOKEN", "secret-token"),
            ("NOTION_MAIN_DATABASE_ID", "main-db"),
            ("NOTION_FOOD_DATABASE_ID", "food-db"),
            ("LLM_API_KEY", "llm-key"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|value| (*value).to_string()))
    }

    #[test]
    fn loads_with_defaults_for_optional_settings() {
        let config = load(&base_vars()).expect("base vars should load");
        assert_eq!(config.resolver.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.remote.base_url, "https://api.notion.com");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.db_path.to_str(), Some("foodlog.db"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn missing_credential_is_reported_by_name() {
        let mut vars = base_vars();
        vars.remove("LLM_API_KEY");
        assert_eq!(load(&vars), Err(ConfigError::MissingVar("LLM_API_KEY")));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("NOTION_TOKEN", "   ");
        assert_eq!(load(&vars), Err(ConfigError::MissingVar("NOTION_TOKEN")));
    }

    #[test]
    fn invalid_poll_interval_is_rejected() {
        let mut vars = base_vars();
        vars.insert("FOODLOG_POLL_INTERVAL_SECS", "soon");
        let err = load(&vars).expect_err("non-numeric interval must fail");
        assert!(matches!(err, ConfigError::InvalidVar { name, .. }
            if name == "FOODLOG_POLL_INTERVAL_SECS"));
    }
}
