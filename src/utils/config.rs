use crate::comment::service::{ApprovalScope, CommentSettings};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub app_name: String,
    pub max_pool_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    /// Only present when `store` is `StoreBackend::Mongo`
    pub mongo: Option<MongoConfig>,
    pub comments: CommentSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "localhost".to_string());
        let port = parse_or("PORT", &lookup, 8000)?;
        let store = parse_or("COMMENT_STORE", &lookup, StoreBackend::Mongo)?;

        let mongo = match store {
            StoreBackend::Memory => None,
            StoreBackend::Mongo => Some(MongoConfig {
                uri: lookup("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
                database: lookup("MONGODB_DATABASE")
                    .ok_or(ConfigError::Missing("MONGODB_DATABASE"))?,
                app_name: lookup("MONGODB_APP_NAME")
                    .unwrap_or_else(|| "threaded-comments".to_string()),
                max_pool_size: parse_opt("MONGODB_MAX_POOL_SIZE", &lookup)?,
            }),
        };

        let approval_scope = parse_or("COMMENT_APPROVAL_SCOPE", &lookup, ApprovalScope::Roots)?;
        let timeout_ms: u64 = parse_or("COMMENT_WRITE_TIMEOUT_MS", &lookup, 5000)?;

        Ok(AppConfig {
            host,
            port,
            store,
            mongo,
            comments: CommentSettings {
                approval_scope,
                write_timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

fn parse_opt<T, F>(key: &'static str, lookup: &F) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(key, lookup)?.unwrap_or(default))
}
