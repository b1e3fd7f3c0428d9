//! Runtime settings, loaded from TOML. Every section and field has a default, so an
//! empty file (or no file) is a valid configuration.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {0} not set")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub uploads: UploadSettings,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Redis URL, or `${VAR}` to read it from the environment.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Attempts per unit of work before it fails with `TransactionAborted`.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            prefix: default_prefix(),
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

impl StoreSettings {
    /// The Redis URL with `${VAR}` expanded.
    pub fn redis_url(&self) -> Result<String, ConfigError> {
        expand_env(&self.redis_url)
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_prefix() -> String {
    "murmur".to_string()
}

fn default_max_commit_attempts() -> u32 {
    DEFAULT_MAX_COMMIT_ATTEMPTS
}

/// Fan-out cache caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Recent posts kept on the user document.
    #[serde(default = "default_page_length")]
    pub posts_cache: usize,
    /// First page of comments kept on the post document.
    #[serde(default = "default_page_length")]
    pub comments_cache: usize,
    /// Followers and following ids kept on the user details document.
    #[serde(default = "default_large_cache")]
    pub follow_cache: usize,
    #[serde(default = "default_large_cache")]
    pub saved_posts_cache: usize,
    #[serde(default = "default_similar_posts")]
    pub similar_posts: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            posts_cache: default_page_length(),
            comments_cache: default_page_length(),
            follow_cache: default_large_cache(),
            saved_posts_cache: default_large_cache(),
            similar_posts: default_similar_posts(),
        }
    }
}

fn default_page_length() -> usize {
    12
}

fn default_large_cache() -> usize {
    1200
}

fn default_similar_posts() -> usize {
    9
}

/// Per-operation deadlines in milliseconds. They cover every retry of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_operation_ms")]
    pub write_ms: u64,
    #[serde(default = "default_operation_ms")]
    pub read_ms: u64,
    #[serde(default = "default_feed_ms")]
    pub feed_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write_ms: default_operation_ms(),
            read_ms: default_operation_ms(),
            feed_ms: default_feed_ms(),
        }
    }
}

impl Timeouts {
    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn feed(&self) -> Duration {
        Duration::from_millis(self.feed_ms)
    }
}

fn default_operation_ms() -> u64 {
    5_000
}

fn default_feed_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Base URL of the bucket post images are uploaded to.
    #[serde(default = "default_upload_base_url")]
    pub base_url: String,
    #[serde(default = "default_upload_expiry_secs")]
    pub expires_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            base_url: default_upload_base_url(),
            expires_secs: default_upload_expiry_secs(),
        }
    }
}

fn default_upload_base_url() -> String {
    "http://localhost:9000/posts".to_string()
}

fn default_upload_expiry_secs() -> u64 {
    600
}

fn expand_env(value: &str) -> Result<String, ConfigError> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).map_err(|_| ConfigError::MissingEnv(var_name.to_string())),
        None => Ok(value.to_string()),
    }
}
