//! Client configuration file.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below.
//!
//! # Example
//!
//! ```toml
//! [queue]
//! key = "clipsync:mutations"
//! dir = ".clipsync"
//! coalesce_toggles = false
//!
//! [connectivity]
//! debounce_ms = 750
//!
//! [remote]
//! base_url = "https://api.example.com"
//! auth_token = "..."
//! timeout_ms = 10000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Environment variable consulted when `[remote] auth_token` is not set.
pub const AUTH_TOKEN_ENV: &str = "CLIPSYNC_AUTH_TOKEN";

/// Storage key the queue is persisted under unless configured otherwise.
pub const DEFAULT_QUEUE_KEY: &str = "clipsync:mutations";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub connectivity: ConnectivitySettings,
    #[serde(default)]
    pub remote: RemoteSettings,
}

/// `[queue]`: where pending mutations live and how they are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Namespaced key holding the JSON array of records.
    pub key: String,
    /// Directory used by the file-backed store.
    pub dir: PathBuf,
    /// Collapse a toggle with a still-pending opposite toggle instead of
    /// queueing both.
    pub coalesce_toggles: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            key: DEFAULT_QUEUE_KEY.to_string(),
            dir: PathBuf::from(".clipsync"),
            coalesce_toggles: false,
        }
    }
}

/// `[connectivity]`: signal debouncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    pub debounce_ms: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings { debounce_ms: 750 }
    }
}

/// `[remote]`: the REST API the queue replays against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: None,
            auth_token: None,
            timeout_ms: 10_000,
        }
    }
}

impl RemoteSettings {
    /// Configured token, falling back to `CLIPSYNC_AUTH_TOKEN`.
    pub fn resolved_auth_token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
    }
}

impl ClientConfig {
    pub fn parse(content: &str, origin: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Config {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Read and parse a configuration file.
pub fn read_config(path: &Path) -> Result<ClientConfig, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    ClientConfig::parse(&content, &path.display().to_string())
}
