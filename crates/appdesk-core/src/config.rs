//! Workspace configuration
//!
//! Loaded from TOML. Every section and key is optional:
//!
//! ```toml
//! [api]
//! base_url = "https://ops.example.com/api"
//! timeout_secs = 10
//!
//! [review]
//! note_exempt_result = "ok"
//! default_results = ["pending", "ok", "bad", "not_perfect"]
//!
//! [refresh]
//! interval_secs = 60
//! ```

use crate::error::ConfigError;
use appdesk_row::CheckResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// REST collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL the `/applications` paths are appended to
    pub base_url: String,
    /// Bearer token
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// Review workflow settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Result that may be recorded without a note
    pub note_exempt_result: String,
    /// Results offered when the server supplies none
    pub default_results: Vec<String>,
}

impl ReviewConfig {
    /// Whether `result` needs a note to complete a review
    #[must_use]
    pub fn requires_note(&self, result: &CheckResult) -> bool {
        result.as_str() != self.note_exempt_result
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            note_exempt_result: "ok".to_string(),
            default_results: ["pending", "ok", "bad", "not_perfect"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Periodic refresh settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between automatic refreshes; unset disables them
    pub interval_secs: Option<u64>,
}

impl RefreshConfig {
    /// Refresh interval, if enabled and non-zero
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Workspace configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// REST collaborator
    pub api: ApiConfig,
    /// Review workflow
    pub review: ReviewConfig,
    /// Periodic refresh
    pub refresh: RefreshConfig,
}

impl WorkspaceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api.token = Some(token.into());
        self
    }

    /// With the note-exempt result
    #[inline]
    #[must_use]
    pub fn with_note_exempt_result(mut self, result: impl Into<String>) -> Self {
        self.review.note_exempt_result = result.into();
        self
    }

    /// With periodic refresh
    #[inline]
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh.interval_secs = Some(interval.as_secs());
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for invalid TOML or mistyped keys
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if it is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!("loaded workspace config from {}", path.display());
        Ok(config)
    }
}
