//! Configuration schema definitions.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── ImporterConfig   - Importer endpoint and credentials
//! └── ImportConfig     - Worker count and job polling
//! ```

use serde::{Deserialize, Serialize};

/// Production Polarion xUnit importer.
pub const POLARION_IMPORT_URL: &str = "https://polarion.engineering.redhat.com/polarion/import";

/// Staging Polarion xUnit importer.
pub const POLARION_IMPORT_STAGING_URL: &str =
    "https://polarion.stage.engineering.redhat.com/polarion/import";

/// Root configuration structure.
///
/// # TOML Structure
///
/// ```toml
/// [importer]
/// url = "https://polarion.engineering.redhat.com/polarion/import"
/// username = "bot"
/// password = "secret"
///
/// [import]
/// workers = 5
/// poll_interval_secs = 2
/// poll_timeout_secs = 600
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Importer endpoint and credentials.
    pub importer: ImporterConfig,

    /// Import tuning (optional, has defaults).
    #[serde(default)]
    pub import: ImportConfig,
}

/// Importer endpoint and Basic credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImporterConfig {
    /// Importer base URL. `/xunit` and `/xunit-queue` are appended to it.
    ///
    /// Default: the production importer
    #[serde(default = "default_importer_url")]
    pub url: String,

    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl ImporterConfig {
    /// Configuration for the production importer.
    pub fn production(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: POLARION_IMPORT_URL.to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Configuration for the staging importer.
    pub fn staging(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: POLARION_IMPORT_STAGING_URL.to_string(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Import tuning.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `workers` | 5 |
/// | `poll_interval_secs` | 2 |
/// | `poll_timeout_secs` | 600 (10 minutes) |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Maximum number of reports imported concurrently.
    ///
    /// Default: 5
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between job status polls.
    ///
    /// Default: 2
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for a job to finish before giving up.
    ///
    /// Default: 600
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_importer_url() -> String {
    POLARION_IMPORT_URL.to_string()
}

fn default_workers() -> usize {
    5
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_timeout() -> u64 {
    600
}
