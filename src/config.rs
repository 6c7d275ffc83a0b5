//! Configuration loading and schema definitions for report imports.
//!
//! This module provides types and functions for loading the importer
//! endpoint, credentials and import tuning from TOML files or strings.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result};

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
///
/// # Example
///
/// ```no_run
/// use delorean::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("delorean.toml"))?;
/// println!("Importing to {}", config.importer.url);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads configuration from a TOML string.
///
/// # Example
///
/// ```
/// use delorean::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [importer]
///     url = "https://polarion.example.com/polarion/import"
///     username = "bot"
///     password = "secret"
///
///     [import]
///     workers = 2
/// "#)?;
///
/// assert_eq!(config.import.workers, 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}
