//! Configuration for an engine session.
//!
//! Use defaults, load a TOML file, or override via environment variables:
//!
//! - `ENGINE_VISIBLE`           (default: "true")
//! - `ENGINE_ATTACH_IF_RUNNING` (default: "true")
//! - `ENGINE_SILENT`            (default: "true")
//! - `ENGINE_THREAD_NAME`       (default: "engine-affinity")
//! - `ENGINE_LOG`               (default: "info")

use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use engine_dispatch::DEFAULT_THREAD_NAME;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Show the engine's main window.
    pub visible: bool,

    /// Prefer attaching to a running engine over launching a new one.
    pub attach_if_running: bool,

    /// Suppress engine dialogs in the `*_with_defaults` document operations.
    pub silent: bool,

    /// Name of the affinity thread (shows up in logs and debuggers).
    pub thread_name: String,

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            visible: true,
            attach_if_running: true,
            silent: true,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Construct a `SessionConfig` from environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Result<Self> {
        SessionConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = SessionConfig::default();

        Ok(SessionConfig {
            visible: read_or_default(&lookup, "ENGINE_VISIBLE", defaults.visible)?,
            attach_if_running: read_or_default(
                &lookup,
                "ENGINE_ATTACH_IF_RUNNING",
                defaults.attach_if_running,
            )?,
            silent: read_or_default(&lookup, "ENGINE_SILENT", defaults.silent)?,
            thread_name: lookup("ENGINE_THREAD_NAME").unwrap_or(defaults.thread_name),
            log_filter: lookup("ENGINE_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid session config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session config {}", path.display()))?;
        SessionConfig::from_toml_str(&text)
            .with_context(|| format!("parsing session config {}", path.display()))
    }
}

fn read_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}={:?}: {}", key, val, e)),
        None => Ok(default),
    }
}
