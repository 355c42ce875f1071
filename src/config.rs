//! Layered configuration for nzbguard.
//!
//! Settings come from compiled-in defaults, then an optional TOML file, then
//! command-line flags. Credentials are only ever read from the environment
//! (`NZBGET_USER` / `NZBGET_PASS`) so they never end up in a config file or
//! the process argument list.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GuardError, Result};

/// Fixed wait between polling cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub const USER_ENV: &str = "NZBGET_USER";
pub const PASS_ENV: &str = "NZBGET_PASS";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the guard process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub nzbget: NzbGetConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GuardConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            GuardError::Config(format!("failed to parse config file {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Load from `path` when one is given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides on top of whatever was loaded.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(v) = overrides.pause_threshold {
            self.thresholds.pause_gb = v;
        }
        if let Some(v) = overrides.unpause_threshold {
            self.thresholds.unpause_gb = v;
        }
        if overrides.ssl {
            self.nzbget.ssl = true;
        }
        if let Some(v) = &overrides.host {
            self.nzbget.host = v.clone();
        }
        if let Some(v) = &overrides.port {
            self.nzbget.port = v.clone();
        }
        if let Some(v) = &overrides.dir {
            self.monitor.dir = v.clone();
        }
        if overrides.dashboard {
            self.monitor.dashboard = true;
        }
        if let Some(v) = overrides.log_format {
            self.logging.format = v;
        }
    }

    /// Warn about settings that are accepted but make little sense.
    ///
    /// An inverted threshold pair is not rejected: the controller still
    /// behaves deterministically, it just loses its hysteresis band.
    pub fn check(&self) {
        if self.thresholds.unpause_gb <= self.thresholds.pause_gb {
            warn!(
                pause_gb = self.thresholds.pause_gb,
                unpause_gb = self.thresholds.unpause_gb,
                "unpause threshold should be greater than pause threshold"
            );
        }
    }
}

/// Values given on the command line. `None` / `false` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pause_threshold: Option<u64>,
    pub unpause_threshold: Option<u64>,
    pub ssl: bool,
    pub host: Option<String>,
    pub port: Option<String>,
    pub dir: Option<PathBuf>,
    pub dashboard: bool,
    pub log_format: Option<LogFormat>,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Hysteresis bounds, in whole gigabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Pause once free space drops below this.
    pub pause_gb: u64,
    /// Resume once free space rises above this.
    pub unpause_gb: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pause_gb: 10,
            unpause_gb: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// NZBGet endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NzbGetConfig {
    pub host: String,
    /// Kept as a string so it is substituted into the URL verbatim.
    pub port: String,
    /// Use `https` instead of `http`.
    pub ssl: bool,
}

impl Default for NzbGetConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "6789".to_string(),
            ssl: false,
        }
    }
}

impl NzbGetConfig {
    pub fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory whose filesystem is checked.
    pub dir: PathBuf,
    /// Render the terminal gauge instead of plain status lines.
    pub dashboard: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/"),
            dashboard: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// NZBGet control credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Read `NZBGET_USER` and `NZBGET_PASS` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_values(std::env::var(USER_ENV).ok(), std::env::var(PASS_ENV).ok())
    }

    /// Build credentials from raw values; absent or empty values are a config error.
    pub fn from_values(user: Option<String>, password: Option<String>) -> Result<Self> {
        let user = user
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GuardError::Config(format!("missing env {USER_ENV}")))?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GuardError::Config(format!("missing env {PASS_ENV}")))?;
        Ok(Self { user, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
