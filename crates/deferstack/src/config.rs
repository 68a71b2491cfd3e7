//! Scheduler configuration.
//!
//! Configuration is fixed when a [`DeferStack`](crate::DeferStack) is
//! constructed; nothing here is mutable on a live scheduler.
//!
//! ```toml
//! capacity = 256
//! default_start_level = 1
//! contract_checks = "warn"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum synchronous nesting depth.
pub const DEFAULT_CAPACITY: usize = 256;

/// Default depth assigned when an outermost window opens.
pub const DEFAULT_START_LEVEL: usize = 1;

/// How caller-contract violations (a start level of zero) are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractChecks {
    /// Coerce the offending argument to its default and say nothing.
    Off,
    /// Coerce the offending argument and emit a `warn!` diagnostic.
    Warn,
    /// Reject the call with [`Error::InvalidStartLevel`].
    Strict,
}

impl Default for ContractChecks {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Warn
        } else {
            Self::Off
        }
    }
}

impl fmt::Display for ContractChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Warn => write!(f, "warn"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for ContractChecks {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            _ => Err(format!(
                "unknown contract check mode: {s}. Expected one of: off, warn, strict"
            )),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

/// Construction-time settings for a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferConfig {
    /// Maximum synchronous nesting depth before callbacks are deferred.
    pub capacity: usize,
    /// Start level used by `schedule` when the caller does not pass one.
    pub default_start_level: usize,
    /// Handling of caller-contract violations.
    pub contract_checks: ContractChecks,
}

impl Default for DeferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_start_level: DEFAULT_START_LEVEL,
            contract_checks: ContractChecks::default(),
        }
    }
}

impl DeferConfig {
    /// Create a configuration with the given capacity and defaults otherwise.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn contract_checks(mut self, checks: ContractChecks) -> Self {
        self.contract_checks = checks;
        self
    }

    #[must_use]
    pub fn default_start_level(mut self, level: usize) -> Self {
        self.default_start_level = level;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Check the invariants a scheduler relies on.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity(self.capacity));
        }
        if self.default_start_level == 0 {
            return Err(Error::InvalidStartLevel(self.default_start_level));
        }
        Ok(())
    }
}
