//! Runner configuration, loaded from TOML.
//!
//! ```toml
//! templates_dir = "templates"
//! output_dir = "plans"
//! scope = "allow"
//! deny_unknown_fields = true
//! parallel = true
//!
//! [schedule]
//! first_cycle = "PT0S"
//! last_cycle = "PT18H"
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::path::{Path, PathBuf};

use pullplan_core::{Resolution, ResolveOptions, ScopePolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or checking a runner config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daily window the schedule runs in, as offsets from midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub first_cycle: Resolution,
    pub last_cycle: Resolution,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            first_cycle: Resolution::parse("PT0S").expect("literal duration is valid"),
            last_cycle: Resolution::parse("PT18H").expect("literal duration is valid"),
        }
    }
}

/// Everything the runner needs besides the documents themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Directory of `<name>.json` template documents.
    pub templates_dir: PathBuf,
    /// Where exported plans go, one subdirectory per document.
    pub output_dir: PathBuf,
    pub scope: ScopePolicy,
    pub deny_unknown_fields: bool,
    /// Resolve documents and templates on the rayon pool.
    pub parallel: bool,
    pub schedule: ScheduleConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("plans"),
            scope: ScopePolicy::default(),
            deny_unknown_fields: true,
            parallel: true,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and check a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let first = self.schedule.first_cycle.approx_duration();
        let last = self.schedule.last_cycle.approx_duration();
        match (first, last) {
            (Some(first), Some(last)) if first <= last => Ok(()),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(format!(
                "schedule.first_cycle ({}) is after schedule.last_cycle ({})",
                self.schedule.first_cycle, self.schedule.last_cycle
            ))),
            _ => Err(ConfigError::Invalid(
                "schedule window is too large to represent".into(),
            )),
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            scope: self.scope,
            deny_unknown_fields: self.deny_unknown_fields,
        }
    }
}
