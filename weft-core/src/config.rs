//! Configuration parsing and management.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid ignored method pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Method names skipped by default when matching, e.g. `__send__`
static DEFAULT_IGNORED_METHODS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new("^__").expect("static pattern compiles")]);

/// Main configuration struct matching the `weft.yml` schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftConfig {
    /// Log a warning when an aspect matches no join points
    #[serde(default = "default_true")]
    pub warn_on_unmatched: bool,

    /// Method-name patterns treated as system methods
    #[serde(default = "default_ignored_method_patterns")]
    pub ignored_method_patterns: Vec<String>,

    /// Install design-by-contract checks; when false they are skipped
    #[serde(default = "default_true")]
    pub contracts_enabled: bool,

    // Internal: path to config file, for diagnostics
    #[serde(skip)]
    pub(crate) config_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_ignored_method_patterns() -> Vec<String> {
    vec![String::from("^__")]
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            warn_on_unmatched: true,
            ignored_method_patterns: default_ignored_method_patterns(),
            contracts_enabled: true,
            config_path: None,
        }
    }
}

impl WeftConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from YAML text and validate its patterns
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: WeftConfig = serde_yaml::from_str(contents)?;
        config.ignored_methods()?;
        Ok(config)
    }

    /// The file this configuration was loaded from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Compiled system-method patterns
    pub fn ignored_methods(&self) -> Result<Vec<Regex>, ConfigError> {
        if self.ignored_method_patterns == default_ignored_method_patterns() {
            return Ok(DEFAULT_IGNORED_METHODS.clone());
        }
        self.ignored_method_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }
}
