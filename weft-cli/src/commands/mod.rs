//! CLI command implementations.

pub mod resolve;
pub mod validate;

pub use resolve::resolve;
pub use validate::validate;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use weft_core::{PointcutOptions, PointcutSpec, WeftConfig};

/// A pointcut file: one option map or several
#[derive(Deserialize)]
#[serde(untagged)]
enum PointcutFile {
    One(PointcutOptions),
    Many(Vec<PointcutOptions>),
}

/// Load the configuration, falling back to defaults when the file is absent
pub(crate) fn load_config(path: &Path) -> Result<WeftConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file; using defaults");
        return Ok(WeftConfig::default());
    }
    WeftConfig::from_file(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Read and validate every specification in a pointcut file
pub(crate) fn load_specifications(path: &Path) -> Result<Vec<PointcutSpec>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pointcut file {}", path.display()))?;
    let file: PointcutFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse pointcut file {}", path.display()))?;
    let options = match file {
        PointcutFile::One(options) => vec![options],
        PointcutFile::Many(options) => options,
    };
    options
        .iter()
        .enumerate()
        .map(|(index, options)| {
            PointcutSpec::from_options(options)
                .with_context(|| format!("Pointcut {} in {} is invalid", index + 1, path.display()))
        })
        .collect()
}
