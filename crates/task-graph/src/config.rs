//! Compile configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs controlling one graph compilation.
///
/// ```toml
/// output-group-size = 4
/// iterative = true
/// intermediate = false
/// warn-same-unit-modify = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct CompileConfig {
    /// Number of consecutive processes sharing one output-once item.
    pub output_group_size: u32,
    /// The graph is executed repeatedly; old-store reads of values the
    /// graph itself produces get per-iteration producers.
    pub iterative: bool,
    /// The graph runs finer levels several times per coarse step.
    pub intermediate: bool,
    /// Log a warning when a unit modifies a value its own per-region
    /// instances read.
    pub warn_same_unit_modify: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            output_group_size: 1,
            iterative: false,
            intermediate: false,
            warn_same_unit_modify: true,
        }
    }
}

impl CompileConfig {
    /// Parse from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed TOML, unknown keys, or a zero
    /// output group size.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the
    /// errors of [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `output_group_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.output_group_size == 0 {
            return Err(Error::config("output-group-size must be at least 1"));
        }
        Ok(())
    }
}
