//! Compiler configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compiler configuration
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Shell command whose trimmed output becomes the catalog version;
    /// unset or blank stamps the compile time instead
    pub version_command: Option<String>,
    /// Environment used when neither the caller nor the node picks one
    pub default_environment: String,
    /// Whether reading an unset variable is an error (otherwise `undef`)
    pub strict_variables: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            version_command: None,
            default_environment: "production".to_string(),
            strict_variables: true,
        }
    }
}

impl CompilerConfig {
    /// Parse from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid config
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Set the version command
    #[must_use]
    pub fn with_version_command(mut self, command: impl Into<String>) -> Self {
        self.version_command = Some(command.into());
        self
    }

    /// Set the default environment
    #[must_use]
    pub fn with_default_environment(mut self, environment: impl Into<String>) -> Self {
        self.default_environment = environment.into();
        self
    }

    /// Set variable strictness
    #[must_use]
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// The version command, if one is configured and not blank
    #[must_use]
    pub fn version_command(&self) -> Option<&str> {
        self.version_command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
    }
}

/// Config loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON or field types
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
