//! Errors from loading and registering types.

use std::path::PathBuf;
use trellis_core::Location;
use trellis_parse::ParseError;

/// Error reading manifest sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Filesystem error
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Manifest directory does not exist
    #[error("manifest directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
}

/// Error building a type collection
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Sources could not be read
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A source failed to tokenize, parse or pass the legality checks
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Two definitions share a fully-qualified name
    #[error("{second}: {kind} '{name}' is already defined at {first}")]
    DuplicateDefinition {
        /// `class` or `define`
        kind: &'static str,
        /// Fully-qualified name
        name: String,
        /// First definition
        first: Location,
        /// Rejected definition
        second: Location,
    },
}

impl LoadError {
    /// Whether this is a structural legality violation
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Parse(err) if err.is_structural())
    }
}

/// Error from the resource-type registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A type with this name is already registered
    #[error("resource type already registered: {name}")]
    AlreadyRegistered {
        /// Type name
        name: String,
    },

    /// No type with this name
    #[error("resource type not found: {name}")]
    NotFound {
        /// Type name
        name: String,
    },
}
