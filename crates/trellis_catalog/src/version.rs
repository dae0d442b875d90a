//! Catalog versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version stamped on a catalog
///
/// Either the compile clock's Unix seconds or the trimmed output of a
/// configured version command (typically a VCS revision).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogVersion {
    /// Unix seconds at compile time
    Timestamp(u64),
    /// Output of the version command
    Command(String),
}

impl CatalogVersion {
    /// Timestamp seconds, if this is a timestamp version
    #[must_use]
    pub fn as_timestamp(&self) -> Option<u64> {
        match self {
            Self::Timestamp(secs) => Some(*secs),
            Self::Command(_) => None,
        }
    }
}

impl Default for CatalogVersion {
    fn default() -> Self {
        Self::Timestamp(0)
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(secs) => write!(f, "{secs}"),
            Self::Command(text) => f.write_str(text),
        }
    }
}
