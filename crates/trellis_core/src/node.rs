//! Compilation target descriptor.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The node a catalog is compiled for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name (certificate name / hostname)
    pub name: String,
    /// Facts reported by the node, bound as top-scope variables
    #[serde(default)]
    pub facts: IndexMap<String, String>,
    /// Explicit environment selector
    #[serde(default)]
    pub environment: Option<String>,
}

impl Node {
    /// Create a node with no facts
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facts: IndexMap::new(),
            environment: None,
        }
    }

    /// Add a fact
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    /// Select an environment
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}
