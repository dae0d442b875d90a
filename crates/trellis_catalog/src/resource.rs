//! Resources held in a catalog.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use trellis_core::{Location, ResourceRef, ScopeId, Value};

/// Parameters that every resource type accepts
pub const METAPARAMETERS: &[&str] = &[
    "require", "before", "notify", "subscribe", "tag", "alias", "audit", "noop", "schedule",
    "loglevel", "stage",
];

/// Whether `name` is a metaparameter
#[must_use]
pub fn is_metaparameter(name: &str) -> bool {
    METAPARAMETERS.contains(&name)
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Canonical type and title
    #[serde(flatten)]
    pub reference: ResourceRef,
    /// Parameter values in declaration order
    pub parameters: IndexMap<String, Value>,
    /// Tags
    pub tags: IndexSet<String>,
    /// Where the resource was declared
    pub location: Location,
    /// Scope that declared the resource
    #[serde(skip)]
    pub scope: ScopeId,
    /// Whether defaults have been materialised
    #[serde(skip)]
    pub finished: bool,
}

impl Resource {
    /// Create an unfinished resource with no parameters
    #[must_use]
    pub fn new(reference: ResourceRef, scope: ScopeId, location: Location) -> Self {
        Self {
            reference,
            parameters: IndexMap::new(),
            tags: IndexSet::new(),
            location,
            scope,
            finished: false,
        }
    }

    /// Builder-style parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Canonical type name
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.reference.type_name
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.reference.title
    }

    /// Parameter value, if set
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Set a parameter, returning the previous value
    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.parameters.insert(name.into(), value)
    }

    /// Add a tag (lowercased)
    pub fn tag(&mut self, tag: &str) {
        self.tags.insert(tag.to_lowercase());
    }

    /// Whether the resource carries a tag
    #[must_use]
    pub fn tagged(&self, tag: &str) -> bool {
        self.tags.contains(&tag.to_lowercase())
    }
}
