//! The compiled catalog.
//!
//! Resources are keyed by their `Type[title]` string and kept in
//! declaration order. Edges connect resources already in the catalog;
//! cycles are not checked here.

use crate::error::{CatalogError, CatalogResult};
use crate::resource::Resource;
use crate::version::CatalogVersion;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use trellis_core::ResourceRef;

/// A compiled catalog for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    /// Node the catalog was compiled for
    pub node: String,
    /// Environment the catalog was compiled in
    pub environment: String,
    /// Catalog version
    pub version: CatalogVersion,
    /// Resources keyed by `Type[title]`
    pub resources: IndexMap<String, Resource>,
    /// Relationship edges in insertion order, each kept once
    pub edges: IndexSet<Edge>,
}

impl Catalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new(node: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            environment: environment.into(),
            version: CatalogVersion::default(),
            resources: IndexMap::new(),
            edges: IndexSet::new(),
        }
    }

    /// Add a resource
    ///
    /// # Errors
    ///
    /// Returns error if a resource with the same type and title exists;
    /// the error carries both declaration locations
    pub fn add_resource(&mut self, resource: Resource) -> CatalogResult<()> {
        let key = resource.reference.to_string();
        if let Some(existing) = self.resources.get(&key) {
            return Err(CatalogError::DuplicateResource {
                reference: resource.reference,
                first: existing.location.clone(),
                second: resource.location,
            });
        }
        self.resources.insert(key, resource);
        Ok(())
    }

    /// Add an edge between two resources; repeated edges are kept once
    ///
    /// # Errors
    ///
    /// Returns error if either endpoint is not in the catalog
    pub fn add_edge(&mut self, from: ResourceRef, to: ResourceRef, kind: EdgeKind) -> CatalogResult<()> {
        for endpoint in [&from, &to] {
            if !self.contains(endpoint) {
                return Err(CatalogError::MissingEndpoint {
                    reference: endpoint.clone(),
                });
            }
        }
        self.edges.insert(Edge { from, to, kind });
        Ok(())
    }

    /// Look up a resource by its `Type[title]` string
    ///
    /// The type part is canonicalised, so `notify[x]` finds `Notify[x]`.
    #[must_use]
    pub fn resource(&self, reference: &str) -> Option<&Resource> {
        match reference.parse::<ResourceRef>() {
            Ok(parsed) => self.resource_by_ref(&parsed),
            Err(_) => self.resources.get(reference),
        }
    }

    /// Look up a resource by reference
    #[must_use]
    pub fn resource_by_ref(&self, reference: &ResourceRef) -> Option<&Resource> {
        self.resources.get(&reference.to_string())
    }

    /// Mutable lookup by reference
    pub fn resource_mut(&mut self, reference: &ResourceRef) -> Option<&mut Resource> {
        self.resources.get_mut(&reference.to_string())
    }

    /// Whether a resource is present
    #[must_use]
    pub fn contains(&self, reference: &ResourceRef) -> bool {
        self.resources.contains_key(&reference.to_string())
    }

    /// All resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Mutable iteration over all resources
    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.values_mut()
    }

    /// Catalog version
    #[must_use]
    pub fn version(&self) -> &CatalogVersion {
        &self.version
    }

    /// Set the catalog version
    pub fn set_version(&mut self, version: CatalogVersion) {
        self.version = version;
    }

    /// All edges
    #[must_use]
    pub fn edges(&self) -> &IndexSet<Edge> {
        &self.edges
    }

    /// Edges leaving a resource
    #[must_use]
    pub fn edges_from(&self, reference: &ResourceRef) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.from == reference).collect()
    }

    /// Edges entering a resource
    #[must_use]
    pub fn edges_to(&self, reference: &ResourceRef) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.to == reference).collect()
    }

    /// Whether an edge of the given kind exists
    #[must_use]
    pub fn has_edge(&self, from: &ResourceRef, to: &ResourceRef, kind: EdgeKind) -> bool {
        self.edges.contains(&Edge {
            from: from.clone(),
            to: to.clone(),
            kind,
        })
    }

    /// Number of resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the catalog has no resources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A directed edge between two resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// Source resource
    pub from: ResourceRef,
    /// Target resource
    pub to: ResourceRef,
    /// Edge kind
    pub kind: EdgeKind,
}

/// Kind of relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Containment: a class or define contains a resource
    Contains,
    /// Ordering: `from` is applied before `to`
    Before,
    /// Ordering plus refresh notification from `from` to `to`
    Notify,
}
