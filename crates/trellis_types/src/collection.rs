//! Type collection.
//!
//! The parsed form of every manifest unit in an environment, indexed by
//! fully-qualified definition name. A collection is immutable after load
//! apart from the forced-stale flag, so compiles share it through `Arc`.

use crate::error::{LoadError, SourceError};
use crate::source::{ManifestSource, SourceProvider};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use trellis_core::name::{candidate_names, is_qualified, NAMESPACE_SEPARATOR};
use trellis_core::{Location, Timestamp};
use trellis_parse::{Ast, ClassDefinition, DefineDefinition, NodeDefinition, NodeName};

/// A class or define found by lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// Class definition
    Class(Arc<ClassDefinition>),
    /// Define definition
    Define(Arc<DefineDefinition>),
}

impl Definition {
    /// Fully-qualified name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Class(class) => &class.name,
            Self::Define(define) => &define.name,
        }
    }

    fn location(&self) -> &Location {
        match self {
            Self::Class(class) => &class.location,
            Self::Define(define) => &define.location,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Class(_) => "class",
            Self::Define(_) => "define",
        }
    }
}

/// Parsed definitions of one environment
pub struct TypeCollection {
    manifests: Vec<Ast>,
    definitions: IndexMap<String, Definition>,
    nodes: Vec<Arc<NodeDefinition>>,
    markers: IndexMap<String, Timestamp>,
    provider: Option<Arc<dyn SourceProvider>>,
    forced_stale: AtomicBool,
    generation: u64,
}

impl TypeCollection {
    /// Load every unit a provider supplies
    ///
    /// The provider is kept so [`TypeCollection::stale`] can compare
    /// markers later.
    ///
    /// # Errors
    ///
    /// Returns error if a unit cannot be read or fails to build, or if a
    /// definition name is used twice
    pub fn load(provider: Arc<dyn SourceProvider>) -> Result<Self, LoadError> {
        let sources = provider.load()?;
        let mut collection = Self::from_sources(sources)?;
        collection.provider = Some(provider);
        Ok(collection)
    }

    /// Build from sources already in memory
    ///
    /// A collection built this way only goes stale through
    /// [`TypeCollection::mark_stale`].
    ///
    /// # Errors
    ///
    /// Returns error if a unit fails to build or a definition name is used
    /// twice
    pub fn from_sources(sources: Vec<ManifestSource>) -> Result<Self, LoadError> {
        let mut collection = Self {
            manifests: Vec::with_capacity(sources.len()),
            definitions: IndexMap::new(),
            nodes: Vec::new(),
            markers: IndexMap::new(),
            provider: None,
            forced_stale: AtomicBool::new(false),
            generation: 0,
        };

        for source in sources {
            let ast = trellis_parse::parse(&source.name, &source.text)?;
            for class in ast.classes() {
                collection.define(Definition::Class(Arc::clone(class)))?;
            }
            for define in ast.defines() {
                collection.define(Definition::Define(Arc::clone(define)))?;
            }
            collection.nodes.extend(ast.nodes().into_iter().cloned());
            collection.markers.insert(source.name, source.marker);
            collection.manifests.push(ast);
        }

        debug!(
            units = collection.manifests.len(),
            definitions = collection.definitions.len(),
            nodes = collection.nodes.len(),
            "Loaded type collection"
        );
        Ok(collection)
    }

    fn define(&mut self, definition: Definition) -> Result<(), LoadError> {
        if let Some(existing) = self.definitions.get(definition.name()) {
            return Err(LoadError::DuplicateDefinition {
                kind: definition.kind(),
                name: definition.name().to_string(),
                first: existing.location().clone(),
                second: definition.location().clone(),
            });
        }
        self.definitions
            .insert(definition.name().to_string(), definition);
        Ok(())
    }

    /// Set the load generation
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Load generation; each successful environment load gets a new one
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the collection no longer matches its sources
    ///
    /// True if it was forced stale, or if any unit's marker differs from
    /// the one recorded at load, or units were added or removed.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot list its units
    pub fn stale(&self) -> Result<bool, SourceError> {
        if self.forced_stale.load(Ordering::SeqCst) {
            return Ok(true);
        }
        match &self.provider {
            Some(provider) => Ok(provider.markers()? != self.markers),
            None => Ok(false),
        }
    }

    /// Force the collection stale
    pub fn mark_stale(&self) {
        self.forced_stale.store(true, Ordering::SeqCst);
    }

    /// Find a class or define by name from within `namespace`
    ///
    /// Qualified names are looked up exactly; a leading `::` anchors at the
    /// global namespace. Unqualified names try each enclosing namespace
    /// from innermost to outermost, then the global name.
    #[must_use]
    pub fn lookup(&self, name: &str, namespace: &str) -> Option<&Definition> {
        self.lookup_kind(name, namespace, Some)
    }

    /// [`TypeCollection::lookup`] restricted to classes; a define of the
    /// same name in an inner namespace does not hide an outer class
    #[must_use]
    pub fn find_class(&self, name: &str, namespace: &str) -> Option<&Arc<ClassDefinition>> {
        self.lookup_kind(name, namespace, |definition| match definition {
            Definition::Class(class) => Some(class),
            Definition::Define(_) => None,
        })
    }

    /// [`TypeCollection::lookup`] restricted to defines
    #[must_use]
    pub fn find_define(&self, name: &str, namespace: &str) -> Option<&Arc<DefineDefinition>> {
        self.lookup_kind(name, namespace, |definition| match definition {
            Definition::Define(define) => Some(define),
            Definition::Class(_) => None,
        })
    }

    /// First candidate name whose definition `pick` accepts
    fn lookup_kind<'s, T>(
        &'s self,
        name: &str,
        namespace: &str,
        pick: impl Fn(&'s Definition) -> Option<&'s T>,
    ) -> Option<&'s T> {
        let name = name.to_lowercase();
        if let Some(absolute) = name.strip_prefix(NAMESPACE_SEPARATOR) {
            return self.definitions.get(absolute).and_then(pick);
        }
        if is_qualified(&name) {
            return self.definitions.get(&name).and_then(pick);
        }
        let namespace = namespace.to_lowercase();
        candidate_names(&namespace, &name)
            .iter()
            .find_map(|candidate| self.definitions.get(candidate).and_then(&pick))
    }

    /// Class by exact fully-qualified name
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&Arc<ClassDefinition>> {
        match self.definitions.get(&name.to_lowercase())? {
            Definition::Class(class) => Some(class),
            Definition::Define(_) => None,
        }
    }

    /// Node definition for a node name
    ///
    /// Tries the exact name, then the name with trailing domain labels
    /// removed one at a time (`web01.example.com`, `web01.example`,
    /// `web01`), then `default`.
    #[must_use]
    pub fn node_definition(&self, node_name: &str) -> Option<&Arc<NodeDefinition>> {
        let node_name = node_name.to_lowercase();
        let mut candidate = node_name.as_str();
        loop {
            if let Some(node) = self.find_node(|n| matches!(n, NodeName::Name(name) if name == candidate)) {
                return Some(node);
            }
            match candidate.rfind('.') {
                Some(idx) => candidate = &candidate[..idx],
                None => break,
            }
        }
        self.find_node(|n| *n == NodeName::Default)
    }

    fn find_node(&self, matches: impl Fn(&NodeName) -> bool) -> Option<&Arc<NodeDefinition>> {
        self.nodes
            .iter()
            .find(|node| node.names.iter().any(&matches))
    }

    /// Whether any node definitions exist
    #[must_use]
    pub fn has_node_definitions(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Parsed units in load order
    #[must_use]
    pub fn manifests(&self) -> &[Ast] {
        &self.manifests
    }

    /// All definitions by fully-qualified name
    #[must_use]
    pub fn definitions(&self) -> &IndexMap<String, Definition> {
        &self.definitions
    }

    /// Markers recorded at load
    #[must_use]
    pub fn markers(&self) -> &IndexMap<String, Timestamp> {
        &self.markers
    }
}

impl std::fmt::Debug for TypeCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCollection")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("nodes", &self.nodes.len())
            .field("generation", &self.generation)
            .field("forced_stale", &self.forced_stale.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
