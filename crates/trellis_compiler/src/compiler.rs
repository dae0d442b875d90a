//! The catalog compiler.
//!
//! Compiles are synchronous and independent: each one owns its scope
//! arena and catalog while sharing the environment's type collection.
//! Finished catalogs are cached per (node, environment) and reused while
//! the collection generation is unchanged and the node's facts are the
//! same, which also keeps the catalog version stable between reloads.
//! A recompile's timestamp version is always newer than the one it
//! replaces, even within the same clock second.

use crate::config::CompilerConfig;
use crate::error::{CompileError, EvalError};
use crate::eval::Evaluation;
use crate::version::{advance_version, catalog_version};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use trellis_catalog::{Catalog, CatalogVersion};
use trellis_core::{Clock, Node, SystemClock};
use trellis_types::{Environment, Environments, SharedTypeRegistry, TypeRegistry};

/// Cached catalog for one node in one environment
#[derive(Debug, Clone)]
struct CacheEntry {
    generation: u64,
    node: Node,
    catalog: Arc<Catalog>,
}

/// Compiles nodes into catalogs
pub struct Compiler {
    environments: Environments,
    registry: Arc<SharedTypeRegistry>,
    clock: Arc<dyn Clock>,
    config: CompilerConfig,
    cache: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl Compiler {
    /// Create a compiler with the core resource types and the system clock
    #[must_use]
    pub fn new(environments: Environments, config: CompilerConfig) -> Self {
        Self {
            environments,
            registry: Arc::new(SharedTypeRegistry::new(TypeRegistry::with_builtins())),
            clock: Arc::new(SystemClock),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Use a different clock for version stamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a shared resource-type registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SharedTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Resource-type registry; types registered here are visible to the
    /// next compile
    #[must_use]
    pub fn registry(&self) -> &Arc<SharedTypeRegistry> {
        &self.registry
    }

    /// Known environments
    #[must_use]
    pub fn environments(&self) -> &Environments {
        &self.environments
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a node
    ///
    /// The environment is `environment` if given, else the node's own
    /// selector, else the configured default.
    ///
    /// # Errors
    ///
    /// Returns error if the environment is unknown, its manifests fail to
    /// load, evaluation fails, or the version cannot be determined. No
    /// partial catalog is returned or cached.
    pub fn compile(&self, node: &Node, environment: Option<&str>) -> Result<Arc<Catalog>, CompileError> {
        let fail = |cause: EvalError| CompileError::new(&node.name, cause);

        let name = environment
            .or(node.environment.as_deref())
            .unwrap_or(self.config.default_environment.as_str());
        let environment = self.environment(name).map_err(fail)?;
        let collection = environment
            .collection()
            .map_err(|err| fail(err.into()))?;
        let key = (node.name.clone(), environment.name().to_string());

        if let Some(catalog) = self.cached(&key, collection.generation(), node) {
            debug!(node = %node.name, environment = %key.1, "Reusing cached catalog");
            return Ok(catalog);
        }

        let registry = self.registry.snapshot();
        let mut catalog = Evaluation::new(node, environment.name(), &collection, &registry, &self.config)
            .run()
            .map_err(fail)?;
        let version = catalog_version(&self.config, self.clock.as_ref()).map_err(fail)?;
        catalog.set_version(advance_version(version, self.previous_version(&key).as_ref()));

        info!(
            node = %node.name,
            environment = %key.1,
            version = %catalog.version(),
            resources = catalog.len(),
            "Compiled catalog"
        );

        let catalog = Arc::new(catalog);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(
            key,
            CacheEntry {
                generation: collection.generation(),
                node: node.clone(),
                catalog: Arc::clone(&catalog),
            },
        );
        Ok(catalog)
    }

    fn environment(&self, name: &str) -> Result<Arc<Environment>, EvalError> {
        self.environments
            .get(Some(name))
            .ok_or_else(|| EvalError::UnknownEnvironment {
                name: name.to_string(),
            })
    }

    fn cached(&self, key: &(String, String), generation: u64, node: &Node) -> Option<Arc<Catalog>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(key)
            .filter(|entry| entry.generation == generation && entry.node == *node)
            .map(|entry| Arc::clone(&entry.catalog))
    }

    /// Version of the last catalog compiled for this key, whatever its generation
    fn previous_version(&self, key: &(String, String)) -> Option<CatalogVersion> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).map(|entry| entry.catalog.version().clone())
    }

    /// Drop every cached catalog
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("environments", &self.environments)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
