//! Environments.
//!
//! An environment owns a source provider and the type collection last
//! loaded from it. The collection is loaded on first use and reloaded
//! when it goes stale. Reloads take the write lock and re-check
//! staleness, so concurrent callers trigger at most one reload. A failed
//! reload keeps the previous collection in place.

use crate::collection::TypeCollection;
use crate::error::LoadError;
use crate::source::SourceProvider;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// A named set of manifests
pub struct Environment {
    name: String,
    provider: Arc<dyn SourceProvider>,
    current: RwLock<Option<Arc<TypeCollection>>>,
    generations: AtomicU64,
}

impl Environment {
    /// Create an environment; nothing is loaded until first use
    #[must_use]
    pub fn new(name: impl Into<String>, provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
            current: RwLock::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Environment name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current type collection, loading or reloading as needed
    ///
    /// # Errors
    ///
    /// Returns error if a load is needed and fails; the previously loaded
    /// collection, if any, stays current
    pub fn collection(&self) -> Result<Arc<TypeCollection>, LoadError> {
        {
            let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(collection) = current.as_ref() {
                if !collection.stale()? {
                    return Ok(Arc::clone(collection));
                }
            }
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(collection) = current.as_ref() {
            if !collection.stale()? {
                debug!(environment = %self.name, "Collection already reloaded");
                return Ok(Arc::clone(collection));
            }
        }

        match TypeCollection::load(Arc::clone(&self.provider)) {
            Ok(collection) => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
                let collection = Arc::new(collection.with_generation(generation));
                info!(environment = %self.name, generation, "Loaded manifests");
                *current = Some(Arc::clone(&collection));
                Ok(collection)
            }
            Err(err) => {
                warn!(environment = %self.name, error = %err, "Manifest load failed");
                Err(err)
            }
        }
    }

    /// Collection currently held, without loading
    #[must_use]
    pub fn current(&self) -> Option<Arc<TypeCollection>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.clone()
    }

    /// Force the current collection stale so the next use reloads
    pub fn mark_stale(&self) {
        if let Some(collection) = self.current() {
            collection.mark_stale();
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("generations", &self.generations.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Environments by name, with a default
#[derive(Debug)]
pub struct Environments {
    default: String,
    environments: IndexMap<String, Arc<Environment>>,
}

impl Environments {
    /// Create an empty set with the given default name
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            environments: IndexMap::new(),
        }
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, environment: Environment) -> Self {
        self.insert(environment);
        self
    }

    /// Add or replace an environment
    pub fn insert(&mut self, environment: Environment) {
        self.environments
            .insert(environment.name().to_string(), Arc::new(environment));
    }

    /// Look up an environment; `None` selects the default
    #[must_use]
    pub fn get(&self, name: Option<&str>) -> Option<Arc<Environment>> {
        self.environments
            .get(name.unwrap_or(&self.default))
            .cloned()
    }

    /// Default environment name
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Environment names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }
}
