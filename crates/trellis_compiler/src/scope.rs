//! Scope arena.
//!
//! Scopes live in one arena per compile and refer to each other by
//! [`ScopeId`]. A scope's parent is fixed at creation; variable lookup
//! walks parents innermost-first and never looks at sibling scopes or at
//! the scope that caused a class to be included.

use crate::error::{EvalError, EvalResult};
use indexmap::IndexMap;
use std::sync::Arc;
use trellis_core::{Location, ResourceRef, ScopeId, Value};
use trellis_parse::ClassDefinition;
use trellis_types::TypeCollection;

/// A single scope
#[derive(Debug, Clone)]
pub struct Scope {
    /// Enclosing scope (None for the top scope)
    pub parent: Option<ScopeId>,
    /// Namespace used to qualify class and type names
    pub namespace: String,
    /// Resource the scope belongs to (`Class[Main]` for the top scope)
    pub owner: ResourceRef,
    /// Variables set in this scope
    pub variables: IndexMap<String, Value>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, namespace: &str, owner: ResourceRef) -> Self {
        Self {
            parent,
            namespace: namespace.to_string(),
            owner,
            variables: IndexMap::new(),
        }
    }
}

/// Every scope created during one compile
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Create an arena holding the top scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, "", ResourceRef::class("main"))],
        }
    }

    /// Create a child scope
    pub fn child(&mut self, parent: ScopeId, namespace: &str, owner: ResourceRef) -> ScopeId {
        let id = ScopeId::from_raw(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent), namespace, owner));
        id
    }

    /// Scope record
    #[must_use]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Namespace of a scope
    #[must_use]
    pub fn namespace(&self, id: ScopeId) -> &str {
        &self.get(id).namespace
    }

    /// Owner of a scope
    #[must_use]
    pub fn owner(&self, id: ScopeId) -> &ResourceRef {
        &self.get(id).owner
    }

    /// Set a variable
    ///
    /// # Errors
    ///
    /// Returns error if the variable is already set in this scope
    pub fn set_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
        location: &Location,
    ) -> EvalResult<()> {
        let variables = &mut self.scopes[scope.index()].variables;
        if variables.contains_key(name) {
            return Err(EvalError::Reassignment {
                variable: name.to_string(),
                location: location.clone(),
            });
        }
        variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Variable set directly in a scope
    #[must_use]
    pub fn local_variable(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        self.get(scope).variables.get(name)
    }

    /// Resolve a variable innermost-first along the parent chain
    #[must_use]
    pub fn resolve_variable(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        self.ancestors(scope)
            .find_map(|id| self.local_variable(id, name))
    }

    /// A scope and its parents, innermost first
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |id| self.get(*id).parent)
    }

    /// Qualify a class name through a scope's namespace
    #[must_use]
    pub fn qualify_class<'c>(
        &self,
        scope: ScopeId,
        name: &str,
        collection: &'c TypeCollection,
    ) -> Option<&'c Arc<ClassDefinition>> {
        collection.find_class(name, self.namespace(scope))
    }

    /// Number of scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false; the top scope exists from creation
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Timestamp;
    use trellis_types::ManifestSource;

    fn loc() -> Location {
        Location::new("site.pp", 1, 1)
    }

    #[test]
    fn test_top_scope() {
        let arena = ScopeArena::new();
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.owner(ScopeId::TOP).to_string(), "Class[Main]");
        assert_eq!(arena.namespace(ScopeId::TOP), "");
    }

    #[test]
    fn test_resolve_walks_parents_only() {
        let mut arena = ScopeArena::new();
        arena
            .set_variable(ScopeId::TOP, "os", Value::from("debian"), &loc())
            .unwrap();
        let a = arena.child(ScopeId::TOP, "a", ResourceRef::class("a"));
        let b = arena.child(ScopeId::TOP, "b", ResourceRef::class("b"));
        arena.set_variable(a, "port", Value::Integer(80), &loc()).unwrap();

        assert_eq!(arena.resolve_variable(a, "os"), Some(&Value::from("debian")));
        assert_eq!(arena.resolve_variable(a, "port"), Some(&Value::Integer(80)));
        assert_eq!(arena.resolve_variable(b, "port"), None);
    }

    #[test]
    fn test_shadowing() {
        let mut arena = ScopeArena::new();
        arena.set_variable(ScopeId::TOP, "x", Value::from("outer"), &loc()).unwrap();
        let child = arena.child(ScopeId::TOP, "c", ResourceRef::class("c"));
        arena.set_variable(child, "x", Value::from("inner"), &loc()).unwrap();
        assert_eq!(arena.resolve_variable(child, "x"), Some(&Value::from("inner")));
        assert_eq!(arena.resolve_variable(ScopeId::TOP, "x"), Some(&Value::from("outer")));
    }

    #[test]
    fn test_reassignment_rejected() {
        let mut arena = ScopeArena::new();
        arena.set_variable(ScopeId::TOP, "x", Value::Integer(1), &loc()).unwrap();
        let err = arena
            .set_variable(ScopeId::TOP, "x", Value::Integer(2), &loc())
            .unwrap_err();
        assert!(matches!(err, EvalError::Reassignment { variable, .. } if variable == "x"));
    }

    #[test]
    fn test_ancestors() {
        let mut arena = ScopeArena::new();
        let a = arena.child(ScopeId::TOP, "a", ResourceRef::class("a"));
        let b = arena.child(a, "a::b", ResourceRef::class("a::b"));
        let chain: Vec<ScopeId> = arena.ancestors(b).collect();
        assert_eq!(chain, vec![b, a, ScopeId::TOP]);
    }

    #[test]
    fn test_qualify_class_favors_namespace() {
        let collection = TypeCollection::from_sources(vec![ManifestSource::new(
            "site.pp",
            "class experiment { class baz { } } class baz { }",
            Timestamp::from_secs(1),
        )])
        .unwrap();
        let mut arena = ScopeArena::new();
        let scope = arena.child(ScopeId::TOP, "experiment", ResourceRef::class("experiment"));

        let local = arena.qualify_class(scope, "Baz", &collection).unwrap();
        assert_eq!(local.name, "experiment::baz");
        let global = arena.qualify_class(ScopeId::TOP, "baz", &collection).unwrap();
        assert_eq!(global.name, "baz");
    }
}
