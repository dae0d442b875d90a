//! Resource-type registry.
//!
//! Resource types that are not defines must be registered here before a
//! manifest can declare them. Registration is append-only; downstream
//! generators add types through [`SharedTypeRegistry::register`] and the
//! compiler only ever reads.

use crate::error::RegistryError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Description of a resource type
///
/// Descriptors deserialize from JSON so generators can ship them as data;
/// everything but `name` is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeDescriptor {
    /// Lowercase type name
    pub name: String,
    /// Parameter that defaults to the resource title
    #[serde(default = "default_namevar")]
    pub namevar: String,
    /// Accepted attributes; empty accepts any attribute
    #[serde(default)]
    pub attributes: IndexSet<String>,
    /// Whether the type takes `ensure`
    #[serde(default)]
    pub ensurable: bool,
    /// Provider details, opaque to the compiler
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_namevar() -> String {
    "name".to_string()
}

impl ResourceTypeDescriptor {
    /// Create a descriptor accepting any attribute, with namevar `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            namevar: default_namevar(),
            attributes: IndexSet::new(),
            ensurable: false,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the namevar
    #[must_use]
    pub fn with_namevar(mut self, namevar: &str) -> Self {
        self.namevar = namevar.to_string();
        self
    }

    /// Restrict the accepted attributes
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Mark as taking `ensure`
    #[must_use]
    pub fn ensurable(mut self) -> Self {
        self.ensurable = true;
        self
    }

    /// Attach provider metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether `attribute` may be set on resources of this type
    ///
    /// Metaparameters are not considered here.
    #[must_use]
    pub fn accepts(&self, attribute: &str) -> bool {
        self.attributes.is_empty()
            || attribute == self.namevar
            || (self.ensurable && attribute == "ensure")
            || self.attributes.contains(attribute)
    }
}

/// Registry of resource types
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, ResourceTypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the core types
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_types() {
            registry.types.insert(descriptor.name.clone(), descriptor);
        }
        registry
    }

    /// Register a type
    ///
    /// # Errors
    ///
    /// Returns error if the name is already registered
    pub fn register(&mut self, mut descriptor: ResourceTypeDescriptor) -> Result<(), RegistryError> {
        descriptor.name = descriptor.name.to_lowercase();
        if self.types.contains_key(&descriptor.name) {
            return Err(RegistryError::AlreadyRegistered {
                name: descriptor.name,
            });
        }
        self.types.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Look up a type by name, case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceTypeDescriptor> {
        self.types.get(&name.to_lowercase())
    }

    /// Look up a type, failing if absent
    ///
    /// # Errors
    ///
    /// Returns error if no type has this name
    pub fn require(&self, name: &str) -> Result<&ResourceTypeDescriptor, RegistryError> {
        self.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_lowercase(),
        })
    }

    /// Whether a type is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Thread-safe registry shared between compiles and type generators
#[derive(Debug, Default)]
pub struct SharedTypeRegistry {
    inner: RwLock<TypeRegistry>,
}

impl SharedTypeRegistry {
    /// Wrap a registry
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            inner: RwLock::new(registry),
        }
    }

    /// Register a type
    ///
    /// # Errors
    ///
    /// Returns error if the name is already registered
    pub fn register(&self, descriptor: ResourceTypeDescriptor) -> Result<(), RegistryError> {
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        registry.register(descriptor)
    }

    /// Look up a type by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ResourceTypeDescriptor> {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(name).cloned()
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        registry.names()
    }

    /// Copy of the current registry, for a compile to read without locking
    #[must_use]
    pub fn snapshot(&self) -> TypeRegistry {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        registry.clone()
    }
}

fn builtin_types() -> Vec<ResourceTypeDescriptor> {
    vec![
        ResourceTypeDescriptor::new("notify").with_attributes(["message", "withpath"]),
        ResourceTypeDescriptor::new("file")
            .with_namevar("path")
            .with_attributes([
                "content", "source", "mode", "owner", "group", "target", "recurse", "force",
                "backup", "purge", "replace",
            ])
            .ensurable(),
        ResourceTypeDescriptor::new("package")
            .with_attributes(["provider", "source", "install_options", "adminfile"])
            .ensurable(),
        ResourceTypeDescriptor::new("service")
            .with_attributes([
                "enable", "hasstatus", "hasrestart", "restart", "start", "stop", "status",
                "provider", "pattern",
            ])
            .ensurable(),
        ResourceTypeDescriptor::new("exec")
            .with_namevar("command")
            .with_attributes([
                "cwd", "creates", "onlyif", "unless", "refreshonly", "refresh", "path", "user",
                "group", "environment", "timeout", "returns", "logoutput",
            ]),
        ResourceTypeDescriptor::new("user")
            .with_attributes([
                "uid", "gid", "home", "shell", "groups", "managehome", "comment", "password",
                "system",
            ])
            .ensurable(),
        ResourceTypeDescriptor::new("group")
            .with_attributes(["gid", "members", "system"])
            .ensurable(),
        ResourceTypeDescriptor::new("cron")
            .with_attributes([
                "command", "user", "minute", "hour", "monthday", "month", "weekday",
                "environment", "target",
            ])
            .ensurable(),
        ResourceTypeDescriptor::new("host")
            .with_attributes(["ip", "host_aliases", "comment", "target"])
            .ensurable(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_json() {
        let descriptor: ResourceTypeDescriptor = serde_json::from_str(
            r#"{"name": "Nagios_Host", "attributes": ["address"], "metadata": {"provider": "naginator"}}"#,
        )
        .unwrap();
        assert_eq!(descriptor.namevar, "name");
        assert!(!descriptor.ensurable);
        assert!(descriptor.accepts("address"));
        assert!(!descriptor.accepts("port"));

        let mut registry = TypeRegistry::new();
        registry.register(descriptor).unwrap();
        assert_eq!(registry.get("nagios_host").unwrap().metadata["provider"], "naginator");
    }

    #[test]
    fn test_registry_new() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_builtins() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["notify", "file", "package", "service", "exec", "user", "group", "cron", "host"]
        );
        assert_eq!(registry.get("File").map(|d| d.namevar.as_str()), Some("path"));
    }

    #[test]
    fn test_registry_register_duplicate() {
        let mut registry = TypeRegistry::with_builtins();
        let result = registry.register(ResourceTypeDescriptor::new("Notify"));
        assert_eq!(
            result,
            Err(RegistryError::AlreadyRegistered {
                name: "notify".to_string()
            })
        );
    }

    #[test]
    fn test_registry_require() {
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.require("nagios_host"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_descriptor_accepts() {
        let file = TypeRegistry::with_builtins().get("file").cloned().unwrap();
        assert!(file.accepts("path"));
        assert!(file.accepts("ensure"));
        assert!(file.accepts("mode"));
        assert!(!file.accepts("message"));

        let open = ResourceTypeDescriptor::new("anything");
        assert!(open.accepts("whatever"));
    }

    #[test]
    fn test_shared_registry_append() {
        let shared = SharedTypeRegistry::new(TypeRegistry::with_builtins());
        let generated = ResourceTypeDescriptor::new("nagios_host")
            .with_attributes(["address", "alias"])
            .ensurable()
            .with_metadata(serde_json::json!({"target": "/etc/nagios/hosts.cfg"}));

        shared.register(generated).unwrap();
        let found = shared.get("nagios_host").unwrap();
        assert_eq!(found.metadata["target"], "/etc/nagios/hosts.cfg");
        assert!(shared.names().contains(&"nagios_host".to_string()));
        assert!(shared.snapshot().contains("nagios_host"));
    }
}
