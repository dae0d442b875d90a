//! Trellis Types
//!
//! Everything a compile looks definitions up in: the type collection built
//! from manifest sources, the registry of resource types, and the
//! environments that own a collection and reload it when it goes stale.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod environment;
pub mod error;
pub mod registry;
pub mod source;

// Re-exports
pub use collection::{Definition, TypeCollection};
pub use environment::{Environment, Environments};
pub use error::{LoadError, RegistryError, SourceError};
pub use registry::{ResourceTypeDescriptor, SharedTypeRegistry, TypeRegistry};
pub use source::{DirectorySources, ManifestSource, MemorySources, SourceProvider};
