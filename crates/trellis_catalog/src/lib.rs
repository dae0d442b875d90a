//! Trellis Catalog
//!
//! The output of a compile: every resource declared for one node, the
//! relationship edges between them, and the catalog version.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod error;
pub mod resource;
pub mod version;

// Re-exports
pub use catalog::{Catalog, Edge, EdgeKind};
pub use error::{CatalogError, CatalogResult};
pub use resource::{is_metaparameter, Resource, METAPARAMETERS};
pub use version::CatalogVersion;
