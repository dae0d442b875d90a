//! Catalog errors.

use trellis_core::{Location, ResourceRef};

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// A resource with the same type and title already exists
    #[error("duplicate declaration: {reference} is already declared at {first}; cannot redeclare at {second}")]
    DuplicateResource {
        /// The conflicting reference
        reference: ResourceRef,
        /// Where the first declaration was
        first: Location,
        /// Where the rejected declaration was
        second: Location,
    },

    /// An edge endpoint is not in the catalog
    #[error("edge endpoint {reference} is not in the catalog")]
    MissingEndpoint {
        /// The missing endpoint
        reference: ResourceRef,
    },
}
