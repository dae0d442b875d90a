//! Evaluation and compile errors.

use trellis_catalog::CatalogError;
use trellis_core::{Location, ResourceRef};
use trellis_types::LoadError;

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Why a compile failed
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The environment's manifests failed to load, including structural
    /// legality violations
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A class, type or relationship target could not be found
    #[error("{location}: could not resolve {reference}")]
    UnresolvedReference {
        /// What was referenced
        reference: String,
        /// Where
        location: Location,
    },

    /// A resource was declared twice
    #[error("duplicate declaration: {reference} is already declared at {first}; cannot redeclare at {second}")]
    DuplicateResource {
        /// The conflicting reference
        reference: ResourceRef,
        /// First declaration
        first: Location,
        /// Rejected declaration
        second: Location,
    },

    /// A variable was assigned twice in one scope
    #[error("{location}: cannot reassign variable ${variable}")]
    Reassignment {
        /// Variable name
        variable: String,
        /// Where the second assignment was
        location: Location,
    },

    /// A parameter the class, define or type does not accept
    #[error("{location}: invalid parameter '{parameter}' for {resource}")]
    InvalidParameter {
        /// Resource receiving the parameter
        resource: ResourceRef,
        /// Parameter name
        parameter: String,
        /// Where
        location: Location,
    },

    /// A parameter without a default was not given
    #[error("{location}: {resource} requires parameter '{parameter}'")]
    MissingParameter {
        /// Resource missing the parameter
        resource: ResourceRef,
        /// Parameter name
        parameter: String,
        /// Where the resource was declared
        location: Location,
    },

    /// A class inherits from itself, directly or through its parents
    #[error("{location}: class {class} inherits from itself")]
    CircularInheritance {
        /// Class whose inheritance chain loops
        class: String,
        /// Where the class is defined
        location: Location,
    },

    /// A variable read before it was set
    #[error("{location}: unknown variable ${variable}")]
    UndefinedVariable {
        /// Variable name
        variable: String,
        /// Where
        location: Location,
    },

    /// A call to a function that does not exist
    #[error("{location}: unknown function {name}")]
    UnknownFunction {
        /// Function name
        name: String,
        /// Where
        location: Location,
    },

    /// The manifest called `fail`
    #[error("{location}: {message}")]
    Failed {
        /// Message passed to `fail`
        message: String,
        /// Where
        location: Location,
    },

    /// Node definitions exist but none matches the node
    #[error("could not find a node definition matching {node}")]
    NoNodeDefinition {
        /// Node name
        node: String,
    },

    /// The configured version command failed
    #[error("version command '{command}' failed: {reason}")]
    VersionCommand {
        /// Command line
        command: String,
        /// Failure description
        reason: String,
    },

    /// No environment with this name
    #[error("unknown environment {name}")]
    UnknownEnvironment {
        /// Environment name
        name: String,
    },
}

impl From<CatalogError> for EvalError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DuplicateResource {
                reference,
                first,
                second,
            } => Self::DuplicateResource {
                reference,
                first,
                second,
            },
            CatalogError::MissingEndpoint { reference } => Self::UnresolvedReference {
                reference: reference.to_string(),
                location: Location::new("", 0, 0),
            },
        }
    }
}

/// A failed compile for one node
#[derive(Debug, thiserror::Error)]
#[error("compilation failed for node {node}: {cause}")]
pub struct CompileError {
    /// Node being compiled
    pub node: String,
    /// Underlying failure
    #[source]
    pub cause: EvalError,
}

impl CompileError {
    /// Wrap a failure for a node
    #[must_use]
    pub fn new(node: impl Into<String>, cause: EvalError) -> Self {
        Self {
            node: node.into(),
            cause,
        }
    }

    /// Whether the failure is a structural legality violation
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(&self.cause, EvalError::Load(err) if err.is_structural())
    }
}
