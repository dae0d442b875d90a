//! Trellis Compiler
//!
//! Evaluates an environment's manifests for one node and produces a
//! catalog. The public surface is [`Compiler`]; scopes and evaluation
//! state are private to each compile.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod error;
mod eval;
pub mod scope;
pub mod version;

#[cfg(test)]
mod end_to_end;

// Re-exports
pub use compiler::Compiler;
pub use config::{CompilerConfig, ConfigError};
pub use error::{CompileError, EvalError, EvalResult};
pub use scope::{Scope, ScopeArena};
pub use version::{advance_version, catalog_version};
