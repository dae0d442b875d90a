//! Trellis Core Types
//!
//! Pure types shared by every stage of the manifest compiler: source
//! locations, qualified names, evaluated values, node descriptors and
//! the clock used to stamp catalog versions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod id;
pub mod location;
pub mod name;
pub mod node;
pub mod time;
pub mod value;

// Re-exports
pub use id::ScopeId;
pub use location::Location;
pub use name::{capitalize_name, join_namespace, NAMESPACE_SEPARATOR};
pub use node::Node;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use value::{RefParseError, ResourceRef, Value};
