//! Identifiers for compile-time entities.

use serde::{Deserialize, Serialize};

/// Scope identifier - index of a scope record in a compile's scope arena
///
/// Handles are only meaningful inside the compile that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The top scope of every compile
    pub const TOP: Self = Self(0);

    /// Create from a raw arena index
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Get the arena index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_index() {
        let id = ScopeId::from_raw(7);
        assert_eq!(id.index(), 7);
        assert_eq!(ScopeId::TOP.index(), 0);
    }

    #[test]
    fn test_scope_id_display() {
        assert_eq!(format!("{}", ScopeId::from_raw(3)), "scope_3");
    }
}
