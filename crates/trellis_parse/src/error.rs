//! Parse and structural errors.

use trellis_core::Location;

/// Result type for parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Error produced while tokenizing or building a manifest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Character that starts no token
    #[error("{location}: unexpected character {found:?}")]
    UnexpectedChar { found: char, location: Location },

    /// String or comment without its closing delimiter
    #[error("{location}: unterminated {what}")]
    Unterminated {
        what: &'static str,
        location: Location,
    },

    /// Integer literal out of range
    #[error("{location}: invalid number {text}")]
    InvalidNumber { text: String, location: Location },

    /// Token that does not fit the grammar
    #[error("{location}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: Location,
    },

    /// Attribute or parameter given twice
    #[error("{location}: duplicate {what} '{name}'")]
    Duplicate {
        what: &'static str,
        name: String,
        location: Location,
    },

    /// Structurally illegal definition
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl ParseError {
    /// Whether this is a structural legality violation
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

/// A definition placed where the language forbids it
///
/// Raised before evaluation and independent of any runtime data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {definition} {reason}")]
pub struct StructuralError {
    /// The offending definition, e.g. `class foo`
    pub definition: String,
    /// Why it is illegal
    pub reason: String,
    /// Where it was written
    pub location: Location,
}
