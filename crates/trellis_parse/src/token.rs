//! Tokens consumed by the AST builder.

use trellis_core::Location;

/// Piece of a double-quoted string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text
    Literal(String),
    /// Interpolated variable (name without `$`)
    Variable(String),
}

/// Token types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Class,
    Define,
    Node,
    Inherits,
    If,
    Elsif,
    Else,
    Unless,
    Case,
    Default,
    And,
    Or,
    True,
    False,
    Undef,

    // Words and literals
    /// Lowercase name, possibly namespace-qualified (`experiment::baz`)
    Name(String),
    /// Capitalised type name (`Notify`, `Experiment::Baz`)
    TypeName(String),
    /// Variable name without the `$`
    Variable(String),
    /// Single-quoted string
    String(String),
    /// Double-quoted string
    Template(Vec<TemplatePart>),
    /// Integer literal
    Integer(i64),

    // Symbols
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Assign,    // =
    FatArrow,  // =>
    EqEq,      // ==
    NotEq,     // !=
    Bang,      // !
    Arrow,     // ->
    TildeArrow, // ~>

    // End of input
    Eof,
}

impl TokenKind {
    /// Keyword for a bare word, if it is one
    #[must_use]
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "class" => Self::Class,
            "define" => Self::Define,
            "node" => Self::Node,
            "inherits" => Self::Inherits,
            "if" => Self::If,
            "elsif" => Self::Elsif,
            "else" => Self::Else,
            "unless" => Self::Unless,
            "case" => Self::Case,
            "default" => Self::Default,
            "and" => Self::And,
            "or" => Self::Or,
            "true" => Self::True,
            "false" => Self::False,
            "undef" => Self::Undef,
            _ => return None,
        };
        Some(kind)
    }

    /// Source text of a keyword token
    #[must_use]
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Self::Class => "class",
            Self::Define => "define",
            Self::Node => "node",
            Self::Inherits => "inherits",
            Self::If => "if",
            Self::Elsif => "elsif",
            Self::Else => "else",
            Self::Unless => "unless",
            Self::Case => "case",
            Self::Default => "default",
            Self::And => "and",
            Self::Or => "or",
            Self::True => "true",
            Self::False => "false",
            Self::Undef => "undef",
            _ => return None,
        };
        Some(text)
    }

    /// Human-readable description for diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(text) = self.keyword_text() {
            return format!("'{text}'");
        }
        match self {
            Self::Name(n) => format!("name '{n}'"),
            Self::TypeName(n) => format!("type name '{n}'"),
            Self::Variable(n) => format!("variable '${n}'"),
            Self::String(_) | Self::Template(_) => "string".to_string(),
            Self::Integer(i) => format!("number {i}"),
            Self::LBrace => "'{'".to_string(),
            Self::RBrace => "'}'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Colon => "':'".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::Assign => "'='".to_string(),
            Self::FatArrow => "'=>'".to_string(),
            Self::EqEq => "'=='".to_string(),
            Self::NotEq => "'!='".to_string(),
            Self::Bang => "'!'".to_string(),
            Self::Arrow => "'->'".to_string(),
            Self::TildeArrow => "'~>'".to_string(),
            Self::Eof => "end of input".to_string(),
            _ => "keyword".to_string(),
        }
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Where the token starts
    pub location: Location,
}

impl Token {
    /// Create a token
    #[must_use]
    pub fn new(kind: TokenKind, location: Location) -> Self {
        Self { kind, location }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_roundtrip() {
        for word in ["class", "define", "node", "if", "case", "undef"] {
            let kind = TokenKind::keyword(word).unwrap();
            assert_eq!(kind.keyword_text(), Some(word));
        }
        assert!(TokenKind::keyword("notify").is_none());
    }

    #[test]
    fn test_describe() {
        assert_eq!(TokenKind::Name("foo".into()).describe(), "name 'foo'");
        assert_eq!(TokenKind::Class.describe(), "'class'");
        assert_eq!(TokenKind::Eof.describe(), "end of input");
    }
}
