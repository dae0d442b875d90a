//! Trellis Parser
//!
//! Turns manifest text into an immutable syntax tree. Parsing happens in
//! three steps: the lexer produces a token stream, the builder produces
//! the AST, and a separate legality pass rejects structurally illegal
//! nesting before any evaluation happens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builder;
pub mod error;
pub mod legality;
pub mod lexer;
pub mod token;

pub use ast::{
    Arrow, Assignment, Ast, Attribute, BinaryOp, Branch, ClassDefinition, Conditional,
    DefineDefinition, Expr, ExprKind, NodeDefinition, NodeName, Parameter, ResourceBody,
    ResourceDeclaration, Statement,
};
pub use builder::build;
pub use error::{ParseError, ParseResult, StructuralError};
pub use lexer::lex;
pub use token::{TemplatePart, Token, TokenKind};

/// Tokenize and build a manifest in one step
///
/// # Errors
///
/// Returns error if the text does not tokenize, does not parse, or
/// violates a structural rule
pub fn parse(file: &str, text: &str) -> ParseResult<Ast> {
    let tokens = lex(file, text)?;
    build(file, tokens)
}
