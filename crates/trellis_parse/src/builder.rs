//! AST builder: recursive descent over the token stream.

use crate::ast::{
    Arrow, Assignment, Ast, Attribute, BinaryOp, Branch, ClassDefinition, Conditional,
    DefineDefinition, Expr, ExprKind, NodeDefinition, NodeName, Parameter, ResourceBody,
    ResourceDeclaration, Statement,
};
use crate::error::{ParseError, ParseResult};
use crate::legality;
use crate::token::{TemplatePart, Token, TokenKind};
use std::collections::HashSet;
use std::sync::Arc;
use trellis_core::name::join_namespace;
use trellis_core::Location;

/// Build an AST from a token stream
///
/// Runs the structural legality pass on the finished tree, so a returned
/// AST is always legal.
///
/// # Errors
///
/// Returns error if the tokens do not form a manifest, or if a definition
/// is nested where the language forbids it
pub fn build(file: &str, tokens: Vec<Token>) -> ParseResult<Ast> {
    let mut parser = Parser::new(file, tokens);
    let statements = parser.program()?;
    let ast = Ast {
        file: file.to_string(),
        statements,
    };
    legality::check(&ast)?;
    Ok(ast)
}

/// Parser state
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Fully-qualified names of the definitions being parsed, innermost last
    namespaces: Vec<String>,
}

// ==================== TOKEN HELPERS ====================

impl Parser {
    fn new(file: &str, mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let location = tokens
                .last()
                .map_or_else(|| Location::new(file, 1, 1), |t| t.location.clone());
            tokens.push(Token::new(TokenKind::Eof, location));
        }
        Self {
            tokens,
            pos: 0,
            namespaces: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_name(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("name")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.describe(),
            location: token.location.clone(),
        }
    }

    /// Qualify a definition name with the enclosing definition
    fn qualify(&self, name: &str) -> String {
        if let Some(absolute) = name.strip_prefix("::") {
            return absolute.to_lowercase();
        }
        let namespace = self.namespaces.last().map_or("", String::as_str);
        join_namespace(namespace, &name.to_lowercase())
    }
}

// ==================== STATEMENTS ====================

impl Parser {
    fn program(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(statements)
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Class if self.peek_nth(1).kind == TokenKind::LBrace => {
                self.advance();
                self.resource_declaration("class".to_string(), token.location)
            }
            TokenKind::Class => self.class_definition(),
            TokenKind::Define => self.define_definition(),
            TokenKind::Node => self.node_definition(),
            TokenKind::If => self.if_statement(),
            TokenKind::Unless => self.unless_statement(),
            TokenKind::Case => self.case_statement(),
            TokenKind::Variable(name) => {
                self.advance();
                self.expect(&TokenKind::Assign)?;
                let value = self.expression()?;
                Ok(Statement::Assignment(Assignment {
                    variable: name,
                    value,
                    location: token.location,
                }))
            }
            TokenKind::Name(name) => {
                self.advance();
                if self.check(&TokenKind::LBrace) {
                    self.resource_declaration(name.to_lowercase(), token.location)
                } else {
                    self.call_statement(name, token.location)
                }
            }
            TokenKind::TypeName(_) => self.relationship_statement(),
            _ => Err(self.unexpected("statement")),
        }
    }

    fn class_definition(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::Class)?;
        let name = self.expect_name()?;
        let name = self.qualify(&name);
        let parameters = self.parameters()?;
        let parent = if self.eat(&TokenKind::Inherits) {
            Some(self.expect_name()?.to_lowercase())
        } else {
            None
        };
        let enclosing = self.namespaces.last().cloned();

        self.namespaces.push(name.clone());
        let body = self.block();
        self.namespaces.pop();

        Ok(Statement::ClassDefinition(Arc::new(ClassDefinition {
            name,
            parameters,
            parent,
            enclosing,
            body: body?,
            location: start.location,
        })))
    }

    fn define_definition(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::Define)?;
        let name = self.expect_name()?;
        let name = self.qualify(&name);
        let parameters = self.parameters()?;
        let enclosing = self.namespaces.last().cloned();

        self.namespaces.push(name.clone());
        let body = self.block();
        self.namespaces.pop();

        Ok(Statement::DefineDefinition(Arc::new(DefineDefinition {
            name,
            parameters,
            enclosing,
            body: body?,
            location: start.location,
        })))
    }

    fn node_definition(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::Node)?;
        let mut names = Vec::new();
        loop {
            let name = match &self.peek().kind {
                TokenKind::Default => NodeName::Default,
                TokenKind::Name(n) | TokenKind::String(n) => NodeName::Name(n.to_lowercase()),
                TokenKind::Template(parts) => match literal_template(parts) {
                    Some(text) => NodeName::Name(text.to_lowercase()),
                    None => return Err(self.unexpected("literal node name")),
                },
                _ => return Err(self.unexpected("node name")),
            };
            self.advance();
            names.push(name);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let body = self.block()?;
        Ok(Statement::NodeDefinition(Arc::new(NodeDefinition {
            names,
            body,
            location: start.location,
        })))
    }

    fn parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        let mut parameters = Vec::new();
        if !self.eat(&TokenKind::LParen) {
            return Ok(parameters);
        }
        let mut seen = HashSet::new();
        while !self.check(&TokenKind::RParen) {
            let token = self.peek().clone();
            let TokenKind::Variable(name) = token.kind else {
                return Err(self.unexpected("parameter"));
            };
            self.advance();
            if !seen.insert(name.clone()) {
                return Err(ParseError::Duplicate {
                    what: "parameter",
                    name,
                    location: token.location,
                });
            }
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.expression()?)
            } else {
                None
            };
            parameters.push(Parameter {
                name,
                default,
                location: token.location,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(parameters)
    }

    /// Bodies after the type name: `{ title: a => 1, b => 2; title2: ... }`
    fn resource_declaration(
        &mut self,
        type_name: String,
        location: Location,
    ) -> ParseResult<Statement> {
        self.expect(&TokenKind::LBrace)?;
        let mut bodies = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let title = self.expression()?;
            self.expect(&TokenKind::Colon)?;
            let attributes = self.attributes()?;
            bodies.push(ResourceBody {
                location: title.location.clone(),
                title,
                attributes,
            });
            if !self.eat(&TokenKind::Semicolon) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Statement::ResourceDeclaration(ResourceDeclaration {
            type_name,
            bodies,
            location,
        }))
    }

    fn attributes(&mut self) -> ParseResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        let mut seen = HashSet::new();
        while !self.check(&TokenKind::Semicolon) && !self.check(&TokenKind::RBrace) {
            let token = self.peek().clone();
            let name = match &token.kind {
                TokenKind::Name(n) => n.clone(),
                kind => match kind.keyword_text() {
                    Some(text) => text.to_string(),
                    None => return Err(self.unexpected("attribute name")),
                },
            };
            self.advance();
            if !seen.insert(name.clone()) {
                return Err(ParseError::Duplicate {
                    what: "attribute",
                    name,
                    location: token.location,
                });
            }
            self.expect(&TokenKind::FatArrow)?;
            let value = self.expression()?;
            attributes.push(Attribute {
                name,
                value,
                location: token.location,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(attributes)
    }

    fn call_statement(&mut self, name: String, location: Location) -> ParseResult<Statement> {
        let args = if self.eat(&TokenKind::LParen) {
            self.expression_list(&TokenKind::RParen)?
        } else {
            let mut args = vec![self.expression()?];
            while self.eat(&TokenKind::Comma) {
                args.push(self.expression()?);
            }
            args
        };
        Ok(Statement::Expression(Expr::new(
            ExprKind::Call { name, args },
            location,
        )))
    }

    fn relationship_statement(&mut self) -> ParseResult<Statement> {
        let first = self.expression()?;
        let location = first.location.clone();
        let mut operands = vec![first];
        let mut arrows = Vec::new();
        loop {
            let arrow = match self.peek().kind {
                TokenKind::Arrow => Arrow::Before,
                TokenKind::TildeArrow => Arrow::Notify,
                _ => break,
            };
            self.advance();
            arrows.push(arrow);
            operands.push(self.expression()?);
        }
        if arrows.is_empty() {
            return Err(self.unexpected("'->' or '~>'"));
        }
        Ok(Statement::Expression(Expr::new(
            ExprKind::Relationship { operands, arrows },
            location,
        )))
    }

    fn if_statement(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::If)?;
        let mut branches = vec![self.guarded_branch()?];
        loop {
            if self.check(&TokenKind::Elsif) {
                self.advance();
                branches.push(self.guarded_branch()?);
            } else if self.check(&TokenKind::Else) {
                branches.push(self.else_branch()?);
                break;
            } else {
                break;
            }
        }
        Ok(Statement::Conditional(Conditional {
            branches,
            location: start.location,
        }))
    }

    fn unless_statement(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::Unless)?;
        let guard = self.expression()?;
        let location = guard.location.clone();
        let body = self.block()?;
        let mut branches = vec![Branch {
            guard: Some(Expr::new(ExprKind::Not(Box::new(guard)), location.clone())),
            body,
            location,
        }];
        if self.check(&TokenKind::Else) {
            branches.push(self.else_branch()?);
        }
        Ok(Statement::Conditional(Conditional {
            branches,
            location: start.location,
        }))
    }

    /// `case` lowers to a conditional; `default` always runs last
    fn case_statement(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&TokenKind::Case)?;
        let subject = self.expression()?;
        self.expect(&TokenKind::LBrace)?;

        let mut branches = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RBrace) {
            let location = self.peek().location.clone();
            if self.eat(&TokenKind::Default) {
                self.expect(&TokenKind::Colon)?;
                default = Some(Branch {
                    guard: None,
                    body: self.block()?,
                    location,
                });
                continue;
            }

            let mut guard: Option<Expr> = None;
            loop {
                let value = self.expression()?;
                let value_location = value.location.clone();
                let test = Expr::new(
                    ExprKind::Binary {
                        op: BinaryOp::Eq,
                        left: Box::new(subject.clone()),
                        right: Box::new(value),
                    },
                    value_location.clone(),
                );
                guard = Some(match guard {
                    None => test,
                    Some(prev) => Expr::new(
                        ExprKind::Binary {
                            op: BinaryOp::Or,
                            left: Box::new(prev),
                            right: Box::new(test),
                        },
                        value_location,
                    ),
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Colon)?;
            branches.push(Branch {
                guard,
                body: self.block()?,
                location,
            });
        }
        self.expect(&TokenKind::RBrace)?;
        branches.extend(default);

        Ok(Statement::Conditional(Conditional {
            branches,
            location: start.location,
        }))
    }

    fn guarded_branch(&mut self) -> ParseResult<Branch> {
        let guard = self.expression()?;
        let location = guard.location.clone();
        Ok(Branch {
            guard: Some(guard),
            body: self.block()?,
            location,
        })
    }

    fn else_branch(&mut self) -> ParseResult<Branch> {
        let token = self.expect(&TokenKind::Else)?;
        Ok(Branch {
            guard: None,
            body: self.block()?,
            location: token.location,
        })
    }
}

// ==================== EXPRESSIONS ====================

impl Parser {
    fn expression(&mut self) -> ParseResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.comparison()?;
        while self.eat(&TokenKind::And) {
            let right = self.comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let left = self.unary()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.unary()?;
        Ok(binary(op, left, right))
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Bang) {
            let token = self.advance();
            let operand = self.unary()?;
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), token.location));
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::Template(parts) => ExprKind::Template(parts),
            TokenKind::Integer(i) => ExprKind::Integer(i),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Undef => ExprKind::Undef,
            TokenKind::Variable(name) => ExprKind::Variable(name),
            TokenKind::LBracket => {
                self.advance();
                let items = self.expression_list(&TokenKind::RBracket)?;
                return Ok(Expr::new(ExprKind::Array(items), token.location));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::TypeName(type_name) => {
                self.advance();
                if self.eat(&TokenKind::LBracket) {
                    let titles = self.expression_list(&TokenKind::RBracket)?;
                    return Ok(Expr::new(
                        ExprKind::Reference { type_name, titles },
                        token.location,
                    ));
                }
                return Ok(Expr::new(ExprKind::Bareword(type_name), token.location));
            }
            TokenKind::Name(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let args = self.expression_list(&TokenKind::RParen)?;
                    return Ok(Expr::new(ExprKind::Call { name, args }, token.location));
                }
                return Ok(Expr::new(ExprKind::Bareword(name), token.location));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, token.location))
    }

    /// Comma-separated expressions up to and including `close`;
    /// a trailing comma is allowed
    fn expression_list(&mut self, close: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let location = left.location.clone();
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        location,
    )
}

/// Text of a double-quoted string without interpolation
fn literal_template(parts: &[TemplatePart]) -> Option<String> {
    parts
        .iter()
        .map(|part| match part {
            TemplatePart::Literal(text) => Some(text.as_str()),
            TemplatePart::Variable(_) => None,
        })
        .collect::<Option<Vec<_>>>()
        .map(|texts| texts.concat())
}
