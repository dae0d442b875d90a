//! Abstract syntax tree for manifests.
//!
//! The tree is immutable once built. Class and define definitions are
//! reference counted so the type collection can index them without
//! copying bodies, and so concurrent compiles can share them.

use crate::token::TemplatePart;
use std::sync::Arc;
use trellis_core::Location;

/// A parsed manifest unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    /// Source unit name
    pub file: String,
    /// Top-level statements in source order
    pub statements: Vec<Statement>,
}

impl Ast {
    /// Create an empty AST for a source unit
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            statements: Vec::new(),
        }
    }

    /// Visit every class definition, nested ones included
    pub fn classes(&self) -> Vec<&Arc<ClassDefinition>> {
        let mut out = Vec::new();
        collect(&self.statements, &mut |stmt| {
            if let Statement::ClassDefinition(class) = stmt {
                out.push(class);
            }
        });
        out
    }

    /// Visit every define definition, nested ones included
    pub fn defines(&self) -> Vec<&Arc<DefineDefinition>> {
        let mut out = Vec::new();
        collect(&self.statements, &mut |stmt| {
            if let Statement::DefineDefinition(define) = stmt {
                out.push(define);
            }
        });
        out
    }

    /// Top-level node definitions
    pub fn nodes(&self) -> Vec<&Arc<NodeDefinition>> {
        self.statements
            .iter()
            .filter_map(|stmt| match stmt {
                Statement::NodeDefinition(node) => Some(node),
                _ => None,
            })
            .collect()
    }
}

fn collect<'a>(statements: &'a [Statement], visit: &mut impl FnMut(&'a Statement)) {
    for stmt in statements {
        visit(stmt);
        match stmt {
            Statement::ClassDefinition(class) => collect(&class.body, visit),
            Statement::DefineDefinition(define) => collect(&define.body, visit),
            _ => {}
        }
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `class name(params) inherits parent { ... }`
    ClassDefinition(Arc<ClassDefinition>),
    /// `define name(params) { ... }`
    DefineDefinition(Arc<DefineDefinition>),
    /// `node 'name' { ... }`
    NodeDefinition(Arc<NodeDefinition>),
    /// `type { 'title': attr => value }`
    ResourceDeclaration(ResourceDeclaration),
    /// `if` / `unless` / `case`
    Conditional(Conditional),
    /// `$name = value`
    Assignment(Assignment),
    /// Function call or relationship chain
    Expression(Expr),
}

impl Statement {
    /// Where the statement starts
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::ClassDefinition(c) => &c.location,
            Self::DefineDefinition(d) => &d.location,
            Self::NodeDefinition(n) => &n.location,
            Self::ResourceDeclaration(r) => &r.location,
            Self::Conditional(c) => &c.location,
            Self::Assignment(a) => &a.location,
            Self::Expression(e) => &e.location,
        }
    }
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    /// Fully-qualified lowercase name
    pub name: String,
    /// Declared parameters
    pub parameters: Vec<Parameter>,
    /// Parent class as written after `inherits`
    pub parent: Option<String>,
    /// Fully-qualified name of the lexically enclosing definition
    pub enclosing: Option<String>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Definition site
    pub location: Location,
}

/// Defined resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineDefinition {
    /// Fully-qualified lowercase name
    pub name: String,
    /// Declared parameters
    pub parameters: Vec<Parameter>,
    /// Fully-qualified name of the lexically enclosing definition
    pub enclosing: Option<String>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Definition site
    pub location: Location,
}

/// Node name matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeName {
    /// Exact (case-insensitive) name
    Name(String),
    /// Fallback for unmatched nodes
    Default,
}

/// Node definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    /// Names this body applies to
    pub names: Vec<NodeName>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Definition site
    pub location: Location,
}

/// Class or define parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Name without `$`
    pub name: String,
    /// Default value expression
    pub default: Option<Expr>,
    /// Declaration site
    pub location: Location,
}

/// Resource declaration with one or more bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDeclaration {
    /// Type name as written (`notify`, `foo::bar`, `class`)
    pub type_name: String,
    /// One body per `title: attributes` group
    pub bodies: Vec<ResourceBody>,
    /// Declaration site
    pub location: Location,
}

/// One titled body of a resource declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBody {
    /// Title expression (string or array of strings)
    pub title: Expr,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Body site
    pub location: Location,
}

/// `name => value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Value expression
    pub value: Expr,
    /// Attribute site
    pub location: Location,
}

/// Conditional with guarded branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    /// Branches tried in order
    pub branches: Vec<Branch>,
    /// Statement site
    pub location: Location,
}

/// A conditional branch; a missing guard is the `else`/`default` branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Guard expression
    pub guard: Option<Expr>,
    /// Statements run in the enclosing scope when selected
    pub body: Vec<Statement>,
    /// Branch site
    pub location: Location,
}

/// Variable assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Variable name without `$`
    pub variable: String,
    /// Assigned expression
    pub value: Expr,
    /// Statement site
    pub location: Location,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `and`
    And,
    /// `or`
    Or,
}

/// Relationship arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    /// `->` left is applied before right
    Before,
    /// `~>` left is applied before right and notifies it
    Notify,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    /// Expression kind
    pub kind: ExprKind,
    /// Expression site
    pub location: Location,
}

impl Expr {
    /// Create an expression
    #[must_use]
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Self { kind, location }
    }
}

/// Expression kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// Single-quoted string
    String(String),
    /// Double-quoted string with interpolation
    Template(Vec<TemplatePart>),
    /// Integer literal
    Integer(i64),
    /// `true` / `false`
    Bool(bool),
    /// `undef`
    Undef,
    /// Unquoted word, evaluates to a string
    Bareword(String),
    /// `$name`
    Variable(String),
    /// `[a, b]`
    Array(Vec<Expr>),
    /// `Type[title, ...]`
    Reference {
        /// Type name as written
        type_name: String,
        /// Title expressions
        titles: Vec<Expr>,
    },
    /// `!expr`
    Not(Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `name(args)` or `name arg, arg`
    Call {
        /// Function name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `A -> B ~> C`
    Relationship {
        /// Operands, one more than arrows
        operands: Vec<Expr>,
        /// Arrows between consecutive operands
        arrows: Vec<Arrow>,
    },
}
