//! Structural legality pass.
//!
//! Runs over a finished AST before any evaluation. Class and define
//! definitions may appear at top level or inside another class or define
//! body, never under a conditional branch or a node body at any depth.
//! Node definitions may only appear at top level. Guards are never
//! evaluated, so `if false { class foo {} }` is rejected the same way as
//! `if true { ... }`.

use crate::ast::{Ast, Statement};
use crate::error::StructuralError;

/// Where a statement sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    Definition,
    Conditional,
    NodeBody,
}

impl Context {
    /// Reason a definition is illegal here, if it is
    fn forbids_definition(self) -> Option<&'static str> {
        match self {
            Self::TopLevel | Self::Definition => None,
            Self::Conditional => Some("cannot be defined inside a conditional"),
            Self::NodeBody => Some("cannot be defined inside a node definition"),
        }
    }

    /// Context of a nested block; once illegal, always illegal
    fn enter(self, block: Self) -> Self {
        match self {
            Self::Conditional | Self::NodeBody => self,
            Self::TopLevel | Self::Definition => block,
        }
    }
}

/// Check every definition in the AST is legally placed
///
/// # Errors
///
/// Returns the first illegally nested definition in source order
pub fn check(ast: &Ast) -> Result<(), StructuralError> {
    walk(&ast.statements, Context::TopLevel)
}

fn walk(statements: &[Statement], context: Context) -> Result<(), StructuralError> {
    for statement in statements {
        match statement {
            Statement::ClassDefinition(class) => {
                let definition = format!("class {}", class.name);
                reject_definition(context, &definition, statement)?;
                walk(&class.body, context.enter(Context::Definition))?;
            }
            Statement::DefineDefinition(define) => {
                let definition = format!("define {}", define.name);
                reject_definition(context, &definition, statement)?;
                walk(&define.body, context.enter(Context::Definition))?;
            }
            Statement::NodeDefinition(node) => {
                if context != Context::TopLevel {
                    return Err(StructuralError {
                        definition: "node".to_string(),
                        reason: "can only be defined at top level".to_string(),
                        location: node.location.clone(),
                    });
                }
                walk(&node.body, Context::NodeBody)?;
            }
            Statement::Conditional(conditional) => {
                for branch in &conditional.branches {
                    walk(&branch.body, context.enter(Context::Conditional))?;
                }
            }
            Statement::ResourceDeclaration(_)
            | Statement::Assignment(_)
            | Statement::Expression(_) => {}
        }
    }
    Ok(())
}

fn reject_definition(
    context: Context,
    definition: &str,
    statement: &Statement,
) -> Result<(), StructuralError> {
    match context.forbids_definition() {
        Some(reason) => Err(StructuralError {
            definition: definition.to_string(),
            reason: reason.to_string(),
            location: statement.location().clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ParseError;
    use crate::parse;

    fn structural(text: &str) -> String {
        match parse("site.pp", text) {
            Err(ParseError::Structural(err)) => err.to_string(),
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_class_in_if_true_rejected() {
        let msg = structural("if true {\n  class foo { }\n}");
        assert_eq!(msg, "site.pp:2:3: class foo cannot be defined inside a conditional");
    }

    #[test]
    fn test_class_in_if_false_rejected() {
        let msg = structural("if false {\n  class foo { }\n}");
        assert_eq!(msg, "site.pp:2:3: class foo cannot be defined inside a conditional");
    }

    #[test]
    fn test_define_in_else_rejected() {
        let msg = structural("if $x { } else { define d { } }");
        assert!(msg.contains("define d cannot be defined inside a conditional"));
    }

    #[test]
    fn test_class_in_conditional_inside_class_rejected() {
        let msg = structural("class outer { case $os { default: { class inner { } } } }");
        assert!(msg.contains("class outer::inner"));
    }

    #[test]
    fn test_class_deep_under_conditional_rejected() {
        let msg = structural("unless $x { notify { 'a': } if $y { class deep { } } }");
        assert!(msg.contains("class deep"));
    }

    #[test]
    fn test_class_in_node_rejected() {
        let msg = structural("node default { class foo { } }");
        assert!(msg.contains("node definition"));
    }

    #[test]
    fn test_nested_node_rejected() {
        let msg = structural("class foo { node 'web' { } }");
        assert!(msg.contains("can only be defined at top level"));
    }

    #[test]
    fn test_legal_nesting_accepted() {
        let ast = parse(
            "site.pp",
            "class a { class b { define c { } } if $x { notify { 'y': } } }
             define d { class e { } }
             node default { if $z { include a } }",
        )
        .unwrap();
        assert_eq!(ast.classes().len(), 3);
        assert_eq!(ast.defines().len(), 2);
    }
}
