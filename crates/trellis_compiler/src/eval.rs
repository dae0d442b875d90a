//! Evaluation of one compile.
//!
//! An [`Evaluation`] owns everything that is private to a single compile:
//! the scope arena, the set of evaluated classes and the catalog under
//! construction. The type collection and registry are shared read-only.

use crate::config::CompilerConfig;
use crate::error::{EvalError, EvalResult};
use crate::scope::ScopeArena;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use trellis_catalog::{is_metaparameter, Catalog, EdgeKind, Resource};
use trellis_core::name::{parent_namespace, NAMESPACE_SEPARATOR};
use trellis_core::{Location, Node, ResourceRef, ScopeId, Value};
use trellis_parse::{
    Arrow, Attribute, BinaryOp, ClassDefinition, Conditional, DefineDefinition, Expr, ExprKind, NodeName,
    Parameter, ResourceDeclaration, Statement, TemplatePart,
};
use trellis_types::{TypeCollection, TypeRegistry};

/// Relationship metaparameters: name, edge kind, and whether the edge
/// leaves the declaring resource
const RELATIONSHIP_METAPARAMETERS: [(&str, EdgeKind, bool); 4] = [
    ("require", EdgeKind::Before, false),
    ("before", EdgeKind::Before, true),
    ("notify", EdgeKind::Notify, true),
    ("subscribe", EdgeKind::Notify, false),
];

/// An edge waiting for the end of evaluation
#[derive(Debug, Clone)]
struct Relationship {
    source: ResourceRef,
    target: ResourceRef,
    kind: EdgeKind,
    location: Location,
}

/// State of a single compile
pub(crate) struct Evaluation<'a> {
    node: &'a Node,
    collection: &'a TypeCollection,
    registry: &'a TypeRegistry,
    config: &'a CompilerConfig,
    scopes: ScopeArena,
    catalog: Catalog,
    /// Evaluated classes by fully-qualified name
    class_scopes: HashMap<String, ScopeId>,
    /// Classes whose parent chain is being evaluated
    inheriting: HashSet<String>,
    relationships: Vec<Relationship>,
}

impl<'a> Evaluation<'a> {
    pub(crate) fn new(
        node: &'a Node,
        environment: &str,
        collection: &'a TypeCollection,
        registry: &'a TypeRegistry,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            node,
            collection,
            registry,
            config,
            scopes: ScopeArena::new(),
            catalog: Catalog::new(&node.name, environment),
            class_scopes: HashMap::new(),
            inheriting: HashSet::new(),
            relationships: Vec::new(),
        }
    }

    /// Evaluate every manifest, then the node definition, then finish
    pub(crate) fn run(mut self) -> EvalResult<Catalog> {
        let main = self.scopes.owner(ScopeId::TOP).clone();
        self.catalog
            .add_resource(Resource::new(main, ScopeId::TOP, builtin_location()))?;
        self.class_scopes.insert("main".to_string(), ScopeId::TOP);
        self.bind_node_variables()?;

        let collection = self.collection;
        for ast in collection.manifests() {
            self.evaluate_statements(&ast.statements, ScopeId::TOP)?;
        }
        self.evaluate_node()?;
        self.finish()?;
        Ok(self.catalog)
    }

    fn bind_node_variables(&mut self) -> EvalResult<()> {
        let location = builtin_location();
        let environment = Value::from(self.catalog.environment.clone());
        self.scopes
            .set_variable(ScopeId::TOP, "environment", environment, &location)?;
        for (name, value) in &self.node.facts {
            if name == "environment" {
                continue;
            }
            self.scopes
                .set_variable(ScopeId::TOP, name, Value::from(value.as_str()), &location)?;
        }
        Ok(())
    }

    fn evaluate_node(&mut self) -> EvalResult<()> {
        let collection = self.collection;
        if !collection.has_node_definitions() {
            return Ok(());
        }
        let definition = collection.node_definition(&self.node.name).ok_or_else(|| {
            EvalError::NoNodeDefinition {
                node: self.node.name.clone(),
            }
        })?;

        let title = match definition.names.first() {
            Some(NodeName::Name(name)) => name.clone(),
            Some(NodeName::Default) | None => "default".to_string(),
        };
        let reference = ResourceRef::new("node", title);
        debug!(node = %self.node.name, definition = %reference, "Evaluating node definition");

        self.catalog.add_resource(Resource::new(
            reference.clone(),
            ScopeId::TOP,
            definition.location.clone(),
        ))?;
        self.contain(ScopeId::TOP, &reference)?;
        let scope = self.scopes.child(ScopeId::TOP, "", reference);
        self.evaluate_statements(&definition.body, scope)
    }

    // ==================== STATEMENTS ====================

    fn evaluate_statements(&mut self, statements: &'a [Statement], scope: ScopeId) -> EvalResult<()> {
        for statement in statements {
            self.evaluate_statement(statement, scope)?;
        }
        Ok(())
    }

    fn evaluate_statement(&mut self, statement: &'a Statement, scope: ScopeId) -> EvalResult<()> {
        match statement {
            // Definitions are indexed by the type collection, not evaluated in place
            Statement::ClassDefinition(_)
            | Statement::DefineDefinition(_)
            | Statement::NodeDefinition(_) => Ok(()),
            Statement::Assignment(assignment) => {
                let value = self.evaluate(&assignment.value, scope)?;
                self.scopes
                    .set_variable(scope, &assignment.variable, value, &assignment.location)
            }
            Statement::ResourceDeclaration(declaration) => self.declare(declaration, scope),
            Statement::Conditional(conditional) => self.evaluate_conditional(conditional, scope),
            Statement::Expression(expr) => self.evaluate(expr, scope).map(drop),
        }
    }

    /// Run the first branch whose guard holds, in the current scope
    fn evaluate_conditional(&mut self, conditional: &'a Conditional, scope: ScopeId) -> EvalResult<()> {
        for branch in &conditional.branches {
            let taken = match &branch.guard {
                Some(guard) => self.evaluate(guard, scope)?.is_truthy(),
                None => true,
            };
            if taken {
                return self.evaluate_statements(&branch.body, scope);
            }
        }
        Ok(())
    }

    fn declare(&mut self, declaration: &'a ResourceDeclaration, scope: ScopeId) -> EvalResult<()> {
        if declaration.type_name == "class" {
            for body in &declaration.bodies {
                let parameters = self.evaluate_attributes(&body.attributes, scope)?;
                for title in self.titles(&body.title, scope)? {
                    let class = self.resolve_class(&title, scope, &body.location)?;
                    self.evaluate_class(class, Some(parameters.clone()), scope, &body.location)?;
                }
            }
            return Ok(());
        }

        let collection = self.collection;
        let define = collection.find_define(&declaration.type_name, self.scopes.namespace(scope));
        let type_name = match define {
            Some(define) => define.name.clone(),
            None if self.registry.contains(&declaration.type_name) => declaration.type_name.clone(),
            None => {
                return Err(EvalError::UnresolvedReference {
                    reference: format!("resource type {}", declaration.type_name),
                    location: declaration.location.clone(),
                });
            }
        };

        for body in &declaration.bodies {
            let parameters = self.evaluate_attributes(&body.attributes, scope)?;
            for title in self.titles(&body.title, scope)? {
                let reference = ResourceRef::new(&type_name, title);
                let mut resource = Resource::new(reference.clone(), scope, body.location.clone());
                resource.parameters = parameters.clone();
                self.catalog.add_resource(resource)?;
                self.contain(scope, &reference)?;

                if let Some(define) = define {
                    self.evaluate_define(define, &reference, &parameters, &body.location)?;
                }
            }
        }
        Ok(())
    }

    fn evaluate_attributes(
        &mut self,
        attributes: &'a [Attribute],
        scope: ScopeId,
    ) -> EvalResult<IndexMap<String, Value>> {
        let mut values = IndexMap::with_capacity(attributes.len());
        for attribute in attributes {
            let value = self.evaluate(&attribute.value, scope)?;
            values.insert(attribute.name.clone(), value);
        }
        Ok(values)
    }

    /// One title per element of the evaluated title expression
    fn titles(&mut self, title: &'a Expr, scope: ScopeId) -> EvalResult<Vec<String>> {
        let value = self.evaluate(title, scope)?;
        Ok(value.flatten().into_iter().map(ToString::to_string).collect())
    }

    fn contain(&mut self, scope: ScopeId, reference: &ResourceRef) -> EvalResult<()> {
        let owner = self.scopes.owner(scope).clone();
        self.catalog
            .add_edge(owner, reference.clone(), EdgeKind::Contains)?;
        Ok(())
    }

    // ==================== CLASSES AND DEFINES ====================

    /// Find a class through the scope's namespace
    fn resolve_class(
        &self,
        name: &str,
        scope: ScopeId,
        location: &Location,
    ) -> EvalResult<&'a Arc<ClassDefinition>> {
        let collection = self.collection;
        self.scopes
            .qualify_class(scope, name, collection)
            .ok_or_else(|| EvalError::UnresolvedReference {
                reference: format!("class {name}"),
                location: location.clone(),
            })
    }

    /// Evaluate a class once; later plain inclusions are no-ops
    ///
    /// `parameters` is `Some` for resource-like declarations, which may
    /// only happen once per class.
    fn evaluate_class(
        &mut self,
        class: &'a Arc<ClassDefinition>,
        parameters: Option<IndexMap<String, Value>>,
        declaring: ScopeId,
        location: &Location,
    ) -> EvalResult<ScopeId> {
        let reference = ResourceRef::class(&class.name);
        if let Some(&scope) = self.class_scopes.get(&class.name) {
            if parameters.is_some() {
                let first = self
                    .catalog
                    .resource_by_ref(&reference)
                    .map_or_else(|| class.location.clone(), |r| r.location.clone());
                return Err(EvalError::DuplicateResource {
                    reference,
                    first,
                    second: location.clone(),
                });
            }
            return Ok(scope);
        }

        let parent = match &class.parent {
            Some(parent_name) => self.evaluate_parent_class(class, parent_name, declaring, location)?,
            None => self.lexical_parent(class.enclosing.as_deref()),
        };

        debug!(class = %class.name, "Evaluating class");
        let scope = self.scopes.child(parent, &class.name, reference.clone());
        self.class_scopes.insert(class.name.clone(), scope);

        let given = parameters.unwrap_or_default();
        let mut resource = Resource::new(reference.clone(), scope, location.clone());
        resource.parameters = given.clone();
        self.catalog.add_resource(resource)?;
        self.contain(declaring, &reference)?;

        self.bind_parameters(&class.parameters, &given, &reference, scope, location, false)?;
        self.evaluate_statements(&class.body, scope)?;
        Ok(scope)
    }

    fn evaluate_parent_class(
        &mut self,
        class: &'a Arc<ClassDefinition>,
        parent_name: &str,
        declaring: ScopeId,
        location: &Location,
    ) -> EvalResult<ScopeId> {
        let collection = self.collection;
        let parent = collection
            .find_class(parent_name, parent_namespace(&class.name))
            .ok_or_else(|| EvalError::UnresolvedReference {
                reference: format!("parent class {parent_name}"),
                location: class.location.clone(),
            })?;

        if !self.inheriting.insert(class.name.clone()) || self.inheriting.contains(&parent.name) {
            return Err(EvalError::CircularInheritance {
                class: class.name.clone(),
                location: class.location.clone(),
            });
        }
        let scope = self.evaluate_class(parent, None, declaring, location);
        self.inheriting.remove(&class.name);
        scope
    }

    /// Scope of the lexically enclosing class if it has been evaluated,
    /// otherwise the top scope
    fn lexical_parent(&self, enclosing: Option<&str>) -> ScopeId {
        enclosing
            .and_then(|name| self.class_scopes.get(name).copied())
            .unwrap_or(ScopeId::TOP)
    }

    fn evaluate_define(
        &mut self,
        define: &'a Arc<DefineDefinition>,
        reference: &ResourceRef,
        parameters: &IndexMap<String, Value>,
        location: &Location,
    ) -> EvalResult<()> {
        let parent = self.lexical_parent(define.enclosing.as_deref());
        let scope = self.scopes.child(parent, &define.name, reference.clone());
        let title = Value::from(reference.title.clone());
        self.scopes.set_variable(scope, "title", title.clone(), location)?;
        self.bind_parameters(&define.parameters, parameters, reference, scope, location, true)?;
        if self.scopes.local_variable(scope, "name").is_none() {
            let name = parameters.get("name").cloned().unwrap_or(title);
            self.scopes.set_variable(scope, "name", name, location)?;
        }
        self.evaluate_statements(&define.body, scope)
    }

    /// Bind declared parameters from given values or defaults
    ///
    /// Defaults are evaluated in the new scope, so they can read
    /// parameters bound before them.
    fn bind_parameters(
        &mut self,
        declared: &'a [Parameter],
        given: &IndexMap<String, Value>,
        resource: &ResourceRef,
        scope: ScopeId,
        location: &Location,
        accepts_name: bool,
    ) -> EvalResult<()> {
        for name in given.keys() {
            let known = is_metaparameter(name)
                || (accepts_name && name == "name")
                || declared.iter().any(|p| &p.name == name);
            if !known {
                return Err(EvalError::InvalidParameter {
                    resource: resource.clone(),
                    parameter: name.clone(),
                    location: location.clone(),
                });
            }
        }

        for parameter in declared {
            let value = match (given.get(&parameter.name), &parameter.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => self.evaluate(default, scope)?,
                (None, None) => {
                    return Err(EvalError::MissingParameter {
                        resource: resource.clone(),
                        parameter: parameter.name.clone(),
                        location: location.clone(),
                    });
                }
            };
            self.scopes
                .set_variable(scope, &parameter.name, value, &parameter.location)?;
        }
        Ok(())
    }

    // ==================== FUNCTIONS ====================

    fn call(
        &mut self,
        name: &str,
        args: &'a [Expr],
        location: &Location,
        scope: ScopeId,
    ) -> EvalResult<Value> {
        match name {
            "include" => {
                for class in self.class_arguments(args, scope)? {
                    let class = self.resolve_class(&class, scope, location)?;
                    self.evaluate_class(class, None, scope, location)?;
                }
            }
            "require" => {
                for class in self.class_arguments(args, scope)? {
                    let class = self.resolve_class(&class, scope, location)?;
                    self.evaluate_class(class, None, scope, location)?;
                    self.relationships.push(Relationship {
                        source: ResourceRef::class(&class.name),
                        target: self.scopes.owner(scope).clone(),
                        kind: EdgeKind::Before,
                        location: location.clone(),
                    });
                }
            }
            "notice" => {
                let message = self.message(args, scope)?;
                info!(node = %self.node.name, %location, "{message}");
            }
            "fail" => {
                return Err(EvalError::Failed {
                    message: self.message(args, scope)?,
                    location: location.clone(),
                });
            }
            _ => {
                return Err(EvalError::UnknownFunction {
                    name: name.to_string(),
                    location: location.clone(),
                });
            }
        }
        Ok(Value::Undef)
    }

    /// Class names from function arguments; arrays are flattened and
    /// class references contribute their title
    fn class_arguments(&mut self, args: &'a [Expr], scope: ScopeId) -> EvalResult<Vec<String>> {
        let mut names = Vec::new();
        for arg in args {
            let value = self.evaluate(arg, scope)?;
            for item in value.flatten() {
                match item {
                    Value::Reference(reference) if reference.is_class() => {
                        names.push(reference.title.clone());
                    }
                    other => names.push(other.to_string()),
                }
            }
        }
        Ok(names)
    }

    fn message(&mut self, args: &'a [Expr], scope: ScopeId) -> EvalResult<String> {
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(self.evaluate(arg, scope)?.to_string());
        }
        Ok(parts.join(" "))
    }

    /// Record `a -> b` and `a ~> b` chains for the end of evaluation
    fn relationship(&mut self, operands: &'a [Expr], arrows: &[Arrow], scope: ScopeId) -> EvalResult<()> {
        let mut resolved = Vec::with_capacity(operands.len());
        for operand in operands {
            let value = self.evaluate(operand, scope)?;
            let references = value
                .flatten()
                .into_iter()
                .map(|item| as_reference(item, &operand.location))
                .collect::<EvalResult<Vec<_>>>()?;
            resolved.push(references);
        }

        for (i, arrow) in arrows.iter().enumerate() {
            let kind = match arrow {
                Arrow::Before => EdgeKind::Before,
                Arrow::Notify => EdgeKind::Notify,
            };
            for source in &resolved[i] {
                for target in &resolved[i + 1] {
                    self.relationships.push(Relationship {
                        source: source.clone(),
                        target: target.clone(),
                        kind,
                        location: operands[i + 1].location.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // ==================== EXPRESSIONS ====================

    fn evaluate(&mut self, expr: &'a Expr, scope: ScopeId) -> EvalResult<Value> {
        let value = match &expr.kind {
            ExprKind::String(text) | ExprKind::Bareword(text) => Value::String(text.clone()),
            ExprKind::Template(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(literal) => text.push_str(literal),
                        TemplatePart::Variable(name) => {
                            text.push_str(&self.variable(name, scope, &expr.location)?.to_string());
                        }
                    }
                }
                Value::String(text)
            }
            ExprKind::Integer(i) => Value::Integer(*i),
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Undef => Value::Undef,
            ExprKind::Variable(name) => self.variable(name, scope, &expr.location)?,
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item, scope)?);
                }
                Value::Array(values)
            }
            ExprKind::Reference { type_name, titles } => self.reference(type_name, titles, scope)?,
            ExprKind::Not(inner) => Value::Bool(!self.evaluate(inner, scope)?.is_truthy()),
            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate(left, scope)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Value::Bool(false),
                    BinaryOp::Or if left.is_truthy() => Value::Bool(true),
                    BinaryOp::And | BinaryOp::Or => Value::Bool(self.evaluate(right, scope)?.is_truthy()),
                    BinaryOp::Eq => Value::Bool(left.loose_eq(&self.evaluate(right, scope)?)),
                    BinaryOp::NotEq => Value::Bool(!left.loose_eq(&self.evaluate(right, scope)?)),
                }
            }
            ExprKind::Call { name, args } => self.call(name, args, &expr.location, scope)?,
            ExprKind::Relationship { operands, arrows } => {
                self.relationship(operands, arrows, scope)?;
                Value::Undef
            }
        };
        Ok(value)
    }

    /// Read a variable
    ///
    /// `$::x` reads the top scope and `$a::b::x` (or `$::a::b::x`) reads
    /// the scope of the evaluated class `a::b`; plain names walk the parent
    /// chain.
    fn variable(&self, name: &str, scope: ScopeId, location: &Location) -> EvalResult<Value> {
        let anchored = name.strip_prefix(NAMESPACE_SEPARATOR);
        let path = anchored.unwrap_or(name);
        let found = if let Some((class, variable)) = path.rsplit_once(NAMESPACE_SEPARATOR) {
            self.class_scopes
                .get(&class.to_lowercase())
                .and_then(|&class_scope| self.scopes.local_variable(class_scope, variable))
        } else if let Some(global) = anchored {
            self.scopes.local_variable(ScopeId::TOP, global)
        } else {
            self.scopes.resolve_variable(scope, name)
        };

        match found {
            Some(value) => Ok(value.clone()),
            None if self.config.strict_variables => Err(EvalError::UndefinedVariable {
                variable: name.to_string(),
                location: location.clone(),
            }),
            None => Ok(Value::Undef),
        }
    }

    /// Build `Type[title]` references
    ///
    /// Class titles are qualified through the current scope and the class
    /// is evaluated if it has not been yet; define types are qualified
    /// through the scope's namespace. The reference names the definition
    /// visible where it was written.
    fn reference(&mut self, type_name: &str, titles: &'a [Expr], scope: ScopeId) -> EvalResult<Value> {
        let collection = self.collection;
        let type_key = type_name.to_lowercase();
        let mut references = Vec::new();

        for title_expr in titles {
            let value = self.evaluate(title_expr, scope)?;
            for item in value.flatten() {
                let title = item.to_string();
                let reference = if type_key == "class" {
                    match self.scopes.qualify_class(scope, &title, collection) {
                        Some(class) => {
                            self.evaluate_class(class, None, scope, &title_expr.location)?;
                            ResourceRef::class(&class.name)
                        }
                        None => ResourceRef::class(&title),
                    }
                } else {
                    match collection.find_define(&type_key, self.scopes.namespace(scope)) {
                        Some(define) => ResourceRef::new(&define.name, title),
                        None => ResourceRef::new(type_name, title),
                    }
                };
                references.push(reference);
            }
        }

        Ok(match references.len() {
            1 => Value::Reference(references.remove(0)),
            _ => Value::Array(references.into_iter().map(Value::Reference).collect()),
        })
    }

    // ==================== FINISH ====================

    /// Turn recorded relationships into edges and finish every resource
    fn finish(&mut self) -> EvalResult<()> {
        let mut pending = std::mem::take(&mut self.relationships);
        for resource in self.catalog.resources() {
            for (metaparameter, kind, outgoing) in RELATIONSHIP_METAPARAMETERS {
                let Some(value) = resource.parameter(metaparameter) else {
                    continue;
                };
                for item in value.flatten() {
                    let other = as_reference(item, &resource.location)?;
                    let (source, target) = if outgoing {
                        (resource.reference.clone(), other)
                    } else {
                        (other, resource.reference.clone())
                    };
                    pending.push(Relationship {
                        source,
                        target,
                        kind,
                        location: resource.location.clone(),
                    });
                }
            }
        }

        for relationship in pending {
            for endpoint in [&relationship.source, &relationship.target] {
                if !self.catalog.contains(endpoint) {
                    return Err(EvalError::UnresolvedReference {
                        reference: endpoint.to_string(),
                        location: relationship.location.clone(),
                    });
                }
            }
            self.catalog
                .add_edge(relationship.source, relationship.target, relationship.kind)?;
        }

        let registry = self.registry;
        let scopes = &self.scopes;
        for resource in self.catalog.resources_mut() {
            if resource.finished {
                continue;
            }
            if let Some(descriptor) = registry.get(resource.type_name()) {
                if !resource.parameters.contains_key(&descriptor.namevar) {
                    let title = Value::from(resource.title().to_string());
                    resource.set_parameter(descriptor.namevar.clone(), title);
                }
                if let Some(parameter) = resource
                    .parameters
                    .keys()
                    .find(|name| !is_metaparameter(name) && !descriptor.accepts(name))
                {
                    return Err(EvalError::InvalidParameter {
                        resource: resource.reference.clone(),
                        parameter: parameter.clone(),
                        location: resource.location.clone(),
                    });
                }
            }
            tag_resource(resource, scopes);
            resource.finished = true;
        }
        Ok(())
    }
}

/// Tag with the type, every enclosing class and any `tag` values
fn tag_resource(resource: &mut Resource, scopes: &ScopeArena) {
    let type_name = resource.type_name().to_lowercase();
    tag_name(resource, &type_name);
    for scope in scopes.ancestors(resource.scope) {
        let owner = scopes.owner(scope);
        if owner.is_class() && owner.title != "Main" {
            tag_name(resource, &owner.title.to_lowercase());
        }
    }
    if let Some(tags) = resource.parameter("tag").cloned() {
        for tag in tags.flatten() {
            resource.tag(&tag.to_string());
        }
    }
}

/// Tag a qualified name and each of its segments
fn tag_name(resource: &mut Resource, name: &str) {
    resource.tag(name);
    if name.contains(NAMESPACE_SEPARATOR) {
        for segment in name.split(NAMESPACE_SEPARATOR) {
            resource.tag(segment);
        }
    }
}

fn as_reference(value: &Value, location: &Location) -> EvalResult<ResourceRef> {
    match value {
        Value::Reference(reference) => Ok(reference.clone()),
        Value::String(text) => text.parse().map_err(|_| EvalError::UnresolvedReference {
            reference: text.clone(),
            location: location.clone(),
        }),
        other => Err(EvalError::UnresolvedReference {
            reference: other.to_string(),
            location: location.clone(),
        }),
    }
}

fn builtin_location() -> Location {
    Location::new("<builtin>", 0, 0)
}
