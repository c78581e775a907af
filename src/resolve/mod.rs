//! Reference resolution for select and index expressions.
//!
//! `aws_instance.web.arn`, `var.cfg.name`, `each.value.port` and friends are
//! resolved to the declarations they point at. When configuration text does
//! not declare the selected property but the provider schema (or a type
//! constraint) says it exists, a synthetic element stands in for it.

mod element;

pub use element::{qualified_name, Element, SyntheticProperty};

use std::collections::{BTreeMap, HashSet};

use crate::frontend::ast::{is_star_or_number, Ast, Dialect, Expr, Literal, NodeId, NodeKind};
use crate::frontend::core::Project;
use crate::infer::for_each::{dynamic_iterator, each_container, for_binding, is_for_variable};
use crate::module::{ModuleScope, Variable};
use crate::schema::{SchemaItem, SchemaRef, TypeModel, HAS_DYNAMIC_ATTRIBUTES};
use crate::types::Type;

const DEFAULT_MAX_DEPTH: usize = 64;

pub struct Resolver<'a> {
    project: &'a Project,
    model: &'a TypeModel,
    ignored: HashSet<String>,
    max_depth: usize,
}

/// State of one top-level resolution.
struct Walk {
    fake: bool,
    visited: HashSet<(Element, String)>,
    resolving: Vec<NodeId>,
}

impl Walk {
    fn new(fake: bool) -> Self {
        Self {
            fake,
            visited: HashSet::new(),
            resolving: Vec::new(),
        }
    }
}

impl<'a> Resolver<'a> {
    pub fn new(project: &'a Project, model: &'a TypeModel) -> Self {
        Self {
            project,
            model,
            ignored: HashSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Qualified names (e.g. `resource.aws_instance.tags`) under which any
    /// selected name resolves to a synthetic property.
    pub fn with_ignored_references<I, S>(mut self, fqns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(fqns.into_iter().map(Into::into));
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn ast(&self) -> &'a Ast {
        self.project.ast()
    }

    /// Declarations the select or index expression `node` refers to.
    ///
    /// With `include_fake` unset, synthetic elements are dropped from the
    /// result. Results are deduplicated and keep discovery order.
    pub fn resolve(&self, node: NodeId, include_fake: bool) -> Vec<Element> {
        let mut walk = Walk::new(include_fake);
        let found = self.resolve_in(&mut walk, node);
        finish(found, include_fake)
    }

    /// Declarations any reference expression points at: the variable of an
    /// enclosing `for`, or whatever a select/index chain resolves to.
    pub fn references(&self, expr: NodeId, include_fake: bool) -> Vec<Element> {
        let mut walk = Walk::new(include_fake);
        let found = self.references_in(&mut walk, expr);
        finish(found, include_fake)
    }

    fn references_in(&self, walk: &mut Walk, expr: NodeId) -> Vec<Element> {
        let ast = self.ast();
        match ast.expr(expr) {
            Some(Expr::Identifier(name)) => for_binding(ast, expr, name)
                .map(|b| vec![Element::Node(b.var)])
                .unwrap_or_default(),
            Some(Expr::Parenthesized(Some(inner))) => self.references_in(walk, *inner),
            Some(Expr::Select { .. } | Expr::Index { .. }) => self.resolve_in(walk, expr),
            _ => Vec::new(),
        }
    }

    fn resolve_in(&self, walk: &mut Walk, node: NodeId) -> Vec<Element> {
        let ast = self.ast();
        if walk.resolving.contains(&node) || walk.resolving.len() >= self.max_depth {
            log::debug!("stopping resolution of {}", ast.text(node));
            return Vec::new();
        }
        walk.resolving.push(node);
        let found = match ast.expr(node) {
            Some(Expr::Select { from, field }) => match ast.field_text(*field) {
                Some(name) => self.resolve_select(walk, node, *from, &name),
                None => Vec::new(),
            },
            Some(Expr::Index { from, index }) => match ast.expr(*index) {
                Some(Expr::Literal(Literal::String(key))) => {
                    self.resolve_select(walk, node, *from, key)
                }
                _ => self.references_in(walk, *from),
            },
            _ => Vec::new(),
        };
        walk.resolving.pop();
        found
    }

    fn resolve_select(&self, walk: &mut Walk, node: NodeId, from: NodeId, name: &str) -> Vec<Element> {
        let ast = self.ast();
        if ast.dialect(node) == Dialect::Terraform {
            if let Some(found) = self.scoped(node, from, name) {
                return found;
            }
        }
        // `.*`, `[*]` and numeric hops select from every element alike.
        if is_star_or_number(name) {
            return self.references_in(walk, from);
        }

        let indexed = matches!(ast.expr(from), Some(Expr::Index { .. }));
        let mut found = Vec::new();
        for left in self.references_in(walk, from) {
            if indexed {
                if let Some(items) = self.array_value(&left) {
                    let objects: Vec<NodeId> = items
                        .iter()
                        .copied()
                        .filter(|i| matches!(ast.expr(*i), Some(Expr::Object(_))))
                        .collect();
                    if !objects.is_empty() {
                        for object in objects {
                            self.collect(walk, Element::Node(object), name, &mut found);
                        }
                        continue;
                    }
                    if let Some(first) = items.first() {
                        self.collect(walk, Element::Node(*first), name, &mut found);
                        continue;
                    }
                }
            }
            self.collect(walk, left, name, &mut found);
        }
        found
    }

    /// Elements of an attribute whose value is an array literal.
    fn array_value(&self, element: &Element) -> Option<&'a [NodeId]> {
        let ast = self.ast();
        let attr = ast.attribute(element.node()?)?;
        match ast.expr(attr.value)? {
            Expr::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Selections whose left side is a Terraform scope name, such as
    /// `var.x`, `local.x`, `aws_instance.web` or `data.aws_ami.ubuntu`.
    fn scoped(&self, node: NodeId, from: NodeId, name: &str) -> Option<Vec<Element>> {
        let ast = self.ast();
        let scope = ModuleScope::of(self.project, node);
        match ast.expr(from)? {
            Expr::Identifier(head) if for_binding(ast, from, head).is_none() => {
                Some(self.scope_shortcut(node, scope, head, name))
            }
            Expr::Select { from: inner, field }
                if ast.identifier(*inner) == Some("data")
                    && for_binding(ast, *inner, "data").is_none() =>
            {
                let type_name = ast.field_text(*field)?;
                Some(nodes(scope.find_data_source(Some(&type_name), Some(name))))
            }
            _ => None,
        }
    }

    fn scope_shortcut(&self, node: NodeId, scope: ModuleScope<'_>, head: &str, name: &str) -> Vec<Element> {
        let ast = self.ast();
        match head {
            "var" => scope
                .find_variables(name)
                .into_iter()
                .map(|v| Element::Node(v.block))
                .collect(),
            "local" => scope
                .find_local(name)
                .map(|(_, attr)| vec![Element::Node(attr)])
                .unwrap_or_default(),
            "module" => nodes(scope.find_modules(name)),
            "each" if name == "value" => each_container(ast, node)
                .and_then(|value| ast.parent(value))
                .map(Element::Node)
                .into_iter()
                .collect(),
            "data" | "each" | "count" | "path" | "terraform" | "self" => Vec::new(),
            other => match dynamic_iterator(ast, node, other) {
                Some(dynamic) if name == "value" => ast
                    .find_attribute(dynamic, "for_each")
                    .map(Element::Node)
                    .into_iter()
                    .collect(),
                Some(_) => Vec::new(),
                None => nodes(scope.find_resources(Some(other), Some(name))),
            },
        }
    }

    fn collect(&self, walk: &mut Walk, element: Element, name: &str, found: &mut Vec<Element>) {
        if !walk.visited.insert((element.clone(), name.to_string())) {
            return;
        }
        let node = match &element {
            Element::Synthetic(s) => return self.collect_in_synthetic(walk, &element, s, name, found),
            Element::Node(n) => *n,
        };

        let ast = self.ast();
        match ast.kind(node) {
            NodeKind::Block(_) => self.collect_in_block(walk, node, name, found),
            NodeKind::Attribute(_) => self.collect_in_attribute(walk, node, name, found),
            NodeKind::Expr(Expr::Identifier(_)) if is_for_variable(ast, node) => {
                let Some(intro) = ast.parent(node) else {
                    return;
                };
                if let Some(fi) = ast.for_intro(intro) {
                    let block = ast.enclosing_block(intro);
                    self.resolve_for_each_value(walk, fi.container, name, block, found);
                }
            }
            NodeKind::Expr(Expr::Object(_)) => {
                self.push_members(node, name, found);
            }
            NodeKind::Expr(Expr::Array(items)) => {
                for item in items {
                    match ast.expr(*item) {
                        Some(Expr::Object(_)) => self.collect(walk, Element::Node(*item), name, found),
                        Some(Expr::Select { .. } | Expr::Index { .. }) => {
                            for r in self.references_in(walk, *item) {
                                self.collect(walk, r, name, found);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    /// Attribute `name` of a block or object, else nested blocks whose
    /// identifier or a label is `name`.
    fn push_members(&self, container: NodeId, name: &str, found: &mut Vec<Element>) -> bool {
        let ast = self.ast();
        if let Some(attr) = ast.find_attribute(container, name) {
            found.push(Element::Node(attr));
            return true;
        }
        let before = found.len();
        found.extend(
            ast.nested_blocks(container)
                .filter(|b| {
                    ast.block(*b)
                        .is_some_and(|b| b.identifier == name || b.labels.iter().any(|l| l == name))
                })
                .map(Element::Node),
        );
        found.len() > before
    }

    fn collect_in_block(&self, walk: &mut Walk, block: NodeId, name: &str, found: &mut Vec<Element>) {
        let ast = self.ast();
        let element = Element::Node(block);
        let fqn = qualified_name(ast, &element);
        if fqn.as_ref().is_some_and(|f| self.ignored.contains(f)) {
            if walk.fake {
                found.push(Element::synthetic(name, &element, false));
            }
            return;
        }
        let Some(b) = ast.block(block) else {
            return;
        };

        let root = ast.is_root_block(block);
        match b.identifier.as_str() {
            "module" if root => {
                match ModuleScope::of(self.project, block).as_module_block(block) {
                    Some(module) => found.extend(nodes(module.find_outputs(name))),
                    None if walk.fake => found.push(Element::synthetic(name, &element, false)),
                    None => {}
                }
                return;
            }
            "variable" if root => return self.collect_in_variable(walk, block, name, found),
            "dynamic" => return,
            "output" if root => {
                match ast.attribute_value(block, "value") {
                    None if walk.fake => found.push(Element::synthetic(name, &element, false)),
                    None => {}
                    Some(value) => match ast.expr(value) {
                        Some(Expr::Object(_) | Expr::Array(_)) => {
                            self.collect(walk, Element::Node(value), name, found)
                        }
                        _ => {
                            for r in self.references_in(walk, value) {
                                self.collect(walk, r, name, found);
                            }
                        }
                    },
                }
                return;
            }
            _ => {}
        }

        if self.push_members(block, name, found) {
            return;
        }
        if let Some(SchemaRef::Block(schema)) = fqn.as_deref().and_then(|f| self.model.get_by_fqn(f)) {
            if schema.computed {
                found.push(Element::synthetic(name, &element, false));
                return;
            }
        }
        if walk.fake {
            if let Some(schema) = self.model.block_schema(ast, block) {
                add_block_property(&schema.properties, name, &element, found, false);
            }
        }
    }

    fn collect_in_variable(&self, walk: &mut Walk, block: NodeId, name: &str, found: &mut Vec<Element>) {
        let ast = self.ast();
        let element = Element::Node(block);
        let variable = Variable::new(ast, block);
        let before = found.len();
        if let Some(default) = variable.default_value() {
            if matches!(ast.expr(default), Some(Expr::Object(_) | Expr::Array(_))) {
                self.collect(walk, Element::Node(default), name, found);
            }
        }
        if found.len() > before {
            return;
        }
        match resolve_in_type(variable.declared_type().as_ref(), &element, name) {
            Some(e) => found.push(e),
            None if walk.fake => found.push(Element::synthetic(name, &element, true)),
            None => {}
        }
    }

    fn collect_in_attribute(&self, walk: &mut Walk, node: NodeId, name: &str, found: &mut Vec<Element>) {
        let ast = self.ast();
        let Some(attr) = ast.attribute(node) else {
            return;
        };
        let value = attr.value;
        let parent = ast.parent(node).filter(|p| ast.block(*p).is_some());
        if attr.key == "for_each" && parent.is_some() {
            return self.resolve_for_each_value(walk, value, name, parent, found);
        }

        if self.in_locals(node) {
            match ast.expr(value) {
                Some(Expr::Object(_) | Expr::Array(_)) => {
                    self.collect(walk, Element::Node(value), name, found)
                }
                Some(Expr::ForArray { expr, .. }) => self.collect(walk, Element::Node(*expr), name, found),
                _ if attr.key == name => found.push(Element::Node(node)),
                _ if is_variable_reference(ast, value) => {
                    self.resolve_for_each_value(walk, value, name, None, found)
                }
                _ => {
                    for r in self.references_in(walk, value) {
                        self.collect(walk, r, name, found);
                    }
                }
            }
            return;
        }

        if matches!(ast.expr(value), Some(Expr::Object(_))) {
            if let Some(p) = ast.find_attribute(value, name) {
                found.push(Element::Node(p));
            }
        } else if walk.fake {
            let element = Element::Node(node);
            let schema = qualified_name(ast, &element).and_then(|f| self.model.get_by_fqn(&f));
            if let Some(SchemaRef::Block(schema)) = schema {
                add_block_property(&schema.properties, name, &element, found, false);
            }
        }
    }

    fn in_locals(&self, node: NodeId) -> bool {
        let ast = self.ast();
        ast.root_block_of(node)
            .and_then(|b| ast.block(b))
            .is_some_and(|b| b.identifier == "locals")
    }

    fn collect_in_synthetic(
        &self,
        walk: &mut Walk,
        element: &Element,
        synthetic: &SyntheticProperty,
        name: &str,
        found: &mut Vec<Element>,
    ) {
        if let Some(t) = &synthetic.r#type {
            match resolve_in_type(Some(t), element, name) {
                Some(e) => found.push(e),
                None if walk.fake => found.push(Element::synthetic(name, element, true)),
                None => {}
            }
            return;
        }
        if !walk.fake {
            return;
        }
        if synthetic.dynamic {
            found.push(Element::synthetic(name, element, true));
            return;
        }
        let Some(fqn) = qualified_name(self.ast(), element) else {
            return;
        };
        match self.model.get_by_fqn(&fqn) {
            Some(SchemaRef::Block(b)) if b.computed => {
                add_block_property(&b.properties, name, element, found, true)
            }
            Some(SchemaRef::Property(p)) if p.computed => {
                if matches!(p.r#type, Type::Any | Type::Map(_) | Type::Object(_)) {
                    found.push(Element::synthetic(name, element, false));
                }
            }
            _ if self.ignored.contains(&fqn) => found.push(Element::synthetic(name, element, false)),
            _ => {}
        }
    }

    /// Select `name` from the elements a `for_each` or `for` container
    /// iterates over.
    fn resolve_for_each_value(
        &self,
        walk: &mut Walk,
        value: NodeId,
        name: &str,
        block: Option<NodeId>,
        found: &mut Vec<Element>,
    ) {
        let ast = self.ast();
        match ast.expr(value) {
            Some(Expr::ForArray { expr: item, .. } | Expr::ForObject { value: item, .. }) => {
                if matches!(ast.expr(*item), Some(Expr::Object(_))) {
                    self.collect(walk, Element::Node(*item), name, found);
                }
            }
            Some(Expr::Array(_)) => self.collect(walk, Element::Node(value), name, found),
            Some(Expr::MethodCall { .. }) => {
                if let Some(block) = block.filter(|_| walk.fake) {
                    found.push(Element::synthetic(name, &Element::Node(block), false));
                }
            }
            Some(Expr::Object(_)) => {
                for attr in ast.attributes(value) {
                    if let Some(a) = ast.attribute(attr) {
                        self.collect(walk, Element::Node(a.value), name, found);
                    }
                }
            }
            _ if is_variable_reference(ast, value) => {
                for r in self.references_in(walk, value) {
                    if let Some(var) = r.node().filter(|n| is_root(ast, *n, "variable")) {
                        self.collect_from_variable_iterable(walk, var, name, found);
                    }
                }
            }
            _ => self.collect_from_for_each_value(walk, value, name, found),
        }
    }

    fn collect_from_variable_iterable(&self, walk: &mut Walk, block: NodeId, name: &str, found: &mut Vec<Element>) {
        let ast = self.ast();
        let variable = Variable::new(ast, block);
        if let Some(default) = variable.default_value() {
            match ast.expr(default) {
                Some(Expr::Object(items)) => {
                    for item in items {
                        self.collect(walk, Element::Node(*item), name, found);
                    }
                }
                Some(Expr::Array(_)) => self.collect(walk, Element::Node(default), name, found),
                _ => {}
            }
        }
        if let Some(e) = resolve_in_type(variable.declared_type().as_ref(), &Element::Node(block), name) {
            found.push(e);
        }
    }

    fn collect_from_for_each_value(&self, walk: &mut Walk, value: NodeId, name: &str, found: &mut Vec<Element>) {
        let ast = self.ast();
        for r in self.references_in(walk, value) {
            match self.value_container(walk, &r) {
                Some(c) if matches!(ast.expr(c), Some(Expr::Object(_))) => {
                    for item in ast.items(c) {
                        self.collect(walk, Element::Node(*item), name, found);
                    }
                }
                Some(c) if matches!(ast.expr(c), Some(Expr::Array(_))) => {
                    self.collect(walk, Element::Node(c), name, found)
                }
                _ => self.collect(walk, r, name, found),
            }
        }
    }

    /// Literal container behind a reference, following `for` variables back
    /// to what they iterate.
    fn value_container(&self, walk: &mut Walk, element: &Element) -> Option<NodeId> {
        let ast = self.ast();
        let node = element.node()?;
        let is_container = |n: NodeId| matches!(ast.expr(n), Some(Expr::Object(_) | Expr::Array(_)));
        match ast.kind(node) {
            NodeKind::Expr(Expr::Identifier(_)) if is_for_variable(ast, node) => {
                let container = ast.parent(node).and_then(|i| ast.for_intro(i))?.container;
                self.references_in(walk, container)
                    .iter()
                    .find_map(|c| self.value_container(walk, c))
            }
            NodeKind::Block(_) if is_root(ast, node, "variable") => Some(node),
            NodeKind::Attribute(a) => is_container(a.value).then_some(a.value),
            _ => is_container(node).then_some(node),
        }
    }
}

fn finish(found: Vec<Element>, include_fake: bool) -> Vec<Element> {
    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|e| include_fake || !e.is_synthetic())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

fn nodes(ids: Vec<NodeId>) -> Vec<Element> {
    ids.into_iter().map(Element::Node).collect()
}

fn is_root(ast: &Ast, node: NodeId, identifier: &str) -> bool {
    ast.is_root_block(node) && ast.block(node).is_some_and(|b| b.identifier == identifier)
}

/// `var.NAME` or `var.NAME[i]`.
fn is_variable_reference(ast: &Ast, expr: NodeId) -> bool {
    let expr = match ast.expr(expr) {
        Some(Expr::Index { from, .. }) => *from,
        _ => expr,
    };
    match ast.expr(expr) {
        Some(Expr::Select { from, .. }) => ast.identifier(*from) == Some("var"),
        _ => false,
    }
}

/// Synthetic property for `name` of a block with schema `properties`.
fn add_block_property(
    properties: &BTreeMap<String, SchemaItem>,
    name: &str,
    owner: &Element,
    found: &mut Vec<Element>,
    add_fake: bool,
) {
    match properties.get(name) {
        Some(item) => {
            let dynamic = matches!(item, SchemaItem::Property(p) if p.r#type == Type::Any);
            found.push(Element::synthetic(name, owner, dynamic));
        }
        None if properties.contains_key(HAS_DYNAMIC_ATTRIBUTES) => {
            found.push(Element::synthetic(name, owner, true))
        }
        None if add_fake => found.push(Element::synthetic(name, owner, false)),
        None => {}
    }
}

/// Field `name` of an object type, of the first object in a tuple, or of the
/// object elements of a collection.
fn resolve_in_type(t: Option<&Type>, owner: &Element, name: &str) -> Option<Element> {
    let object_field = |t: &Type| match t {
        Type::Object(Some(fields)) => fields.get(name).cloned(),
        _ => None,
    };
    let field = match t? {
        t @ Type::Object(_) => object_field(t),
        Type::Tuple(items) => items.iter().find_map(|i| object_field(i)),
        Type::List(Some(e)) | Type::Set(Some(e)) | Type::Map(Some(e)) => object_field(e),
        _ => None,
    }?;
    Some(Element::typed(name, owner, field))
}
