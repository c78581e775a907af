//! Type inference over the node arena.
//!
//! [`TypeEngine::infer`] is total: malformed or unresolvable input yields
//! `Type::Invalid`, `Type::Any` or `None`, never an error. Results are
//! memoized in a [`TypeCache`] against the project revision.

mod cache;
pub mod for_each;

pub use cache::{CacheStats, TypeCache};

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::frontend::ast::{Ast, Dialect, Expr, Literal, NodeId, NodeKind, Operator};
use crate::frontend::core::Project;
use crate::functions::FunctionTable;
use crate::module::{ModuleScope, Variable};
use crate::schema::TypeModel;
use crate::types::{common_supertype, ModuleType, Type};
use for_each::{BindingRole, ForBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Nested inference steps allowed before giving up with `Any`.
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

/// Infers expression types for one project snapshot.
pub struct TypeEngine<'a> {
    project: &'a Project,
    model: &'a TypeModel,
    functions: &'a FunctionTable,
    cache: &'a TypeCache,
    options: EngineOptions,
    cancel: Option<Arc<AtomicBool>>,
}

/// State of one top-level `infer` call.
#[derive(Default)]
struct InferCx {
    in_progress: HashSet<NodeId>,
    depth: usize,
    /// Set when a result was truncated (cycle, depth or cancellation);
    /// truncated results are not cached.
    cut: bool,
}

impl<'a> TypeEngine<'a> {
    pub fn new(
        project: &'a Project,
        model: &'a TypeModel,
        functions: &'a FunctionTable,
        cache: &'a TypeCache,
    ) -> Self {
        Self {
            project,
            model,
            functions,
            cache,
            options: EngineOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Once `flag` is raised, remaining steps return `Any` without caching.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn model(&self) -> &'a TypeModel {
        self.model
    }

    fn ast(&self) -> &'a Ast {
        self.project.ast()
    }

    /// Type of `node`, or `None` when the node needs no type.
    pub fn infer(&self, node: NodeId) -> Option<Type> {
        let mut cx = InferCx::default();
        self.infer_in(&mut cx, node)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn infer_in(&self, cx: &mut InferCx, node: NodeId) -> Option<Type> {
        if self.cancelled() {
            cx.cut = true;
            return Some(Type::Any);
        }
        let revision = self.project.revision();
        if let Some(hit) = self.cache.get(node, revision) {
            return hit;
        }
        if cx.in_progress.contains(&node) {
            log::debug!("type cycle through {}", self.ast().text(node));
            cx.cut = true;
            return Some(Type::Any);
        }
        if cx.depth >= self.options.max_depth {
            log::warn!(
                "type inference deeper than {} steps at {}",
                self.options.max_depth,
                self.ast().text(node)
            );
            cx.cut = true;
            return Some(Type::Any);
        }

        cx.in_progress.insert(node);
        cx.depth += 1;
        let outer_cut = std::mem::replace(&mut cx.cut, false);
        let result = self.compute(cx, node);
        let cut = cx.cut;
        cx.cut = outer_cut || cut;
        cx.depth -= 1;
        cx.in_progress.remove(&node);

        if !cut {
            self.cache.insert(node, revision, result.clone());
        }
        result
    }

    fn compute(&self, cx: &mut InferCx, node: NodeId) -> Option<Type> {
        match self.ast().kind(node) {
            NodeKind::Expr(expr) => self.infer_expr(cx, node, expr),
            NodeKind::Attribute(attr) => self.infer_in(cx, attr.value),
            NodeKind::Block(_) => self.infer_block(cx, node),
            NodeKind::ForIntro(_) => None,
        }
    }

    fn infer_expr(&self, cx: &mut InferCx, node: NodeId, expr: &'a Expr) -> Option<Type> {
        match expr {
            Expr::Literal(literal) => Some(match literal {
                Literal::String(_) | Literal::Heredoc(_) => Type::String,
                Literal::Number(_) => Type::Number,
                Literal::Bool(_) => Type::Bool,
                Literal::Null => Type::Null,
            }),
            Expr::Template(_) => Some(Type::String),
            Expr::Star => None,
            Expr::Identifier(name) => self.infer_identifier(cx, node, name),
            Expr::Parenthesized(inner) => match inner {
                Some(inner) => self.infer_in(cx, *inner),
                None => Some(Type::Any),
            },
            Expr::Unary { op, .. } => match op {
                Operator::Plus | Operator::Minus => Some(Type::Number),
                Operator::Not => Some(Type::Bool),
                other => self.defect(node, "unary", *other),
            },
            Expr::Binary { op, .. } => match op {
                Operator::Plus | Operator::Minus | Operator::Mul | Operator::Div | Operator::Mod => {
                    Some(Type::Number)
                }
                Operator::Eq
                | Operator::NotEq
                | Operator::Less
                | Operator::LessEq
                | Operator::Greater
                | Operator::GreaterEq
                | Operator::And
                | Operator::Or => Some(Type::Bool),
                other => self.defect(node, "binary", *other),
            },
            Expr::Conditional {
                then, otherwise, ..
            } => {
                let l = self.infer_in(cx, *then);
                let r = self.infer_in(cx, *otherwise);
                conditional_type(l, r)
            }
            Expr::Array(items) => Some(self.infer_array(cx, items)),
            Expr::Object(items) => Some(self.infer_object(cx, items)),
            Expr::MethodCall { name, .. } => {
                Some(self.functions.return_type(self.ast().dialect(node), name))
            }
            Expr::ForArray { expr, .. } => Some(Type::List(self.infer_in(cx, *expr).map(Box::new))),
            Expr::ForObject {
                value, grouping, ..
            } => {
                let value = self.infer_in(cx, *value);
                let value = if *grouping {
                    Some(Type::List(value.map(Box::new)))
                } else {
                    value
                };
                Some(Type::Map(value.map(Box::new)))
            }
            Expr::Select { from, field } => self.infer_select(cx, node, *from, *field),
            Expr::Index { from, index } => self.infer_index(cx, node, *from, *index),
        }
    }

    fn defect(&self, node: NodeId, kind: &str, op: Operator) -> Option<Type> {
        log::error!(
            "unexpected {kind} operator `{}` in {}",
            op.as_str(),
            self.ast().text(node)
        );
        None
    }

    fn infer_array(&self, cx: &mut InferCx, items: &[NodeId]) -> Type {
        if items.is_empty() {
            return Type::List(None);
        }
        let mut distinct: Vec<Type> = Vec::new();
        for item in items {
            let t = self.infer_in(cx, *item).unwrap_or(Type::Any);
            if !distinct.contains(&t) {
                distinct.push(t);
            }
        }
        let element = if distinct.len() == 1 {
            distinct.remove(0)
        } else {
            common_supertype(&distinct).unwrap_or(Type::Any)
        };
        Type::list(element)
    }

    /// Object of attribute types, then nested blocks by name.
    fn infer_object(&self, cx: &mut InferCx, items: &[NodeId]) -> Type {
        let ast = self.ast();
        let mut fields = BTreeMap::new();
        let mut blocks = Vec::new();
        for item in items {
            match ast.kind(*item) {
                NodeKind::Attribute(attr) => {
                    let t = self.infer_in(cx, attr.value).unwrap_or(Type::Any);
                    fields.insert(attr.key.clone(), t);
                }
                NodeKind::Block(block) => blocks.push((block.identifier.clone(), *item)),
                _ => {}
            }
        }
        for (name, block) in blocks {
            let t = self.infer_in(cx, block).unwrap_or(Type::Any);
            fields.entry(name).or_insert(t);
        }
        Type::Object(Some(fields))
    }

    fn infer_block(&self, cx: &mut InferCx, node: NodeId) -> Option<Type> {
        let ast = self.ast();
        let block = ast.block(node)?;
        if ast.is_root_block(node) && ast.dialect(node) == Dialect::Terraform {
            match block.identifier.as_str() {
                "resource" => {
                    let type_name = block.labels.first()?;
                    return Some(Type::Resource(self.model.resource_type(type_name)));
                }
                "data" => {
                    let type_name = block.labels.first()?;
                    return Some(Type::DataSource(self.model.data_source_type(type_name)));
                }
                "module" => return Some(self.module_block_type(cx, node)),
                "variable" => {
                    return Some(
                        Variable::new(ast, node).combined_type_with(|n| self.infer_in(cx, n)),
                    )
                }
                "output" => {
                    return Some(
                        ast.attribute_value(node, "value")
                            .and_then(|v| self.infer_in(cx, v))
                            .unwrap_or(Type::Any),
                    )
                }
                _ => {}
            }
        }
        Some(self.infer_object(cx, &block.items))
    }

    /// Type of a `module` block, without `count`/`for_each` wrapping.
    fn module_block_type(&self, cx: &mut InferCx, block: NodeId) -> Type {
        let name = self.ast().block_label(block, 0).unwrap_or_default();
        match ModuleScope::of(self.project, block).as_module_block(block) {
            Some(module) => module.module_type_with(name, &mut |n| self.infer_in(cx, n)),
            None => Type::Module(Arc::new(ModuleType {
                name: name.to_string(),
                fields: None,
            })),
        }
    }

    /// Counted blocks are lists of instances, `for_each` blocks maps.
    fn wrap_instances(&self, block: NodeId, t: Type) -> Type {
        let ast = self.ast();
        if ast.find_attribute(block, "count").is_some() {
            Type::list(t)
        } else if ast.find_attribute(block, "for_each").is_some() {
            Type::map(t)
        } else {
            t
        }
    }

    fn infer_identifier(&self, cx: &mut InferCx, node: NodeId, name: &str) -> Option<Type> {
        let ast = self.ast();
        if let Some(attr) = ast.parent(node).and_then(|p| ast.attribute(p)) {
            if attr.key_node == Some(node) {
                return None;
            }
        }
        let binding = for_each::for_binding(ast, node, name).or_else(|| {
            let intro = ast.parent(node)?;
            let fi = ast.for_intro(intro)?;
            let role = if fi.value_var == node {
                BindingRole::Value
            } else {
                BindingRole::Key
            };
            Some(ForBinding {
                intro,
                var: node,
                role,
                container: fi.container,
            })
        });
        match binding {
            Some(binding) => {
                let container = self.infer_in(cx, binding.container).unwrap_or(Type::Any);
                Some(match binding.role {
                    BindingRole::Value => for_each::iterated_value_type(&container),
                    BindingRole::Key => for_each::iterated_key_type(&container),
                })
            }
            None => Some(Type::Identifier),
        }
    }

    fn infer_select(
        &self,
        cx: &mut InferCx,
        node: NodeId,
        from: NodeId,
        field: NodeId,
    ) -> Option<Type> {
        let ast = self.ast();
        let from_type = self.infer_in(cx, from);
        let Some(name) = ast.field_text(field) else {
            return Some(Type::Any);
        };
        if name == "*" {
            return Some(self.splat(node, from_type));
        }
        if let Ok(index) = name.parse::<usize>() {
            return Some(element_at(from_type, Some(index)));
        }
        if ast.dialect(node) == Dialect::Terraform {
            if let Some(t) = self.scoped(cx, node, from, &name) {
                return Some(t);
            }
        }
        Some(self.select_from(from, from_type, &name))
    }

    fn infer_index(
        &self,
        cx: &mut InferCx,
        node: NodeId,
        from: NodeId,
        index: NodeId,
    ) -> Option<Type> {
        let from_type = self.infer_in(cx, from);
        Some(match self.ast().expr(index) {
            Some(Expr::Star) => self.splat(node, from_type),
            Some(Expr::Literal(Literal::String(key))) => self.select_from(from, from_type, key),
            Some(Expr::Literal(Literal::Number(n))) => element_at(from_type, n.parse().ok()),
            _ => element_at(from_type, None),
        })
    }

    /// Normalizes the base of a splat to a list.
    fn splat(&self, node: NodeId, from_type: Option<Type>) -> Type {
        let Some(t) = from_type else {
            return Type::Invalid;
        };
        match t {
            Type::Set(e) => Type::List(e),
            Type::List(_) | Type::Tuple(_) => t,
            t if t.is_primitive() || matches!(t, Type::Object(_)) => Type::list(t),
            t if t.is_block_type() && self.ast().dialect(node) == Dialect::Terraform => {
                Type::list(t)
            }
            _ => Type::Invalid,
        }
    }

    /// Whether `node` sits after a splat hop, so selections distribute over
    /// the splatted elements.
    fn is_splat(&self, mut node: NodeId) -> bool {
        let ast = self.ast();
        loop {
            match ast.expr(node) {
                Some(Expr::Select { from, field }) => {
                    if matches!(ast.expr(*field), Some(Expr::Star)) {
                        return true;
                    }
                    node = *from;
                }
                Some(Expr::Index { from, index }) => {
                    if matches!(ast.expr(*index), Some(Expr::Star)) {
                        return true;
                    }
                    node = *from;
                }
                _ => return false,
            }
        }
    }

    fn select_from(&self, from: NodeId, from_type: Option<Type>, name: &str) -> Type {
        let from_type = match from_type {
            None => return Type::Any,
            Some(Type::Invalid) => return Type::Invalid,
            Some(t) => t,
        };
        let select = |t: Option<&Type>| {
            t.unwrap_or(&Type::Any)
                .select_field(name)
                .unwrap_or(Type::Any)
        };
        if self.is_splat(from) {
            match &from_type {
                Type::List(e) => return Type::list(select(e.as_deref())),
                Type::Set(e) => return Type::set(select(e.as_deref())),
                _ => {}
            }
        }
        from_type.select_field(name).unwrap_or(Type::Any)
    }

    /// Terraform scope shortcuts: `var.`, `local.`, `module.`, `data.T.`,
    /// `path.`, `each.`, ... and first-level `TYPE.NAME` resources.
    fn scoped(&self, cx: &mut InferCx, node: NodeId, from: NodeId, name: &str) -> Option<Type> {
        let ast = self.ast();
        match ast.expr(from)? {
            Expr::Identifier(scope) if for_each::for_binding(ast, from, scope).is_none() => {
                Some(self.scope_shortcut(cx, node, scope, name))
            }
            Expr::Select { from: inner, field } if ast.identifier(*inner) == Some("data") => {
                let type_name = ast.field_text(*field)?;
                let module = ModuleScope::of(self.project, node);
                Some(
                    match module
                        .find_data_source(Some(&type_name), Some(name))
                        .first()
                    {
                        Some(block) => self.wrap_instances(
                            *block,
                            Type::DataSource(self.model.data_source_type(&type_name)),
                        ),
                        None => Type::Invalid,
                    },
                )
            }
            _ => None,
        }
    }

    fn scope_shortcut(&self, cx: &mut InferCx, node: NodeId, scope: &str, name: &str) -> Type {
        let ast = self.ast();
        let module = ModuleScope::of(self.project, node);
        match scope {
            "var" => match module.find_variables(name).first() {
                Some(v) if ast.is_descendant_of(node, v.block) => Type::Any,
                Some(v) => v.combined_type_with(|n| self.infer_in(cx, n)),
                None => Type::Any,
            },
            "local" => match module.find_local(name) {
                Some((_, attr)) => ast
                    .attribute(attr)
                    .and_then(|a| self.infer_in(cx, a.value))
                    .unwrap_or(Type::Any),
                None => Type::Invalid,
            },
            "module" => match module.find_modules(name).first() {
                Some(block) => {
                    let t = self.module_block_type(cx, *block);
                    self.wrap_instances(*block, t)
                }
                None => Type::Invalid,
            },
            // `data.TYPE`; the next hop picks the data source
            "data" => Type::Any,
            "path" | "terraform" => Type::String,
            "count" => match name {
                "index" => Type::Number,
                _ => Type::Invalid,
            },
            "each" => match name {
                "key" => Type::String,
                "value" => for_each::each_container(ast, node)
                    .and_then(|c| self.infer_in(cx, c))
                    .map_or(Type::Any, |c| for_each::iterated_value_type(&c)),
                _ => Type::Invalid,
            },
            "self" => Type::Any,
            _ => {
                if let Some(dynamic) = for_each::dynamic_iterator(ast, node, scope) {
                    let container = ast
                        .attribute_value(dynamic, "for_each")
                        .and_then(|c| self.infer_in(cx, c))
                        .unwrap_or(Type::Any);
                    return match name {
                        "key" => for_each::iterated_key_type(&container),
                        "value" => for_each::iterated_value_type(&container),
                        _ => Type::Invalid,
                    };
                }
                match module.find_resources(Some(scope), Some(name)).first() {
                    Some(block) => self.wrap_instances(
                        *block,
                        Type::Resource(self.model.resource_type(scope)),
                    ),
                    None => Type::Invalid,
                }
            }
        }
    }
}

/// `cond ? then : else`: a string "then" branch yields to the other branch.
pub fn conditional_type(then: Option<Type>, otherwise: Option<Type>) -> Option<Type> {
    match (then, otherwise) {
        (l, r) if l == r => l,
        (None, r) => r,
        (l, None) => l,
        (Some(Type::Any), _) | (_, Some(Type::Any)) => Some(Type::Any),
        (Some(Type::String), r) => r,
        (l, _) => l,
    }
}

/// Element type for a numeric selection; `index` picks a tuple element.
fn element_at(from_type: Option<Type>, index: Option<usize>) -> Type {
    match from_type {
        Some(Type::List(e) | Type::Set(e) | Type::Map(e) | Type::Optional(e)) => {
            e.map_or(Type::Any, |e| *e)
        }
        Some(Type::Tuple(items)) => index
            .and_then(|i| items.get(i).cloned())
            .or_else(|| common_supertype(&items))
            .unwrap_or(Type::Any),
        Some(t) if t.is_block_type() => t,
        Some(Type::Invalid) => Type::Invalid,
        Some(Type::Object(Some(fields))) => {
            common_supertype(&fields.into_values().collect::<Vec<_>>()).unwrap_or(Type::Any)
        }
        _ => Type::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::ModuleId;
    use crate::schema::{BlockSchema, PropertySchema, ResourceType};
    use crate::test_support::{p, MapLoader};

    struct Fixture {
        project: Project,
        model: TypeModel,
        functions: FunctionTable,
        cache: TypeCache,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let loader = MapLoader::new(files);
            let mut model = TypeModel::new();
            model.add_resource(ResourceType {
                type_name: "aws_instance".into(),
                provider: "aws".into(),
                block: BlockSchema::new("resource", 2).with([
                    PropertySchema::new("ami", Type::String).required().into(),
                    PropertySchema::new("arn", Type::String).computed().into(),
                ]),
            });
            Self {
                project: Project::load(&p("/m"), &loader).unwrap(),
                model,
                functions: FunctionTable::terraform(),
                cache: TypeCache::new(),
            }
        }

        fn engine(&self) -> TypeEngine<'_> {
            TypeEngine::new(&self.project, &self.model, &self.functions, &self.cache)
        }

        fn expr(&mut self, dialect: Dialect, text: &str) -> NodeId {
            let root = self.project.root();
            self.project.add_expression(root, dialect, text).unwrap()
        }

        fn infer(&mut self, text: &str) -> Option<Type> {
            let node = self.expr(Dialect::Terraform, text);
            self.engine().infer(node)
        }

        /// Value of `locals { name = ... }` in the root module.
        fn local(&self, name: &str) -> NodeId {
            let scope = ModuleScope::new(&self.project, self.project.root());
            let (_, attr) = scope.find_local(name).unwrap();
            self.project.ast().attribute(attr).unwrap().value
        }
    }

    fn empty() -> Fixture {
        Fixture::new(&[])
    }

    #[test]
    fn literals_and_operators() {
        let mut f = empty();
        assert_eq!(f.infer("\"x\""), Some(Type::String));
        assert_eq!(f.infer("1.5"), Some(Type::Number));
        assert_eq!(f.infer("TRUE"), Some(Type::Bool));
        assert_eq!(f.infer("null"), Some(Type::Null));
        assert_eq!(f.infer("\"a-${1}\""), Some(Type::String));
        assert_eq!(f.infer("-(3)"), Some(Type::Number));
        assert_eq!(f.infer("!true"), Some(Type::Bool));
        assert_eq!(f.infer("1 + 2 * 3"), Some(Type::Number));
        assert_eq!(f.infer("1 < 2 && true"), Some(Type::Bool));
        assert_eq!(f.infer("foo"), Some(Type::Identifier));
        assert_ne!(f.infer("foo"), Some(Type::String));
    }

    #[test]
    fn conditional_string_branch_yields() {
        let mut f = empty();
        assert_eq!(f.infer("true ? \"x\" : 3"), Some(Type::Number));
        assert_eq!(f.infer("true ? 3 : \"x\""), Some(Type::Number));
        assert_eq!(f.infer("true ? 3 : 4"), Some(Type::Number));
        assert_eq!(f.infer("true ? [] : 4"), Some(Type::List(None)));
        assert_eq!(
            conditional_type(None, Some(Type::Bool)),
            Some(Type::Bool)
        );
        assert_eq!(
            conditional_type(Some(Type::Any), Some(Type::Bool)),
            Some(Type::Any)
        );
    }

    #[test]
    fn collection_literals() {
        let mut f = empty();
        assert_eq!(f.infer("[]"), Some(Type::List(None)));
        assert_eq!(f.infer("[\"a\", \"b\"]"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("[\"a\", 1]"), Some(Type::list(Type::Any)));
        assert_eq!(f.infer("[\"a\", null]"), Some(Type::list(Type::String)));
        assert_eq!(
            f.infer("{ a = \"x\", b = 1 }"),
            Some(Type::object([("a", Type::String), ("b", Type::Number)]))
        );
        assert_eq!(
            f.infer("{ a = \"x\", b = 1 }.a"),
            Some(Type::String)
        );
        assert_eq!(f.infer("{ a = \"x\" }.missing"), Some(Type::Invalid));
    }

    #[test]
    fn for_expressions() {
        let mut f = empty();
        assert_eq!(
            f.infer("[for s in [\"a\"] : upper(s)]"),
            Some(Type::list(Type::String))
        );
        assert_eq!(
            f.infer("{ for s in [\"a\"] : s => 1 }"),
            Some(Type::map(Type::Number))
        );
        assert_eq!(
            f.infer("{ for s in [\"a\"] : s => 1... }"),
            Some(Type::map(Type::list(Type::Number)))
        );
        assert_eq!(
            f.infer("[for i, s in [\"a\"] : i]"),
            Some(Type::list(Type::Number))
        );
        assert_eq!(
            f.infer("[for k, v in { a = true } : k]"),
            Some(Type::list(Type::String))
        );
        assert_eq!(
            f.infer("[for k, v in { a = true } : v]"),
            Some(Type::list(Type::Bool))
        );
    }

    #[test]
    fn function_calls_by_dialect() {
        let mut f = empty();
        assert_eq!(f.infer("upper(\"x\")"), Some(Type::String));
        assert_eq!(f.infer("unknown_fn(1)"), Some(Type::Any));
        let node = f.expr(Dialect::Hcl, "upper(\"x\")");
        assert_eq!(f.engine().infer(node), Some(Type::Any));
    }

    #[test]
    fn variables_flow_through_selection() {
        let mut f = Fixture::new(&[(
            "/m/main.tf",
            r#"
variable "v" {
  type = list(string)
}

variable "s" {
  type = set(string)
}

variable "str" {
  type = string
}

variable "list" {
  type = list(object({ name = string }))
}

variable "tuple" {
  default = ["a", 1]
}

variable "self_ref" {
  default = var.self_ref
}
"#,
        )]);
        assert_eq!(f.infer("var.v[0]"), Some(Type::String));
        assert_eq!(f.infer("var.v.0"), Some(Type::String));
        assert_eq!(f.infer("var.s[*]"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("var.s.*"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("var.str[*]"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("var.v[*]"), Some(Type::list(Type::String)));
        assert_eq!(
            f.infer("[for x in var.list : x.name]"),
            Some(Type::list(Type::String))
        );
        assert_eq!(f.infer("var.list[*].name"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("var.missing"), Some(Type::Any));
        assert_eq!(f.infer("var.self_ref"), Some(Type::Any));
    }

    #[test]
    fn locals_and_cycles() {
        let mut f = Fixture::new(&[(
            "/m/main.tf",
            r#"
locals {
  m = { a = 1, b = "x" }
  a = local.b
  b = local.a
  t = ["x", 2]
}
"#,
        )]);
        assert_eq!(f.infer("local.m.b"), Some(Type::String));
        assert_eq!(f.infer("local.m"), Some(Type::object([("a", Type::Number), ("b", Type::String)])));
        assert_eq!(f.infer("local.nope"), Some(Type::Invalid));
        assert_eq!(f.infer("local.a"), Some(Type::Any));
        assert_eq!(f.infer("local.t[1]"), Some(Type::Any));
    }

    #[test]
    fn resources_and_data_sources() {
        let mut f = Fixture::new(&[(
            "/m/main.tf",
            r#"
resource "aws_instance" "web" {
  ami = "ami-1"
}

resource "aws_instance" "many" {
  count = 2
  ami   = "ami-1"
}

resource "aws_instance" "keyed" {
  for_each = { a = 1 }
  ami      = "ami-1"
}

resource "google_thing" "g" {}

data "aws_ami" "ubuntu" {}
"#,
        )]);
        assert_eq!(f.infer("aws_instance.web.ami"), Some(Type::String));
        assert_eq!(f.infer("aws_instance.web.id"), Some(Type::String));
        assert_eq!(f.infer("aws_instance.web.nope"), Some(Type::Invalid));
        assert_eq!(f.infer("aws_instance.many[0].arn"), Some(Type::String));
        assert_eq!(f.infer("aws_instance.many[*].arn"), Some(Type::list(Type::String)));
        assert_eq!(f.infer("aws_instance.keyed[\"a\"].ami"), Some(Type::String));
        assert_eq!(f.infer("aws_instance.missing.id"), Some(Type::Invalid));
        assert_eq!(f.infer("google_thing.g.anything"), Some(Type::Any));
        assert_eq!(f.infer("data.aws_ami.ubuntu.id"), Some(Type::String));
        assert_eq!(f.infer("data.aws_ami.other.id"), Some(Type::Invalid));
        assert!(matches!(
            f.infer("aws_instance.many"),
            Some(Type::List(Some(e))) if matches!(*e, Type::Resource(_))
        ));
    }

    #[test]
    fn module_outputs() {
        let mut f = Fixture::new(&[
            ("/m/main.tf", "module \"net\" {\n  source = \"./net\"\n}\n\nmodule \"remote\" {\n  source = \"hashicorp/x/aws\"\n}\n"),
            ("/m/net/main.tf", "output \"vpc_id\" {\n  value = \"vpc-1\"\n}\n"),
        ]);
        assert_eq!(f.infer("module.net.vpc_id"), Some(Type::String));
        assert_eq!(f.infer("module.net.nope"), Some(Type::Invalid));
        assert_eq!(f.infer("module.remote.anything"), Some(Type::Any));
        assert_eq!(f.infer("module.missing"), Some(Type::Invalid));
    }

    #[test]
    fn other_terraform_scopes() {
        let f = Fixture::new(&[(
            "/m/main.tf",
            r#"
resource "aws_instance" "web" {
  for_each = { a = { size = 1 } }
  ami      = each.key
  tags     = each.value
  index    = count.index
  here     = path.module

  dynamic "ebs" {
    for_each = ["x"]
    content {
      name = ebs.value
    }
  }
}
"#,
        )]);
        let engine = f.engine();
        let ast = f.project.ast();
        let block = ModuleScope::new(&f.project, f.project.root()).declared_resources()[0];
        let value = |key| engine.infer(ast.attribute_value(block, key).unwrap());
        assert_eq!(value("ami"), Some(Type::String));
        assert_eq!(value("tags"), Some(Type::object([("size", Type::Number)])));
        assert_eq!(value("index"), Some(Type::Number));
        assert_eq!(value("here"), Some(Type::String));

        let dynamic = ast.nested_blocks(block).next().unwrap();
        let content = ast.nested_blocks(dynamic).next().unwrap();
        assert_eq!(
            engine.infer(ast.attribute_value(content, "name").unwrap()),
            Some(Type::String)
        );
    }

    #[test]
    fn object_keys_need_no_type() {
        let f = Fixture::new(&[("/m/main.tf", "locals {\n  o = { k = 1 }\n}\n")]);
        let ast = f.project.ast();
        let attr = ast.items(f.local("o"))[0];
        let key = ast.attribute(attr).unwrap().key_node.unwrap();
        assert_eq!(f.engine().infer(key), None);
        assert_eq!(f.engine().infer(attr), Some(Type::Number));
    }

    #[test]
    fn results_are_cached_until_a_file_changes() {
        let mut f = Fixture::new(&[("/m/main.tf", "locals {\n  a = 1\n}\n")]);
        let node = f.expr(Dialect::Terraform, "local.a");
        assert_eq!(f.engine().infer(node), Some(Type::Number));
        let misses = f.cache.stats().misses;
        assert_eq!(f.engine().infer(node), Some(Type::Number));
        assert_eq!(f.cache.stats().misses, misses);
        assert!(f.cache.stats().hits >= 1);

        f.project
            .replace_file(&p("/m/main.tf"), "locals {\n  a = \"x\"\n}\n")
            .unwrap();
        assert_eq!(f.engine().infer(node), Some(Type::String));
    }

    #[test]
    fn depth_limit_and_cancellation_fall_back_to_any() {
        let mut f = empty();
        let node = f.expr(Dialect::Terraform, "((((1))))");
        let shallow = f.engine().with_options(EngineOptions { max_depth: 2 });
        assert_eq!(shallow.infer(node), Some(Type::Any));
        assert_eq!(f.cache.stats().entries, 0);

        let flag = Arc::new(AtomicBool::new(true));
        assert_eq!(f.engine().with_cancellation(flag).infer(node), Some(Type::Any));
        assert_eq!(f.engine().infer(node), Some(Type::Number));
    }

    #[test]
    fn unexpected_operators_are_engine_defects() {
        let mut ast = Ast::new();
        let file = ast.add_file("t.tf".into(), Dialect::Terraform, ModuleId(0));
        let operand = ast.alloc(file, None);
        let unary = ast.alloc(file, None);
        ast.set_kind(
            unary,
            NodeKind::Expr(Expr::Unary {
                op: Operator::Eq,
                operand,
            }),
        );
        let binary = ast.alloc(file, None);
        ast.set_kind(
            binary,
            NodeKind::Expr(Expr::Binary {
                op: Operator::Not,
                lhs: operand,
                rhs: operand,
            }),
        );
        let project = Project::from_ast(ast);
        let (model, functions, cache) = (TypeModel::new(), FunctionTable::new(), TypeCache::new());
        let engine = TypeEngine::new(&project, &model, &functions, &cache);
        assert_eq!(engine.infer(unary), None);
        assert_eq!(engine.infer(binary), None);
    }
}
