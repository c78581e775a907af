//! Iteration scopes: `for` expression variables, `each.*` and `dynamic`
//! block iterators.

use crate::frontend::ast::{Ast, Expr, NodeId};
use crate::types::{common_supertype, is_list_type, is_object_type, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    Key,
    Value,
}

/// A `for` expression variable an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForBinding {
    pub intro: NodeId,
    pub var: NodeId,
    pub role: BindingRole,
    pub container: NodeId,
}

/// The `for` variable named `name` in scope at `node`.
///
/// The container of a `for` intro is evaluated outside the loop, so its own
/// variables are not visible there.
pub fn for_binding(ast: &Ast, node: NodeId, name: &str) -> Option<ForBinding> {
    let mut prev = node;
    for ancestor in ast.ancestors(node) {
        if let Some(Expr::ForArray { intro, .. } | Expr::ForObject { intro, .. }) = ast.expr(ancestor) {
            if prev != *intro {
                if let Some(fi) = ast.for_intro(*intro) {
                    let binding = |var, role| ForBinding {
                        intro: *intro,
                        var,
                        role,
                        container: fi.container,
                    };
                    if ast.identifier(fi.value_var) == Some(name) {
                        return Some(binding(fi.value_var, BindingRole::Value));
                    }
                    if let Some(k) = fi.key_var.filter(|k| ast.identifier(*k) == Some(name)) {
                        return Some(binding(k, BindingRole::Key));
                    }
                }
            }
        }
        prev = ancestor;
    }
    None
}

/// Whether `node` is the variable declared by a `for` intro.
pub fn is_for_variable(ast: &Ast, node: NodeId) -> bool {
    ast.parent(node)
        .and_then(|p| ast.for_intro(p))
        .is_some_and(|fi| fi.value_var == node || fi.key_var == Some(node))
}

/// Value of the `for_each` argument governing `each.*` at `node`.
pub fn each_container(ast: &Ast, node: NodeId) -> Option<NodeId> {
    ast.ancestors(node)
        .filter(|a| ast.block(*a).is_some_and(|b| b.identifier != "dynamic"))
        .find_map(|b| ast.attribute_value(b, "for_each"))
}

/// Enclosing `dynamic` block whose iterator is called `name`.
pub fn dynamic_iterator(ast: &Ast, node: NodeId, name: &str) -> Option<NodeId> {
    ast.ancestors(node).find(|a| {
        let Some(block) = ast.block(*a) else {
            return false;
        };
        if block.identifier != "dynamic" {
            return false;
        }
        let iterator = ast
            .attribute_value(*a, "iterator")
            .and_then(|i| ast.identifier(i))
            .or_else(|| block.labels.first().map(String::as_str));
        iterator == Some(name)
    })
}

/// Type of the value variable when iterating a container of type `container`.
pub fn iterated_value_type(container: &Type) -> Type {
    match container {
        Type::List(e) | Type::Set(e) | Type::Map(e) => e.as_deref().cloned().unwrap_or(Type::Any),
        Type::Tuple(items) => common_supertype(items).unwrap_or(Type::Any),
        t if t.is_object() => t
            .fields()
            .and_then(|f| common_supertype(&f.values().cloned().collect::<Vec<_>>()))
            .unwrap_or(Type::Any),
        _ => Type::Any,
    }
}

/// Type of the key variable: list indices are numbers, object keys strings.
pub fn iterated_key_type(container: &Type) -> Type {
    if is_list_type(container) {
        Type::Number
    } else if is_object_type(container) {
        Type::String
    } else {
        Type::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{Dialect, ModuleId};
    use crate::frontend::lower::lower_expression;
    use std::path::PathBuf;

    fn lower(src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let file = ast.add_file(PathBuf::from("t.tf"), Dialect::Terraform, ModuleId(0));
        let expr: hcl::Expression = src.parse().unwrap();
        let id = lower_expression(&mut ast, file, &expr, None);
        (ast, id)
    }

    #[test]
    fn binds_for_variables_in_body_only() {
        let (ast, root) = lower("[for i, x in x : x.name if i > 0]");
        let Some(Expr::ForArray { intro, expr, condition }) = ast.expr(root).cloned() else {
            panic!("expected a for expression");
        };
        let Some(Expr::Select { from, .. }) = ast.expr(expr).cloned() else {
            panic!("expected a select");
        };
        let binding = for_binding(&ast, from, "x").unwrap();
        assert_eq!(binding.role, BindingRole::Value);
        assert_eq!(binding.intro, intro);

        let Some(Expr::Binary { lhs, .. }) = condition.and_then(|c| ast.expr(c)).cloned() else {
            panic!("expected a condition");
        };
        assert_eq!(for_binding(&ast, lhs, "i").unwrap().role, BindingRole::Key);

        let container = ast.for_intro(intro).unwrap().container;
        assert!(for_binding(&ast, container, "x").is_none());
        assert!(is_for_variable(&ast, binding.var));
    }

    #[test]
    fn iterated_types() {
        assert_eq!(iterated_value_type(&Type::set(Type::String)), Type::String);
        assert_eq!(
            iterated_value_type(&Type::object([("a", Type::Number), ("b", Type::Number)])),
            Type::Number
        );
        assert_eq!(iterated_value_type(&Type::List(None)), Type::Any);
        assert_eq!(iterated_key_type(&Type::list(Type::String)), Type::Number);
        assert_eq!(iterated_key_type(&Type::map(Type::String)), Type::String);
        assert_eq!(iterated_key_type(&Type::String), Type::Any);
    }
}
