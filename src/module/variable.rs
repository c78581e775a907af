use crate::frontend::ast::{Ast, NodeId};
use crate::infer::TypeEngine;
use crate::types::{constraint, Type};

/// A `variable "NAME" { ... }` declaration.
#[derive(Debug, Clone, Copy)]
pub struct Variable<'a> {
    ast: &'a Ast,
    pub block: NodeId,
}

impl<'a> Variable<'a> {
    pub fn new(ast: &'a Ast, block: NodeId) -> Self {
        Self { ast, block }
    }

    pub fn name(&self) -> &'a str {
        self.ast.block_label(self.block, 0).unwrap_or_default()
    }

    /// Type from the `type = ...` constraint, if one is written.
    pub fn declared_type(&self) -> Option<Type> {
        self.ast
            .attribute_value(self.block, "type")
            .map(|t| constraint::from_expression(self.ast, t))
    }

    pub fn default_value(&self) -> Option<NodeId> {
        self.ast.attribute_value(self.block, "default")
    }

    /// Declared type, else the type of the default value, else `Any`.
    pub fn combined_type(&self, engine: &TypeEngine<'_>) -> Type {
        self.combined_type_with(|node| engine.infer(node))
    }

    pub(crate) fn combined_type_with(&self, infer: impl FnOnce(NodeId) -> Option<Type>) -> Type {
        if let Some(declared) = self.declared_type() {
            return declared;
        }
        self.default_value()
            .and_then(infer)
            .unwrap_or(Type::Any)
    }
}
