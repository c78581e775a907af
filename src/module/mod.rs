//! Declarations visible inside one module directory.

mod variable;

pub use variable::Variable;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::frontend::ast::{Ast, ModuleId, NodeId};
use crate::frontend::core::Project;
use crate::infer::TypeEngine;
use crate::types::{ModuleType, Type};

/// Symbol lookups over the root blocks of one module.
///
/// Results follow declaration order within a file; files are visited sorted
/// by path.
#[derive(Debug, Clone, Copy)]
pub struct ModuleScope<'p> {
    project: &'p Project,
    id: ModuleId,
}

impl<'p> ModuleScope<'p> {
    pub fn new(project: &'p Project, id: ModuleId) -> Self {
        Self { project, id }
    }

    /// Scope of the module the node is declared in.
    pub fn of(project: &'p Project, node: NodeId) -> Self {
        Self::new(project, project.ast().module_of(node))
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    fn ast(&self) -> &'p Ast {
        self.project.ast()
    }

    fn root_blocks(&self, identifier: &'p str) -> impl Iterator<Item = NodeId> + 'p {
        let ast = self.ast();
        self.project
            .module(self.id)
            .files
            .iter()
            .flat_map(move |f| ast.file(*f).items.iter().copied())
            .filter(move |b| ast.block(*b).is_some_and(|b| b.identifier == identifier))
    }

    fn labelled(&self, identifier: &'p str, name: &str) -> Vec<NodeId> {
        let ast = self.ast();
        self.root_blocks(identifier)
            .filter(|b| ast.block_label(*b, 0) == Some(name))
            .collect()
    }

    pub fn find_variables(&self, name: &str) -> Vec<Variable<'p>> {
        self.labelled("variable", name)
            .into_iter()
            .map(|b| Variable::new(self.ast(), b))
            .collect()
    }

    pub fn all_variables(&self) -> Vec<Variable<'p>> {
        self.root_blocks("variable")
            .map(|b| Variable::new(self.ast(), b))
            .collect()
    }

    /// First `locals` entry named `name`, as (name, attribute node).
    pub fn find_local(&self, name: &str) -> Option<(String, NodeId)> {
        self.all_locals().into_iter().find(|(n, _)| n == name)
    }

    pub fn all_locals(&self) -> Vec<(String, NodeId)> {
        let ast = self.ast();
        self.root_blocks("locals")
            .flat_map(|b| ast.attributes(b).collect::<Vec<_>>())
            .filter_map(|a| ast.attribute(a).map(|attr| (attr.key.clone(), a)))
            .collect()
    }

    pub fn find_modules(&self, name: &str) -> Vec<NodeId> {
        self.labelled("module", name)
    }

    pub fn defined_modules(&self) -> Vec<NodeId> {
        self.root_blocks("module").collect()
    }

    pub fn defined_outputs(&self) -> Vec<NodeId> {
        self.root_blocks("output").collect()
    }

    pub fn find_outputs(&self, name: &str) -> Vec<NodeId> {
        self.labelled("output", name)
    }

    /// `resource` blocks, optionally filtered by type and name.
    pub fn find_resources(&self, type_name: Option<&str>, name: Option<&str>) -> Vec<NodeId> {
        self.typed_blocks("resource", type_name, name)
    }

    pub fn declared_resources(&self) -> Vec<NodeId> {
        self.find_resources(None, None)
    }

    pub fn find_data_source(&self, type_name: Option<&str>, name: Option<&str>) -> Vec<NodeId> {
        self.typed_blocks("data", type_name, name)
    }

    pub fn declared_data_sources(&self) -> Vec<NodeId> {
        self.find_data_source(None, None)
    }

    fn typed_blocks(
        &self,
        identifier: &'p str,
        type_name: Option<&str>,
        name: Option<&str>,
    ) -> Vec<NodeId> {
        let ast = self.ast();
        self.root_blocks(identifier)
            .filter(|b| type_name.map_or(true, |t| ast.block_label(*b, 0) == Some(t)))
            .filter(|b| name.map_or(true, |n| ast.block_label(*b, 1) == Some(n)))
            .collect()
    }

    /// Scope of the module a `module` block sources, when it was loaded.
    pub fn as_module_block(&self, block: NodeId) -> Option<ModuleScope<'p>> {
        self.project
            .module_source(block)
            .map(|id| ModuleScope::new(self.project, id))
    }

    /// Object-like type of this module: its outputs, then its variables.
    /// An output wins over a variable of the same name.
    pub fn module_type(&self, name: &str, engine: &TypeEngine<'_>) -> Type {
        self.module_type_with(name, &mut |node| engine.infer(node))
    }

    pub(crate) fn module_type_with(
        &self,
        name: &str,
        infer: &mut dyn FnMut(NodeId) -> Option<Type>,
    ) -> Type {
        let ast = self.ast();
        let mut fields = BTreeMap::new();
        for output in self.defined_outputs() {
            let Some(output_name) = ast.block_label(output, 0) else {
                continue;
            };
            let t = ast
                .attribute_value(output, "value")
                .and_then(&mut *infer)
                .unwrap_or(Type::Any);
            fields.entry(output_name.to_string()).or_insert(t);
        }
        for var in self.all_variables() {
            if fields.contains_key(var.name()) {
                continue;
            }
            let t = var.combined_type_with(&mut *infer);
            fields.insert(var.name().to_string(), t);
        }
        Type::Module(Arc::new(ModuleType {
            name: name.to_string(),
            fields: Some(fields),
        }))
    }
}
