use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::frontend::ast::{Expr, NodeId};
use crate::frontend::core::Project;
use crate::infer::TypeEngine;
use crate::module::ModuleScope;
use crate::resolve::Resolver;

mod invalid_type;
mod unresolved_reference;
mod variable_default_type;

use invalid_type::InvalidType;
use unresolved_reference::UnresolvedReference;
use variable_default_type::VariableDefaultType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Allow,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintMessage {
    pub check: &'static str,
    pub message: String,
    pub severity: LintSeverity,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintSettings {
    #[serde(default)]
    pub severity: HashMap<String, LintSeverity>,
}

/// What a check may look at: the loaded project and the engines over it.
pub struct LintContext<'a> {
    pub project: &'a Project,
    pub engine: &'a TypeEngine<'a>,
    pub resolver: &'a Resolver<'a>,
}

impl LintContext<'_> {
    fn message(&self, check: &'static str, node: NodeId, message: String) -> LintMessage {
        LintMessage {
            check,
            message,
            severity: LintSeverity::Error,
            file: self.project.ast().file_of(node).path.clone(),
        }
    }

    /// Nodes of the current module files.
    fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.project
            .ast()
            .node_ids()
            .filter(move |n| self.project.is_live(*n))
    }

    /// Select and index chains that are not themselves the left side of a
    /// longer chain.
    fn outermost_references(&self) -> impl Iterator<Item = NodeId> + '_ {
        let ast = self.project.ast();
        self.live_nodes()
            .filter(|n| matches!(ast.expr(*n), Some(Expr::Select { .. } | Expr::Index { .. })))
            .filter(move |n| {
                !ast.parent(*n).is_some_and(|p| {
                    matches!(ast.expr(p), Some(Expr::Select { from, .. } | Expr::Index { from, .. }) if from == n)
                })
            })
    }
}

pub trait LintCheck {
    fn name(&self) -> &'static str;
    fn run(&self, cx: &LintContext<'_>) -> Vec<LintMessage>;
}

pub fn run(cx: &LintContext<'_>, settings: &LintSettings) -> Vec<LintMessage> {
    let checks: Vec<Box<dyn LintCheck>> = vec![
        Box::new(InvalidType),
        Box::new(UnresolvedReference),
        Box::new(VariableDefaultType),
        Box::new(DuplicateDeclaration),
    ];
    run_with_checks(cx, checks, settings)
}

pub fn run_with_checks(
    cx: &LintContext<'_>,
    checks: Vec<Box<dyn LintCheck>>,
    settings: &LintSettings,
) -> Vec<LintMessage> {
    let mut messages = Vec::new();
    for check in checks {
        let severity = settings
            .severity
            .get(check.name())
            .copied()
            .unwrap_or(LintSeverity::Error);
        if severity == LintSeverity::Allow {
            continue;
        }
        for mut msg in check.run(cx) {
            msg.severity = severity;
            messages.push(msg);
        }
    }
    messages
}

/// Two declarations of the same kind and name in one module.
struct DuplicateDeclaration;

impl DuplicateDeclaration {
    fn declarations(scope: &ModuleScope<'_>, project: &Project) -> Vec<(String, NodeId)> {
        let ast = project.ast();
        let label = |b: NodeId, kind: &str| {
            let labels = ast.block(b).map(|b| b.labels.join(".")).unwrap_or_default();
            (format!("{kind} '{labels}'"), b)
        };
        let mut out: Vec<(String, NodeId)> = Vec::new();
        out.extend(
            scope
                .all_variables()
                .into_iter()
                .map(|v| label(v.block, "variable")),
        );
        out.extend(
            scope
                .all_locals()
                .into_iter()
                .map(|(name, attr)| (format!("local '{name}'"), attr)),
        );
        out.extend(scope.defined_outputs().into_iter().map(|b| label(b, "output")));
        out.extend(scope.defined_modules().into_iter().map(|b| label(b, "module")));
        out.extend(
            scope
                .declared_resources()
                .into_iter()
                .map(|b| label(b, "resource")),
        );
        out.extend(
            scope
                .declared_data_sources()
                .into_iter()
                .map(|b| label(b, "data source")),
        );
        out
    }
}

impl LintCheck for DuplicateDeclaration {
    fn name(&self) -> &'static str {
        "duplicate-declaration"
    }

    fn run(&self, cx: &LintContext<'_>) -> Vec<LintMessage> {
        let mut msgs = Vec::new();
        for module in cx.project.modules() {
            let scope = ModuleScope::new(cx.project, module.id);
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (what, node) in Self::declarations(&scope, cx.project) {
                let count = seen.entry(what.clone()).or_default();
                *count += 1;
                if *count == 2 {
                    msgs.push(cx.message(
                        self.name(),
                        node,
                        format!("{what} is declared more than once"),
                    ));
                }
            }
        }
        msgs
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::functions::FunctionTable;
    use crate::infer::TypeCache;
    use crate::schema::TypeModel;
    use crate::test_support::{p, MapLoader};

    /// Runs `checks` over a project made of `files` under `/m`.
    pub(crate) fn lint(
        files: &[(&str, &str)],
        checks: Vec<Box<dyn LintCheck>>,
        settings: &LintSettings,
    ) -> Vec<LintMessage> {
        let project = Project::load(&p("/m"), &MapLoader::new(files)).unwrap();
        let model = TypeModel::new();
        let functions = FunctionTable::terraform();
        let cache = TypeCache::new();
        let engine = TypeEngine::new(&project, &model, &functions, &cache);
        let resolver = Resolver::new(&project, &model);
        let cx = LintContext {
            project: &project,
            engine: &engine,
            resolver: &resolver,
        };
        run_with_checks(&cx, checks, settings)
    }

    const DUPLICATES: &str = r#"
variable "a" {}
variable "a" {}

locals {
  x = 1
}

locals {
  x = 2
  y = 3
}

resource "aws_instance" "web" {}
resource "aws_s3_bucket" "web" {}
"#;

    #[test]
    fn duplicate_declarations() {
        let msgs = lint(
            &[("/m/main.tf", DUPLICATES)],
            vec![Box::new(DuplicateDeclaration)],
            &LintSettings::default(),
        );
        let texts: Vec<&str> = msgs.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(
            texts,
            [
                "variable 'a' is declared more than once",
                "local 'x' is declared more than once",
            ]
        );
        assert!(msgs.iter().all(|m| m.file == p("/m/main.tf")));
    }

    #[test]
    fn severity_settings_apply() {
        let files = [("/m/main.tf", DUPLICATES)];
        let mut settings = LintSettings::default();
        settings
            .severity
            .insert("duplicate-declaration".into(), LintSeverity::Warn);
        let msgs = lint(&files, vec![Box::new(DuplicateDeclaration)], &settings);
        assert!(msgs.iter().all(|m| m.severity == LintSeverity::Warn));

        settings
            .severity
            .insert("duplicate-declaration".into(), LintSeverity::Allow);
        assert!(lint(&files, vec![Box::new(DuplicateDeclaration)], &settings).is_empty());
    }
}
