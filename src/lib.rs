pub mod config;
pub mod frontend;
pub mod functions;
pub mod infer;
pub mod lint;
pub mod module;
pub mod resolve;
pub mod schema;
pub mod types;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use config::Config;
pub use frontend::ast::{Ast, Dialect, NodeId};
pub use frontend::core::Project;
pub use functions::FunctionTable;
pub use infer::{EngineOptions, TypeCache, TypeEngine};
pub use lint::{LintContext, LintMessage, LintSeverity};
pub use module::ModuleScope;
pub use resolve::{Element, Resolver};
pub use schema::TypeModel;
pub use types::Type;

// Loader abstraction: lets callers control how files are read.
pub trait Loader {
    fn load(&self, path: &Path) -> Result<String>;
    /// Files directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

pub struct FsLoader;

impl Loader for FsLoader {
    fn load(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

/// A loaded project with its provider schemas, ready to be queried.
pub struct Workspace {
    pub project: Project,
    pub model: TypeModel,
    pub functions: FunctionTable,
    pub cache: TypeCache,
    pub config: Config,
}

impl Workspace {
    /// Load the module tree at `root`. Schema paths in `config` are relative
    /// to `root`.
    pub fn open(root: &Path, loader: &dyn Loader, config: Config) -> Result<Self> {
        let project = Project::load(root, loader)
            .with_context(|| format!("loading configuration in {}", root.display()))?;
        let model = TypeModel::from_files(&config.schema_paths(root))?;
        let functions = FunctionTable::with_providers(&model);
        log::info!(
            "loaded {} module(s), {} resource and {} data source schema(s)",
            project.modules().len(),
            model.resource_count(),
            model.data_source_count()
        );
        Ok(Self {
            project,
            model,
            functions,
            cache: TypeCache::new(),
            config,
        })
    }

    pub fn engine(&self) -> TypeEngine<'_> {
        TypeEngine::new(&self.project, &self.model, &self.functions, &self.cache).with_options(
            EngineOptions {
                max_depth: self.config.settings.max_depth,
            },
        )
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.project, &self.model)
            .with_ignored_references(self.config.settings.ignored_references.iter().cloned())
    }

    pub fn lint(&self) -> Vec<LintMessage> {
        let engine = self.engine();
        let resolver = self.resolver();
        let cx = LintContext {
            project: &self.project,
            engine: &engine,
            resolver: &resolver,
        };
        lint::run(&cx, &self.config.lint)
    }

    /// Parse `text` as an expression in the root module.
    pub fn expression(&mut self, text: &str) -> Result<NodeId> {
        let root = self.project.root();
        self.project.add_expression(root, Dialect::Terraform, text)
    }

    pub fn infer_expression(&mut self, text: &str) -> Result<Option<Type>> {
        let node = self.expression(text)?;
        Ok(self.engine().infer(node))
    }

    pub fn resolve_expression(&mut self, text: &str, include_fake: bool) -> Result<Vec<Element>> {
        let node = self.expression(text)?;
        Ok(self.resolver().resolve(node, include_fake))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapLoader;

    #[test]
    fn workspace_queries() {
        let loader = MapLoader::new(&[(
            "/w/main.tf",
            "variable \"n\" {\n  type = number\n}\n\nlocals {\n  cfg = { name = \"x\" }\n}\n",
        )]);
        let mut ws = Workspace::open(Path::new("/w"), &loader, Config::default()).unwrap();
        assert_eq!(ws.infer_expression("var.n").unwrap(), Some(Type::Number));
        assert_eq!(ws.infer_expression("local.cfg.name").unwrap(), Some(Type::String));
        assert_eq!(ws.resolve_expression("local.cfg.name", false).unwrap().len(), 1);
        assert!(ws.infer_expression("var.n +").is_err());
        assert!(ws.lint().is_empty());
    }

    #[test]
    fn lint_sees_only_current_files() {
        let loader = MapLoader::new(&[("/w/main.tf", "locals {\n  a = local.missing\n}\n")]);
        let mut ws = Workspace::open(Path::new("/w"), &loader, Config::default()).unwrap();
        let checks: Vec<&str> = ws.lint().iter().map(|m| m.check).collect();
        assert_eq!(checks, ["invalid-type", "unresolved-reference"]);

        ws.project
            .replace_file(Path::new("/w/main.tf"), "locals {\n  a = 1\n}\n")
            .unwrap();
        assert!(ws.lint().is_empty());

        assert_eq!(ws.infer_expression("local.nope").unwrap(), Some(Type::Invalid));
        assert!(ws.resolve_expression("local.nope", false).unwrap().is_empty());
        assert!(ws.lint().is_empty());
    }

    #[test]
    fn ignored_references_come_from_config() {
        let loader = MapLoader::new(&[("/w/main.tf", "resource \"aws_instance\" \"web\" {}\n")]);
        let mut config = Config::default();
        config.settings.ignored_references = vec!["resource.aws_instance".into()];
        let mut ws = Workspace::open(Path::new("/w"), &loader, config).unwrap();
        let found = ws.resolve_expression("aws_instance.web.anything", true).unwrap();
        assert!(matches!(&found[..], [Element::Synthetic(_)]));
    }
}
