use anyhow::{anyhow, bail, Context, Result};
use path_absolutize::Absolutize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::frontend::ast::{Ast, Dialect, Expr, FileId, Literal, ModuleId, NodeId};
use crate::frontend::lower;
use crate::Loader;

/// A directory of configuration files sharing one declaration scope.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub dir: PathBuf,
    /// Files sorted by path.
    pub files: Vec<FileId>,
}

/// Every module reachable from a root directory, lowered into one arena.
#[derive(Debug, Default)]
pub struct Project {
    ast: Ast,
    modules: Vec<Module>,
    by_dir: HashMap<PathBuf, ModuleId>,
    module_sources: HashMap<NodeId, ModuleId>,
    revision: u64,
}

impl Project {
    /// Load `root` and, recursively, every module it sources from a local path.
    pub fn load(root: &Path, loader: &dyn Loader) -> Result<Self> {
        let mut project = Project::default();
        let mut visiting = Vec::new();
        project.load_module(root, loader, &mut visiting)?;
        Ok(project)
    }

    fn load_module(
        &mut self,
        dir: &Path,
        loader: &dyn Loader,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<ModuleId> {
        let absdir = absolute(dir)?;
        if visiting.contains(&absdir) {
            bail!("module cycle detected at {}", absdir.display());
        }
        if let Some(id) = self.by_dir.get(&absdir) {
            return Ok(*id);
        }
        visiting.push(absdir.clone());

        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            id,
            dir: absdir.clone(),
            files: Vec::new(),
        });
        self.by_dir.insert(absdir.clone(), id);

        let mut paths: Vec<PathBuf> = loader
            .list(&absdir)
            .with_context(|| format!("listing module directory {}", absdir.display()))?
            .into_iter()
            .filter(|p| Dialect::from_path(p).is_some())
            .collect();
        paths.sort();

        for path in paths {
            let Some(dialect) = Dialect::from_path(&path) else {
                continue;
            };
            let content = loader
                .load(&path)
                .with_context(|| format!("reading HCL file {}", path.display()))?;
            let file = self.ast.add_file(path.clone(), dialect, id);
            self.parse_into(file, &content)?;
            self.modules[id.0 as usize].files.push(file);

            for (block, source) in self.local_module_sources(file) {
                let child_dir = absdir.join(&source);
                let child = self
                    .load_module(&child_dir, loader, visiting)
                    .with_context(|| format!("loading module source {source}"))?;
                self.module_sources.insert(block, child);
            }
        }

        visiting.pop();
        log::debug!(
            "loaded module {} ({} files)",
            absdir.display(),
            self.modules[id.0 as usize].files.len()
        );
        Ok(id)
    }

    fn parse_into(&mut self, file: FileId, content: &str) -> Result<()> {
        let path = self.ast.file(file).path.clone();
        let body: hcl::Body =
            hcl::from_str(content).with_context(|| format!("parsing HCL in {}", path.display()))?;
        let items = lower::lower_body(&mut self.ast, file, &body);
        self.ast.file_mut(file).items = items;
        Ok(())
    }

    /// `module` blocks of `file` whose `source` is a relative directory.
    fn local_module_sources(&self, file: FileId) -> Vec<(NodeId, String)> {
        let f = self.ast.file(file);
        if f.dialect != Dialect::Terraform {
            return Vec::new();
        }
        f.items
            .iter()
            .copied()
            .filter(|b| self.ast.block(*b).is_some_and(|b| b.identifier == "module"))
            .filter_map(|b| {
                let value = self.ast.attribute_value(b, "source")?;
                match self.ast.expr(value) {
                    Some(Expr::Literal(Literal::String(s)))
                        if s.starts_with("./") || s.starts_with("../") =>
                    {
                        Some((b, s.clone()))
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Re-parse one file in place. Bumps the revision so cached types are
    /// recomputed.
    pub fn replace_file(&mut self, path: &Path, source: &str) -> Result<()> {
        let (file, _) = self
            .ast
            .files()
            .find(|(_, f)| f.path == path)
            .ok_or_else(|| anyhow!("file {} is not part of the project", path.display()))?;
        self.parse_into(file, source)?;

        let dir = self.module(self.ast.file(file).module).dir.clone();
        for (block, source) in self.local_module_sources(file) {
            match absolute(&dir.join(&source))
                .ok()
                .and_then(|d| self.by_dir.get(&d).copied())
            {
                Some(child) => {
                    self.module_sources.insert(block, child);
                }
                None => log::debug!("module source {source} was not loaded"),
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Parse a standalone expression evaluated in the scope of `module`.
    pub fn add_expression(
        &mut self,
        module: ModuleId,
        dialect: Dialect,
        text: &str,
    ) -> Result<NodeId> {
        let expr: hcl::Expression = text
            .parse()
            .with_context(|| format!("parsing expression {text:?}"))?;
        let file = self.ast.add_file(PathBuf::from("<expression>"), dialect, module);
        let id = lower::lower_expression(&mut self.ast, file, &expr, None);
        self.ast.file_mut(file).items = vec![id];
        Ok(id)
    }

    /// Whether `node` is part of the current parse of a module file. Nodes
    /// orphaned by [`Project::replace_file`] and standalone expressions are not.
    pub fn is_live(&self, node: NodeId) -> bool {
        let file = self.ast.node(node).file;
        let f = self.ast.file(file);
        if !self.module(f.module).files.contains(&file) {
            return false;
        }
        let top = self.ast.ancestors(node).last().unwrap_or(node);
        f.items.contains(&top)
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn root(&self) -> ModuleId {
        ModuleId(0)
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module_by_dir(&self, dir: &Path) -> Option<ModuleId> {
        absolute(dir).ok().and_then(|d| self.by_dir.get(&d).copied())
    }

    /// Module loaded from the local `source` of a `module` block.
    pub fn module_source(&self, block: NodeId) -> Option<ModuleId> {
        self.module_sources.get(&block).copied()
    }

    pub fn file_by_path(&self, path: &Path) -> Option<FileId> {
        self.ast
            .files()
            .find(|(_, f)| f.path == path)
            .map(|(id, _)| id)
    }
}

impl Project {
    /// Single-module project over an already built arena.
    #[cfg(test)]
    pub(crate) fn from_ast(ast: Ast) -> Self {
        let files = ast.files().map(|(id, _)| id).collect();
        Project {
            ast,
            modules: vec![Module {
                id: ModuleId(0),
                dir: PathBuf::from("/"),
                files,
            }],
            ..Project::default()
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .map_err(|e| anyhow!("absolutize error: {e}"))?
        .to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{p, MapLoader};

    #[test]
    fn loads_files_sorted_and_follows_local_modules() {
        let loader = MapLoader::new(&[
            ("/root/b.tf", "variable \"b\" {}"),
            ("/root/a.tf", "module \"net\" {\n  source = \"./net\"\n}"),
            ("/root/net/main.tf", "output \"id\" {\n  value = \"x\"\n}"),
            ("/root/README.md", "ignored"),
        ]);
        let project = Project::load(&p("/root"), &loader).unwrap();
        assert_eq!(project.modules().len(), 2);
        let root = project.module(project.root());
        let paths: Vec<_> = root
            .files
            .iter()
            .map(|f| project.ast().file(*f).path.clone())
            .collect();
        assert_eq!(paths, vec![p("/root/a.tf"), p("/root/b.tf")]);

        let block = project.ast().file(root.files[0]).items[0];
        let child = project.module_source(block).unwrap();
        assert_eq!(project.module(child).dir, p("/root/net"));
    }

    #[test]
    fn detects_module_cycles() {
        let loader = MapLoader::new(&[
            ("/root/main.tf", "module \"a\" {\n  source = \"./a\"\n}"),
            ("/root/a/main.tf", "module \"up\" {\n  source = \"../\"\n}"),
        ]);
        let err = Project::load(&p("/root"), &loader).unwrap_err();
        assert!(format!("{err:#}").contains("module cycle detected"));
    }

    #[test]
    fn replacing_a_file_bumps_revision() {
        let loader = MapLoader::new(&[("/root/main.tf", "locals {\n  a = 1\n}")]);
        let mut project = Project::load(&p("/root"), &loader).unwrap();
        assert_eq!(project.revision(), 0);
        project
            .replace_file(&p("/root/main.tf"), "locals {\n  a = \"x\"\n}")
            .unwrap();
        assert_eq!(project.revision(), 1);
        assert!(project.replace_file(&p("/root/other.tf"), "").is_err());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let loader = MapLoader::new(&[("/root/main.tf", "locals {")]);
        let err = Project::load(&p("/root"), &loader).unwrap_err();
        assert!(format!("{err:#}").contains("/root/main.tf"));
    }
}
