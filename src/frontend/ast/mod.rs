//! Arena representation of HCL/Terraform configuration.
//!
//! Every block, attribute, expression and `for` intro gets a [`NodeId`] and a
//! parent link, so analyses can walk up from any expression to the
//! declaration that contains it. Nodes are never removed; replacing a file
//! appends fresh nodes and orphans the old ones.

mod display;

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

/// Expression dialect of a file.
///
/// Terraform files (`*.tf`) get the scope shortcuts (`var.`, `local.`, ...)
/// and the built-in function table; plain HCL files do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Terraform,
    Hcl,
}

impl Dialect {
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tf") => Some(Dialect::Terraform),
            Some("hcl") => Some(Dialect::Hcl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct File {
    pub path: PathBuf,
    pub dialect: Dialect,
    pub module: ModuleId,
    pub items: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub file: FileId,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Block(Block),
    Attribute(Attribute),
    ForIntro(ForIntro),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub identifier: String,
    pub labels: Vec<String>,
    /// Attributes and nested blocks, in source order.
    pub items: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub key: String,
    /// Key expression for object literal entries; `None` for block attributes.
    pub key_node: Option<NodeId>,
    pub value: NodeId,
}

/// `for k, v in container` part of a for-expression.
#[derive(Debug, Clone)]
pub struct ForIntro {
    pub key_var: Option<NodeId>,
    pub value_var: NodeId,
    pub container: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    String(String),
    Number(String),
    Bool(bool),
    Null,
    Heredoc(String),
}

/// Operator tokens as produced by the parser.
///
/// Unary and binary expressions share one token set; which tokens are legal
/// for which node kind is checked by the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Not,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Not => "!",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    /// The `*` selector of a splat.
    Star,
    /// Interpolated string; holds the interpolated expressions.
    Template(Vec<NodeId>),
    Parenthesized(Option<NodeId>),
    Unary {
        op: Operator,
        operand: NodeId,
    },
    Binary {
        op: Operator,
        lhs: NodeId,
        rhs: NodeId,
    },
    Conditional {
        condition: NodeId,
        then: NodeId,
        otherwise: NodeId,
    },
    Array(Vec<NodeId>),
    /// Object literal; items are attribute (and occasionally block) nodes.
    Object(Vec<NodeId>),
    Select {
        from: NodeId,
        field: NodeId,
    },
    Index {
        from: NodeId,
        index: NodeId,
    },
    MethodCall {
        name: String,
        args: Vec<NodeId>,
    },
    ForArray {
        intro: NodeId,
        expr: NodeId,
        condition: Option<NodeId>,
    },
    ForObject {
        intro: NodeId,
        key: NodeId,
        value: NodeId,
        grouping: bool,
        condition: Option<NodeId>,
    },
}

#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    files: Vec<File>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: PathBuf, dialect: Dialect, module: ModuleId) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(File {
            path,
            dialect,
            module,
            items: Vec::new(),
        });
        id
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0 as usize]
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.0 as usize]
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }

    /// Allocate a node with a placeholder kind; lowering fills it in with
    /// [`Ast::set_kind`] once the children exist.
    pub(crate) fn alloc(&mut self, file: FileId, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind: NodeKind::Expr(Expr::Literal(Literal::Null)),
            parent,
            file,
        });
        id
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.nodes[id.index()].parent = parent;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id, in allocation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn file_of(&self, id: NodeId) -> &File {
        self.file(self.node(id).file)
    }

    pub fn dialect(&self, id: NodeId) -> Dialect {
        self.file_of(id).dialect
    }

    pub fn module_of(&self, id: NodeId) -> ModuleId {
        self.file_of(id).module
    }

    /// Strict ancestors, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn expr(&self, id: NodeId) -> Option<&Expr> {
        match self.kind(id) {
            NodeKind::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        match self.kind(id) {
            NodeKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId) -> Option<&Attribute> {
        match self.kind(id) {
            NodeKind::Attribute(a) => Some(a),
            _ => None,
        }
    }

    pub fn for_intro(&self, id: NodeId) -> Option<&ForIntro> {
        match self.kind(id) {
            NodeKind::ForIntro(f) => Some(f),
            _ => None,
        }
    }

    pub fn identifier(&self, id: NodeId) -> Option<&str> {
        match self.expr(id) {
            Some(Expr::Identifier(name)) => Some(name),
            _ => None,
        }
    }

    /// Blocks that sit directly in a file body.
    pub fn is_root_block(&self, id: NodeId) -> bool {
        self.block(id).is_some() && self.parent(id).is_none()
    }

    pub fn block_label(&self, id: NodeId, index: usize) -> Option<&str> {
        self.block(id)
            .and_then(|b| b.labels.get(index))
            .map(String::as_str)
    }

    /// Attribute node named `key` among the items of a block or object literal.
    pub fn find_attribute(&self, container: NodeId, key: &str) -> Option<NodeId> {
        self.items(container)
            .iter()
            .copied()
            .find(|item| self.attribute(*item).is_some_and(|a| a.key == key))
    }

    pub fn attribute_value(&self, container: NodeId, key: &str) -> Option<NodeId> {
        self.find_attribute(container, key)
            .and_then(|a| self.attribute(a))
            .map(|a| a.value)
    }

    /// Items of a block body or object literal.
    pub fn items(&self, container: NodeId) -> &[NodeId] {
        match self.kind(container) {
            NodeKind::Block(b) => &b.items,
            NodeKind::Expr(Expr::Object(items)) => items,
            _ => &[],
        }
    }

    pub fn nested_blocks(&self, container: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.items(container)
            .iter()
            .copied()
            .filter(|item| self.block(*item).is_some())
    }

    pub fn attributes(&self, container: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.items(container)
            .iter()
            .copied()
            .filter(|item| self.attribute(*item).is_some())
    }

    /// Closest enclosing block, not counting `id` itself.
    pub fn enclosing_block(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.block(*a).is_some())
    }

    /// Outermost block containing `id` (or `id` if it is a root block).
    pub fn root_block_of(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|n| self.block(*n).is_some())
            .last()
    }

    /// Text of a select field: identifier name, literal text or `*`.
    pub fn field_text(&self, id: NodeId) -> Option<String> {
        match self.expr(id)? {
            Expr::Identifier(name) => Some(name.clone()),
            Expr::Star => Some("*".to_string()),
            Expr::Literal(Literal::String(s)) | Expr::Literal(Literal::Number(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Source-like rendering of a node, used in diagnostics.
    pub fn text(&self, id: NodeId) -> String {
        display::render(self, id)
    }
}

pub fn is_star_or_number(text: &str) -> bool {
    text == "*" || text.parse::<i64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn dialect_follows_extension() {
        assert_eq!(Dialect::from_path(Path::new("main.tf")), Some(Dialect::Terraform));
        assert_eq!(Dialect::from_path(Path::new("conf.hcl")), Some(Dialect::Hcl));
        assert_eq!(Dialect::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn star_or_number() {
        assert!(is_star_or_number("*"));
        assert!(is_star_or_number("12"));
        assert!(!is_star_or_number("name"));
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut ast = Ast::new();
        let file = ast.add_file(PathBuf::from("main.tf"), Dialect::Terraform, ModuleId(0));
        let block = ast.alloc(file, None);
        let attr = ast.alloc(file, Some(block));
        let value = ast.alloc(file, Some(attr));
        ast.set_kind(
            attr,
            NodeKind::Attribute(Attribute {
                key: "a".into(),
                key_node: None,
                value,
            }),
        );
        ast.set_kind(
            block,
            NodeKind::Block(Block {
                identifier: "locals".into(),
                labels: vec![],
                items: vec![attr],
            }),
        );
        assert_eq!(ast.ancestors(value).collect::<Vec<_>>(), vec![attr, block]);
        assert!(ast.is_root_block(block));
        assert_eq!(ast.attribute_value(block, "a"), Some(value));
        assert_eq!(ast.root_block_of(value), Some(block));
    }
}
