use crate::frontend::ast::{Ast, Expr, NodeId, NodeKind};
use crate::types::Type;

/// Target of a reference: a declaration in the arena, or a property a schema
/// says exists without any text declaring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Node(NodeId),
    Synthetic(Box<SyntheticProperty>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticProperty {
    pub name: String,
    /// Known when the property comes from a type constraint.
    pub r#type: Option<Type>,
    /// Properties of a dynamic value: anything selected from them resolves.
    pub dynamic: bool,
    pub owner: Element,
}

impl Element {
    pub fn synthetic(name: &str, owner: &Element, dynamic: bool) -> Self {
        Element::Synthetic(Box::new(SyntheticProperty {
            name: name.to_string(),
            r#type: None,
            dynamic,
            owner: owner.clone(),
        }))
    }

    pub fn typed(name: &str, owner: &Element, r#type: Type) -> Self {
        Element::Synthetic(Box::new(SyntheticProperty {
            name: name.to_string(),
            r#type: Some(r#type),
            dynamic: true,
            owner: owner.clone(),
        }))
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Element::Node(n) => Some(*n),
            Element::Synthetic(_) => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Element::Synthetic(_))
    }

    /// Short human description, e.g. `resource "aws_instance" "web"` or
    /// `arn (synthetic)`.
    pub fn describe(&self, ast: &Ast) -> String {
        match self {
            Element::Node(n) => match ast.kind(*n) {
                NodeKind::Attribute(a) => a.key.clone(),
                NodeKind::Block(b) => std::iter::once(b.identifier.clone())
                    .chain(b.labels.iter().map(|l| format!("{l:?}")))
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => ast.text(*n),
            },
            Element::Synthetic(s) => match &s.r#type {
                Some(t) => format!("{} (synthetic, {t})", s.name),
                None => format!("{} (synthetic)", s.name),
            },
        }
    }
}

/// Schema path of an element: `resource.TYPE`, `data.TYPE`, or the root
/// block identifier, followed by nested block identifiers and attribute keys.
pub fn qualified_name(ast: &Ast, element: &Element) -> Option<String> {
    match element {
        Element::Node(n) => node_qualified_name(ast, *n),
        Element::Synthetic(s) => {
            qualified_name(ast, &s.owner).map(|owner| format!("{owner}.{}", s.name))
        }
    }
}

fn node_qualified_name(ast: &Ast, node: NodeId) -> Option<String> {
    match ast.kind(node) {
        NodeKind::Block(block) => match ast.parent(node) {
            None => Some(match block.identifier.as_str() {
                kind @ ("resource" | "data") => format!("{kind}.{}", block.labels.first()?),
                other => other.to_string(),
            }),
            Some(parent) => node_qualified_name(ast, parent)
                .map(|p| format!("{p}.{}", block.identifier)),
        },
        NodeKind::Attribute(attr) => {
            let parent = ast.parent(node)?;
            let container = match ast.kind(parent) {
                NodeKind::Block(_) => parent,
                NodeKind::Expr(Expr::Object(_)) => ast.parent(parent)?,
                _ => return None,
            };
            node_qualified_name(ast, container).map(|p| format!("{p}.{}", attr.key))
        }
        _ => None,
    }
}
