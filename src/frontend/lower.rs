//! Lowering of `hcl-rs` syntax into the node arena.

use hcl::expr::{
    BinaryOperator, FuncName, ObjectKey, Operation, TemplateExpr, TraversalOperator, UnaryOperator,
};
use hcl::template::{Element as TplElement, Template};
use hcl::{Body, Expression, Structure};

use crate::frontend::ast::{
    Ast, Attribute, Block, Expr, FileId, ForIntro, Literal, NodeId, NodeKind, Operator,
};

/// Lower every top-level structure of `body`; returns the root item ids.
pub fn lower_body(ast: &mut Ast, file: FileId, body: &Body) -> Vec<NodeId> {
    lower_structures(ast, file, body, None)
}

fn lower_structures(
    ast: &mut Ast,
    file: FileId,
    body: &Body,
    parent: Option<NodeId>,
) -> Vec<NodeId> {
    body.iter()
        .map(|structure| match structure {
            Structure::Attribute(attr) => {
                let id = ast.alloc(file, parent);
                let value = lower_expression(ast, file, attr.expr(), Some(id));
                ast.set_kind(
                    id,
                    NodeKind::Attribute(Attribute {
                        key: attr.key().to_string(),
                        key_node: None,
                        value,
                    }),
                );
                id
            }
            Structure::Block(block) => {
                let id = ast.alloc(file, parent);
                let items = lower_structures(ast, file, block.body(), Some(id));
                ast.set_kind(
                    id,
                    NodeKind::Block(Block {
                        identifier: block.identifier().to_string(),
                        labels: block
                            .labels()
                            .iter()
                            .map(|l| l.as_str().to_string())
                            .collect(),
                        items,
                    }),
                );
                id
            }
        })
        .collect()
}

pub fn lower_expression(
    ast: &mut Ast,
    file: FileId,
    expr: &Expression,
    parent: Option<NodeId>,
) -> NodeId {
    if let Expression::Traversal(tr) = expr {
        return lower_traversal(ast, file, &tr.expr, &tr.operators, parent);
    }

    let id = ast.alloc(file, parent);
    let me = Some(id);
    let kind = match expr {
        Expression::Null => Expr::Literal(Literal::Null),
        Expression::Bool(b) => Expr::Literal(Literal::Bool(*b)),
        Expression::Number(n) => Expr::Literal(Literal::Number(n.to_string())),
        Expression::String(s) => Expr::Literal(Literal::String(s.clone())),
        Expression::Variable(v) => {
            let name = v.as_str();
            if name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false") {
                Expr::Literal(Literal::Bool(name.eq_ignore_ascii_case("true")))
            } else {
                Expr::Identifier(name.to_string())
            }
        }
        Expression::Array(items) => Expr::Array(
            items
                .iter()
                .map(|e| lower_expression(ast, file, e, me))
                .collect(),
        ),
        Expression::Object(obj) => {
            let mut items = Vec::with_capacity(obj.len());
            for (key, value) in obj {
                let attr = ast.alloc(file, me);
                let (key_text, key_node) = match key {
                    ObjectKey::Identifier(ident) => {
                        let k = ast.alloc(file, Some(attr));
                        ast.set_kind(k, NodeKind::Expr(Expr::Identifier(ident.to_string())));
                        (ident.to_string(), k)
                    }
                    ObjectKey::Expression(e) => {
                        let k = lower_expression(ast, file, e, Some(attr));
                        let text = match ast.expr(k) {
                            Some(Expr::Literal(Literal::String(s))) => s.clone(),
                            _ => ast.text(k),
                        };
                        (text, k)
                    }
                    #[allow(unreachable_patterns)]
                    _ => {
                        let k = ast.alloc(file, Some(attr));
                        (String::new(), k)
                    }
                };
                let value = lower_expression(ast, file, value, Some(attr));
                ast.set_kind(
                    attr,
                    NodeKind::Attribute(Attribute {
                        key: key_text,
                        key_node: Some(key_node),
                        value,
                    }),
                );
                items.push(attr);
            }
            Expr::Object(items)
        }
        Expression::TemplateExpr(t) => lower_template(ast, file, t, id),
        Expression::FuncCall(call) => Expr::MethodCall {
            name: func_name(&call.name),
            args: call
                .args
                .iter()
                .map(|e| lower_expression(ast, file, e, me))
                .collect(),
        },
        Expression::Parenthesis(inner) => {
            Expr::Parenthesized(Some(lower_expression(ast, file, inner, me)))
        }
        Expression::Conditional(c) => Expr::Conditional {
            condition: lower_expression(ast, file, &c.cond_expr, me),
            then: lower_expression(ast, file, &c.true_expr, me),
            otherwise: lower_expression(ast, file, &c.false_expr, me),
        },
        Expression::Operation(op) => match &**op {
            Operation::Unary(u) => Expr::Unary {
                op: match u.operator {
                    UnaryOperator::Neg => Operator::Minus,
                    UnaryOperator::Not => Operator::Not,
                },
                operand: lower_expression(ast, file, &u.expr, me),
            },
            Operation::Binary(b) => Expr::Binary {
                op: binary_operator(b.operator),
                lhs: lower_expression(ast, file, &b.lhs_expr, me),
                rhs: lower_expression(ast, file, &b.rhs_expr, me),
            },
        },
        Expression::ForExpr(fe) => {
            let intro = ast.alloc(file, me);
            let key_var = fe.key_var.as_ref().map(|k| {
                let n = ast.alloc(file, Some(intro));
                ast.set_kind(n, NodeKind::Expr(Expr::Identifier(k.to_string())));
                n
            });
            let value_var = ast.alloc(file, Some(intro));
            ast.set_kind(
                value_var,
                NodeKind::Expr(Expr::Identifier(fe.value_var.to_string())),
            );
            let container = lower_expression(ast, file, &fe.collection_expr, Some(intro));
            ast.set_kind(
                intro,
                NodeKind::ForIntro(ForIntro {
                    key_var,
                    value_var,
                    container,
                }),
            );
            let condition = fe
                .cond_expr
                .as_ref()
                .map(|c| lower_expression(ast, file, c, me));
            match &fe.key_expr {
                Some(key) => Expr::ForObject {
                    intro,
                    key: lower_expression(ast, file, key, me),
                    value: lower_expression(ast, file, &fe.value_expr, me),
                    grouping: fe.grouping,
                    condition,
                },
                None => Expr::ForArray {
                    intro,
                    expr: lower_expression(ast, file, &fe.value_expr, me),
                    condition,
                },
            }
        }
        _ => {
            log::debug!("unsupported expression lowered as null: {expr:?}");
            Expr::Literal(Literal::Null)
        }
    };
    ast.set_kind(id, NodeKind::Expr(kind));
    id
}

/// `a.b[0].*` becomes nested select/index nodes with the outermost hop on top.
fn lower_traversal(
    ast: &mut Ast,
    file: FileId,
    root: &Expression,
    operators: &[TraversalOperator],
    parent: Option<NodeId>,
) -> NodeId {
    let Some((last, rest)) = operators.split_last() else {
        return lower_expression(ast, file, root, parent);
    };
    let id = ast.alloc(file, parent);
    let from = lower_traversal(ast, file, root, rest, Some(id));
    let kind = match last {
        TraversalOperator::GetAttr(name) => Expr::Select {
            from,
            field: leaf(ast, file, id, Expr::Identifier(name.to_string())),
        },
        TraversalOperator::AttrSplat => Expr::Select {
            from,
            field: leaf(ast, file, id, Expr::Star),
        },
        TraversalOperator::FullSplat => Expr::Index {
            from,
            index: leaf(ast, file, id, Expr::Star),
        },
        TraversalOperator::LegacyIndex(n) => Expr::Select {
            from,
            field: leaf(ast, file, id, Expr::Literal(Literal::Number(n.to_string()))),
        },
        TraversalOperator::Index(e) => Expr::Index {
            from,
            index: lower_expression(ast, file, e, Some(id)),
        },
    };
    ast.set_kind(id, NodeKind::Expr(kind));
    id
}

fn leaf(ast: &mut Ast, file: FileId, parent: NodeId, expr: Expr) -> NodeId {
    let id = ast.alloc(file, Some(parent));
    ast.set_kind(id, NodeKind::Expr(expr));
    id
}

fn lower_template(ast: &mut Ast, file: FileId, t: &TemplateExpr, id: NodeId) -> Expr {
    let heredoc = matches!(t, TemplateExpr::Heredoc(_));
    let template = match Template::from_expr(t) {
        Ok(template) => template,
        Err(err) => {
            log::debug!("template did not parse, treating as plain string: {err}");
            return Expr::Literal(Literal::String(t.to_string()));
        }
    };
    let mut literal = String::new();
    let mut parts = Vec::new();
    let mut plain = true;
    for element in template.elements() {
        match element {
            TplElement::Literal(s) => literal.push_str(s),
            TplElement::Interpolation(ip) => {
                plain = false;
                parts.push(lower_expression(ast, file, &ip.expr, Some(id)));
            }
            TplElement::Directive(_) => plain = false,
        }
    }
    if !plain {
        Expr::Template(parts)
    } else if heredoc {
        Expr::Literal(Literal::Heredoc(literal))
    } else {
        Expr::Literal(Literal::String(literal))
    }
}

fn func_name(name: &FuncName) -> String {
    name.namespace
        .iter()
        .map(|ns| ns.as_str())
        .chain(std::iter::once(name.name.as_str()))
        .collect::<Vec<_>>()
        .join("::")
}

fn binary_operator(op: BinaryOperator) -> Operator {
    match op {
        BinaryOperator::Eq => Operator::Eq,
        BinaryOperator::NotEq => Operator::NotEq,
        BinaryOperator::LessEq => Operator::LessEq,
        BinaryOperator::GreaterEq => Operator::GreaterEq,
        BinaryOperator::Less => Operator::Less,
        BinaryOperator::Greater => Operator::Greater,
        BinaryOperator::Plus => Operator::Plus,
        BinaryOperator::Minus => Operator::Minus,
        BinaryOperator::Mul => Operator::Mul,
        BinaryOperator::Div => Operator::Div,
        BinaryOperator::Mod => Operator::Mod,
        BinaryOperator::And => Operator::And,
        BinaryOperator::Or => Operator::Or,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{Dialect, ModuleId};
    use std::path::PathBuf;

    fn lower(src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let file = ast.add_file(PathBuf::from("t.tf"), Dialect::Terraform, ModuleId(0));
        let expr: Expression = src.parse().expect("expression parses");
        let id = lower_expression(&mut ast, file, &expr, None);
        (ast, id)
    }

    #[test]
    fn traversal_becomes_select_chain() {
        let (ast, id) = lower("var.v[0].name");
        let Some(Expr::Select { from, field }) = ast.expr(id) else {
            panic!("expected select, got {:?}", ast.kind(id));
        };
        assert_eq!(ast.identifier(*field), Some("name"));
        let Some(Expr::Index { from: inner, .. }) = ast.expr(*from) else {
            panic!("expected index");
        };
        assert_eq!(ast.parent(*inner), Some(*from));
        assert_eq!(ast.parent(*from), Some(id));
        assert_eq!(ast.text(id), "var.v[0].name");
    }

    #[test]
    fn splat_becomes_star_field() {
        let (ast, id) = lower("aws_instance.x.*.id");
        let Some(Expr::Select { from, .. }) = ast.expr(id) else {
            panic!("expected select");
        };
        let Some(Expr::Select { field, .. }) = ast.expr(*from) else {
            panic!("expected splat select");
        };
        assert!(matches!(ast.expr(*field), Some(Expr::Star)));
    }

    #[test]
    fn plain_template_is_a_string_literal() {
        let (ast, id) = lower("\"hello\"");
        assert!(matches!(
            ast.expr(id),
            Some(Expr::Literal(Literal::String(s))) if s == "hello"
        ));
        let (ast, id) = lower("\"hi ${var.name}\"");
        assert!(matches!(ast.expr(id), Some(Expr::Template(parts)) if parts.len() == 1));
    }

    #[test]
    fn unparsable_template_is_kept_as_text() {
        let mut ast = Ast::new();
        let file = ast.add_file(PathBuf::from("t.tf"), Dialect::Terraform, ModuleId(0));
        let id = ast.alloc(file, None);
        let t = TemplateExpr::QuotedString("${unterminated".into());
        assert!(matches!(
            lower_template(&mut ast, file, &t, id),
            Expr::Literal(Literal::String(s)) if s == "${unterminated"
        ));
    }

    #[test]
    fn for_expression_has_intro() {
        let (ast, id) = lower("{ for k, v in var.m : k => v... }");
        let Some(Expr::ForObject {
            intro, grouping, ..
        }) = ast.expr(id)
        else {
            panic!("expected for object");
        };
        assert!(grouping);
        let intro = ast.for_intro(*intro).expect("intro");
        assert!(intro.key_var.is_some());
        assert_eq!(ast.identifier(intro.value_var), Some("v"));
    }

    #[test]
    fn object_keys_are_recorded() {
        let (ast, id) = lower("{ a = 1, \"b\" = true }");
        let Some(Expr::Object(items)) = ast.expr(id) else {
            panic!("expected object");
        };
        let keys: Vec<_> = items
            .iter()
            .filter_map(|i| ast.attribute(*i))
            .map(|a| a.key.clone())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn provider_function_names_keep_namespace() {
        let (ast, id) = lower("provider::aws::arn_parse(\"x\")");
        assert!(matches!(
            ast.expr(id),
            Some(Expr::MethodCall { name, .. }) if name == "provider::aws::arn_parse"
        ));
    }
}
