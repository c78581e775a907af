use super::{Ast, Expr, Literal, NodeId, NodeKind};

pub(super) fn render(ast: &Ast, id: NodeId) -> String {
    let mut out = String::new();
    write_node(ast, id, &mut out);
    out
}

fn write_list(ast: &Ast, ids: &[NodeId], sep: &str, out: &mut String) {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        write_node(ast, *id, out);
    }
}

fn write_node(ast: &Ast, id: NodeId, out: &mut String) {
    match ast.kind(id) {
        NodeKind::Block(b) => {
            out.push_str(&b.identifier);
            for label in &b.labels {
                out.push_str(&format!(" \"{label}\""));
            }
            out.push_str(" { ... }");
        }
        NodeKind::Attribute(a) => {
            out.push_str(&a.key);
            out.push_str(" = ");
            write_node(ast, a.value, out);
        }
        NodeKind::ForIntro(f) => {
            out.push_str("for ");
            if let Some(k) = f.key_var {
                write_node(ast, k, out);
                out.push_str(", ");
            }
            write_node(ast, f.value_var, out);
            out.push_str(" in ");
            write_node(ast, f.container, out);
        }
        NodeKind::Expr(e) => write_expr(ast, e, out),
    }
}

fn write_expr(ast: &Ast, expr: &Expr, out: &mut String) {
    match expr {
        Expr::Literal(Literal::String(s)) => out.push_str(&format!("{s:?}")),
        Expr::Literal(Literal::Heredoc(_)) => out.push_str("<<EOT ... EOT"),
        Expr::Literal(Literal::Number(n)) => out.push_str(n),
        Expr::Literal(Literal::Bool(b)) => out.push_str(&b.to_string()),
        Expr::Literal(Literal::Null) => out.push_str("null"),
        Expr::Identifier(name) => out.push_str(name),
        Expr::Star => out.push('*'),
        Expr::Template(parts) => {
            out.push('"');
            for p in parts {
                out.push_str("${");
                write_node(ast, *p, out);
                out.push('}');
            }
            out.push('"');
        }
        Expr::Parenthesized(inner) => {
            out.push('(');
            if let Some(inner) = inner {
                write_node(ast, *inner, out);
            }
            out.push(')');
        }
        Expr::Unary { op, operand } => {
            out.push_str(op.as_str());
            write_node(ast, *operand, out);
        }
        Expr::Binary { op, lhs, rhs } => {
            write_node(ast, *lhs, out);
            out.push_str(&format!(" {} ", op.as_str()));
            write_node(ast, *rhs, out);
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            write_node(ast, *condition, out);
            out.push_str(" ? ");
            write_node(ast, *then, out);
            out.push_str(" : ");
            write_node(ast, *otherwise, out);
        }
        Expr::Array(items) => {
            out.push('[');
            write_list(ast, items, ", ", out);
            out.push(']');
        }
        Expr::Object(items) => {
            out.push('{');
            write_list(ast, items, ", ", out);
            out.push('}');
        }
        Expr::Select { from, field } => {
            write_node(ast, *from, out);
            out.push('.');
            write_node(ast, *field, out);
        }
        Expr::Index { from, index } => {
            write_node(ast, *from, out);
            out.push('[');
            write_node(ast, *index, out);
            out.push(']');
        }
        Expr::MethodCall { name, args } => {
            out.push_str(name);
            out.push('(');
            write_list(ast, args, ", ", out);
            out.push(')');
        }
        Expr::ForArray {
            intro,
            expr,
            condition,
        } => {
            out.push('[');
            write_node(ast, *intro, out);
            out.push_str(" : ");
            write_node(ast, *expr, out);
            if let Some(c) = condition {
                out.push_str(" if ");
                write_node(ast, *c, out);
            }
            out.push(']');
        }
        Expr::ForObject {
            intro,
            key,
            value,
            grouping,
            condition,
        } => {
            out.push('{');
            write_node(ast, *intro, out);
            out.push_str(" : ");
            write_node(ast, *key, out);
            out.push_str(" => ");
            write_node(ast, *value, out);
            if *grouping {
                out.push_str("...");
            }
            if let Some(c) = condition {
                out.push_str(" if ");
                write_node(ast, *c, out);
            }
            out.push('}');
        }
    }
}
