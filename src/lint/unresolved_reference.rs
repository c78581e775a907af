use super::{LintCheck, LintContext, LintMessage};
use crate::frontend::ast::{is_star_or_number, Dialect, Expr, NodeId};
use crate::infer::for_each::{dynamic_iterator, for_binding};

/// Scope names whose selections never name a declaration.
const BUILTIN_SCOPES: &[&str] = &["each", "count", "path", "terraform", "self", "data"];

/// `var.x`, `local.x`, `module.x`, `TYPE.NAME` and `data.TYPE.NAME` that name
/// nothing declared in the module.
pub struct UnresolvedReference;

impl UnresolvedReference {
    /// Whether `node` is the declaration-naming prefix of a reference.
    fn is_declaration_reference(cx: &LintContext<'_>, node: NodeId) -> bool {
        let ast = cx.project.ast();
        if ast.dialect(node) != Dialect::Terraform {
            return false;
        }
        let Some(Expr::Select { from, field }) = ast.expr(node) else {
            return false;
        };
        if ast.field_text(*field).map_or(true, |f| is_star_or_number(&f)) {
            return false;
        }
        match ast.expr(*from) {
            Some(Expr::Identifier(head)) => {
                !BUILTIN_SCOPES.contains(&head.as_str())
                    && for_binding(ast, *from, head).is_none()
                    && dynamic_iterator(ast, node, head).is_none()
            }
            Some(Expr::Select { from: inner, .. }) => {
                ast.identifier(*inner) == Some("data") && for_binding(ast, *inner, "data").is_none()
            }
            _ => false,
        }
    }
}

impl LintCheck for UnresolvedReference {
    fn name(&self) -> &'static str {
        "unresolved-reference"
    }

    fn run(&self, cx: &LintContext<'_>) -> Vec<LintMessage> {
        let ast = cx.project.ast();
        cx.live_nodes()
            .filter(|n| Self::is_declaration_reference(cx, *n))
            .filter(|n| cx.resolver.resolve(*n, true).is_empty())
            .map(|n| {
                cx.message(
                    self.name(),
                    n,
                    format!("'{}' does not refer to any declaration", ast.text(n)),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::tests::lint;
    use crate::lint::LintSettings;

    #[test]
    fn flags_undeclared_names_only() {
        let main = r#"
variable "region" {}

resource "aws_instance" "web" {
  count = 2
  ami   = "${var.region}-${count.index}-${path.module}"
  tags  = { for k, v in var.tags : k => v.name }
}

data "aws_ami" "ubuntu" {}

output "ids" {
  value = [aws_instance.web[0].id, aws_instance.db.id, data.aws_ami.ubuntu.id, data.aws_ami.other.id]
}
"#;
        let msgs = lint(
            &[("/m/main.tf", main)],
            vec![Box::new(UnresolvedReference)],
            &LintSettings::default(),
        );
        let mut texts: Vec<&str> = msgs.iter().map(|m| m.message.as_str()).collect();
        texts.sort();
        assert_eq!(
            texts,
            [
                "'aws_instance.db' does not refer to any declaration",
                "'data.aws_ami.other' does not refer to any declaration",
                "'var.tags' does not refer to any declaration",
            ]
        );
    }
}
