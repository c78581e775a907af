use super::{LintCheck, LintContext, LintMessage};
use crate::types::Type;

/// References whose type cannot be determined: a missing object field, an
/// undeclared resource or local.
pub struct InvalidType;

impl LintCheck for InvalidType {
    fn name(&self) -> &'static str {
        "invalid-type"
    }

    fn run(&self, cx: &LintContext<'_>) -> Vec<LintMessage> {
        let ast = cx.project.ast();
        cx.outermost_references()
            .filter(|n| cx.engine.infer(*n) == Some(Type::Invalid))
            .map(|n| cx.message(self.name(), n, format!("'{}' has an invalid type", ast.text(n))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::tests::lint;
    use crate::lint::LintSettings;

    #[test]
    fn flags_missing_fields_and_declarations() {
        let main = r#"
locals {
  cfg  = { name = "x" }
  ok   = local.cfg.name
  bad  = local.cfg.nope
  gone = local.missing
  any  = var.anything.goes
}
"#;
        let msgs = lint(
            &[("/m/main.tf", main)],
            vec![Box::new(InvalidType)],
            &LintSettings::default(),
        );
        let texts: Vec<&str> = msgs.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(
            texts,
            [
                "'local.cfg.nope' has an invalid type",
                "'local.missing' has an invalid type",
            ]
        );
    }
}
