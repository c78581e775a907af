use super::{LintCheck, LintContext, LintMessage};
use crate::module::ModuleScope;

/// A variable default that does not convert to the declared type.
pub struct VariableDefaultType;

impl LintCheck for VariableDefaultType {
    fn name(&self) -> &'static str {
        "variable-default-type"
    }

    fn run(&self, cx: &LintContext<'_>) -> Vec<LintMessage> {
        let mut msgs = Vec::new();
        for module in cx.project.modules() {
            for variable in ModuleScope::new(cx.project, module.id).all_variables() {
                let (Some(declared), Some(default)) =
                    (variable.declared_type(), variable.default_value())
                else {
                    continue;
                };
                let Some(actual) = cx.engine.infer(default) else {
                    continue;
                };
                if !actual.is_convertible_to(&declared) {
                    msgs.push(cx.message(
                        self.name(),
                        variable.block,
                        format!(
                            "default of variable '{}' is {actual}, expected {declared}",
                            variable.name()
                        ),
                    ));
                }
            }
        }
        msgs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::tests::lint;
    use crate::lint::LintSettings;

    #[test]
    fn flags_unconvertible_defaults() {
        let main = r#"
variable "port" {
  type    = number
  default = "8080"
}

variable "tags" {
  type    = map(string)
  default = { env = "prod" }
}

variable "zones" {
  type    = list(string)
  default = { a = 1 }
}

variable "untyped" {
  default = true
}
"#;
        let msgs = lint(
            &[("/m/main.tf", main)],
            vec![Box::new(VariableDefaultType)],
            &LintSettings::default(),
        );
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].message.starts_with("default of variable 'zones'"));
    }
}
