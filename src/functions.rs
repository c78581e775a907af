// Return types of Terraform built-in and provider-defined functions

use std::collections::HashMap;

use crate::frontend::ast::Dialect;
use crate::schema::TypeModel;
use crate::types::Type;

/// Function name to return type, for one dialect.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Type>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, return_type: Type) {
        self.functions.insert(name.to_string(), return_type);
    }

    /// Table with every Terraform built-in function.
    pub fn terraform() -> Self {
        let mut t = Self::new();
        let list_any = || Type::List(None);
        let map_any = || Type::Map(None);

        // Numeric functions
        for name in ["abs", "ceil", "floor", "log", "max", "min", "parseint", "pow", "signum"] {
            t.declare(name, Type::Number);
        }

        // String functions
        for name in [
            "chomp", "endswith", "format", "formatlist", "indent", "join", "lower", "replace",
            "startswith", "strrev", "substr", "title", "trim", "trimprefix", "trimsuffix",
            "trimspace", "upper", "templatestring",
        ] {
            t.declare(name, Type::String);
        }
        t.declare("formatlist", Type::list(Type::String));
        t.declare("split", Type::list(Type::String));
        t.declare("regex", Type::Any);
        t.declare("regexall", list_any());
        t.declare("strcontains", Type::Bool);

        // Collection functions
        t.declare("alltrue", Type::Bool);
        t.declare("anytrue", Type::Bool);
        t.declare("chunklist", Type::list(list_any()));
        t.declare("coalesce", Type::Any);
        t.declare("coalescelist", list_any());
        t.declare("compact", Type::list(Type::String));
        t.declare("concat", list_any());
        t.declare("contains", Type::Bool);
        t.declare("distinct", list_any());
        t.declare("element", Type::Any);
        t.declare("flatten", list_any());
        t.declare("index", Type::Number);
        t.declare("keys", Type::list(Type::String));
        t.declare("length", Type::Number);
        t.declare("lookup", Type::Any);
        t.declare("matchkeys", list_any());
        t.declare("merge", map_any());
        t.declare("one", Type::Any);
        t.declare("range", Type::list(Type::Number));
        t.declare("reverse", list_any());
        t.declare("setintersection", Type::Set(None));
        t.declare("setproduct", list_any());
        t.declare("setsubtract", Type::Set(None));
        t.declare("setunion", Type::Set(None));
        t.declare("slice", list_any());
        t.declare("sort", Type::list(Type::String));
        t.declare("sum", Type::Number);
        t.declare("transpose", Type::map(Type::list(Type::String)));
        t.declare("values", list_any());
        t.declare("zipmap", map_any());

        // Encoding functions
        for name in [
            "base64encode", "base64decode", "base64gzip", "csvdecode", "jsonencode",
            "textencodebase64", "textdecodebase64", "urlencode", "yamlencode",
        ] {
            t.declare(name, Type::String);
        }
        t.declare("csvdecode", Type::list(Type::map(Type::String)));
        t.declare("jsondecode", Type::Any);
        t.declare("yamldecode", Type::Any);

        // Filesystem functions
        for name in [
            "abspath", "dirname", "pathexpand", "basename", "file", "filebase64", "templatefile",
        ] {
            t.declare(name, Type::String);
        }
        t.declare("fileexists", Type::Bool);
        t.declare("fileset", Type::set(Type::String));

        // Date and time functions
        for name in ["formatdate", "plantimestamp", "timeadd", "timestamp"] {
            t.declare(name, Type::String);
        }
        t.declare("timecmp", Type::Number);

        // Hash and crypto functions
        for name in [
            "base64sha256", "base64sha512", "bcrypt", "filebase64sha256", "filebase64sha512",
            "filemd5", "filesha1", "filesha256", "filesha512", "md5", "rsadecrypt", "sha1",
            "sha256", "sha512", "uuid", "uuidv5",
        ] {
            t.declare(name, Type::String);
        }

        // IP network functions
        t.declare("cidrhost", Type::String);
        t.declare("cidrnetmask", Type::String);
        t.declare("cidrsubnet", Type::String);
        t.declare("cidrsubnets", Type::list(Type::String));

        // Type conversion functions
        t.declare("can", Type::Bool);
        t.declare("issensitive", Type::Bool);
        t.declare("nonsensitive", Type::Any);
        t.declare("sensitive", Type::Any);
        t.declare("tobool", Type::Bool);
        t.declare("tolist", list_any());
        t.declare("tomap", map_any());
        t.declare("tonumber", Type::Number);
        t.declare("toset", Type::Set(None));
        t.declare("tostring", Type::String);
        t.declare("try", Type::Any);
        t.declare("type", Type::Any);

        t
    }

    /// Terraform built-ins plus the functions of every loaded provider, as
    /// `provider::NAME::FUNCTION`.
    pub fn with_providers(model: &TypeModel) -> Self {
        let mut t = Self::terraform();
        for f in model.functions() {
            t.declare(
                &format!("provider::{}::{}", f.provider, f.name),
                f.return_type.clone(),
            );
        }
        t
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Return type of a call to `name` in `dialect`. Only the Terraform
    /// dialect has a function table; unknown functions return `Any`.
    pub fn return_type(&self, dialect: Dialect, name: &str) -> Type {
        match dialect {
            Dialect::Terraform => self.get(name).cloned().unwrap_or(Type::Any),
            Dialect::Hcl => Type::Any,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProviderFunction;

    #[test]
    fn builtins_have_return_types() {
        let t = FunctionTable::terraform();
        assert_eq!(t.return_type(Dialect::Terraform, "upper"), Type::String);
        assert_eq!(t.return_type(Dialect::Terraform, "length"), Type::Number);
        assert_eq!(
            t.return_type(Dialect::Terraform, "split"),
            Type::list(Type::String)
        );
        assert_eq!(t.return_type(Dialect::Terraform, "no_such_fn"), Type::Any);
        assert_eq!(t.return_type(Dialect::Hcl, "upper"), Type::Any);
    }

    #[test]
    fn provider_functions_are_namespaced() {
        let mut model = TypeModel::new();
        model.add_function(ProviderFunction {
            provider: "aws".into(),
            name: "arn_parse".into(),
            return_type: Type::object([("region", Type::String)]),
        });
        let t = FunctionTable::with_providers(&model);
        assert_eq!(
            t.return_type(Dialect::Terraform, "provider::aws::arn_parse"),
            Type::object([("region", Type::String)])
        );
        assert!(t.get("arn_parse").is_none());
    }
}
