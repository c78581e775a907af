//! Type constraints: `type = list(object({...}))` and the cty JSON encoding.

use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::frontend::ast::{Ast, Expr, Literal, NodeId};
use crate::schema::SchemaError;
use crate::types::Type;

/// Build the type described by a type constraint expression.
///
/// Malformed constraints yield `Type::Invalid`.
pub fn from_expression(ast: &Ast, node: NodeId) -> Type {
    let Some(expr) = ast.expr(node) else {
        return Type::Invalid;
    };
    match expr {
        Expr::Identifier(name) => keyword(name).unwrap_or(Type::Invalid),
        // Terraform 0.11 style: type = "string"
        Expr::Literal(Literal::String(name)) => keyword(name).unwrap_or(Type::Invalid),
        Expr::Parenthesized(Some(inner)) => from_expression(ast, *inner),
        Expr::MethodCall { name, args } => {
            let first = args.first().map(|a| from_expression(ast, *a));
            match (name.as_str(), first) {
                ("list", Some(t)) => Type::list(t),
                ("set", Some(t)) => Type::set(t),
                ("map", Some(t)) => Type::map(t),
                ("optional", Some(t)) => Type::optional(t),
                ("tuple", _) => match args.first().and_then(|a| ast.expr(*a)) {
                    Some(Expr::Array(items)) => {
                        Type::Tuple(items.iter().map(|i| from_expression(ast, *i)).collect())
                    }
                    _ => Type::Invalid,
                },
                ("object", _) => match args.first().and_then(|a| ast.expr(*a)) {
                    Some(Expr::Object(items)) => Type::Object(Some(
                        items
                            .iter()
                            .filter_map(|i| ast.attribute(*i))
                            .map(|a| (a.key.clone(), from_expression(ast, a.value)))
                            .collect(),
                    )),
                    _ => Type::Invalid,
                },
                _ => Type::Invalid,
            }
        }
        _ => Type::Invalid,
    }
}

fn keyword(name: &str) -> Option<Type> {
    Some(match name {
        "string" => Type::String,
        "number" => Type::Number,
        "bool" => Type::Bool,
        "any" => Type::Any,
        "list" => Type::List(None),
        "set" => Type::Set(None),
        "map" => Type::Map(None),
        "object" => Type::Object(None),
        _ => return None,
    })
}

/// Decode a cty type as written in `terraform providers schema -json` output.
pub fn from_cty_json(value: &Json) -> Result<Type, SchemaError> {
    match value {
        Json::String(s) => match s.as_str() {
            "string" => Ok(Type::String),
            "number" => Ok(Type::Number),
            "bool" => Ok(Type::Bool),
            "dynamic" => Ok(Type::Any),
            other => Err(SchemaError::UnsupportedType(other.to_string())),
        },
        Json::Array(parts) => {
            let kind = parts.first().and_then(Json::as_str).unwrap_or_default();
            let arg = parts.get(1);
            match (kind, arg) {
                ("list", Some(e)) => Ok(Type::list(from_cty_json(e)?)),
                ("set", Some(e)) => Ok(Type::set(from_cty_json(e)?)),
                ("map", Some(e)) => Ok(Type::map(from_cty_json(e)?)),
                ("tuple", Some(Json::Array(items))) => Ok(Type::Tuple(
                    items.iter().map(from_cty_json).collect::<Result<_, _>>()?,
                )),
                ("object", Some(Json::Object(attrs))) => {
                    let optional: Vec<&str> = parts
                        .get(2)
                        .and_then(Json::as_array)
                        .map(|a| a.iter().filter_map(Json::as_str).collect())
                        .unwrap_or_default();
                    let mut fields = BTreeMap::new();
                    for (name, t) in attrs {
                        let t = from_cty_json(t)?;
                        let t = if optional.contains(&name.as_str()) {
                            Type::optional(t)
                        } else {
                            t
                        };
                        fields.insert(name.clone(), t);
                    }
                    Ok(Type::Object(Some(fields)))
                }
                _ => Err(SchemaError::UnsupportedType(value.to_string())),
            }
        }
        other => Err(SchemaError::UnsupportedType(other.to_string())),
    }
}
