//! Structural types of Terraform/HCL expressions.

pub mod constraint;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::schema::{DataSourceType, ResourceType};

/// Inferred type of an expression.
///
/// `Invalid` marks expressions that cannot be typed (a missing object field,
/// an unknown resource); `Any` marks deliberately unconstrained values.
/// Container element `None` means the element type is unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    String,
    Number,
    Bool,
    Null,
    Any,
    Invalid,
    /// Bare name used structurally rather than as a value.
    Identifier,
    List(Option<Box<Type>>),
    Set(Option<Box<Type>>),
    Map(Option<Box<Type>>),
    Optional(Option<Box<Type>>),
    Tuple(Vec<Type>),
    /// `None` means an object of any shape.
    Object(Option<BTreeMap<String, Type>>),
    Resource(Arc<ResourceType>),
    DataSource(Arc<DataSourceType>),
    Module(Arc<ModuleType>),
}

/// Type of a `module` block: its outputs and input variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleType {
    pub name: String,
    /// `None` when the module source could not be loaded.
    pub fields: Option<BTreeMap<String, Type>>,
}

impl Type {
    pub fn list(element: Type) -> Type {
        Type::List(Some(Box::new(element)))
    }

    pub fn set(element: Type) -> Type {
        Type::Set(Some(Box::new(element)))
    }

    pub fn map(element: Type) -> Type {
        Type::Map(Some(Box::new(element)))
    }

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Some(Box::new(inner)))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Type)>) -> Type {
        Type::Object(Some(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Element type of a homogeneous container.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::List(e) | Type::Set(e) | Type::Map(e) | Type::Optional(e) => e.as_deref(),
            _ => None,
        }
    }

    /// Named fields of object-like types. `None` for objects of any shape.
    pub fn fields(&self) -> Option<Cow<'_, BTreeMap<String, Type>>> {
        match self {
            Type::Object(Some(fields)) => Some(Cow::Borrowed(fields)),
            Type::Module(m) => m.fields.as_ref().map(Cow::Borrowed),
            Type::Resource(r) => Some(Cow::Owned(r.block.field_types())),
            Type::DataSource(d) => Some(Cow::Owned(d.block.field_types())),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::String | Type::Number | Type::Bool | Type::Null | Type::Any
        )
    }

    /// Types whose values are named-field objects.
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            Type::Object(_) | Type::Resource(_) | Type::DataSource(_) | Type::Module(_)
        )
    }

    pub fn is_block_type(&self) -> bool {
        matches!(self, Type::Resource(_) | Type::DataSource(_) | Type::Module(_))
    }

    /// Type of field `name`, as seen by `a.name`.
    ///
    /// `None` means the type cannot be selected from at all.
    pub fn select_field(&self, name: &str) -> Option<Type> {
        match self {
            Type::Any => Some(Type::Any),
            Type::Object(None) => Some(Type::Any),
            Type::Object(Some(fields)) => Some(fields.get(name).cloned().unwrap_or(Type::Invalid)),
            Type::Map(element) => Some(element.as_deref().cloned().unwrap_or(Type::Any)),
            Type::Resource(r) => Some(r.block.field_type(name).unwrap_or(Type::Invalid)),
            Type::DataSource(d) => Some(d.block.field_type(name).unwrap_or(Type::Invalid)),
            Type::Module(m) => Some(match &m.fields {
                Some(fields) => fields.get(name).cloned().unwrap_or(Type::Invalid),
                None => Type::Any,
            }),
            _ => None,
        }
    }

    /// Whether a value of this type may be used where `target` is expected.
    pub fn is_convertible_to(&self, target: &Type) -> bool {
        if self == target || *target == Type::Any {
            return true;
        }
        if let Type::Optional(inner) = target {
            return match (self, inner) {
                (Type::Optional(mine), Some(inner)) => {
                    mine.as_deref().map_or(true, |m| m.is_convertible_to(inner))
                }
                (_, Some(inner)) => self.is_convertible_to(inner),
                (_, None) => true,
            };
        }

        match self {
            Type::String => matches!(target, Type::Number | Type::Bool),
            Type::Number | Type::Bool => *target == Type::String,
            Type::Null | Type::Any => true,
            Type::Invalid | Type::Identifier | Type::Optional(_) => false,
            t if t.is_object() => object_convertible(t.fields().as_deref(), target),
            Type::Map(element) => match target {
                Type::Map(other) => elements_convertible(element, other),
                t if t.is_object() => match (element, t.fields()) {
                    (Some(element), Some(fields)) => {
                        unique(fields.values()).iter().all(|f| element.is_convertible_to(f))
                    }
                    _ => true,
                },
                _ => false,
            },
            Type::Tuple(items) => match target {
                Type::Tuple(other) => {
                    items.len() == other.len()
                        && items.iter().zip(other).all(|(a, b)| a.is_convertible_to(b))
                }
                Type::List(element) | Type::Set(element) => match element {
                    Some(element) => items.iter().all(|i| i.is_convertible_to(element)),
                    None => true,
                },
                _ => false,
            },
            Type::List(element) | Type::Set(element) => match target {
                Type::List(other) | Type::Set(other) => elements_convertible(element, other),
                _ => false,
            },
            _ => false,
        }
    }
}

fn elements_convertible(from: &Option<Box<Type>>, to: &Option<Box<Type>>) -> bool {
    match (from, to) {
        (Some(from), Some(to)) => from.is_convertible_to(to),
        _ => true,
    }
}

fn object_convertible(fields: Option<&BTreeMap<String, Type>>, target: &Type) -> bool {
    match target {
        Type::Map(element) => {
            let (Some(fields), Some(element)) = (fields, element) else {
                return true;
            };
            if fields.is_empty() {
                return true;
            }
            let values = unique(fields.values());
            values.len() == 1 && values[0].is_convertible_to(element)
        }
        t if t.is_object() => {
            let (Some(fields), Some(wanted)) = (fields, t.fields()) else {
                return true;
            };
            let required_present = wanted
                .iter()
                .filter(|(_, ty)| !matches!(ty, Type::Optional(_)))
                .all(|(name, _)| fields.contains_key(name));
            if !required_present {
                return false;
            }
            fields
                .iter()
                .filter(|(_, ty)| !matches!(ty, Type::Optional(_)))
                .filter_map(|(name, ty)| wanted.get(name).map(|w| (ty, w)))
                .all(|(ty, w)| ty.is_convertible_to(w))
        }
        _ => false,
    }
}

/// Distinct types in first-seen order.
fn unique<'a>(types: impl IntoIterator<Item = &'a Type>) -> Vec<&'a Type> {
    let mut out: Vec<&Type> = Vec::new();
    for t in types {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

pub fn is_list_type(t: &Type) -> bool {
    matches!(t, Type::List(_) | Type::Set(_) | Type::Tuple(_))
}

pub fn is_object_type(t: &Type) -> bool {
    matches!(t, Type::Map(_)) || t.is_object()
}

/// A type every input converts to, or `None` when there is none.
///
/// Distinct primitives have no common supertype; callers fall back to `Any`.
pub fn common_supertype(input: &[Type]) -> Option<Type> {
    if input.is_empty() {
        return None;
    }
    if input.contains(&Type::Any) {
        return Some(Type::Any);
    }
    let mut set: Vec<&Type> = unique(input);
    if set.len() > 1 {
        set.retain(|t| **t != Type::Null);
    }
    if set.len() == 1 {
        return Some(set[0].clone());
    }

    if set.iter().all(|t| is_list_type(t)) {
        let inner: Vec<Type> = set
            .iter()
            .map(|t| match t {
                Type::List(e) | Type::Set(e) => e.as_deref().cloned().unwrap_or(Type::Any),
                Type::Tuple(items) => common_supertype(items).unwrap_or(Type::Any),
                _ => Type::Any,
            })
            .collect();
        return Some(Type::list(common_supertype(&inner).unwrap_or(Type::Any)));
    }

    if set.iter().all(|t| t.is_object()) {
        let mut common: BTreeMap<String, Vec<Type>> = BTreeMap::new();
        for t in &set {
            if let Some(fields) = t.fields() {
                for (k, v) in fields.iter() {
                    common.entry(k.clone()).or_default().push(v.clone());
                }
            }
        }
        return Some(Type::Object(Some(
            common
                .into_iter()
                .map(|(k, v)| (k, common_supertype(&v).unwrap_or(Type::Any)))
                .collect(),
        )));
    }

    if set.iter().all(|t| is_object_type(t)) {
        let mut inner = Vec::new();
        for t in &set {
            match t {
                Type::Map(e) => inner.push(e.as_deref().cloned().unwrap_or(Type::Any)),
                other => {
                    if let Some(fields) = other.fields() {
                        inner.extend(fields.values().cloned());
                    }
                }
            }
        }
        return Some(Type::map(common_supertype(&inner).unwrap_or(Type::Any)));
    }

    if set.iter().any(|t| matches!(t, Type::Optional(_))) {
        let unwrapped: Option<Vec<Type>> = set
            .iter()
            .map(|t| match t {
                Type::Optional(inner) => inner.as_deref().cloned(),
                other => Some((*other).clone()),
            })
            .collect();
        return common_supertype(&unwrapped?);
    }

    None
}

fn write_container(f: &mut fmt::Formatter<'_>, name: &str, e: &Option<Box<Type>>) -> fmt::Result {
    match e {
        Some(e) => write!(f, "{name}({e})"),
        None => f.write_str(name),
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &BTreeMap<String, Type>) -> fmt::Result {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    write!(f, "object({{{body}}})")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::String => f.write_str("string"),
            Type::Number => f.write_str("number"),
            Type::Bool => f.write_str("bool"),
            Type::Null => f.write_str("null"),
            Type::Any => f.write_str("any"),
            Type::Invalid => f.write_str("invalid"),
            Type::Identifier => f.write_str("identifier"),
            Type::List(e) => write_container(f, "list", e),
            Type::Set(e) => write_container(f, "set", e),
            Type::Map(e) => write_container(f, "map", e),
            Type::Optional(e) => write_container(f, "optional", e),
            Type::Tuple(items) => {
                let body = items
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "tuple([{body}])")
            }
            Type::Object(Some(fields)) if !fields.is_empty() => write_fields(f, fields),
            Type::Object(_) => f.write_str("object"),
            Type::Resource(r) => write!(f, "resource({})", r.type_name),
            Type::DataSource(d) => write!(f, "data-source({})", d.type_name),
            Type::Module(m) => write!(f, "module({})", m.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_supertype_of_equal_types() {
        assert_eq!(
            common_supertype(&[Type::String, Type::String]),
            Some(Type::String)
        );
    }

    #[test]
    fn distinct_primitives_have_no_common_supertype() {
        assert_eq!(common_supertype(&[Type::String, Type::Number]), None);
        assert_eq!(common_supertype(&[Type::Bool, Type::Number]), None);
        assert_eq!(common_supertype(&[]), None);
    }

    #[test]
    fn null_and_any_in_common_supertype() {
        assert_eq!(
            common_supertype(&[Type::String, Type::Null]),
            Some(Type::String)
        );
        assert_eq!(
            common_supertype(&[Type::Number, Type::Any]),
            Some(Type::Any)
        );
    }

    #[test]
    fn common_supertype_of_collections() {
        let lists = [Type::list(Type::String), Type::Tuple(vec![Type::String])];
        assert_eq!(common_supertype(&lists), Some(Type::list(Type::String)));

        let objects = [
            Type::object([("a", Type::String)]),
            Type::object([("a", Type::String), ("b", Type::Number)]),
        ];
        assert_eq!(
            common_supertype(&objects),
            Some(Type::object([("a", Type::String), ("b", Type::Number)]))
        );

        let mixed = [Type::map(Type::Number), Type::object([("a", Type::Number)])];
        assert_eq!(common_supertype(&mixed), Some(Type::map(Type::Number)));
    }

    #[test]
    fn primitive_conversions() {
        assert!(Type::String.is_convertible_to(&Type::Number));
        assert!(Type::Number.is_convertible_to(&Type::String));
        assert!(Type::Null.is_convertible_to(&Type::list(Type::Bool)));
        assert!(Type::Bool.is_convertible_to(&Type::Any));
        assert!(!Type::Number.is_convertible_to(&Type::Bool));
        assert!(!Type::Invalid.is_convertible_to(&Type::String));
        assert!(!Type::String.is_convertible_to(&Type::Invalid));
    }

    #[test]
    fn container_conversions() {
        assert!(Type::list(Type::Number).is_convertible_to(&Type::set(Type::String)));
        assert!(Type::List(None).is_convertible_to(&Type::list(Type::Number)));
        assert!(Type::Tuple(vec![Type::Number, Type::String])
            .is_convertible_to(&Type::list(Type::String)));
        assert!(!Type::Tuple(vec![Type::Number]).is_convertible_to(&Type::Tuple(vec![])));
        assert!(!Type::list(Type::String).is_convertible_to(&Type::map(Type::String)));
    }

    #[test]
    fn object_conversions() {
        let obj = Type::object([("a", Type::String), ("b", Type::Number)]);
        assert!(obj.is_convertible_to(&Type::object([("a", Type::String)])));
        assert!(!obj.is_convertible_to(&Type::object([("c", Type::String)])));
        assert!(obj.is_convertible_to(&Type::object([
            ("a", Type::String),
            ("c", Type::optional(Type::String)),
        ])));
        assert!(!obj.is_convertible_to(&Type::map(Type::String)));
        assert!(Type::object([("a", Type::String)]).is_convertible_to(&Type::map(Type::String)));
        assert!(Type::map(Type::String).is_convertible_to(&Type::object([("x", Type::Number)])));
    }

    #[test]
    fn select_field_on_objects_and_maps() {
        let obj = Type::object([("a", Type::String), ("b", Type::Number)]);
        assert_eq!(obj.select_field("a"), Some(Type::String));
        assert_eq!(obj.select_field("missing"), Some(Type::Invalid));
        assert_eq!(Type::map(Type::Bool).select_field("x"), Some(Type::Bool));
        assert_eq!(Type::String.select_field("x"), None);
    }

    #[test]
    fn presentable_text() {
        assert_eq!(Type::list(Type::String).to_string(), "list(string)");
        assert_eq!(Type::Map(None).to_string(), "map");
        assert_eq!(
            Type::Tuple(vec![Type::String, Type::Bool]).to_string(),
            "tuple([string, bool])"
        );
        assert_eq!(
            Type::object([("a", Type::String), ("b", Type::optional(Type::Number))]).to_string(),
            "object({a=string, b=optional(number)})"
        );
        assert_eq!(Type::Object(None).to_string(), "object");
        assert_eq!(
            Type::Module(Arc::new(ModuleType {
                name: "net".into(),
                fields: None
            }))
            .to_string(),
            "module(net)"
        );
    }
}
