//! Decoding of `terraform providers schema -json` output.

use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use thiserror::Error;

use super::{
    BlockSchema, DataSourceType, Nesting, PropertySchema, ProviderFunction, ResourceType,
    SchemaItem, TypeModel,
};
use crate::types::{constraint, Type};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid provider schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported type {0}")]
    UnsupportedType(String),
    #[error("unknown nesting mode {mode:?} for block {block}")]
    UnknownNesting { block: String, mode: String },
    #[error("attribute {0} has neither a type nor a nested type")]
    UntypedAttribute(String),
}

#[derive(Debug, Deserialize)]
struct ProvidersSchema {
    #[serde(default)]
    provider_schemas: BTreeMap<String, ProviderSchema>,
}

#[derive(Debug, Deserialize)]
struct ProviderSchema {
    #[serde(default)]
    resource_schemas: BTreeMap<String, Schema>,
    #[serde(default)]
    data_source_schemas: BTreeMap<String, Schema>,
    #[serde(default)]
    functions: BTreeMap<String, FunctionSignature>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    block: Block,
}

#[derive(Debug, Default, Deserialize)]
struct Block {
    #[serde(default)]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    block_types: BTreeMap<String, NestedBlock>,
}

#[derive(Debug, Deserialize)]
struct Attribute {
    #[serde(rename = "type")]
    cty: Option<Json>,
    nested_type: Option<NestedAttributes>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    computed: bool,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Deserialize)]
struct NestedAttributes {
    #[serde(default)]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default = "single")]
    nesting_mode: String,
}

#[derive(Debug, Deserialize)]
struct NestedBlock {
    #[serde(default)]
    block: Block,
    #[serde(default = "single")]
    nesting_mode: String,
    #[serde(default)]
    min_items: u64,
}

#[derive(Debug, Deserialize)]
struct FunctionSignature {
    return_type: Json,
}

fn single() -> String {
    "single".to_string()
}

/// Short provider name: `registry.terraform.io/hashicorp/aws` is `aws`.
fn short_name(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}

pub(super) fn load_providers_schema(model: &mut TypeModel, json: &str) -> Result<(), SchemaError> {
    let schema: ProvidersSchema = serde_json::from_str(json)?;
    for (source, provider) in schema.provider_schemas {
        let short = short_name(&source).to_string();
        for (name, s) in provider.resource_schemas {
            let block = convert_block("resource", 2, &s.block)?;
            model.add_resource(ResourceType {
                type_name: name,
                provider: short.clone(),
                block,
            });
        }
        for (name, s) in provider.data_source_schemas {
            let block = convert_block("data", 2, &s.block)?;
            model.add_data_source(DataSourceType {
                type_name: name,
                provider: short.clone(),
                block,
            });
        }
        for (name, f) in provider.functions {
            model.add_function(ProviderFunction {
                provider: short.clone(),
                name,
                return_type: constraint::from_cty_json(&f.return_type)?,
            });
        }
        log::debug!(
            "loaded provider {source}: {} resources, {} data sources",
            model.resource_count(),
            model.data_source_count()
        );
    }
    Ok(())
}

fn convert_block(literal: &str, args: usize, block: &Block) -> Result<BlockSchema, SchemaError> {
    let mut items: Vec<SchemaItem> = Vec::new();
    for (name, attr) in &block.attributes {
        items.push(convert_attribute(name, attr)?.into());
    }
    for (name, nested) in &block.block_types {
        let mut b = convert_block(name, 0, &nested.block)?;
        b.nesting = Some(Nesting::parse(&nested.nesting_mode).ok_or_else(|| {
            SchemaError::UnknownNesting {
                block: name.clone(),
                mode: nested.nesting_mode.clone(),
            }
        })?);
        b.required = nested.min_items > 0;
        // A block with nothing but computed attributes is filled in by the provider.
        b.computed = !b.properties.is_empty() && b.properties.values().all(SchemaItem::computed);
        items.push(b.into());
    }
    Ok(BlockSchema::new(literal, args).with(items))
}

fn convert_attribute(name: &str, attr: &Attribute) -> Result<PropertySchema, SchemaError> {
    let r#type = match (&attr.cty, &attr.nested_type) {
        (Some(cty), _) => constraint::from_cty_json(cty)?,
        (None, Some(nested)) => nested_attributes_type(name, nested)?,
        (None, None) => return Err(SchemaError::UntypedAttribute(name.to_string())),
    };
    Ok(PropertySchema {
        name: name.to_string(),
        r#type,
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        deprecated: attr.deprecated,
    })
}

fn nested_attributes_type(name: &str, nested: &NestedAttributes) -> Result<Type, SchemaError> {
    let mut fields = BTreeMap::new();
    for (n, a) in &nested.attributes {
        fields.insert(n.clone(), convert_attribute(n, a)?.r#type);
    }
    let object = Type::Object(Some(fields));
    match Nesting::parse(&nested.nesting_mode) {
        Some(Nesting::Single | Nesting::Group) => Ok(object),
        Some(Nesting::List) => Ok(Type::list(object)),
        Some(Nesting::Set) => Ok(Type::set(object)),
        Some(Nesting::Map) => Ok(Type::map(object)),
        None => Err(SchemaError::UnknownNesting {
            block: name.to_string(),
            mode: nested.nesting_mode.clone(),
        }),
    }
}
