//! Block and property schemas: built-in Terraform root blocks plus provider
//! resources and data sources.

mod builtin;
mod loader;

pub use builtin::{root_block, root_blocks};
pub use loader::SchemaError;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::frontend::ast::{Ast, NodeId};
use crate::types::Type;

/// Property marking a schema whose attributes are not statically known;
/// any attribute name resolves against it.
pub const HAS_DYNAMIC_ATTRIBUTES: &str = "__has_dynamic_attributes";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertySchema {
    pub name: String,
    pub r#type: Type,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub deprecated: bool,
}

impl PropertySchema {
    pub fn new(name: &str, r#type: Type) -> Self {
        Self {
            name: name.to_string(),
            r#type,
            required: false,
            optional: true,
            computed: false,
            deprecated: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }
}

/// How a nested block repeats inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nesting {
    Single,
    Group,
    List,
    Set,
    Map,
}

impl Nesting {
    pub fn parse(mode: &str) -> Option<Self> {
        Some(match mode {
            "single" => Nesting::Single,
            "group" => Nesting::Group,
            "list" => Nesting::List,
            "set" => Nesting::Set,
            "map" => Nesting::Map,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockSchema {
    pub literal: String,
    /// Number of labels the block takes.
    pub args: usize,
    pub required: bool,
    pub computed: bool,
    pub nesting: Option<Nesting>,
    pub properties: BTreeMap<String, SchemaItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaItem {
    Property(PropertySchema),
    Block(BlockSchema),
}

impl SchemaItem {
    pub fn name(&self) -> &str {
        match self {
            SchemaItem::Property(p) => &p.name,
            SchemaItem::Block(b) => &b.literal,
        }
    }

    pub fn computed(&self) -> bool {
        match self {
            SchemaItem::Property(p) => p.computed,
            SchemaItem::Block(b) => b.computed,
        }
    }
}

impl From<PropertySchema> for SchemaItem {
    fn from(p: PropertySchema) -> Self {
        SchemaItem::Property(p)
    }
}

impl From<BlockSchema> for SchemaItem {
    fn from(b: BlockSchema) -> Self {
        SchemaItem::Block(b)
    }
}

impl BlockSchema {
    pub fn new(literal: &str, args: usize) -> Self {
        Self {
            literal: literal.to_string(),
            args,
            required: false,
            computed: false,
            nesting: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, items: impl IntoIterator<Item = SchemaItem>) -> Self {
        for item in items {
            self.properties.insert(item.name().to_string(), item);
        }
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Defaults overlaid with `self`'s own properties.
    pub fn merged_over(&self, defaults: &BlockSchema) -> BlockSchema {
        let mut merged = defaults.clone();
        merged.literal = self.literal.clone();
        merged
            .properties
            .extend(self.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn has_dynamic_attributes(&self) -> bool {
        self.properties.contains_key(HAS_DYNAMIC_ATTRIBUTES)
    }

    /// Value type of `name` inside an instance of this block.
    pub fn field_type(&self, name: &str) -> Option<Type> {
        match self.properties.get(name) {
            Some(SchemaItem::Property(p)) => Some(p.r#type.clone()),
            Some(SchemaItem::Block(b)) => Some(b.nested_type()),
            None if self.has_dynamic_attributes() => Some(Type::Any),
            None => None,
        }
    }

    pub fn field_types(&self) -> BTreeMap<String, Type> {
        self.properties
            .keys()
            .filter(|k| k.as_str() != HAS_DYNAMIC_ATTRIBUTES)
            .filter_map(|k| self.field_type(k).map(|t| (k.clone(), t)))
            .collect()
    }

    /// Type of the block used as a nested value, honoring its nesting mode.
    pub fn nested_type(&self) -> Type {
        let object = Type::Object(Some(self.field_types()));
        match self.nesting {
            Some(Nesting::List) => Type::list(object),
            Some(Nesting::Set) => Type::set(object),
            Some(Nesting::Map) => Type::map(object),
            _ => object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub type_name: String,
    pub provider: String,
    pub block: BlockSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSourceType {
    pub type_name: String,
    pub provider: String,
    pub block: BlockSchema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFunction {
    /// Short provider name, as in `provider::aws::arn_parse`.
    pub provider: String,
    pub name: String,
    pub return_type: Type,
}

/// Result of a fully qualified schema lookup.
#[derive(Debug, Clone, Copy)]
pub enum SchemaRef<'a> {
    Block(&'a BlockSchema),
    Property(&'a PropertySchema),
}

impl SchemaRef<'_> {
    pub fn computed(&self) -> bool {
        match self {
            SchemaRef::Block(b) => b.computed,
            SchemaRef::Property(p) => p.computed,
        }
    }
}

/// Provider by resource type prefix: `aws_instance` belongs to `aws`.
pub fn resource_prefix(type_name: &str) -> &str {
    type_name.split_once('_').map_or(type_name, |(p, _)| p)
}

/// Resources, data sources and functions known from provider schemas.
#[derive(Debug, Default, Clone)]
pub struct TypeModel {
    resources: HashMap<String, Arc<ResourceType>>,
    data_sources: HashMap<String, Arc<DataSourceType>>,
    functions: Vec<ProviderFunction>,
}

impl TypeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every provider schema file; paths are read eagerly.
    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut model = Self::new();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading provider schema {}", path.display()))?;
            model
                .load_providers_schema_json(&content)
                .with_context(|| format!("loading provider schema {}", path.display()))?;
        }
        Ok(model)
    }

    pub fn add_resource(&mut self, mut resource: ResourceType) {
        resource.block = resource.block.merged_over(builtin::abstract_resource());
        self.resources
            .insert(resource.type_name.clone(), Arc::new(resource));
    }

    pub fn add_data_source(&mut self, mut data_source: DataSourceType) {
        data_source.block = data_source
            .block
            .merged_over(builtin::abstract_data_source());
        self.data_sources
            .insert(data_source.type_name.clone(), Arc::new(data_source));
    }

    pub fn add_function(&mut self, function: ProviderFunction) {
        self.functions.push(function);
    }

    pub fn resource(&self, type_name: &str) -> Option<&Arc<ResourceType>> {
        self.resources.get(type_name)
    }

    pub fn data_source(&self, type_name: &str) -> Option<&Arc<DataSourceType>> {
        self.data_sources.get(type_name)
    }

    pub fn functions(&self) -> &[ProviderFunction] {
        &self.functions
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn data_source_count(&self) -> usize {
        self.data_sources.len()
    }

    /// Schema type of a resource, or a permissive stand-in when no provider
    /// schema describes it.
    pub fn resource_type(&self, type_name: &str) -> Arc<ResourceType> {
        match self.resources.get(type_name) {
            Some(r) => r.clone(),
            None => Arc::new(ResourceType {
                type_name: type_name.to_string(),
                provider: resource_prefix(type_name).to_string(),
                block: dynamic_defaults(builtin::abstract_resource()),
            }),
        }
    }

    pub fn data_source_type(&self, type_name: &str) -> Arc<DataSourceType> {
        match self.data_sources.get(type_name) {
            Some(d) => d.clone(),
            None => Arc::new(DataSourceType {
                type_name: type_name.to_string(),
                provider: resource_prefix(type_name).to_string(),
                block: dynamic_defaults(builtin::abstract_data_source()),
            }),
        }
    }

    /// Look up `resource.TYPE[.nested...]` or `data.TYPE[.nested...]`.
    pub fn get_by_fqn(&self, fqn: &str) -> Option<SchemaRef<'_>> {
        let parts: Vec<&str> = fqn.split('.').collect();
        if parts.len() < 2 {
            return None;
        }
        let block = match parts[0] {
            "resource" => &self.resources.get(parts[1])?.block,
            "data" => &self.data_sources.get(parts[1])?.block,
            _ => return None,
        };
        find_in_block(block, &parts[2..])
    }

    /// Schema of a block as written in configuration, resolved through its
    /// enclosing blocks.
    pub fn block_schema<'m>(&'m self, ast: &Ast, block: NodeId) -> Option<Cow<'m, BlockSchema>> {
        let b = ast.block(block)?;
        let parent = ast.enclosing_block(block);
        let Some(parent) = parent else {
            return match b.identifier.as_str() {
                "resource" => Some(match b.labels.first().and_then(|t| self.resource(t)) {
                    Some(r) => Cow::Borrowed(&r.block),
                    None => Cow::Owned(dynamic_defaults(builtin::abstract_resource())),
                }),
                "data" => Some(match b.labels.first().and_then(|t| self.data_source(t)) {
                    Some(d) => Cow::Borrowed(&d.block),
                    None => Cow::Owned(dynamic_defaults(builtin::abstract_data_source())),
                }),
                other => root_block(other).map(Cow::Borrowed),
            };
        };

        match b.identifier.as_str() {
            "dynamic" | "lifecycle" | "connection" | "provisioner" => {
                return root_block("resource")
                    .and_then(|r| nested_block(r, &b.identifier))
                    .map(Cow::Borrowed);
            }
            "content" if ast.block(parent).is_some_and(|p| p.identifier == "dynamic") => {
                let origin = ast.enclosing_block(parent)?;
                let label = ast.block_label(parent, 0)?;
                return child(self.block_schema(ast, origin)?, label);
            }
            _ => {}
        }

        child(self.block_schema(ast, parent)?, &b.identifier)
    }

    pub fn load_providers_schema_json(&mut self, json: &str) -> Result<(), SchemaError> {
        loader::load_providers_schema(self, json)
    }
}

fn nested_block<'a>(schema: &'a BlockSchema, name: &str) -> Option<&'a BlockSchema> {
    match schema.properties.get(name) {
        Some(SchemaItem::Block(b)) => Some(b),
        _ => None,
    }
}

fn child<'a>(schema: Cow<'a, BlockSchema>, name: &str) -> Option<Cow<'a, BlockSchema>> {
    match schema {
        Cow::Borrowed(s) => nested_block(s, name).map(Cow::Borrowed),
        Cow::Owned(s) => nested_block(&s, name).cloned().map(Cow::Owned),
    }
}

fn find_in_block<'a>(block: &'a BlockSchema, parts: &[&str]) -> Option<SchemaRef<'a>> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(SchemaRef::Block(block));
    };
    match block.properties.get(*first)? {
        SchemaItem::Property(p) if rest.is_empty() => Some(SchemaRef::Property(p)),
        SchemaItem::Property(_) => None,
        SchemaItem::Block(b) => find_in_block(b, rest),
    }
}

fn dynamic_defaults(defaults: &BlockSchema) -> BlockSchema {
    defaults.clone().with([PropertySchema::new(HAS_DYNAMIC_ATTRIBUTES, Type::Any).into()])
}
