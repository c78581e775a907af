use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{BlockSchema, PropertySchema, SchemaItem};
use crate::types::Type;

fn prop(name: &str, t: Type) -> SchemaItem {
    PropertySchema::new(name, t).into()
}

fn depends_on() -> SchemaItem {
    prop("depends_on", Type::List(None))
}

fn conditions(literal: &str) -> BlockSchema {
    BlockSchema::new(literal, 0).with([
        prop("condition", Type::Bool),
        prop("error_message", Type::String),
    ])
}

fn lifecycle() -> BlockSchema {
    BlockSchema::new("lifecycle", 0).with([
        prop("create_before_destroy", Type::Bool),
        prop("prevent_destroy", Type::Bool),
        prop("ignore_changes", Type::list(Type::Any)),
        prop("replace_triggered_by", Type::list(Type::Any)),
        conditions("precondition").into(),
        conditions("postcondition").into(),
    ])
}

fn connection() -> BlockSchema {
    BlockSchema::new("connection", 0).with([
        prop("type", Type::String),
        prop("user", Type::String),
        prop("password", Type::String),
        prop("host", Type::String),
        prop("port", Type::Number),
        prop("timeout", Type::String),
        prop("script_path", Type::String),
        prop("private_key", Type::String),
        prop("agent", Type::Bool),
        prop("bastion_host", Type::String),
        prop("bastion_port", Type::Number),
        prop("bastion_user", Type::String),
        prop("https", Type::Bool),
        prop("insecure", Type::Bool),
        prop("cacert", Type::String),
    ])
}

fn dynamic() -> BlockSchema {
    BlockSchema::new("dynamic", 1).with([
        PropertySchema::new("for_each", Type::Any).required().into(),
        prop("labels", Type::List(None)),
        prop("iterator", Type::Identifier),
        BlockSchema::new("content", 0).required().into(),
    ])
}

fn resource() -> BlockSchema {
    BlockSchema::new("resource", 2).with([
        PropertySchema::new("id", Type::String).computed().into(),
        prop("count", Type::Number),
        prop("for_each", Type::Any),
        depends_on(),
        prop("provider", Type::String),
        lifecycle().into(),
        dynamic().into(),
        connection().into(),
        BlockSchema::new("provisioner", 1)
            .with([connection().into()])
            .into(),
    ])
}

fn data_source() -> BlockSchema {
    BlockSchema::new("data", 2).with([
        PropertySchema::new("id", Type::String).computed().into(),
        prop("count", Type::Number),
        prop("for_each", Type::Any),
        depends_on(),
        lifecycle().into(),
        prop("provider", Type::String),
    ])
}

fn build() -> BTreeMap<String, BlockSchema> {
    let blocks = [
        BlockSchema::new("module", 1).with([
            PropertySchema::new("source", Type::String).required().into(),
            prop("version", Type::String),
            depends_on(),
            prop("count", Type::Number),
            prop("for_each", Type::Any),
            prop("providers", Type::map(Type::String)),
        ]),
        BlockSchema::new("output", 1).with([
            PropertySchema::new("value", Type::Any).required().into(),
            prop("description", Type::String),
            depends_on(),
            prop("sensitive", Type::Bool),
            conditions("precondition").into(),
        ]),
        BlockSchema::new("variable", 1).with([
            prop("type", Type::Any),
            prop("default", Type::Any),
            conditions("validation").into(),
            prop("description", Type::String),
            prop("sensitive", Type::Bool),
            prop("nullable", Type::Bool),
        ]),
        BlockSchema::new("provider", 1).with([
            prop("alias", Type::String),
            prop("version", Type::String),
        ]),
        resource(),
        data_source(),
        BlockSchema::new("terraform", 0).with([
            prop("required_version", Type::String),
            prop("experiments", Type::List(None)),
            BlockSchema::new("required_providers", 0).into(),
            BlockSchema::new("cloud", 0)
                .with([
                    prop("organization", Type::String),
                    BlockSchema::new("workspaces", 0)
                        .required()
                        .with([
                            prop("name", Type::String),
                            prop("tags", Type::list(Type::String)),
                        ])
                        .into(),
                ])
                .into(),
            BlockSchema::new("backend", 1).into(),
        ]),
        BlockSchema::new("locals", 0),
        BlockSchema::new("moved", 0).with([
            PropertySchema::new("from", Type::Identifier).required().into(),
            PropertySchema::new("to", Type::Identifier).required().into(),
        ]),
        BlockSchema::new("import", 0).with([
            PropertySchema::new("id", Type::String).required().into(),
            PropertySchema::new("to", Type::Identifier).required().into(),
            prop("provider", Type::String),
        ]),
        BlockSchema::new("check", 1).with([
            data_source().into(),
            conditions("assert").required().into(),
        ]),
        BlockSchema::new("removed", 0).with([
            PropertySchema::new("from", Type::Identifier).required().into(),
            lifecycle().into(),
        ]),
    ];
    blocks
        .into_iter()
        .map(|b| (b.literal.clone(), b))
        .collect()
}

static ROOT_BLOCKS: OnceLock<BTreeMap<String, BlockSchema>> = OnceLock::new();

/// Schemas of every block allowed at the top level of a Terraform file.
pub fn root_blocks() -> &'static BTreeMap<String, BlockSchema> {
    ROOT_BLOCKS.get_or_init(build)
}

pub fn root_block(literal: &str) -> Option<&'static BlockSchema> {
    root_blocks().get(literal)
}

pub(super) fn abstract_resource() -> &'static BlockSchema {
    static RESOURCE: OnceLock<BlockSchema> = OnceLock::new();
    RESOURCE.get_or_init(resource)
}

pub(super) fn abstract_data_source() -> &'static BlockSchema {
    static DATA: OnceLock<BlockSchema> = OnceLock::new();
    DATA.get_or_init(data_source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_blocks_are_indexed_by_literal() {
        for name in ["resource", "data", "module", "variable", "output", "locals"] {
            assert!(root_block(name).is_some(), "missing {name}");
        }
        let resource = root_block("resource").unwrap();
        assert_eq!(resource.args, 2);
        assert!(matches!(
            resource.properties.get("id"),
            Some(SchemaItem::Property(p)) if p.computed
        ));
        assert!(root_block("nonsense").is_none());
    }
}
