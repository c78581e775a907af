use std::fs;
use std::path::Path;

use tempfile::tempdir;
use tfsema::{config, Element, FsLoader, LintSeverity, Type, Workspace};

const SCHEMA: &str = r#"{
  "format_version": "1.0",
  "provider_schemas": {
    "registry.terraform.io/hashicorp/aws": {
      "resource_schemas": {
        "aws_instance": {
          "version": 1,
          "block": {
            "attributes": {
              "ami": { "type": "string", "required": true },
              "arn": { "type": "string", "computed": true }
            },
            "block_types": {
              "root_block_device": {
                "nesting_mode": "list",
                "block": {
                  "attributes": { "volume_id": { "type": "string", "computed": true } }
                }
              }
            }
          }
        }
      }
    }
  }
}"#;

const MAIN: &str = r#"
variable "v" {
  type = list(string)
}

variable "list" {
  type = list(object({ name = string }))
}

locals {
  m     = { a = 1, b = "x" }
  names = [for x in var.list : x.name]
}

resource "aws_instance" "web" {
  ami = "ami-1"
}

module "net" {
  source = "./modules/net"
}

output "vpc" {
  value = module.net.vpc_id
}
"#;

const NET: &str = r#"
variable "cidr" {
  type    = string
  default = "10.0.0.0/16"
}

output "vpc_id" {
  value = "vpc-${var.cidr}"
}
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn workspace(root: &Path) -> Workspace {
    let config = config::load_config(root).unwrap().unwrap_or_default();
    Workspace::open(root, &FsLoader, config).unwrap()
}

fn project_dir() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", MAIN);
    write(dir.path(), "modules/net/main.tf", NET);
    write(dir.path(), "schema/aws.json", SCHEMA);
    write(
        dir.path(),
        "tfsema.toml",
        "[settings]\nschemas = [\"schema/aws.json\"]\n",
    );
    dir
}

#[test]
fn infers_types_across_modules() {
    let dir = project_dir();
    let mut ws = workspace(dir.path());
    assert_eq!(ws.model.resource_count(), 1);

    assert_eq!(ws.infer_expression("var.v[0]").unwrap(), Some(Type::String));
    assert_eq!(ws.infer_expression("local.m.b").unwrap(), Some(Type::String));
    assert_eq!(ws.infer_expression("local.m.missing").unwrap(), Some(Type::Invalid));
    assert_eq!(
        ws.infer_expression("[for x in var.list : x.name]").unwrap(),
        Some(Type::list(Type::String))
    );
    assert_eq!(ws.infer_expression("aws_instance.web.arn").unwrap(), Some(Type::String));
    assert_eq!(ws.infer_expression("module.net.vpc_id").unwrap(), Some(Type::String));
}

#[test]
fn repeated_inference_hits_the_cache() {
    let dir = project_dir();
    let mut ws = workspace(dir.path());
    let node = ws.expression("local.m.b").unwrap();
    let first = ws.engine().infer(node);
    let before = ws.cache.stats();
    let second = ws.engine().infer(node);
    let after = ws.cache.stats();
    assert_eq!(first, second);
    assert_eq!(after.hits, before.hits + 1);
    assert_eq!(after.misses, before.misses);
}

#[test]
fn resolves_declarations_and_schema_properties() {
    let dir = project_dir();
    let mut ws = workspace(dir.path());

    let outputs = ws.resolve_expression("module.net.vpc_id", false).unwrap();
    assert_eq!(outputs.len(), 1);
    let file = &ws.project.ast().file_of(outputs[0].node().unwrap()).path;
    assert!(file.ends_with("modules/net/main.tf"));

    let text = "aws_instance.web.root_block_device[0].volume_id";
    let fake = ws.resolve_expression(text, true).unwrap();
    assert!(matches!(&fake[..], [Element::Synthetic(s)] if s.name == "volume_id"));
    assert!(ws.resolve_expression(text, false).unwrap().is_empty());
}

#[test]
fn check_reports_problems_with_configured_severity() {
    let dir = project_dir();
    write(
        dir.path(),
        "broken.tf",
        "output \"bad\" {\n  value = aws_instance.db.arn\n}\n\nvariable \"v\" {}\n",
    );
    write(
        dir.path(),
        "tfsema.toml",
        "[settings]\nschemas = [\"schema/aws.json\"]\n\n[lint.severity]\ninvalid-type = \"warn\"\n",
    );
    let ws = workspace(dir.path());
    let messages = ws.lint();

    let checks: Vec<(&str, LintSeverity)> = messages.iter().map(|m| (m.check, m.severity)).collect();
    assert!(checks.contains(&("invalid-type", LintSeverity::Warn)));
    assert!(checks.contains(&("unresolved-reference", LintSeverity::Error)));
    assert!(checks.contains(&("duplicate-declaration", LintSeverity::Error)));
    assert!(messages
        .iter()
        .filter(|m| m.check != "duplicate-declaration")
        .all(|m| m.file.ends_with("broken.tf")));
}

#[test]
fn invalid_files_fail_to_load() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.tf", "locals {\n");
    let err = Workspace::open(dir.path(), &FsLoader, Default::default()).err().unwrap();
    assert!(format!("{err:#}").contains("main.tf"));
}
