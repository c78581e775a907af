use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use serde_json::json;
use std::path::PathBuf;
use tfsema::config::{self, Config};
use tfsema::resolve::qualified_name;
use tfsema::{FsLoader, LintSeverity, Workspace};

#[derive(Parser)]
#[command(name = "tfsema")]
#[command(about = "Type inference and reference resolution for Terraform/HCL", long_about = None)]
struct Cli {
    /// Root module directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Configuration file (default: tfsema.toml in --dir, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Provider schema JSON from `terraform providers schema -json`. Can repeat.
    #[arg(long)]
    schema: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks and print diagnostics
    Check {},
    /// Print the inferred type of an expression evaluated in the root module
    Infer { expression: String },
    /// Print the declarations an expression refers to
    Resolve {
        expression: String,
        /// Include synthetic properties known only from schemas
        #[arg(long)]
        include_fake: bool,
    },
    /// Summarize loaded provider schemas, or list one resource type's fields
    Schema { resource: Option<String> },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_settings(&cli)?;
    let mut ws = Workspace::open(&cli.dir, &FsLoader, config)?;

    match cli.command {
        Commands::Check {} => {
            let messages = ws.lint();
            if cli.format == Format::Json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                for m in &messages {
                    let line = format!("{}: [{}] {}", m.file.display(), m.check, m.message);
                    match m.severity {
                        LintSeverity::Error => error!("{line}"),
                        _ => log::warn!("{line}"),
                    }
                }
            }
            let errors = messages
                .iter()
                .filter(|m| m.severity == LintSeverity::Error)
                .count();
            if errors > 0 {
                error!("Summary: {} error(s), {} warning(s)", errors, messages.len() - errors);
                std::process::exit(1);
            }
            info!("Summary: no errors, {} warning(s)", messages.len());
        }
        Commands::Infer { expression } => {
            let ty = ws
                .infer_expression(&expression)
                .with_context(|| format!("inferring {expression}"))?;
            let rendered = ty.map(|t| t.to_string());
            if cli.format == Format::Json {
                println!("{}", json!({ "expression": expression, "type": rendered }));
            } else {
                println!("{}", rendered.as_deref().unwrap_or("<none>"));
            }
        }
        Commands::Resolve {
            expression,
            include_fake,
        } => {
            let found = ws
                .resolve_expression(&expression, include_fake)
                .with_context(|| format!("resolving {expression}"))?;
            let ast = ws.project.ast();
            let rows: Vec<_> = found
                .iter()
                .map(|e| {
                    json!({
                        "element": e.describe(ast),
                        "synthetic": e.is_synthetic(),
                        "qualified_name": qualified_name(ast, e),
                        "file": e.node().map(|n| ast.file_of(n).path.display().to_string()),
                    })
                })
                .collect();
            if cli.format == Format::Json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if found.is_empty() {
                info!("{expression} does not resolve");
            } else {
                for e in &found {
                    match e.node() {
                        Some(n) => println!("{} ({})", e.describe(ast), ast.file_of(n).path.display()),
                        None => println!("{}", e.describe(ast)),
                    }
                }
            }
        }
        Commands::Schema { resource } => match resource {
            Some(name) => {
                let r = ws
                    .model
                    .resource(&name)
                    .ok_or_else(|| anyhow!("no schema for resource type '{name}'"))?;
                let fields = r.block.field_types();
                if cli.format == Format::Json {
                    let map: serde_json::Map<_, _> = fields
                        .iter()
                        .map(|(k, v)| (k.clone(), json!(v.to_string())))
                        .collect();
                    println!("{}", serde_json::Value::Object(map));
                } else {
                    for (k, v) in fields {
                        println!("{k}: {v}");
                    }
                }
            }
            None => {
                if cli.format == Format::Json {
                    println!(
                        "{}",
                        json!({
                            "resources": ws.model.resource_count(),
                            "data_sources": ws.model.data_source_count(),
                            "functions": ws.functions.len(),
                        })
                    );
                } else {
                    info!(
                        "{} resource(s), {} data source(s), {} function(s)",
                        ws.model.resource_count(),
                        ws.model.data_source_count(),
                        ws.functions.len()
                    );
                }
            }
        },
    }

    Ok(())
}

/// Config file settings, with `--schema` paths appended.
fn load_settings(cli: &Cli) -> Result<Config> {
    let loaded = match &cli.config {
        Some(path) => Some(
            config::load_config_from_path(path)?
                .ok_or_else(|| anyhow!("{} not found", path.display()))?,
        ),
        None => config::load_config(&cli.dir).with_context(|| "failed to load tfsema.toml")?,
    };
    let mut config = loaded.unwrap_or_default();
    let cwd = std::env::current_dir()?;
    config
        .settings
        .schemas
        .extend(cli.schema.iter().map(|s| cwd.join(s)));
    Ok(config)
}
