//! Resource verbs: list, show, exists, create, modify, delete, stats.

use serde_json::{Map, Value, json};

use icontrol_core::{ManagementRoot, ResourceNode};

use crate::cli::{CreateArgs, GlobalOpts, ListArgs, ModifyArgs, TargetArgs};
use crate::error::CliError;
use crate::output;

// ── Argument helpers ─────────────────────────────────────────────────

fn parse_query(pairs: &[String]) -> Result<Vec<(String, String)>, CliError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| CliError::Validation {
                    field: "query".into(),
                    reason: format!("expected KEY=VALUE, got '{pair}'"),
                })
        })
        .collect()
}

/// Identity flags plus extra query keys as a load parameter object.
fn target_params(args: &TargetArgs) -> Result<Value, CliError> {
    let mut params = Map::new();
    let identity = [
        ("name", &args.name),
        ("partition", &args.partition),
        ("subPath", &args.sub_path),
        ("id", &args.id),
    ];
    for (key, value) in identity {
        if let Some(value) = value {
            params.insert(key.to_owned(), Value::String(value.clone()));
        }
    }
    for (key, value) in parse_query(&args.query)? {
        params.insert(key, Value::String(value));
    }
    Ok(Value::Object(params))
}

fn parse_document(raw: &str) -> Result<Value, CliError> {
    let doc: Value = serde_json::from_str(raw)?;
    if !doc.is_object() {
        return Err(CliError::Validation {
            field: "data".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(doc)
}

async fn load_target(
    root: &ManagementRoot,
    args: &TargetArgs,
) -> Result<ResourceNode, CliError> {
    let node = root.navigate(&args.path)?;
    Ok(node.load(target_params(args)?).await?)
}

fn print_single(value: &Value, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(global.output, value)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn list(
    root: &ManagementRoot,
    args: &ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let query = parse_query(&args.query)?;
    let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let items = root.navigate(&args.path)?.get_collection(&query).await?;
    let items: Vec<Value> = items.iter().map(ResourceNode::raw).collect();

    let out = output::render_list(global.output, &items)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn show(
    root: &ManagementRoot,
    args: &TargetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let node = load_target(root, args).await?;
    print_single(&node.raw(), global)
}

pub async fn exists(
    root: &ManagementRoot,
    args: &TargetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let node = root.navigate(&args.path)?;
    if node.exists(target_params(args)?).await? {
        output::print_output("true", global.quiet);
        return Ok(());
    }
    Err(CliError::NotFound {
        message: format!("no {} matches the given identity", node.type_name()),
    })
}

pub async fn create(
    root: &ManagementRoot,
    args: &CreateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let raw = match (&args.data, &args.file) {
        (Some(data), _) => data.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "data".into(),
                reason: "pass the resource as --data '<json>' or --file <path>".into(),
            });
        }
    };
    let doc = parse_document(&raw)?;

    let mut node = root.navigate(&args.path)?;
    node.create(doc).await?;
    print_single(&node.raw(), global)
}

pub async fn modify(
    root: &ManagementRoot,
    args: &ModifyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let patch = parse_document(&args.data)?;
    let mut node = load_target(root, &args.target).await?;
    node.modify(patch).await?;
    print_single(&node.raw(), global)
}

pub async fn delete(
    root: &ManagementRoot,
    args: &TargetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut node = load_target(root, args).await?;
    let label = node.identity().full_path();
    node.delete().await?;
    if !global.quiet {
        eprintln!("Deleted {} {label}", node.type_name());
    }
    Ok(())
}

pub async fn stats(
    root: &ManagementRoot,
    args: &TargetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let node = load_target(root, args).await?;
    print_single(&node.stats().await?, global)
}

pub fn version(root: &ManagementRoot, global: &GlobalOpts) -> Result<(), CliError> {
    let version = root
        .device_version()
        .map_or_else(|| "unknown".to_owned(), ToString::to_string);
    if global.output == crate::cli::OutputFormat::Plain {
        output::print_output(&version, global.quiet);
        return Ok(());
    }
    print_single(&json!({ "version": version }), global)
}
