//! Output formatting: table, JSON, YAML, plain.
//!
//! Resource data is dynamic JSON, so tables are built from a fixed set of
//! summary columns (lists) or field/value pairs (single resources).

use std::io::{self, Write};

use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Row types ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Partition")]
    partition: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Generation")]
    generation: String,
}

impl From<&Value> for ResourceRow {
    fn from(v: &Value) -> Self {
        Self {
            name: text(v.get("name").or_else(|| v.get("id"))),
            partition: text(v.get("partition")),
            kind: text(v.get("kind")),
            generation: text(v.get("generation")),
        }
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "-".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Identifier used by plain output: full path, then name, then id.
fn identifier(v: &Value) -> String {
    ["fullPath", "name", "id"]
        .iter()
        .find_map(|key| v.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render the field bags of a collection.
pub fn render_list(format: OutputFormat, items: &[Value]) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ResourceRow> = items.iter().map(ResourceRow::from).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Plain => Ok(items.iter().map(identifier).collect::<Vec<_>>().join("\n")),
        structured => render_structured(structured, items),
    }
}

/// Render one field bag.
pub fn render_single(format: OutputFormat, item: &Value) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<FieldRow> = item
                .as_object()
                .into_iter()
                .flatten()
                .map(|(k, v)| FieldRow {
                    field: k.clone(),
                    value: text(Some(v)),
                })
                .collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Plain => Ok(identifier(item)),
        structured => render_structured(structured, item),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => {
            serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))?
        }
        _ => serde_json::to_string_pretty(data)?,
    };
    Ok(rendered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pools() -> Vec<Value> {
        vec![
            json!({"name": "web", "partition": "Common", "fullPath": "/Common/web",
                   "kind": "tm:ltm:pool:poolstate", "generation": 3}),
            json!({"name": "api", "partition": "Common", "fullPath": "/Common/api",
                   "kind": "tm:ltm:pool:poolstate", "generation": 7}),
        ]
    }

    #[test]
    fn table_lists_summary_columns() {
        let out = render_list(OutputFormat::Table, &pools()).unwrap();
        assert!(out.contains("Generation"));
        assert!(out.contains("web"));
        assert!(out.contains('7'));
    }

    #[test]
    fn plain_prints_full_paths() {
        let out = render_list(OutputFormat::Plain, &pools()).unwrap();
        assert_eq!(out, "/Common/web\n/Common/api");
    }

    #[test]
    fn json_keeps_device_field_order() {
        let out = render_single(OutputFormat::JsonCompact, &pools()[0]).unwrap();
        assert!(out.starts_with(r#"{"name":"web","partition":"Common""#));
    }

    #[test]
    fn yaml_output() {
        let out = render_single(OutputFormat::Yaml, &json!({"name": "web"})).unwrap();
        assert_eq!(out.trim(), "name: web");
    }
}
