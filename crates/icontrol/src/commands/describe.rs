//! Offline type description, read straight from the metadata registry.

use std::sync::Arc;

use serde_json::{Value, json};

use icontrol_core::{ContainerKind, CoreError, Metadata, ROOT_TYPE, Registry, UpdateMethod, Verb};

use crate::cli::{DescribeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

const ALL_VERBS: [Verb; 9] = [
    Verb::Create,
    Verb::Load,
    Verb::Refresh,
    Verb::Update,
    Verb::Modify,
    Verb::Delete,
    Verb::Exists,
    Verb::GetCollection,
    Verb::Stats,
];

/// Walk `path` through the registry, returning the final type and a URI
/// template (`<name>` stands for a resource identity).
fn resolve(registry: &Registry, path: &str) -> Result<(Arc<Metadata>, String), CoreError> {
    let mut meta = registry.get(ROOT_TYPE)?;
    let mut segments = vec![meta.uri_token()];

    for attribute in path.split('.').filter(|s| !s.is_empty()) {
        let child = meta
            .allowed_lazy_attributes
            .iter()
            .filter_map(|t| registry.get(t).ok())
            .find(|m| m.attribute_name() == attribute)
            .ok_or_else(|| CoreError::UnknownAttribute {
                type_name: meta.type_name.clone(),
                attribute: attribute.to_owned(),
            })?;
        segments.push(match child.kind {
            ContainerKind::Resource if child.is_id_keyed() => "<id>".to_owned(),
            ContainerKind::Resource => "<name>".to_owned(),
            _ => child.uri_token(),
        });
        meta = child;
    }

    let mut uri = format!("/{}", segments.join("/"));
    if matches!(
        meta.kind,
        ContainerKind::OrganizingCollection | ContainerKind::Collection
    ) {
        uri.push('/');
    }
    Ok((meta, uri))
}

fn describe(registry: &Registry, meta: &Metadata, uri: &str) -> Value {
    let attributes: Vec<String> = meta
        .allowed_lazy_attributes
        .iter()
        .filter_map(|t| registry.get(t).ok())
        .map(|m| m.attribute_name())
        .collect();
    let verbs: Vec<String> = ALL_VERBS
        .into_iter()
        .filter(|v| meta.supports(*v))
        .map(|v| v.to_string())
        .collect();
    let update_method = match meta.update_method {
        UpdateMethod::Put => "PUT",
        UpdateMethod::Patch => "PATCH",
    };

    json!({
        "type": meta.type_name,
        "container": meta.kind.to_string(),
        "uri": uri,
        "kind": meta.required_json_kind,
        "verbs": verbs,
        "attributes": attributes,
        "creation_parameters": meta.creation_parameters(),
        "load_parameters": meta.load_parameters(),
        "update_method": update_method,
        "minimum_version": meta.minimum_version.as_ref().map(ToString::to_string),
    })
}

pub fn handle(args: &DescribeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = Registry::builtin()?;
    let (meta, uri) = resolve(&registry, &args.path)?;
    let description = describe(&registry, &meta, &uri);

    let out = output::render_single(global.output, &description)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uri_templates() {
        let registry = Registry::builtin().unwrap();
        let (_, uri) = resolve(&registry, "tm.ltm.pools").unwrap();
        assert_eq!(uri, "/mgmt/tm/ltm/pool/");
        let (_, uri) = resolve(&registry, "tm.ltm.pools.pool.members_s").unwrap();
        assert_eq!(uri, "/mgmt/tm/ltm/pool/<name>/members/");
        let (_, uri) = resolve(&registry, "tm.asm.policies_s.policy").unwrap();
        assert_eq!(uri, "/mgmt/tm/asm/policies/<id>");
        let (meta, uri) = resolve(&registry, "").unwrap();
        assert_eq!(meta.type_name, ROOT_TYPE);
        assert_eq!(uri, "/mgmt/");
    }

    #[test]
    fn description_lists_supported_verbs() {
        let registry = Registry::builtin().unwrap();
        let (meta, uri) = resolve(&registry, "tm.sys.disk.logical_disks.logical_disk").unwrap();
        let value = describe(&registry, &meta, &uri);
        assert_eq!(value["verbs"], json!(["load", "refresh", "exists"]));
    }

    #[test]
    fn unknown_attribute() {
        let registry = Registry::builtin().unwrap();
        assert!(matches!(
            resolve(&registry, "tm.nope"),
            Err(CoreError::UnknownAttribute { .. })
        ));
    }
}
