// ── URI resolution ──
//
// Pure mapping between a node's place in the resource tree and its REST
// path. Type names follow the endpoint naming of the device ("LSNPools",
// "Virtual_Address_s"); identities are tilde-encoded the way the device
// escapes folder paths ("/Common/web" becomes "~Common~web").

use serde_json::{Map, Value};
use url::Url;

// ── Type-name formatting ────────────────────────────────────────────

/// Format an endpoint type name as a lowercase, hyphenated path token.
///
/// Acronym runs stay together: `LSNPools` → `lsn-pools`,
/// `Global_Settings` → `global-settings`, `Ltm` → `ltm`.
pub fn format_resource_name(type_name: &str) -> String {
    let chars: Vec<char> = type_name.chars().collect();
    let mut out = String::with_capacity(type_name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            push_hyphen(&mut out);
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars.get(i - 1).copied().unwrap_or('_');
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            let word_break = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if word_break {
                push_hyphen(&mut out);
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out.trim_end_matches('-').to_owned()
}

fn push_hyphen(out: &mut String) {
    if !out.is_empty() && !out.ends_with('-') {
        out.push('-');
    }
}

/// Path token of a collection: the member name without its plural marker.
///
/// `Pools` → `pool`, `LSNPools` → `lsn-pool`, `Virtual_Address_s` →
/// `virtual-address`. A `_s` suffix wins over a bare trailing `s`.
pub fn collection_segment(type_name: &str) -> String {
    let stem = type_name
        .strip_suffix("_s")
        .or_else(|| type_name.strip_suffix('s'))
        .unwrap_or(type_name);
    format_resource_name(stem)
}

/// Collection type name for a resource type name.
///
/// Names already ending in `s` take the `_s` marker: `Address` →
/// `Address_s`, never `Addresss`.
pub fn collection_type_name(resource_type: &str) -> String {
    if resource_type.ends_with('s') {
        format!("{resource_type}_s")
    } else {
        format!("{resource_type}s")
    }
}

/// Lazy-attribute name under which a type is exposed by its parent.
pub fn attribute_name(type_name: &str) -> String {
    type_name.to_ascii_lowercase()
}

/// Join one path segment onto a parent URI.
///
/// Container URIs (collections, organizing collections) carry a trailing
/// slash; resource URIs do not.
pub fn child_uri(parent: &Url, segment: &str, trailing_slash: bool) -> Result<Url, url::ParseError> {
    let base = parent.as_str().trim_end_matches('/');
    let slash = if trailing_slash { "/" } else { "" };
    if segment.is_empty() {
        return Url::parse(&format!("{base}{slash}"));
    }
    Url::parse(&format!("{base}/{segment}{slash}"))
}

// ── Identity ────────────────────────────────────────────────────────

/// Logical key of an addressable entity.
///
/// Name + partition (+ sub-path) for most resources, a device-generated
/// `id` for id-keyed ones (tasks, ASM policies).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub partition: Option<String>,
    pub sub_path: Option<String>,
    pub id: Option<String>,
}

impl Identity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }

    /// Split a device full path (`/Common/app.app/web`) into its parts.
    pub fn from_full_path(full_path: &str) -> Self {
        let parts: Vec<&str> = full_path
            .trim_start_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [] => Self::named("/"),
            [name] => Self::named(*name),
            [partition, name] => Self::named(*name).with_partition(*partition),
            [partition, sub @ .., name] => Self::named(*name)
                .with_partition(*partition)
                .with_sub_path(sub.join("/")),
        }
    }

    /// Read the identity keys out of a field bag.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let get = |key: &str| fields.get(key).and_then(Value::as_str).map(String::from);
        Self {
            name: get("name"),
            partition: get("partition"),
            sub_path: get("subPath"),
            id: get("id"),
        }
    }

    /// Inverse of [`segment`](Self::segment).
    pub fn from_segment(segment: &str) -> Self {
        let Some(rest) = segment.strip_prefix('~') else {
            return Self::named(segment);
        };
        let parts: Vec<&str> = rest.split('~').collect();
        match parts.as_slice() {
            [""] => Self::named("/"),
            [name] => Self::named(*name).with_partition("/"),
            [partition, name] => Self::named(*name).with_partition(*partition),
            [partition, sub @ .., name] => Self::named(*name)
                .with_partition(*partition)
                .with_sub_path(sub.join("/")),
            [] => Self::default(),
        }
    }

    /// Tilde-encoded path segment for this identity.
    ///
    /// - id-keyed: the id itself
    /// - `name == "/"`: `~` (the root folder)
    /// - no / empty partition: `name`
    /// - partition `/`: `~name`
    /// - otherwise `~partition~name` or `~partition~sub~name`
    pub fn segment(&self) -> String {
        if let Some(ref id) = self.id {
            return escape(id);
        }

        let name = self.name.as_deref().unwrap_or_default();
        if name == "/" {
            return "~".into();
        }
        let name = escape(name.trim_start_matches('/'));

        match self.partition.as_deref() {
            None | Some("") => name,
            Some("/") => format!("~{name}"),
            Some(partition) => {
                let partition = escape(partition.trim_matches('/'));
                match self.sub_path.as_deref().filter(|s| !s.is_empty()) {
                    Some(sub) => format!("~{partition}~{}~{name}", escape(sub.trim_matches('/'))),
                    None => format!("~{partition}~{name}"),
                }
            }
        }
    }

    /// Reject combinations [`segment`](Self::segment) cannot encode.
    ///
    /// A sub-path only exists inside a partition, so one given without a
    /// partition (or with the root partition) would be dropped from the URI.
    pub fn check(&self) -> Result<(), String> {
        if self.id.is_some() {
            return Ok(());
        }
        let has_sub_path = self.sub_path.as_deref().is_some_and(|s| !s.is_empty());
        let has_partition = self
            .partition
            .as_deref()
            .is_some_and(|p| !p.is_empty() && p != "/");
        if has_sub_path && !has_partition {
            return Err(format!(
                "subPath '{}' needs a partition",
                self.sub_path.as_deref().unwrap_or_default()
            ));
        }
        Ok(())
    }

    /// Device-style full path (`/Common/web`), or the bare name/id.
    pub fn full_path(&self) -> String {
        let name = self
            .name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or_default();
        match (self.partition.as_deref(), self.sub_path.as_deref()) {
            (Some(p), Some(sub)) if !p.is_empty() && p != "/" => format!("/{p}/{sub}/{name}"),
            (Some(p), _) if !p.is_empty() && p != "/" => format!("/{p}/{name}"),
            _ => name.to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.id.is_none()
    }
}

fn escape(raw: &str) -> String {
    raw.replace('/', "~")
}

// ── selfLink handling ───────────────────────────────────────────────

/// A parsed `selfLink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfLink {
    /// Link without its query string.
    pub url: Url,
    pub identity: Identity,
    /// The `ver` query parameter echoed by the device.
    pub version: Option<String>,
}

/// Parse a device `selfLink` back into path, identity and version.
pub fn parse_self_link(link: &str) -> Result<SelfLink, url::ParseError> {
    let mut url = Url::parse(link)?;
    let version = url
        .query_pairs()
        .find(|(k, _)| k == "ver")
        .map(|(_, v)| v.into_owned());
    url.set_query(None);

    let last = url
        .path_segments()
        .and_then(|mut segs| segs.next_back().map(String::from))
        .unwrap_or_default();

    Ok(SelfLink {
        identity: Identity::from_segment(&last),
        url,
        version,
    })
}

/// Point a device-echoed link (always `https://localhost/...`) at the
/// session's actual management address.
pub fn rebase_self_link(link: &Url, base: &Url) -> Url {
    let mut out = base.clone();
    out.set_path(link.path());
    out.set_query(None);
    out.set_fragment(None);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn base() -> Url {
        Url::parse("https://10.0.0.5/mgmt/tm/ltm/pool/").unwrap()
    }

    #[test]
    fn acronyms_stay_together() {
        assert_eq!(format_resource_name("LSNPools"), "lsn-pools");
        assert_ne!(format_resource_name("LSNPools"), "l-s-n-pools");
        assert_eq!(format_resource_name("Global_Settings"), "global-settings");
        assert_eq!(format_resource_name("Ltm"), "ltm");
        assert_eq!(format_resource_name("ManagementRoot"), "management-root");
        assert_eq!(format_resource_name("Ipv6Routes"), "ipv6-routes");
    }

    #[test]
    fn collection_segment_strips_one_plural_marker() {
        assert_eq!(collection_segment("Pools"), "pool");
        assert_eq!(collection_segment("LSNPools"), "lsn-pool");
        assert_eq!(collection_segment("Virtual_Address_s"), "virtual-address");
        assert_eq!(collection_segment("Headers_s"), "headers");
        assert_eq!(collection_segment("Logical_Disks"), "logical-disk");
    }

    #[test]
    fn collection_type_name_never_doubles_s() {
        assert_eq!(collection_type_name("Pool"), "Pools");
        assert_eq!(collection_type_name("Address"), "Address_s");
        assert_eq!(collection_type_name("Virtual_Address"), "Virtual_Address_s");
        assert_eq!(collection_segment(&collection_type_name("Address")), "address");
    }

    #[test]
    fn partition_is_tilde_encoded() {
        let common = Identity::named("foo").with_partition("Common");
        let bare = Identity::named("foo").with_partition("");
        assert_eq!(
            child_uri(&base(), &common.segment(), false).unwrap().as_str(),
            "https://10.0.0.5/mgmt/tm/ltm/pool/~Common~foo"
        );
        assert_eq!(
            child_uri(&base(), &bare.segment(), false).unwrap().as_str(),
            "https://10.0.0.5/mgmt/tm/ltm/pool/foo"
        );
    }

    #[test]
    fn sub_path_is_encoded_between_partition_and_name() {
        let id = Identity::named("web")
            .with_partition("Common")
            .with_sub_path("app.app");
        assert_eq!(id.segment(), "~Common~app.app~web");
        assert_eq!(id.full_path(), "/Common/app.app/web");
    }

    #[test]
    fn sub_path_without_partition_is_rejected() {
        assert!(Identity::named("web").with_sub_path("app.app").check().is_err());
        assert!(
            Identity::named("web")
                .with_partition("")
                .with_sub_path("app.app")
                .check()
                .is_err()
        );
        assert!(
            Identity::named("web")
                .with_partition("/")
                .with_sub_path("app.app")
                .check()
                .is_err()
        );
        assert!(
            Identity::named("web")
                .with_partition("Common")
                .with_sub_path("app.app")
                .check()
                .is_ok()
        );
        assert!(Identity::named("web").check().is_ok());
        assert!(Identity::named("web").with_sub_path("").check().is_ok());
    }

    #[test]
    fn root_folder_is_not_double_tilde() {
        assert_eq!(Identity::named("/").segment(), "~");
        assert_eq!(Identity::named("/").with_partition("/").segment(), "~");
        assert_eq!(Identity::named("foo").with_partition("/").segment(), "~foo");
    }

    #[test]
    fn id_keyed_identity_uses_id() {
        let id = Identity::by_id("3bTjgn0vYRu0Y4MJaP9GUw");
        assert_eq!(id.segment(), "3bTjgn0vYRu0Y4MJaP9GUw");
    }

    #[test]
    fn full_path_round_trip() {
        let id = Identity::from_full_path("/Common/app.app/web");
        assert_eq!(id.segment(), "~Common~app.app~web");
        assert_eq!(Identity::from_segment(&id.segment()), id);
        assert_eq!(Identity::from_full_path("/"), Identity::named("/"));
    }

    #[test]
    fn self_link_parses_identity_and_version() {
        let link =
            parse_self_link("https://localhost/mgmt/tm/ltm/pool/~Common~web?ver=13.1.0").unwrap();
        assert_eq!(link.version.as_deref(), Some("13.1.0"));
        assert_eq!(link.identity, Identity::named("web").with_partition("Common"));
        assert_eq!(link.url.as_str(), "https://localhost/mgmt/tm/ltm/pool/~Common~web");
    }

    #[test]
    fn rebase_replaces_localhost() {
        let link = Url::parse("https://localhost/mgmt/tm/ltm/pool/~Common~web?ver=13.1.0").unwrap();
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            rebase_self_link(&link, &base).as_str(),
            "http://127.0.0.1:8080/mgmt/tm/ltm/pool/~Common~web"
        );
    }

    #[test]
    fn container_uris_keep_trailing_slash() {
        let tm = Url::parse("https://10.0.0.5/mgmt/tm/").unwrap();
        let ltm = child_uri(&tm, "ltm", true).unwrap();
        assert_eq!(ltm.as_str(), "https://10.0.0.5/mgmt/tm/ltm/");
    }
}
