// ── Resource nodes ──
//
// One generic node type for every endpoint: its behavior comes from the
// `Metadata` it carries, not from a type hierarchy. Nodes are cheap,
// owned values; navigating the tree builds a new one on every access and
// nothing is cached by identity. Two loads of the same entity are two
// independent nodes whose `generation` can diverge until one refreshes.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use strum::Display;
use tracing::{debug, trace};
use url::Url;

use crate::error::CoreError;
use crate::meta::{ContainerKind, Metadata, UpdateMethod, Verb};
use crate::root::Session;
use crate::uri::{self, Identity};

/// Ordered, dynamically typed field bag hydrated from device JSON.
pub type Fields = Map<String, Value>;

/// Keys that address an entity rather than describe it.
const IDENTITY_KEYS: [&str; 4] = ["name", "partition", "subPath", "id"];

/// Where a node stands relative to the device's last-known state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NodeState {
    /// Constructed by navigation; no identity, no data.
    Unbound,
    /// Hydrated from the device's last answer.
    Loaded,
    /// Fields changed locally and not yet sent.
    Stale,
    /// Deleted on the device; every further verb is refused.
    Deleted,
}

/// One REST entity, collection or namespace.
#[derive(Clone)]
pub struct ResourceNode {
    session: Session,
    meta: Arc<Metadata>,
    /// URI this node is created under (its collection, for resources).
    container_uri: Url,
    /// Own URI. Containers and singletons always have one; named
    /// resources get theirs once created or loaded.
    uri: Option<Url>,
    fields: Fields,
    state: NodeState,
}

impl ResourceNode {
    pub(crate) fn container(session: Session, meta: Arc<Metadata>, uri: Url) -> Self {
        Self {
            session,
            meta,
            container_uri: uri.clone(),
            uri: Some(uri),
            fields: Map::new(),
            state: NodeState::Unbound,
        }
    }

    /// A node of `meta`'s type living under this node's URI.
    fn sibling(&self, meta: Arc<Metadata>, container_uri: Url, uri: Option<Url>) -> Self {
        Self {
            session: self.session.clone(),
            meta,
            container_uri,
            uri,
            fields: Map::new(),
            state: NodeState::Unbound,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn type_name(&self) -> &str {
        &self.meta.type_name
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn container_kind(&self) -> ContainerKind {
        self.meta.kind
    }

    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    pub fn container_uri(&self) -> &Url {
        &self.container_uri
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.state == NodeState::Deleted
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// The field bag as a JSON object.
    pub fn raw(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn kind(&self) -> Option<&str> {
        self.get_str("kind")
    }

    /// Device mutation counter; compare across nodes to detect staleness.
    pub fn generation(&self) -> Option<i64> {
        self.get_i64("generation")
    }

    pub fn self_link(&self) -> Option<&str> {
        self.get_str("selfLink")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn partition(&self) -> Option<&str> {
        self.get_str("partition")
    }

    pub fn identity(&self) -> Identity {
        self.identity_of(&self.fields)
    }

    /// Change a field locally. Sent by the next `update`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
        if self.state == NodeState::Loaded {
            self.state = NodeState::Stale;
        }
    }

    // ── Lazy attributes ──────────────────────────────────────────────

    /// Names of the children this node can expose.
    pub fn attributes(&self) -> Vec<String> {
        self.meta
            .allowed_lazy_attributes
            .iter()
            .filter_map(|t| self.session.registry().get(t).ok())
            .map(|m| m.attribute_name())
            .collect()
    }

    /// Resolve a child by attribute name.
    ///
    /// Purely local: nothing is fetched. Every call returns a new node,
    /// bound to this node's URI as its base.
    pub fn attr(&self, attribute: &str) -> Result<ResourceNode, CoreError> {
        let verb = Verb::Navigate;
        self.ensure_live(verb)?;

        let registry = self.session.registry();
        let child = self
            .meta
            .allowed_lazy_attributes
            .iter()
            .filter_map(|t| registry.get(t).ok())
            .find(|m| m.attribute_name() == attribute)
            .ok_or_else(|| CoreError::UnknownAttribute {
                type_name: self.meta.type_name.clone(),
                attribute: attribute.to_owned(),
            })?;
        child.check_version(self.session.device_version())?;

        let parent_uri = self.bound_uri(verb)?;
        let node = match child.kind {
            ContainerKind::OrganizingCollection | ContainerKind::Collection => {
                let uri = self.join(&parent_uri, &child.uri_token(), true)?;
                ResourceNode::container(self.session.clone(), child, uri)
            }
            ContainerKind::UnnamedResource => {
                let uri = self.join(&parent_uri, &child.uri_token(), false)?;
                self.sibling(child, parent_uri, Some(uri))
            }
            ContainerKind::Resource => self.sibling(child, parent_uri, None),
        };
        trace!(parent = %self.meta.type_name, child = %node.meta.type_name, "resolved lazy attribute");
        Ok(node)
    }

    /// The resource factory of a collection (`pools` → `pool`).
    fn member_factory(&self) -> Result<ResourceNode, CoreError> {
        let registry = self.session.registry();
        let member = self
            .meta
            .allowed_lazy_attributes
            .iter()
            .filter_map(|t| registry.get(t).ok())
            .find(|m| m.kind == ContainerKind::Resource)
            .ok_or_else(|| CoreError::Catalog {
                message: format!("{} has no member resource type", self.meta.type_name),
            })?;
        self.attr(&member.attribute_name())
    }

    // ── Verbs ────────────────────────────────────────────────────────

    /// POST `params` to the container and hydrate this node from the reply.
    pub async fn create(&mut self, params: Value) -> Result<(), CoreError> {
        let verb = Verb::Create;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        self.ensure_unbound(verb)?;
        let params = self.to_fields(verb, params)?;
        self.meta.validate_creation(&params)?;
        self.check_identity(verb, &self.identity_of(&params))?;

        let url = self.container_uri.clone();
        debug!(type_name = %self.meta.type_name, %url, "create");
        let reply = self
            .session
            .transport()
            .post(url, Value::Object(params))
            .await
            .map_err(|e| self.api_error(verb, e))?;

        let fields = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, fields.get("kind"))?;
        self.hydrate(fields, None)?;
        Ok(())
    }

    /// GET one entity into a new, independent node.
    ///
    /// Identity keys address the entity; any other key is passed as a
    /// query parameter (`expandSubcollections`, `$select`, ...). On a
    /// collection this loads a member.
    pub async fn load(&self, params: Value) -> Result<ResourceNode, CoreError> {
        if self.meta.kind == ContainerKind::Collection {
            self.meta.ensure_supported(Verb::Load)?;
            return self.member_factory()?.load_member(params).await;
        }
        self.load_member(params).await
    }

    async fn load_member(&self, params: Value) -> Result<ResourceNode, CoreError> {
        let verb = Verb::Load;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let params = self.to_fields(verb, params)?;
        self.meta.validate_load(&params)?;
        let identity = self.identity_of(&params);
        self.check_identity(verb, &identity)?;

        let url = self.target_uri(verb, &identity)?;
        debug!(type_name = %self.meta.type_name, %url, "load");
        let reply = self
            .session
            .transport()
            .get(url.clone(), query_params(&params))
            .await
            .map_err(|e| self.api_error(verb, e))?;

        let fields = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, fields.get("kind"))?;
        let mut node = self.sibling(
            Arc::clone(&self.meta),
            self.container_uri.clone(),
            self.uri.clone(),
        );
        node.hydrate(fields, Some(url))?;
        Ok(node)
    }

    /// Probe whether an entity exists. Only a 404 maps to `false`.
    pub async fn exists(&self, params: Value) -> Result<bool, CoreError> {
        if self.meta.kind == ContainerKind::Collection {
            self.meta.ensure_supported(Verb::Exists)?;
            return self.member_factory()?.exists_member(params).await;
        }
        self.exists_member(params).await
    }

    async fn exists_member(&self, params: Value) -> Result<bool, CoreError> {
        let verb = Verb::Exists;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let params = self.to_fields(verb, params)?;
        self.meta.validate_load(&params)?;
        let identity = self.identity_of(&params);
        self.check_identity(verb, &identity)?;

        let url = self.target_uri(verb, &identity)?;
        debug!(type_name = %self.meta.type_name, %url, "exists");
        match self.session.transport().get(url, Vec::new()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(self.api_error(verb, e)),
        }
    }

    /// Re-read this node's own URI and overwrite its fields in place.
    pub async fn refresh(&mut self) -> Result<(), CoreError> {
        let verb = Verb::Refresh;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let url = self.bound_uri(verb)?;

        debug!(type_name = %self.meta.type_name, %url, "refresh");
        let reply = self
            .session
            .transport()
            .get(url.clone(), Vec::new())
            .await
            .map_err(|e| self.api_error(verb, e))?;

        let fields = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, fields.get("kind"))?;
        self.hydrate(fields, Some(url))
    }

    /// Send the full field bag, merged with `overrides`, and replace the
    /// local state with the device's answer.
    pub async fn update(&mut self, overrides: Value) -> Result<(), CoreError> {
        let verb = Verb::Update;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let url = self.bound_uri(verb)?;
        let overrides = self.to_fields(verb, overrides)?;

        let mut body = self.fields.clone();
        body.extend(overrides);
        self.check_identity(verb, &self.identity_of(&body))?;

        debug!(type_name = %self.meta.type_name, %url, method = ?self.meta.update_method, "update");
        let transport = self.session.transport();
        let pending = match self.meta.update_method {
            UpdateMethod::Put => transport.put(url.clone(), Value::Object(body)),
            UpdateMethod::Patch => transport.patch(url.clone(), Value::Object(body)),
        };
        let reply = pending.await.map_err(|e| self.api_error(verb, e))?;

        let fields = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, fields.get("kind"))?;
        self.hydrate(fields, Some(url))
    }

    /// Send only `patch` and merge the answer into the existing fields.
    /// Fields the device does not echo keep their local values.
    pub async fn modify(&mut self, patch: Value) -> Result<(), CoreError> {
        let verb = Verb::Modify;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let url = self.bound_uri(verb)?;
        let patch = self.to_fields(verb, patch)?;

        let mut probe = self.fields.clone();
        probe.extend(patch.clone());
        self.check_identity(verb, &self.identity_of(&probe))?;

        debug!(type_name = %self.meta.type_name, %url, "modify");
        let reply = self
            .session
            .transport()
            .patch(url, Value::Object(patch))
            .await
            .map_err(|e| self.api_error(verb, e))?;

        let fields = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, fields.get("kind"))?;
        trace!(type_name = %self.meta.type_name, keys = fields.len(), "merging modify reply");
        self.fields.extend(fields);
        self.state = NodeState::Loaded;
        Ok(())
    }

    /// DELETE the entity. The node stays in memory, holding only
    /// `{"deleted": true}`, and refuses every later verb.
    pub async fn delete(&mut self) -> Result<(), CoreError> {
        let verb = Verb::Delete;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let url = self.bound_uri(verb)?;
        self.check_identity(verb, &self.identity())?;

        debug!(type_name = %self.meta.type_name, %url, "delete");
        self.session
            .transport()
            .delete(url)
            .await
            .map_err(|e| self.api_error(verb, e))?;

        self.fields = Map::from_iter([("deleted".to_owned(), Value::Bool(true))]);
        self.state = NodeState::Deleted;
        Ok(())
    }

    /// GET the `/stats` sibling endpoint.
    pub async fn stats(&self) -> Result<Value, CoreError> {
        let verb = Verb::Stats;
        self.meta.ensure_supported(verb)?;
        self.ensure_live(verb)?;
        let url = self.bound_uri(verb)?;
        let url = self.join(&url, "stats", false)?;

        debug!(type_name = %self.meta.type_name, %url, "stats");
        let reply = self
            .session
            .transport()
            .get(url, Vec::new())
            .await
            .map_err(|e| self.api_error(verb, e))?;
        Ok(reply.body)
    }

    /// GET a collection and hydrate each item as the type its `kind` names.
    ///
    /// A reply without `items` is an empty collection.
    pub async fn get_collection(
        &self,
        query: &[(&str, &str)],
    ) -> Result<Vec<ResourceNode>, CoreError> {
        let verb = Verb::GetCollection;
        self.meta.ensure_supported(verb)?;
        let url = self.bound_uri(verb)?;
        let query = query
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();

        debug!(type_name = %self.meta.type_name, %url, "get_collection");
        let reply = self
            .session
            .transport()
            .get(url.clone(), query)
            .await
            .map_err(|e| self.api_error(verb, e))?;

        let mut body = self.expect_object(verb, reply.body)?;
        self.meta.check_kind(verb, body.get("kind"))?;

        let items = match body.remove("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(self.invalid_response(verb, "'items' is not an array".into()));
            }
        };

        items
            .into_iter()
            .map(|item| self.hydrate_member(verb, &url, item))
            .collect()
    }

    fn hydrate_member(&self, verb: Verb, url: &Url, item: Value) -> Result<ResourceNode, CoreError> {
        let Value::Object(fields) = item else {
            return Err(self.invalid_response(verb, "collection item is not an object".into()));
        };
        let kind = fields.get("kind").and_then(Value::as_str).unwrap_or_default();
        let child_type = self.meta.resolve_child_type(kind)?;
        let child_meta = self.session.registry().get(child_type)?;

        let mut node = self.sibling(child_meta, url.clone(), None);
        node.hydrate(fields, None)?;
        Ok(node)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Replace the field bag with device state and bind the node's URI.
    ///
    /// URI precedence: echoed `selfLink` (rebased onto the session
    /// address), the URI the request went to, the current URI, then one
    /// computed from the identity in `fields`.
    fn hydrate(&mut self, fields: Fields, requested: Option<Url>) -> Result<(), CoreError> {
        let from_link = fields
            .get("selfLink")
            .and_then(Value::as_str)
            .and_then(|link| uri::parse_self_link(link).ok())
            .map(|link| uri::rebase_self_link(&link.url, self.session.base_url()));

        let uri = match from_link.or(requested).or_else(|| self.uri.clone()) {
            Some(uri) => uri,
            None => {
                let segment = self.identity_of(&fields).segment();
                self.join(&self.container_uri, &segment, false)?
            }
        };

        trace!(type_name = %self.meta.type_name, %uri, keys = fields.len(), "hydrated");
        self.uri = Some(uri);
        self.fields = fields;
        self.state = NodeState::Loaded;
        Ok(())
    }

    /// Identity keys of `fields`; `id` only counts for id-keyed types.
    fn identity_of(&self, fields: &Fields) -> Identity {
        let mut identity = Identity::from_fields(fields);
        if !self.meta.is_id_keyed() {
            identity.id = None;
        }
        identity
    }

    fn target_uri(&self, verb: Verb, identity: &Identity) -> Result<Url, CoreError> {
        match self.meta.kind {
            ContainerKind::Resource => self.join(&self.container_uri, &identity.segment(), false),
            _ => self.bound_uri(verb),
        }
    }

    fn bound_uri(&self, verb: Verb) -> Result<Url, CoreError> {
        self.uri.clone().ok_or_else(|| CoreError::Unbound {
            type_name: self.meta.type_name.clone(),
            verb,
        })
    }

    /// Structural identity check, then the catalog's validator hooks.
    fn check_identity(&self, verb: Verb, identity: &Identity) -> Result<(), CoreError> {
        identity
            .check()
            .map_err(|reason| CoreError::InvalidIdentity {
                type_name: self.meta.type_name.clone(),
                verb,
                reason,
            })?;
        self.meta.run_validators(verb, identity)
    }

    /// A node already bound to a device entity cannot create another one.
    fn ensure_unbound(&self, verb: Verb) -> Result<(), CoreError> {
        if self.uri.is_none() && self.state == NodeState::Unbound {
            return Ok(());
        }
        Err(CoreError::AlreadyBound {
            type_name: self.meta.type_name.clone(),
            verb,
            uri: self
                .uri
                .as_ref()
                .map_or_else(|| "a device entity".to_owned(), ToString::to_string),
        })
    }

    fn ensure_live(&self, verb: Verb) -> Result<(), CoreError> {
        if self.state == NodeState::Deleted {
            return Err(CoreError::Deleted {
                type_name: self.meta.type_name.clone(),
                verb,
            });
        }
        Ok(())
    }

    fn join(&self, parent: &Url, segment: &str, trailing_slash: bool) -> Result<Url, CoreError> {
        uri::child_uri(parent, segment, trailing_slash).map_err(|source| CoreError::Uri {
            type_name: self.meta.type_name.clone(),
            source,
        })
    }

    fn to_fields(&self, verb: Verb, params: Value) -> Result<Fields, CoreError> {
        match params {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(CoreError::InvalidParameters {
                type_name: self.meta.type_name.clone(),
                verb,
                reason: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    fn expect_object(&self, verb: Verb, body: Value) -> Result<Fields, CoreError> {
        match body {
            Value::Object(map) => Ok(map),
            other => Err(self.invalid_response(verb, format!("expected a JSON object, got {other}"))),
        }
    }

    fn invalid_response(&self, verb: Verb, message: String) -> CoreError {
        CoreError::InvalidResponse {
            type_name: self.meta.type_name.clone(),
            verb,
            message,
        }
    }

    fn api_error(&self, verb: Verb, err: icontrol_api::Error) -> CoreError {
        CoreError::from_api(&self.meta.type_name, verb, err)
    }
}

/// Non-identity parameters, rendered as query pairs.
fn query_params(params: &Fields) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(k, _)| !IDENTITY_KEYS.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                Value::Bool(_) | Value::Number(_) => v.to_string(),
                _ => return None,
            };
            Some((k.clone(), rendered))
        })
        .collect()
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("type_name", &self.meta.type_name)
            .field("kind", &self.meta.kind)
            .field("uri", &self.uri.as_ref().map(Url::as_str))
            .field("state", &self.state)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_params_skip_identity_and_nested_values() {
        let Value::Object(params) = json!({
            "name": "web",
            "partition": "Common",
            "expandSubcollections": "true",
            "limit": 5,
            "nested": {"a": 1}
        }) else {
            panic!("literal is an object");
        };
        assert_eq!(
            query_params(&params),
            vec![
                ("expandSubcollections".to_owned(), "true".to_owned()),
                ("limit".to_owned(), "5".to_owned()),
            ]
        );
    }

    #[test]
    fn node_state_display() {
        assert_eq!(NodeState::Stale.to_string(), "stale");
        assert_eq!(NodeState::Deleted.to_string(), "deleted");
    }
}
