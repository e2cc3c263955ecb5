// ── Session and tree root ──

use std::fmt;
use std::sync::Arc;

use icontrol_api::Transport;
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;
use crate::meta::Verb;
use crate::node::ResourceNode;
use crate::registry::{ROOT_TYPE, Registry};
use crate::uri;
use crate::version::DeviceVersion;

/// State shared by every node of one tree: the transport, the type
/// registry, the device address and its software version.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    base_url: Url,
    device_version: Option<DeviceVersion>,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<Registry>,
        base_url: Url,
        device_version: Option<DeviceVersion>,
    ) -> Self {
        Self {
            transport,
            registry,
            base_url,
            device_version,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `None` when the device version was never discovered; version
    /// gates are skipped in that case.
    pub fn device_version(&self) -> Option<&DeviceVersion> {
        self.device_version.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("device_version", &self.device_version)
            .field("types", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Entry point of the resource tree, rooted at `{base}/mgmt/`.
#[derive(Debug, Clone)]
pub struct ManagementRoot {
    session: Session,
    root: ResourceNode,
}

impl ManagementRoot {
    /// Discover the device version over `transport`, then build the
    /// tree over the embedded catalog.
    pub async fn connect(transport: Arc<dyn Transport>, base_url: Url) -> Result<Self, CoreError> {
        let raw = icontrol_api::fetch_device_version(transport.as_ref(), &base_url)
            .await
            .map_err(|e| CoreError::from_api(ROOT_TYPE, Verb::Load, e))?;
        let version = raw
            .map(|v| v.parse::<DeviceVersion>())
            .transpose()
            .map_err(|e| CoreError::InvalidResponse {
                type_name: ROOT_TYPE.to_owned(),
                verb: Verb::Load,
                message: e.to_string(),
            })?;
        match &version {
            Some(v) => info!(%base_url, version = %v, "connected"),
            None => info!(%base_url, "connected, device version unknown"),
        }
        Self::with_version(transport, base_url, version)
    }

    /// Build the tree without contacting the device.
    pub fn with_version(
        transport: Arc<dyn Transport>,
        base_url: Url,
        device_version: Option<DeviceVersion>,
    ) -> Result<Self, CoreError> {
        let registry = Arc::new(Registry::builtin()?);
        Self::with_registry(transport, base_url, registry, device_version)
    }

    /// Build the tree over a caller-supplied registry.
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        base_url: Url,
        registry: Arc<Registry>,
        device_version: Option<DeviceVersion>,
    ) -> Result<Self, CoreError> {
        let meta = registry.get(ROOT_TYPE)?;
        let uri = uri::child_uri(&base_url, &meta.uri_token(), true).map_err(|source| {
            CoreError::Uri {
                type_name: ROOT_TYPE.to_owned(),
                source,
            }
        })?;
        debug!(%uri, types = registry.len(), "management root ready");

        let session = Session::new(transport, registry, base_url, device_version);
        let root = ResourceNode::container(session.clone(), meta, uri);
        Ok(Self { session, root })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn device_version(&self) -> Option<&DeviceVersion> {
        self.session.device_version()
    }

    pub fn root(&self) -> &ResourceNode {
        &self.root
    }

    pub fn attr(&self, name: &str) -> Result<ResourceNode, CoreError> {
        self.root.attr(name)
    }

    /// The `/mgmt/tm/` namespace.
    pub fn tm(&self) -> Result<ResourceNode, CoreError> {
        self.attr("tm")
    }

    /// Walk a dotted attribute path, e.g. `tm.ltm.pools.pool`.
    pub fn navigate(&self, path: &str) -> Result<ResourceNode, CoreError> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self.root.clone(), |node, attribute| node.attr(attribute))
    }
}
