// icontrol-core: resource runtime for the iControl REST API
//
// Endpoints are described by metadata, not code. A `ManagementRoot` hands
// out `ResourceNode`s by lazy attribute access, and each node runs the
// CRUD verbs its metadata permits over an injected `Transport`.

pub mod error;
pub mod hooks;
pub mod meta;
pub mod node;
pub mod registry;
pub mod root;
pub mod uri;
pub mod version;

pub use error::CoreError;
pub use meta::{ContainerKind, Metadata, UpdateMethod, Verb};
pub use node::{Fields, NodeState, ResourceNode};
pub use registry::{ROOT_TYPE, Registry};
pub use root::{ManagementRoot, Session};
pub use uri::{Identity, SelfLink, format_resource_name};
pub use version::DeviceVersion;
