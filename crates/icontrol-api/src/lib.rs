// icontrol-api: async transport for the iControl REST management API

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::Credentials;
pub use client::{HttpTransport, Method, Reply, Request, Transport, fetch_device_version};
pub use error::Error;
pub use transport::{RetryPolicy, TlsMode, TransportConfig};
