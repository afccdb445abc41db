//! Messaging backends: one contract, two variants.

pub mod backend;
pub mod graph_api;
pub mod private_api;
pub mod session;

pub use backend::{Backend, BackendEndpoints, BackendFactory, BackendKind, ChannelBackend, HttpBackendFactory};
pub use graph_api::{GraphApiChannel, GraphApiConfig};
pub use private_api::PrivateApiChannel;
pub use session::{SessionProvider, pack_session, unpack_session};
