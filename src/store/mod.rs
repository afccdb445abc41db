//! Persistence layer, client side of the remote storage service.

pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpStorage;
pub use traits::Storage;
pub use types::{Account, AccountDrafts, DraftStatus, GeneratedMessage, Message, SenderKind, Thread};
