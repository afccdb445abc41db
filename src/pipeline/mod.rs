//! The sync → generate → dispatch pipeline.

pub mod dispatch;
pub mod reply;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::{DispatchOutcome, DispatchPipeline, DispatchReport};
pub use reply::{ReplyOutcome, ReplyPipeline, build_dialog};
pub use sync::{AccountOutcome, SyncPipeline, SyncReport};
