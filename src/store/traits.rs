//! `Storage` trait: the persistence service contract consumed by the pipelines.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::store::types::{Account, AccountDrafts, DraftStatus, GeneratedMessage, Thread};

/// Remote persistence for accounts, threads, and generated drafts.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All accounts that should be synced this cycle.
    async fn active_accounts(&self) -> Result<Vec<Account>, StorageError>;

    /// Upsert the given threads for an account, keyed by their backend-native
    /// id. Returns the persisted threads with their assigned ids.
    async fn save_threads(
        &self,
        account_id: i64,
        threads: &[Thread],
    ) -> Result<Vec<Thread>, StorageError>;

    /// Create a pending draft for a thread.
    ///
    /// Returns `None` when the thread already holds an unsent draft.
    async fn save_generated_message(
        &self,
        thread_id: i64,
        text: &str,
    ) -> Result<Option<GeneratedMessage>, StorageError>;

    /// Every account that has pending drafts, with those drafts.
    async fn pending_drafts(&self) -> Result<Vec<AccountDrafts>, StorageError>;

    /// Record a draft's terminal status.
    async fn update_draft_status(
        &self,
        id: i64,
        status: DraftStatus,
        error: Option<&str>,
    ) -> Result<GeneratedMessage, StorageError>;
}
