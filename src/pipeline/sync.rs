//! Thread sync: fetch each account's threads, persist them, and generate
//! replies for the persisted threads.
//!
//! Accounts are processed concurrently and independently: a failing account
//! is logged and skipped for this cycle without affecting the others.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::channels::BackendFactory;
use crate::error::PipelineError;
use crate::pipeline::reply::ReplyPipeline;
use crate::scheduler::PollCycle;
use crate::store::Storage;
use crate::store::types::{Account, Thread};

/// What happened to one account during a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// The account was skipped (backend or storage failure).
    Skipped,
    /// Threads were fetched and persisted, and `drafts` replies were created.
    Synced { threads: usize, drafts: usize },
}

/// Totals for one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub accounts: usize,
    pub skipped: usize,
    pub threads: usize,
    pub drafts: usize,
}

pub struct SyncPipeline {
    storage: Arc<dyn Storage>,
    backends: Arc<dyn BackendFactory>,
    replies: ReplyPipeline,
}

impl SyncPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        backends: Arc<dyn BackendFactory>,
        replies: ReplyPipeline,
    ) -> Self {
        Self {
            storage,
            backends,
            replies,
        }
    }

    /// One sync+generate pass over every active account.
    ///
    /// Fails only if the account list itself can't be fetched.
    pub async fn sync_all(&self) -> Result<SyncReport, PipelineError> {
        let accounts = self
            .storage
            .active_accounts()
            .await
            .map_err(PipelineError::RemoteFetch)?;
        debug!(count = accounts.len(), "Syncing threads for active accounts");

        let outcomes = join_all(accounts.iter().map(|a| self.sync_account(a))).await;

        let mut report = SyncReport {
            accounts: accounts.len(),
            ..SyncReport::default()
        };
        for outcome in outcomes {
            match outcome {
                AccountOutcome::Skipped => report.skipped += 1,
                AccountOutcome::Synced { threads, drafts } => {
                    report.threads += threads;
                    report.drafts += drafts;
                }
            }
        }
        Ok(report)
    }

    /// Sync one account and generate replies for its threads.
    pub async fn sync_account(&self, account: &Account) -> AccountOutcome {
        let threads = match self.fetch_and_save(account).await {
            Ok(threads) => threads,
            Err(e) => {
                log_account_failure(account, &e);
                return AccountOutcome::Skipped;
            }
        };

        let drafts = self.replies.reply_to_threads(&threads).await;
        AccountOutcome::Synced {
            threads: threads.len(),
            drafts: drafts.len(),
        }
    }

    async fn fetch_and_save(&self, account: &Account) -> Result<Vec<Thread>, PipelineError> {
        let backend = self.backends.backend_for(account)?;
        debug!(
            account_id = account.id,
            login = %account.login,
            backend = backend.name(),
            "Fetching threads"
        );

        let threads = backend.get_all_threads().await?;
        if threads.is_empty() {
            debug!(account_id = account.id, "No threads to save");
            return Ok(Vec::new());
        }

        debug!(account_id = account.id, count = threads.len(), "Saving threads");
        let saved = self.storage.save_threads(account.id, &threads).await?;
        Ok(saved)
    }
}

fn log_account_failure(account: &Account, e: &PipelineError) {
    match e {
        PipelineError::Channel(c) if c.is_auth() => {
            warn!(account_id = account.id, login = %account.login, error = %e, "Session rejected, skipping account");
        }
        _ => {
            error!(account_id = account.id, login = %account.login, error = %e, "Failed to sync account, skipping");
        }
    }
}

#[async_trait]
impl PollCycle for SyncPipeline {
    fn name(&self) -> &'static str {
        "sync"
    }

    async fn run_once(&self) -> Result<(), PipelineError> {
        let report = self.sync_all().await?;
        info!(
            accounts = report.accounts,
            skipped = report.skipped,
            threads = report.threads,
            drafts = report.drafts,
            "Sync cycle complete"
        );
        Ok(())
    }
}
