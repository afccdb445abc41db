//! Draft dispatch. Sends pending drafts through the owning account's backend
//! and records the outcome on each draft.
//!
//! Sends are strictly sequential. Every draft is followed by a jittered
//! delay, and every account's batch by a fixed pause.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::channels::BackendFactory;
use crate::config::PacingConfig;
use crate::error::PipelineError;
use crate::scheduler::PollCycle;
use crate::store::Storage;
use crate::store::types::{Account, DraftStatus, GeneratedMessage};

/// Result of dispatching one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
    /// The draft was no longer pending when it reached us.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct DispatchPipeline {
    storage: Arc<dyn Storage>,
    backends: Arc<dyn BackendFactory>,
    pacing: PacingConfig,
}

impl DispatchPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        backends: Arc<dyn BackendFactory>,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            storage,
            backends,
            pacing,
        }
    }

    /// Send every pending draft, account by account, in the order received.
    pub async fn dispatch_all(&self) -> Result<DispatchReport, PipelineError> {
        let batches = self
            .storage
            .pending_drafts()
            .await
            .map_err(PipelineError::RemoteFetch)?;

        let mut report = DispatchReport::default();
        for batch in &batches {
            if batch.messages.is_empty() {
                continue;
            }
            debug!(
                account_id = batch.account.id,
                count = batch.messages.len(),
                "Dispatching drafts"
            );

            for draft in &batch.messages {
                match self.dispatch_one(&batch.account, draft).await {
                    DispatchOutcome::Sent => report.sent += 1,
                    DispatchOutcome::Failed(_) => report.failed += 1,
                    DispatchOutcome::Skipped => {
                        report.skipped += 1;
                        continue;
                    }
                }
                tokio::time::sleep(self.pacing.jitter()).await;
            }

            tokio::time::sleep(self.pacing.batch_pause()).await;
        }
        Ok(report)
    }

    /// Send one draft and move it to `sent` or `error`.
    pub async fn dispatch_one(&self, account: &Account, draft: &GeneratedMessage) -> DispatchOutcome {
        if draft.status != DraftStatus::Pending {
            debug!(draft_id = draft.id, status = draft.status.as_str(), "Draft is not pending, skipping");
            return DispatchOutcome::Skipped;
        }

        let sent = match self.backends.backend_for(account) {
            Ok(backend) => backend.send_message(draft).await,
            Err(e) => Err(e),
        };

        let (status, outcome) = match sent {
            Ok(()) => {
                info!(account_id = account.id, draft_id = draft.id, thread_id = draft.thread_id, "Draft sent");
                (DraftStatus::Sent, DispatchOutcome::Sent)
            }
            Err(e) => {
                error!(account_id = account.id, draft_id = draft.id, error = %e, "Failed to send draft");
                (DraftStatus::Error, DispatchOutcome::Failed(e.to_string()))
            }
        };

        let error_text = match &outcome {
            DispatchOutcome::Failed(reason) => Some(reason.as_str()),
            _ => None,
        };
        if let Err(e) = self
            .storage
            .update_draft_status(draft.id, status, error_text)
            .await
        {
            warn!(draft_id = draft.id, error = %e, "Failed to record draft status");
        }

        outcome
    }
}

#[async_trait]
impl PollCycle for DispatchPipeline {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn run_once(&self) -> Result<(), PipelineError> {
        let report = self.dispatch_all().await?;
        info!(
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Dispatch cycle complete"
        );
        Ok(())
    }
}
