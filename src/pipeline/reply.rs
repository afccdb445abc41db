//! Reply generation. Turns a persisted thread into at most one pending draft.
//!
//! A thread needs a reply only when its latest message is a non-empty text
//! from the counterpart. The draft store keeps at most one unsent draft per
//! thread, so re-running on an unchanged thread is a no-op.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::llm::{Dialog, DialogTurn, GenerationSettings, PredictRequest, ReplyGenerator};
use crate::store::Storage;
use crate::store::types::{GeneratedMessage, Message, SenderKind, Thread};

/// Result of running the pipeline on one thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The account spoke last, or the last message has no text.
    NotNeeded,
    /// A new pending draft was persisted.
    Created(GeneratedMessage),
    /// The thread already holds an unsent draft.
    AlreadyPending,
}

/// Build the dialog to answer from a thread's messages.
///
/// Returns `None` when no reply is needed.
pub fn build_dialog(messages: &[Message]) -> Option<Dialog> {
    let mut sorted: Vec<&Message> = messages.iter().collect();
    sorted.sort_by(|a, b| a.created_at.total_cmp(&b.created_at));

    let (last, earlier) = sorted.split_last()?;
    if last.sender == SenderKind::AccountOwner {
        return None;
    }
    let user = last.text()?.to_string();

    let dialog_history = earlier
        .iter()
        .filter_map(|m| {
            let text = m.text()?;
            Some(match m.sender {
                SenderKind::AccountOwner => DialogTurn::bot(text),
                SenderKind::Counterpart => DialogTurn::user(text),
            })
        })
        .collect();

    Some(Dialog {
        user,
        dialog_history,
    })
}

/// Generates and persists reply drafts.
pub struct ReplyPipeline {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn ReplyGenerator>,
    settings: GenerationSettings,
}

impl ReplyPipeline {
    pub fn new(storage: Arc<dyn Storage>, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            storage,
            generator,
            settings: GenerationSettings::default(),
        }
    }

    /// Run the pipeline for one persisted thread.
    pub async fn reply_to_thread(&self, thread: &Thread) -> Result<ReplyOutcome, PipelineError> {
        let thread_id = thread.id.ok_or(PipelineError::MissingThreadId)?;

        let Some(dialog) = build_dialog(&thread.messages) else {
            return Ok(ReplyOutcome::NotNeeded);
        };

        debug!(thread_id, turns = dialog.dialog_history.len(), "Requesting generated reply");
        let request = PredictRequest::single(dialog, self.settings);
        let text = self.generator.generate(&request).await?;

        match self.storage.save_generated_message(thread_id, &text).await? {
            Some(draft) => {
                debug!(thread_id, draft_id = draft.id, "Saved generated reply");
                Ok(ReplyOutcome::Created(draft))
            }
            None => {
                debug!(thread_id, "Thread already has an unsent generated reply");
                Ok(ReplyOutcome::AlreadyPending)
            }
        }
    }

    /// Run the pipeline over many threads concurrently.
    ///
    /// Failures are logged per thread and don't affect siblings. Returns the
    /// drafts that were created.
    pub async fn reply_to_threads(&self, threads: &[Thread]) -> Vec<GeneratedMessage> {
        let outcomes = join_all(threads.iter().map(|t| self.reply_to_thread(t))).await;

        let mut created = Vec::new();
        for (thread, outcome) in threads.iter().zip(outcomes) {
            match outcome {
                Ok(ReplyOutcome::Created(draft)) => created.push(draft),
                Ok(_) => {}
                Err(e) => {
                    error!(thread_id = ?thread.id, error = %e, "Failed to generate reply");
                }
            }
        }

        if !created.is_empty() {
            info!(count = created.len(), "Created reply drafts");
        }
        created
    }
}
