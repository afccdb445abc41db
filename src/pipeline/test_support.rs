//! In-memory stand-ins for the remote collaborators, shared by pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::channels::{BackendFactory, ChannelBackend};
use crate::error::{ChannelError, LlmError, StorageError};
use crate::llm::{PredictRequest, ReplyGenerator};
use crate::store::Storage;
use crate::store::types::{
    Account, AccountDrafts, DraftStatus, GeneratedMessage, Message, SenderKind, Thread,
};

// ── Fixtures ────────────────────────────────────────────────────────

pub(crate) fn account(id: i64, graph_api_enabled: bool) -> Account {
    Account {
        id,
        login: format!("account{id}"),
        status: "active".into(),
        graph_api_enabled,
        page_id: graph_api_enabled.then(|| "42".to_string()),
        page_access_token: graph_api_enabled.then(|| SecretString::from("token".to_string())),
    }
}

pub(crate) fn message(created_at: f64, sender: SenderKind, text: &str) -> Message {
    Message {
        id: None,
        thread_id: None,
        private_id: Some(format!("item-{created_at}")),
        graph_id: None,
        private_user_id: Some(match sender {
            SenderKind::AccountOwner => "1001".to_string(),
            SenderKind::Counterpart => "55".to_string(),
        }),
        graph_user_id: None,
        created_at,
        sender,
        item_type: "text".into(),
        text: Some(text.to_string()),
        link: None,
    }
}

/// A thread as persisted (with an id).
pub(crate) fn thread(id: i64, messages: Vec<Message>) -> Thread {
    Thread {
        id: Some(id),
        private_id: Some(format!("thread-{id}")),
        graph_id: None,
        private_counterpart_id: Some("55".into()),
        graph_counterpart_id: None,
        counterpart_username: "alice".into(),
        messages,
    }
}

pub(crate) fn draft(id: i64, thread_id: i64) -> GeneratedMessage {
    GeneratedMessage {
        id,
        thread_id,
        text: format!("reply {id}"),
        status: DraftStatus::Pending,
        thread_private_id: Some(format!("thread-{thread_id}")),
        thread_graph_id: None,
        recipient_private_id: Some("55".into()),
        recipient_graph_id: None,
        recipient_username: "alice".into(),
        error: None,
    }
}

// ── Storage ─────────────────────────────────────────────────────────

/// Storage that upserts threads by native id and allows one pending draft per thread.
#[derive(Default)]
pub(crate) struct MockStorage {
    pub accounts: Mutex<Vec<Account>>,
    pub fail_accounts: AtomicBool,
    pub fail_pending: AtomicBool,
    pub fail_save_for: Mutex<HashSet<i64>>,
    pending: Mutex<Vec<AccountDrafts>>,
    thread_ids: Mutex<HashMap<String, i64>>,
    saved: Mutex<Vec<(i64, Vec<Thread>)>>,
    drafts: Mutex<Vec<GeneratedMessage>>,
    updates: Mutex<Vec<(i64, DraftStatus, Option<String>)>>,
    next_id: AtomicI64,
}

impl MockStorage {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let storage = Self::default();
        *storage.accounts.lock().unwrap() = accounts;
        storage
    }

    pub fn seed_pending(&self, account: Account, drafts: Vec<GeneratedMessage>) {
        self.drafts.lock().unwrap().extend(drafts.iter().cloned());
        self.pending.lock().unwrap().push(AccountDrafts {
            account,
            messages: drafts,
        });
    }

    pub fn drafts(&self) -> Vec<GeneratedMessage> {
        self.drafts.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<(i64, Vec<Thread>)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(i64, DraftStatus, Option<String>)> {
        self.updates.lock().unwrap().clone()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn unavailable(endpoint: &str) -> StorageError {
    StorageError::Status {
        endpoint: endpoint.to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn active_accounts(&self) -> Result<Vec<Account>, StorageError> {
        if self.fail_accounts.load(Ordering::SeqCst) {
            return Err(unavailable("accounts"));
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn save_threads(
        &self,
        account_id: i64,
        threads: &[Thread],
    ) -> Result<Vec<Thread>, StorageError> {
        if self.fail_save_for.lock().unwrap().contains(&account_id) {
            return Err(unavailable("threads"));
        }

        let mut ids = self.thread_ids.lock().unwrap();
        let persisted: Vec<Thread> = threads
            .iter()
            .map(|t| {
                let key = t.private_id.clone().or_else(|| t.graph_id.clone()).unwrap_or_default();
                let id = *ids.entry(key).or_insert_with(|| self.next_id());
                Thread {
                    id: Some(id),
                    ..t.clone()
                }
            })
            .collect();
        self.saved.lock().unwrap().push((account_id, persisted.clone()));
        Ok(persisted)
    }

    async fn save_generated_message(
        &self,
        thread_id: i64,
        text: &str,
    ) -> Result<Option<GeneratedMessage>, StorageError> {
        let mut drafts = self.drafts.lock().unwrap();
        if drafts
            .iter()
            .any(|d| d.thread_id == thread_id && d.status == DraftStatus::Pending)
        {
            return Ok(None);
        }
        let created = GeneratedMessage {
            text: text.to_string(),
            ..draft(self.next_id(), thread_id)
        };
        drafts.push(created.clone());
        Ok(Some(created))
    }

    async fn pending_drafts(&self) -> Result<Vec<AccountDrafts>, StorageError> {
        if self.fail_pending.load(Ordering::SeqCst) {
            return Err(unavailable("pending"));
        }
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn update_draft_status(
        &self,
        id: i64,
        status: DraftStatus,
        error: Option<&str>,
    ) -> Result<GeneratedMessage, StorageError> {
        self.updates
            .lock()
            .unwrap()
            .push((id, status, error.map(str::to_string)));

        let mut drafts = self.drafts.lock().unwrap();
        let draft = drafts
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| unavailable("drafts"))?;
        draft.status = status;
        draft.error = error.map(str::to_string);
        Ok(draft.clone())
    }
}

// ── Generator ───────────────────────────────────────────────────────

pub(crate) struct MockGenerator {
    reply: Option<String>,
    requests: Mutex<Vec<PredictRequest>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PredictRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    async fn generate(&self, request: &PredictRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or(LlmError::NoGeneratedText)
    }
}

// ── Backends ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Auth,
    Unavailable,
    SessionUnpack,
}

impl Failure {
    fn error(self) -> ChannelError {
        match self {
            Self::Auth => ChannelError::AuthFailed {
                backend: "mock".into(),
                reason: "challenge_required".into(),
            },
            Self::Unavailable => ChannelError::Unavailable {
                backend: "mock".into(),
                reason: "connection reset".into(),
            },
            Self::SessionUnpack => ChannelError::SessionUnpack("invalid base64".into()),
        }
    }
}

/// Factory serving canned threads per account and recording sends.
#[derive(Default)]
pub(crate) struct MockBackendFactory {
    pub threads: HashMap<i64, Result<Vec<Thread>, Failure>>,
    pub failing_drafts: HashSet<i64>,
    pub sent: Arc<Mutex<Vec<i64>>>,
}

impl MockBackendFactory {
    pub fn sent(&self) -> Vec<i64> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockBackend {
    threads: Result<Vec<Thread>, Failure>,
    failing_drafts: HashSet<i64>,
    sent: Arc<Mutex<Vec<i64>>>,
}

impl BackendFactory for MockBackendFactory {
    fn backend_for(&self, account: &Account) -> Result<Box<dyn ChannelBackend>, ChannelError> {
        Ok(Box::new(MockBackend {
            threads: self.threads.get(&account.id).cloned().unwrap_or(Ok(Vec::new())),
            failing_drafts: self.failing_drafts.clone(),
            sent: Arc::clone(&self.sent),
        }))
    }
}

#[async_trait]
impl ChannelBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_all_threads(&self) -> Result<Vec<Thread>, ChannelError> {
        self.threads.clone().map_err(Failure::error)
    }

    async fn send_message(&self, draft: &GeneratedMessage) -> Result<(), ChannelError> {
        if self.failing_drafts.contains(&draft.id) {
            return Err(Failure::Unavailable.error());
        }
        self.sent.lock().unwrap().push(draft.id);
        Ok(())
    }
}
