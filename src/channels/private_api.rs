//! Private API channel: the mobile-app direct inbox, authenticated by a
//! session resolved from the session provider on every operation.
//!
//! Threads come from two inboxes: the regular one and the message-requests
//! ("pending") one. Both are merged before normalization.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::channels::backend::ChannelBackend;
use crate::channels::session::{Session, SessionProvider};
use crate::error::ChannelError;
use crate::store::types::{GeneratedMessage, Message, SenderKind, Thread};

const BACKEND: &str = "private-api";

/// Application id sent by the official Android client.
const IG_APP_ID: &str = "567067343352427";

const DEFAULT_USER_AGENT: &str =
    "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";

/// Response messages that mean the session is no longer usable.
const AUTH_FAILURE_MESSAGES: [&str; 3] = [
    "login_required",
    "challenge_required",
    "checkpoint_required",
];

// ── Raw wire types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InboxResponse {
    inbox: Inbox,
}

#[derive(Debug, Deserialize)]
struct Inbox {
    #[serde(default)]
    threads: Vec<RawThread>,
}

/// A thread as returned by the direct inbox endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RawThread {
    #[serde(deserialize_with = "string_or_number")]
    pub thread_id: String,
    #[serde(default)]
    pub users: Vec<RawUser>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(deserialize_with = "string_or_number")]
    pub pk: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Microseconds since the epoch.
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    pub item_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link: Option<RawLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link_context: Option<RawLinkContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLinkContext {
    #[serde(default)]
    pub link_url: Option<String>,
}

/// Ids arrive as either JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

// ── Normalization ───────────────────────────────────────────────────

/// Convert raw inbox threads into canonical threads.
///
/// The first listed user of a thread is the counterpart; any message not
/// sent by that user was sent by the account owner.
pub fn normalize_threads(raw_threads: Vec<RawThread>) -> Vec<Thread> {
    raw_threads.into_iter().filter_map(normalize_thread).collect()
}

fn normalize_thread(raw: RawThread) -> Option<Thread> {
    let Some(counterpart) = raw.users.first() else {
        warn!(thread_id = %raw.thread_id, "Skipping thread without users");
        return None;
    };

    let messages = raw
        .items
        .iter()
        .filter_map(|item| normalize_item(item, &counterpart.pk))
        .collect();

    Some(Thread {
        id: None,
        private_id: Some(raw.thread_id.clone()),
        graph_id: None,
        private_counterpart_id: Some(counterpart.pk.clone()),
        graph_counterpart_id: None,
        counterpart_username: counterpart.username.clone(),
        messages,
    })
}

fn normalize_item(item: &RawItem, counterpart_pk: &str) -> Option<Message> {
    let link = item.link.as_ref().and_then(|l| {
        l.link_context
            .as_ref()
            .and_then(|c| c.link_url.clone())
            .or_else(|| l.text.clone())
    });

    let message = Message {
        id: None,
        thread_id: None,
        private_id: Some(item.item_id.clone()),
        graph_id: None,
        private_user_id: Some(item.user_id.clone()),
        graph_user_id: None,
        created_at: micros_to_secs(&item.timestamp)?,
        sender: classify_sender(&item.user_id, counterpart_pk),
        item_type: item.item_type.clone(),
        text: item.text.clone(),
        link,
    };

    message.has_content().then_some(message)
}

/// Classify a sender against the thread's counterpart id.
pub fn classify_sender(sender_id: &str, counterpart_id: &str) -> SenderKind {
    if sender_id == counterpart_id {
        SenderKind::Counterpart
    } else {
        SenderKind::AccountOwner
    }
}

fn micros_to_secs(raw: &str) -> Option<f64> {
    match raw.parse::<i64>() {
        Ok(micros) => Some(micros as f64 / 1_000_000.0),
        Err(e) => {
            warn!(timestamp = %raw, error = %e, "Dropping item with unparseable timestamp");
            None
        }
    }
}

// ── HTTP client ─────────────────────────────────────────────────────

/// Authenticated client for one session.
struct PrivateApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl PrivateApiClient {
    fn new(session: &Session, base_url: &str) -> Result<Self, ChannelError> {
        let invalid = |reason: String| ChannelError::SessionUnpack(reason);

        let auth_json = serde_json::to_vec(&session.settings.authorization_data)
            .map_err(|e| invalid(e.to_string()))?;
        let bearer = format!("Bearer IGT:2:{}", STANDARD.encode(auth_json));

        let user_agent = session
            .settings
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| invalid(e.to_string()))?,
        );
        headers.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| invalid(e.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("x-ig-app-id"),
            HeaderValue::from_static(IG_APP_ID),
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(proxy) = &session.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| invalid(format!("bad proxy url: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| ChannelError::Unavailable {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn inbox(&self, path: &str) -> Result<Vec<RawThread>, ChannelError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(unavailable)?;
        let resp = check_response(resp).await?;
        let inbox: InboxResponse = resp.json().await.map_err(|e| ChannelError::InvalidPayload {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        })?;
        Ok(inbox.inbox.threads)
    }

    async fn send_text(&self, thread_id: &str, text: &str) -> Result<(), ChannelError> {
        let token = Uuid::new_v4().to_string();
        let thread_ids = format!("[{thread_id}]");
        let form = [
            ("action", "send_item"),
            ("is_shh_mode", "0"),
            ("send_attribution", "direct_thread"),
            ("client_context", token.as_str()),
            ("mutation_token", token.as_str()),
            ("thread_ids", thread_ids.as_str()),
            ("text", text),
        ];

        let resp = self
            .http
            .post(format!("{}/direct_v2/threads/broadcast/text/", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(unavailable)?;
        check_response(resp).await?;
        Ok(())
    }
}

fn unavailable(e: reqwest::Error) -> ChannelError {
    ChannelError::Unavailable {
        backend: BACKEND.to_string(),
        reason: e.to_string(),
    }
}

/// Map a non-success response onto the channel error taxonomy.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_default();

    let auth = status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || AUTH_FAILURE_MESSAGES.contains(&message.as_str());

    if auth {
        Err(ChannelError::AuthFailed {
            backend: BACKEND.to_string(),
            reason: format!("status {status}: {message}"),
        })
    } else {
        Err(ChannelError::Unavailable {
            backend: BACKEND.to_string(),
            reason: format!("status {status}: {body}"),
        })
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// Backend for accounts without official API access.
pub struct PrivateApiChannel {
    login: String,
    sessions: SessionProvider,
    base_url: String,
}

impl PrivateApiChannel {
    pub fn new(login: String, sessions: SessionProvider, base_url: String) -> Self {
        Self {
            login,
            sessions,
            base_url,
        }
    }

    async fn client(&self) -> Result<PrivateApiClient, ChannelError> {
        let session = self.sessions.resolve(&self.login).await?;
        PrivateApiClient::new(&session, &self.base_url)
    }
}

#[async_trait]
impl ChannelBackend for PrivateApiChannel {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get_all_threads(&self) -> Result<Vec<Thread>, ChannelError> {
        let client = self.client().await?;

        let pending = client.inbox("/direct_v2/pending_inbox/").await?;
        let mut raw_threads = client.inbox("/direct_v2/inbox/").await?;
        debug!(
            login = %self.login,
            inbox = raw_threads.len(),
            pending = pending.len(),
            "Fetched raw threads"
        );
        raw_threads.extend(pending);

        Ok(normalize_threads(raw_threads))
    }

    async fn send_message(&self, draft: &GeneratedMessage) -> Result<(), ChannelError> {
        let Some(thread_id) = draft.thread_private_id.as_deref() else {
            return Err(ChannelError::InvalidPayload {
                backend: BACKEND.to_string(),
                reason: format!("draft {} has no private thread id", draft.id),
            });
        };

        let client = self.client().await?;
        client.send_text(thread_id, &draft.text).await
    }
}
