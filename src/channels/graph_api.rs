//! Official Graph API channel for Instagram accounts linked to a page.
//!
//! Listing threads costs one call for the conversation list, one per
//! conversation for its participants and message ids, and one per message
//! for the message metadata.

use async_trait::async_trait;
use chrono::DateTime;
use futures::{StreamExt, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::channels::backend::ChannelBackend;
use crate::error::ChannelError;
use crate::store::types::{GeneratedMessage, Message, SenderKind, Thread};

const BACKEND: &str = "graph-api";

/// In-flight message metadata requests per conversation.
const MESSAGE_FETCH_CONCURRENCY: usize = 4;

/// Graph error code for an invalid or expired access token.
const OAUTH_INVALID_TOKEN: i64 = 190;

/// Connection for one page.
#[derive(Debug, Clone)]
pub struct GraphApiConfig {
    pub base_url: String,
    pub page_id: String,
    pub access_token: SecretString,
}

// ── Raw wire types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub messages: Option<Paged<MessageRef>>,
    pub participants: Paged<Participant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Message metadata from `GET /{message-id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessage {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub from: Participant,
    /// Recipients; the first one is recorded as the message's user id.
    #[serde(default)]
    pub to: Option<Paged<Participant>>,
    pub created_time: String,
}

impl GraphMessage {
    fn recipient_id(&self) -> Option<&str> {
        self.to
            .as_ref()
            .and_then(|to| to.data.first())
            .map(|p| p.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

// ── Normalization ───────────────────────────────────────────────────

/// Convert one conversation and its fetched messages into a thread.
///
/// The first participant is the account owner and the second is the
/// counterpart. Messages without a body are dropped, and so is a
/// conversation left with no messages.
pub fn normalize_conversation(
    conversation: &Conversation,
    messages: &[GraphMessage],
) -> Option<Thread> {
    let [owner, counterpart, ..] = conversation.participants.data.as_slice() else {
        warn!(conversation_id = %conversation.id, "Skipping conversation without two participants");
        return None;
    };
    let owner_username = owner.username.as_deref().unwrap_or_default();

    let messages: Vec<Message> = messages
        .iter()
        .filter_map(|m| normalize_message(m, owner_username))
        .collect();
    if messages.is_empty() {
        return None;
    }

    Some(Thread {
        id: None,
        private_id: None,
        graph_id: Some(conversation.id.clone()),
        private_counterpart_id: None,
        graph_counterpart_id: Some(counterpart.id.clone()),
        counterpart_username: counterpart.username.clone().unwrap_or_default(),
        messages,
    })
}

fn normalize_message(raw: &GraphMessage, owner_username: &str) -> Option<Message> {
    let text = raw.message.as_deref().filter(|t| !t.is_empty())?;
    let created_at = match parse_graph_time(&raw.created_time) {
        Some(ts) => ts,
        None => {
            warn!(message_id = %raw.id, created_time = %raw.created_time, "Dropping message with unparseable time");
            return None;
        }
    };

    Some(Message {
        id: None,
        thread_id: None,
        private_id: None,
        graph_id: Some(raw.id.clone()),
        private_user_id: None,
        graph_user_id: raw.recipient_id().map(str::to_string),
        created_at,
        sender: classify_sender(raw.from.username.as_deref().unwrap_or_default(), owner_username),
        item_type: "text".to_string(),
        text: Some(text.to_string()),
        link: None,
    })
}

/// Classify a sender against the conversation owner's username.
pub fn classify_sender(sender_username: &str, owner_username: &str) -> SenderKind {
    if sender_username == owner_username {
        SenderKind::AccountOwner
    } else {
        SenderKind::Counterpart
    }
}

/// Parse a Graph ISO-8601 time (`2024-05-01T10:20:30+0000`) to epoch seconds.
pub fn parse_graph_time(raw: &str) -> Option<f64> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

// ── Channel ─────────────────────────────────────────────────────────

/// Backend for accounts with official API access.
pub struct GraphApiChannel {
    config: GraphApiConfig,
    client: reqwest::Client,
}

impl GraphApiChannel {
    pub fn new(config: GraphApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, node: &str) -> String {
        format!("{}/{node}", self.config.base_url.trim_end_matches('/'))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        node: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ChannelError> {
        let resp = self
            .client
            .get(self.url(node))
            .query(params)
            .query(&[("access_token", self.config.access_token.expose_secret())])
            .send()
            .await
            .map_err(unavailable)?;
        let resp = check_response(resp).await?;
        resp.json().await.map_err(|e| ChannelError::InvalidPayload {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        })
    }

    async fn conversations(&self) -> Result<Vec<ConversationRef>, ChannelError> {
        let node = format!("{}/conversations", self.config.page_id);
        let page: Paged<ConversationRef> = self.get(&node, &[("platform", "instagram")]).await?;
        Ok(page.data)
    }

    async fn conversation(&self, id: &str) -> Result<Conversation, ChannelError> {
        self.get(id, &[("fields", "messages,participants,scoped_thread_key")])
            .await
    }

    async fn message(&self, id: &str) -> Result<GraphMessage, ChannelError> {
        self.get(id, &[("fields", "id,message,to,created_time,from,thread_id")])
            .await
    }

    /// Fetch every message's metadata, one call per message, in order.
    async fn messages(&self, conversation: &Conversation) -> Result<Vec<GraphMessage>, ChannelError> {
        let fetches: Vec<_> = conversation
            .messages
            .as_ref()
            .map(|m| m.data.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|r| self.message(&r.id))
            .collect();

        futures::stream::iter(fetches)
            .buffered(MESSAGE_FETCH_CONCURRENCY)
            .try_collect()
            .await
    }
}

#[async_trait]
impl ChannelBackend for GraphApiChannel {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get_all_threads(&self) -> Result<Vec<Thread>, ChannelError> {
        let refs = self.conversations().await?;
        debug!(page_id = %self.config.page_id, count = refs.len(), "Fetched conversations");

        let mut threads = Vec::with_capacity(refs.len());
        for conversation_ref in refs {
            let conversation = self.conversation(&conversation_ref.id).await?;
            let messages = self.messages(&conversation).await?;
            if let Some(thread) = normalize_conversation(&conversation, &messages) {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    async fn send_message(&self, draft: &GeneratedMessage) -> Result<(), ChannelError> {
        let Some(recipient) = draft.recipient_graph_id.as_deref() else {
            return Err(ChannelError::InvalidPayload {
                backend: BACKEND.to_string(),
                reason: format!("draft {} has no Graph recipient id", draft.id),
            });
        };

        let body = serde_json::json!({
            "recipient": { "id": recipient },
            "message": { "text": draft.text },
        });
        let resp = self
            .client
            .post(self.url(&format!("{}/messages", self.config.page_id)))
            .query(&[("access_token", self.config.access_token.expose_secret())])
            .json(&body)
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
    let detail = serde_json::from_str::<GraphErrorBody>(&body).ok().map(|b| b.error);

    let auth = status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || detail.as_ref().is_some_and(|d| d.code == OAUTH_INVALID_TOKEN);
    let reason = match detail {
        Some(d) => format!("status {status}: {} (code {})", d.message, d.code),
        None => format!("status {status}: {body}"),
    };

    if auth {
        Err(ChannelError::AuthFailed {
            backend: BACKEND.to_string(),
            reason,
        })
    } else {
        Err(ChannelError::Unavailable {
            backend: BACKEND.to_string(),
            reason,
        })
    }
}
