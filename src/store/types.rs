//! Records exchanged with the persistence service.
//!
//! Every conversation-level record carries two identifier namespaces: one
//! for the private mobile API and one for the official Graph API. A record
//! produced by one backend leaves the sibling namespace unset. Field names
//! on the wire follow the persistence service's schema.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a message, relative to the managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderKind {
    /// The managed account itself.
    #[serde(rename = "blogger")]
    AccountOwner,
    /// The external person on the other side of the thread.
    #[serde(rename = "external_user")]
    Counterpart,
}

/// Lifecycle of a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Pending,
    Sent,
    Error,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Error => "error",
        }
    }
}

/// A managed messaging identity. Read-only to this service.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: i64,
    #[serde(rename = "instagram_login")]
    pub login: String,
    pub status: String,
    /// Whether the account is served through the official Graph API.
    #[serde(rename = "can_use_official_graph_api")]
    pub graph_api_enabled: bool,
    #[serde(rename = "facebook_page_id", default)]
    pub page_id: Option<String>,
    #[serde(rename = "facebook_page_access_token", default)]
    pub page_access_token: Option<SecretString>,
}

/// One message inside a thread.
///
/// `id` and `thread_id` are assigned by the persistence service and are
/// absent on records produced by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(rename = "instagram_id_from_instagrapi", default)]
    pub private_id: Option<String>,
    #[serde(rename = "instagram_id_from_official_graph_api", default)]
    pub graph_id: Option<String>,
    #[serde(rename = "instagram_user_id_from_instagrapi", default)]
    pub private_user_id: Option<String>,
    #[serde(rename = "instagram_user_id_from_official_graph_api", default)]
    pub graph_user_id: Option<String>,
    /// Unix epoch seconds.
    pub created_at: f64,
    pub sender: SenderKind,
    /// `"text"` for plain text, the backend's native kind otherwise.
    pub item_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl Message {
    /// Text content, treating an empty string as absent.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether the message carries anything worth acting on.
    pub fn has_content(&self) -> bool {
        self.text().is_some() || self.link.as_deref().is_some_and(|l| !l.is_empty())
    }
}

/// A conversation between an account and one counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "instagram_id_from_instagrapi", default)]
    pub private_id: Option<String>,
    #[serde(rename = "instagram_id_from_official_graph_api", default)]
    pub graph_id: Option<String>,
    #[serde(rename = "thread_to_user_id_from_instagrapi", default)]
    pub private_counterpart_id: Option<String>,
    #[serde(rename = "thread_to_user_id_from_official_graph_api", default)]
    pub graph_counterpart_id: Option<String>,
    #[serde(rename = "thread_to_username")]
    pub counterpart_username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
}

/// An outbound reply draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub id: i64,
    pub thread_id: i64,
    pub text: String,
    pub status: DraftStatus,
    #[serde(rename = "thread_instagram_id_from_instagrapi", default)]
    pub thread_private_id: Option<String>,
    #[serde(rename = "thread_instagram_id_from_official_graph_api", default)]
    pub thread_graph_id: Option<String>,
    #[serde(rename = "recipient_instagram_id_from_instagrapi", default)]
    pub recipient_private_id: Option<String>,
    #[serde(rename = "recipient_instagram_id_from_official_graph_api", default)]
    pub recipient_graph_id: Option<String>,
    #[serde(rename = "recipient_instagram_username")]
    pub recipient_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An account together with its pending drafts.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDrafts {
    #[serde(flatten)]
    pub account: Account,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<GeneratedMessage>,
}

/// Treat an explicit JSON `null` list as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn sender_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(SenderKind::AccountOwner).unwrap(),
            "blogger"
        );
        assert_eq!(
            serde_json::to_value(SenderKind::Counterpart).unwrap(),
            "external_user"
        );
    }

    #[test]
    fn draft_status_wire_names() {
        assert_eq!(serde_json::to_value(DraftStatus::Error).unwrap(), "error");
        let status: DraftStatus = serde_json::from_str("\"sent\"").unwrap();
        assert_eq!(status, DraftStatus::Sent);
        assert_eq!(DraftStatus::Pending.as_str(), "pending");
    }

    #[test]
    fn account_debug_redacts_token() {
        let account = Account {
            id: 1,
            login: "shop".into(),
            status: "active".into(),
            graph_api_enabled: true,
            page_id: Some("42".into()),
            page_access_token: Some(SecretString::from("EAAB-secret".to_string())),
        };
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("EAAB-secret"));
        assert_eq!(
            account.page_access_token.as_ref().map(|t| t.expose_secret()),
            Some("EAAB-secret")
        );
    }

    #[test]
    fn account_token_deserializes_into_secret() {
        let account: Account = serde_json::from_value(serde_json::json!({
            "id": 3,
            "instagram_login": "shop",
            "status": "active",
            "can_use_official_graph_api": true,
            "facebook_page_id": "42",
            "facebook_page_access_token": "EAAB-secret"
        }))
        .unwrap();
        assert_eq!(
            account.page_access_token.as_ref().map(|t| t.expose_secret()),
            Some("EAAB-secret")
        );
        assert!(!format!("{account:?}").contains("EAAB-secret"));
    }

    #[test]
    fn account_drafts_accepts_null_messages() {
        let json = serde_json::json!({
            "id": 7,
            "instagram_login": "shop",
            "status": "active",
            "can_use_official_graph_api": false,
            "facebook_page_id": null,
            "facebook_page_access_token": null,
            "messages": null
        });
        let drafts: AccountDrafts = serde_json::from_value(json).unwrap();
        assert_eq!(drafts.account.id, 7);
        assert!(drafts.messages.is_empty());
    }

    #[test]
    fn backend_thread_omits_storage_ids() {
        let thread = Thread {
            id: None,
            private_id: Some("340282366841710300949128".into()),
            graph_id: None,
            private_counterpart_id: Some("55".into()),
            graph_counterpart_id: None,
            counterpart_username: "alice".into(),
            messages: vec![],
        };
        let json = serde_json::to_value(&thread).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["instagram_id_from_instagrapi"], "340282366841710300949128");
        assert!(json["instagram_id_from_official_graph_api"].is_null());
        assert_eq!(json["thread_to_username"], "alice");
    }

    #[test]
    fn message_content_checks() {
        let mut message = Message {
            id: None,
            thread_id: None,
            private_id: Some("1".into()),
            graph_id: None,
            private_user_id: Some("55".into()),
            graph_user_id: None,
            created_at: 1.0,
            sender: SenderKind::Counterpart,
            item_type: "text".into(),
            text: Some(String::new()),
            link: None,
        };
        assert!(message.text().is_none());
        assert!(!message.has_content());

        message.item_type = "link".into();
        message.link = Some("https://example.com".into());
        assert!(message.has_content());
    }
}
