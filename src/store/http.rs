//! HTTP client for the persistence service.
//!
//! Every response is wrapped in a `{"data": ...}` envelope.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;
use crate::store::traits::Storage;
use crate::store::types::{Account, AccountDrafts, DraftStatus, GeneratedMessage, Thread};

const ACTIVE_ACCOUNTS_PATH: &str = "/v1/api/blogger/get-active-bloggers";
const THREADS_PATH: &str = "/v1/api/direct/threads";
const GENERATED_MESSAGE_PATH: &str = "/v1/api/direct/threads/generated-message";
const GENERATED_MESSAGES_PATH: &str = "/v1/api/direct/threads/generated-messages";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// `Storage` implementation backed by the persistence service's REST API.
pub struct HttpStorage {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and decode the envelope's `data` field.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, StorageError> {
        let resp = request.send().await.map_err(|e| StorageError::Request {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = resp.json().await.map_err(|e| StorageError::Decode {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(envelope.data)
    }

    async fn call_required<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StorageError> {
        self.call(path, request)
            .await?
            .ok_or_else(|| StorageError::Decode {
                endpoint: path.to_string(),
                reason: "missing data field".to_string(),
            })
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn active_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let request = self.client.get(self.url(ACTIVE_ACCOUNTS_PATH));
        self.call_required(ACTIVE_ACCOUNTS_PATH, request).await
    }

    async fn save_threads(
        &self,
        account_id: i64,
        threads: &[Thread],
    ) -> Result<Vec<Thread>, StorageError> {
        let body = serde_json::json!({
            "blogger_id": account_id,
            "threads": threads,
        });
        let request = self.client.post(self.url(THREADS_PATH)).json(&body);
        self.call_required(THREADS_PATH, request).await
    }

    async fn save_generated_message(
        &self,
        thread_id: i64,
        text: &str,
    ) -> Result<Option<GeneratedMessage>, StorageError> {
        let body = serde_json::json!({
            "thread_id": thread_id,
            "message": text,
        });
        let request = self.client.post(self.url(GENERATED_MESSAGE_PATH)).json(&body);
        self.call(GENERATED_MESSAGE_PATH, request).await
    }

    async fn pending_drafts(&self) -> Result<Vec<AccountDrafts>, StorageError> {
        let request = self.client.get(self.url(GENERATED_MESSAGES_PATH));
        self.call_required(GENERATED_MESSAGES_PATH, request).await
    }

    async fn update_draft_status(
        &self,
        id: i64,
        status: DraftStatus,
        error: Option<&str>,
    ) -> Result<GeneratedMessage, StorageError> {
        let body = serde_json::json!({
            "id": id,
            "status": status,
            "error": error,
        });
        let request = self.client.patch(self.url(GENERATED_MESSAGES_PATH)).json(&body);
        self.call_required(GENERATED_MESSAGES_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn draft_json(status: &str) -> serde_json::Value {
        json!({
            "id": 11,
            "thread_id": 3,
            "text": "Yes!",
            "status": status,
            "thread_instagram_id_from_instagrapi": "t-1",
            "thread_instagram_id_from_official_graph_api": null,
            "recipient_instagram_id_from_instagrapi": "55",
            "recipient_instagram_id_from_official_graph_api": null,
            "recipient_instagram_username": "alice"
        })
    }

    #[tokio::test]
    async fn active_accounts_decodes_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ACTIVE_ACCOUNTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": 1,
                    "instagram_login": "shop",
                    "status": "active",
                    "can_use_official_graph_api": true,
                    "facebook_page_id": "42",
                    "facebook_page_access_token": "token"
                }]
            })))
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        let accounts = storage.active_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].login, "shop");
        assert!(accounts[0].graph_api_enabled);
        assert_eq!(accounts[0].page_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ACTIVE_ACCOUNTS_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        let err = storage.active_accounts().await.unwrap_err();
        assert!(matches!(err, StorageError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn save_threads_posts_account_id() {
        let server = MockServer::start().await;
        let thread = Thread {
            id: None,
            private_id: Some("t-1".into()),
            graph_id: None,
            private_counterpart_id: Some("55".into()),
            graph_counterpart_id: None,
            counterpart_username: "alice".into(),
            messages: vec![],
        };
        let mut saved = serde_json::to_value(&thread).unwrap();
        saved["id"] = json!(3);

        Mock::given(method("POST"))
            .and(path(THREADS_PATH))
            .and(body_json(json!({
                "blogger_id": 1,
                "threads": [serde_json::to_value(&thread).unwrap()]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [saved] })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        let persisted = storage.save_threads(1, &[thread]).await.unwrap();
        assert_eq!(persisted[0].id, Some(3));
    }

    #[tokio::test]
    async fn save_generated_message_null_data_means_already_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATED_MESSAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        assert!(storage.save_generated_message(3, "hi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_draft_status_sends_error_text() {
        let server = MockServer::start().await;
        let mut updated = draft_json("error");
        updated["error"] = json!("boom");

        Mock::given(method("PATCH"))
            .and(path(GENERATED_MESSAGES_PATH))
            .and(body_json(json!({ "id": 11, "status": "error", "error": "boom" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": updated })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        let draft = storage
            .update_draft_status(11, DraftStatus::Error, Some("boom"))
            .await
            .unwrap();
        assert_eq!(draft.status, DraftStatus::Error);
        assert_eq!(draft.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn pending_drafts_groups_by_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GENERATED_MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": 1,
                    "instagram_login": "shop",
                    "status": "active",
                    "can_use_official_graph_api": false,
                    "messages": [draft_json("pending")]
                }]
            })))
            .mount(&server)
            .await;

        let storage = HttpStorage::new(server.uri());
        let pending = storage.pending_drafts().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].messages[0].recipient_username, "alice");
        assert_eq!(pending[0].messages[0].status, DraftStatus::Pending);
    }
}
