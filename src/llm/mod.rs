//! Reply generation through the external text-generation service.
//!
//! The service takes a dialog (prior turns plus the turn to answer) and a
//! fixed set of sampling knobs, and returns candidate texts. The first
//! candidate is used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;

/// One prior exchange. Exactly one side is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTurn {
    pub bot: String,
    pub user: String,
}

impl DialogTurn {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            bot: text.into(),
            user: String::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            bot: String::new(),
            user: text.into(),
        }
    }
}

/// A dialog to answer: history plus the counterpart's latest text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub user: String,
    pub dialog_history: Vec<DialogTurn>,
}

/// Sampling configuration, identical for every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Request body for `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: PredictData,
    pub config: PredictConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictData {
    pub dialogs: Vec<Dialog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictConfig {
    pub generation_settings: GenerationSettings,
}

impl PredictRequest {
    pub fn single(dialog: Dialog, settings: GenerationSettings) -> Self {
        Self {
            data: PredictData {
                dialogs: vec![dialog],
            },
            config: PredictConfig {
                generation_settings: settings,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    texts: Option<Vec<String>>,
}

/// Produces a reply text for a dialog.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Returns the first candidate, or `LlmError::NoGeneratedText` if there is none.
    async fn generate(&self, request: &PredictRequest) -> Result<String, LlmError>;
}

/// `ReplyGenerator` backed by the generation service's HTTP API.
pub struct HttpGenerator {
    url: String,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(base_url: &str) -> Self {
        Self {
            url: format!("{}/predict", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for HttpGenerator {
    async fn generate(&self, request: &PredictRequest) -> Result<String, LlmError> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                reason: format!("status {status}: {body}"),
            });
        }

        let body: PredictResponse = resp.json().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("bad response body: {e}"),
        })?;

        let text = body
            .texts
            .unwrap_or_default()
            .into_iter()
            .next()
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::NoGeneratedText)?;
        debug!(chars = text.chars().count(), "Received generated text");
        Ok(text)
    }
}
