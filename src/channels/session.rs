//! Session provider for private API accounts.
//!
//! The provider hands out a session blob per account login: JSON settings,
//! zlib-compressed, then base64-encoded.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Raw response from the session provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEnvelope {
    pub session: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Authorization half of the session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationData {
    pub ds_user_id: String,
    pub sessionid: String,
}

/// The subset of unpacked session settings the private client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub authorization_data: AuthorizationData,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A resolved, unpacked session ready to build a client from.
#[derive(Debug, Clone)]
pub struct Session {
    pub settings: SessionSettings,
    pub proxy: Option<String>,
}

/// Decode, inflate, and parse a packed session blob.
pub fn unpack_session(packed: &str) -> Result<serde_json::Value, ChannelError> {
    let compressed = STANDARD
        .decode(packed.trim())
        .map_err(|e| ChannelError::SessionUnpack(format!("invalid base64: {e}")))?;

    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| ChannelError::SessionUnpack(format!("invalid zlib stream: {e}")))?;

    serde_json::from_slice(&inflated)
        .map_err(|e| ChannelError::SessionUnpack(format!("invalid JSON: {e}")))
}

/// Inverse of [`unpack_session`].
pub fn pack_session(settings: &serde_json::Value) -> Result<String, ChannelError> {
    let json = serde_json::to_vec(settings)
        .map_err(|e| ChannelError::SessionUnpack(format!("unserializable session: {e}")))?;

    let compress_err = |e: std::io::Error| ChannelError::SessionUnpack(format!("compression failed: {e}"));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(compress_err)?;
    let compressed = encoder.finish().map_err(compress_err)?;
    Ok(STANDARD.encode(compressed))
}

/// HTTP client for the session provider.
#[derive(Clone)]
pub struct SessionProvider {
    base_url: String,
    client: reqwest::Client,
}

impl SessionProvider {
    /// `base_url` is the session collection, e.g. `http://auth/api/v1/session`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch and unpack the session for an account login.
    pub async fn resolve(&self, login: &str) -> Result<Session, ChannelError> {
        let envelope = self.fetch(login).await?;
        let value = unpack_session(&envelope.session)?;
        let settings: SessionSettings = serde_json::from_value(value)
            .map_err(|e| ChannelError::SessionUnpack(format!("unexpected session shape: {e}")))?;

        Ok(Session {
            settings,
            proxy: envelope.proxy.filter(|p| !p.is_empty()),
        })
    }

    async fn fetch(&self, login: &str) -> Result<SessionEnvelope, ChannelError> {
        let url = format!("{}/{login}", self.base_url);
        let unavailable = |reason: String| ChannelError::Unavailable {
            backend: "session-provider".to_string(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(unavailable(format!("status {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| unavailable(format!("bad session response: {e}")))
    }
}
