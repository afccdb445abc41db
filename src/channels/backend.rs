//! The messaging backend contract and per-account backend selection.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::channels::graph_api::{GraphApiChannel, GraphApiConfig};
use crate::channels::private_api::PrivateApiChannel;
use crate::channels::session::SessionProvider;
use crate::error::ChannelError;
use crate::store::types::{Account, GeneratedMessage, Thread};

/// Capability shared by every messaging backend.
#[async_trait]
pub trait ChannelBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Fetch and normalize every thread visible to the account.
    async fn get_all_threads(&self) -> Result<Vec<Thread>, ChannelError>;

    /// Deliver one draft to its recipient.
    async fn send_message(&self, draft: &GeneratedMessage) -> Result<(), ChannelError>;
}

/// Which backend serves an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    PrivateApi,
    GraphApi,
}

impl BackendKind {
    /// Selection depends only on the account's official-API flag.
    pub fn for_account(account: &Account) -> Self {
        if account.graph_api_enabled {
            Self::GraphApi
        } else {
            Self::PrivateApi
        }
    }
}

/// Closed set of backend variants.
pub enum Backend {
    Private(PrivateApiChannel),
    Graph(GraphApiChannel),
}

#[async_trait]
impl ChannelBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Self::Private(inner) => inner.name(),
            Self::Graph(inner) => inner.name(),
        }
    }

    async fn get_all_threads(&self) -> Result<Vec<Thread>, ChannelError> {
        match self {
            Self::Private(inner) => inner.get_all_threads().await,
            Self::Graph(inner) => inner.get_all_threads().await,
        }
    }

    async fn send_message(&self, draft: &GeneratedMessage) -> Result<(), ChannelError> {
        match self {
            Self::Private(inner) => inner.send_message(draft).await,
            Self::Graph(inner) => inner.send_message(draft).await,
        }
    }
}

/// Builds the backend for an account. Called fresh for every unit of work.
pub trait BackendFactory: Send + Sync {
    fn backend_for(&self, account: &Account) -> Result<Box<dyn ChannelBackend>, ChannelError>;
}

/// Endpoints shared by all backends built by [`HttpBackendFactory`].
#[derive(Debug, Clone)]
pub struct BackendEndpoints {
    pub session_url: String,
    pub private_api_url: String,
    pub graph_api_url: String,
}

/// Production factory: real HTTP backends.
pub struct HttpBackendFactory {
    endpoints: BackendEndpoints,
    sessions: SessionProvider,
}

impl HttpBackendFactory {
    pub fn new(endpoints: BackendEndpoints) -> Self {
        let sessions = SessionProvider::new(endpoints.session_url.clone());
        Self {
            endpoints,
            sessions,
        }
    }

    /// Build the concrete variant for an account.
    pub fn build(&self, account: &Account) -> Result<Backend, ChannelError> {
        match BackendKind::for_account(account) {
            BackendKind::GraphApi => {
                let (Some(page_id), Some(token)) = (
                    account.page_id.as_deref().filter(|p| !p.is_empty()),
                    account
                        .page_access_token
                        .as_ref()
                        .filter(|t| !t.expose_secret().is_empty()),
                ) else {
                    return Err(ChannelError::MissingCredentials {
                        account_id: account.id,
                    });
                };
                Ok(Backend::Graph(GraphApiChannel::new(GraphApiConfig {
                    base_url: self.endpoints.graph_api_url.clone(),
                    page_id: page_id.to_string(),
                    access_token: token.clone(),
                })))
            }
            BackendKind::PrivateApi => Ok(Backend::Private(PrivateApiChannel::new(
                account.login.clone(),
                self.sessions.clone(),
                self.endpoints.private_api_url.clone(),
            ))),
        }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn backend_for(&self, account: &Account) -> Result<Box<dyn ChannelBackend>, ChannelError> {
        Ok(Box::new(self.build(account)?))
    }
}
