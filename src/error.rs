//! Error types for Direct Reply.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the remote persistence service.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint} responded with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

/// Messaging backend errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The remote session is invalid or expired.
    #[error("Authentication failed for backend {backend}: {reason}")]
    AuthFailed { backend: String, reason: String },

    /// Transport failure or rate limiting.
    #[error("Backend {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Failed to unpack session: {0}")]
    SessionUnpack(String),

    #[error("Account {account_id} has no official API credentials")]
    MissingCredentials { account_id: i64 },

    #[error("Invalid payload from backend {backend}: {reason}")]
    InvalidPayload { backend: String, reason: String },
}

impl ChannelError {
    /// Whether the failure means the account's session must be renewed.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }
}

/// Text generation service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Generation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Generation service didn't return any text")]
    NoGeneratedText,
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The account list or pending-draft list couldn't be fetched.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(StorageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Thread has no persisted id")]
    MissingThreadId,
}
