//! Unified error types for relay-bot.
//!
//! Module-specific errors all convert into the main [`BotError`] type so the
//! binary can report any failure through a single `Result`.

use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for relay-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Storage backend error.
    #[error("upload: {0}")]
    Upload(#[from] UploadError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for relay-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for chat channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send a reply.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to download an attachment.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Create a download failed error.
    #[inline]
    pub fn download(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Upload Errors
// ============================================================================

/// Error type for storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Credentials are missing, unreadable, or expired without a way to refresh.
    #[error("credentials: {0}")]
    Credentials(String),

    /// The backend was used before `init` succeeded.
    #[error("backend not initialized: {0}")]
    NotInitialized(&'static str),

    /// No backend is registered under the given name.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// The provider rejected the request or returned an unexpected response.
    #[error("provider: {0}")]
    Provider(String),

    /// Transport-level failure talking to the provider.
    #[error("request: {0}")]
    Request(String),

    /// Local file could not be read.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed provider or token JSON.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// Create a credentials error.
    #[inline]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create a provider error.
    #[inline]
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Result type for storage backend operations.
pub type UploadResult<T> = std::result::Result<T, UploadError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing variable error.
    #[inline]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing(name.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Error Context Extension
// ============================================================================

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context using a closure (lazy evaluation).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<BotError>> ErrorContext<T> for std::result::Result<T, E> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", f(), err))
        })
    }
}

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a BotError);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BotError::Config(e) => write!(f, "Configuration error: {e}"),
            BotError::Channel(e) => write!(f, "Channel error: {e}"),
            BotError::Upload(e) => write!(f, "Upload error: {e}"),
            BotError::Io(e) => write!(f, "IO error: {e}"),
            BotError::Json(e) => write!(f, "JSON error: {e}"),
            BotError::Internal(e) => write!(f, "Internal error: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
