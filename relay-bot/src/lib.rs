//! Relay Bot - forwards files sent in a chat to cloud storage.
//!
//! A user starts a conversation with `/start`, picks a storage service
//! (S3 or Google Drive), then sends documents or videos which are uploaded
//! one by one until `/cancel`.
//!
//! # Architecture
//!
//! - **Conversation** ([`conversation`]) - per-chat state machine and reply texts
//! - **Session** ([`session`]) - in-memory conversation state, one per chat
//! - **Storage** ([`storage`]) - the [`StorageBackend`](storage::StorageBackend)
//!   trait, its S3 and Drive implementations, and the `build_backend` factory
//! - **Channels** ([`channels`]) - Telegram and CLI transports
//! - **Config** ([`config`]) - environment-sourced settings
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relay_bot::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::load()?;
//!     let registry = BackendRegistry::new(config.backends.clone());
//!     let controller = Arc::new(Controller::new(registry, config.download_dir.clone()));
//!     CliChannel::new().run(controller).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable Telegram bot support via teloxide

pub mod channel;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types (centralized)
    pub use crate::error::{
        BotError, ChannelError, ChannelResult, ConfigError, ConfigResult, ErrorContext, Result,
        UploadError, UploadResult,
    };

    // Channel
    pub use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
    pub use crate::channels::CliChannel;
    pub use crate::channels::cli::CliChannelConfig;
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

    // Config
    pub use crate::config::RelayConfig;

    // Conversation
    pub use crate::conversation::{AttachmentFetcher, Controller, LocalFileFetcher};

    // Events
    pub use crate::events::{
        Attachment, AttachmentKind, Command, InboundMessage, MessageContent, OutboundMessage,
        ReplyKeyboard,
    };

    // Session
    pub use crate::session::{Session, SessionManager, State};

    // Storage
    pub use crate::storage::{
        BackendKind, BackendRegistry, BackendSettings, DriveBackend, S3Backend, StorageBackend,
        build_backend,
    };
}
