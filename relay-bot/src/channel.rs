//! Channel trait and base functionality for chat transports.
//!
//! A channel turns platform updates into [`InboundMessage`]s, hands them to
//! the [`Controller`], and delivers the replies back to the chat.
//!
//! [`InboundMessage`]: crate::events::InboundMessage

use crate::conversation::Controller;
use crate::error::ChannelResult;
use crate::events::OutboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Channel is not started.
    #[default]
    Stopped,
    /// Channel is starting up.
    Starting,
    /// Channel is running and connected.
    Running,
    /// Channel encountered an error.
    Error,
}

/// Channel status information.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Number of messages received.
    pub messages_received: u64,
    /// Number of messages sent.
    pub messages_sent: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
    /// Whether the channel is healthy.
    pub healthy: bool,
}

/// Trait for implementing chat channels.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the unique name of this channel.
    fn name(&self) -> &str;

    /// Receive messages and answer them through the controller until the
    /// transport shuts down.
    async fn run(&self, controller: Arc<Controller>) -> ChannelResult<()>;

    /// Send an outbound message through this channel.
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()>;

    /// Get the current channel status.
    async fn status(&self) -> ChannelStatus;
}

/// Base implementation helpers for channels.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create a new channel base.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Set the channel state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Record a received message.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Record a sent message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Record an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build status from current state and stats.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ChannelStatus {
            name: self.name.clone(),
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
            healthy: state == ChannelState::Running && stats.last_error.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_base() {
        let base = ChannelBase::new("telegram");
        assert_eq!(base.name(), "telegram");
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        base.record_received().await;
        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 2);
        assert_eq!(status.messages_sent, 1);
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn test_error_marks_unhealthy() {
        let base = ChannelBase::new("cli");
        base.set_state(ChannelState::Running).await;
        base.record_error("send failed: chat not found").await;

        let status = base.build_status().await;
        assert!(!status.healthy);
        assert_eq!(
            status.last_error.as_deref(),
            Some("send failed: chat not found")
        );
    }
}
