//! Message events exchanged between channels and the conversation controller.
//!
//! Channels translate platform updates into [`InboundMessage`]s and deliver
//! the controller's [`OutboundMessage`]s back to the chat.

use crate::util::{generate_message_id, sanitize_file_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Bot commands understood by the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Begin a conversation.
    Start,
    /// End the conversation and forget the session.
    Cancel,
}

impl Command {
    /// Parse a command from message text, ignoring trailing arguments.
    ///
    /// A command addressed to a bot (`/start@some_bot`) is not recognized;
    /// use [`Command::parse_addressed`] when the bot's username is known.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_addressed(text, None)
    }

    /// Parse a command that may carry the `@botname` suffix Telegram uses
    /// in group chats.
    ///
    /// The suffix must name `bot_username` (case-insensitive); commands
    /// addressed to any other bot are not commands for us.
    #[must_use]
    pub fn parse_addressed(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = match word.split_once('@') {
            Some((name, target)) => {
                if !bot_username.is_some_and(|me| me.eq_ignore_ascii_case(target)) {
                    return None;
                }
                name
            }
            None => word,
        };

        match name {
            "start" => Some(Self::Start),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// How the transport classified an inbound file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// File sent as a document (uncompressed).
    Document,
    /// Video file.
    Video,
    /// Image the transport re-encoded (compressed photo).
    Photo,
    /// Any other media kind, e.g. `"voice"` or `"sticker"`.
    Other(String),
}

impl AttachmentKind {
    /// Whether files of this kind are forwarded to storage.
    #[must_use]
    pub const fn is_uploadable(&self) -> bool {
        matches!(self, Self::Document | Self::Video)
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Video => f.write_str("video"),
            Self::Photo => f.write_str("photo"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// A file attached to an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Transport classification.
    pub kind: AttachmentKind,
    /// Transport handle used to download the bytes.
    pub file_id: String,
    /// Sanitized source file name.
    pub file_name: String,
    /// MIME type reported by the transport, if any.
    pub mime_type: Option<String>,
    /// File size in bytes, if known.
    pub file_size: Option<u64>,
}

impl Attachment {
    /// Create an attachment; the file name is sanitized.
    pub fn new(
        kind: AttachmentKind,
        file_id: impl Into<String>,
        file_name: impl AsRef<str>,
    ) -> Self {
        Self {
            kind,
            file_id: file_id.into(),
            file_name: sanitize_file_name(file_name.as_ref()),
            mime_type: None,
            file_size: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the file size.
    #[must_use]
    pub const fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }
}

/// Payload of an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    /// A recognized bot command.
    Command(Command),
    /// Free text.
    Text(String),
    /// A file.
    Attachment(Attachment),
}

impl MessageContent {
    /// Classify message text as a command or plain text.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_addressed_text(text, None)
    }

    /// Classify message text, accepting commands addressed to `bot_username`.
    #[must_use]
    pub fn from_addressed_text(text: impl Into<String>, bot_username: Option<&str>) -> Self {
        let text = text.into();
        Command::parse_addressed(&text, bot_username).map_or(Self::Text(text), Self::Command)
    }
}

/// An inbound message from a channel to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Channel identifier (e.g., "telegram", "cli").
    pub channel: String,
    /// Sender's identifier within the channel.
    pub sender_id: String,
    /// Sender's display name, used for logging.
    pub sender_name: Option<String>,
    /// Chat/conversation identifier.
    pub chat_id: String,
    /// Message payload.
    pub content: MessageContent,
    /// Timestamp when the message was received.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: MessageContent,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            chat_id: chat_id.into(),
            content,
            timestamp: SystemTime::now(),
        }
    }

    /// Create a text message, recognizing commands.
    pub fn text(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(channel, sender_id, chat_id, MessageContent::from_text(text))
    }

    /// Set the sender's display name.
    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Get a unique session key for this conversation.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Name to use in log lines: display name, falling back to sender id.
    #[must_use]
    pub fn sender_label(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(&self.sender_id)
    }
}

/// Quick-reply keyboard instruction attached to a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKeyboard {
    /// Leave whatever keyboard the client currently shows.
    #[default]
    Keep,
    /// Show a one-time keyboard with these rows of buttons.
    Show(Vec<Vec<String>>),
    /// Remove a previously shown keyboard.
    Remove,
}

/// An outbound reply from the controller to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel identifier.
    pub channel: String,
    /// Target chat/conversation identifier.
    pub chat_id: String,
    /// Plain text content.
    pub content: String,
    /// Keyboard instruction.
    #[serde(default)]
    pub keyboard: ReplyKeyboard,
}

impl OutboundMessage {
    /// Create a response to an inbound message.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self {
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
            content: content.into(),
            keyboard: ReplyKeyboard::Keep,
        }
    }

    /// Set the keyboard instruction.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = keyboard;
        self
    }
}
