//! Command-line interface channel implementation.
//!
//! Drives the same conversation as Telegram from stdin. Lines are read as
//! chat messages; attachments are simulated with a path:
//!
//! ```text
//! /start
//! S3
//! /document ./report.pdf
//! /photo ./cat.jpg
//! /cancel
//! ```

use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::conversation::{Controller, LocalFileFetcher};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{
    Attachment, AttachmentKind, InboundMessage, MessageContent, OutboundMessage, ReplyKeyboard,
};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt string to display before user input.
    pub prompt: String,
    /// Chat identifier for this CLI session.
    pub session_id: String,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            session_id: "local".to_string(),
        }
    }
}

impl CliChannelConfig {
    /// Create a new CLI channel config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the session ID.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }
}

/// One line of user input.
#[derive(Debug)]
enum CliInput {
    /// Leave the session.
    Exit,
    /// Nothing to send.
    Empty,
    /// Message content to hand to the controller.
    Message(MessageContent),
}

/// Command-line interface channel.
#[derive(Debug)]
pub struct CliChannel {
    base: ChannelBase,
    config: CliChannelConfig,
}

impl CliChannel {
    /// Create a new CLI channel with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliChannelConfig::default())
    }

    /// Create a new CLI channel with the given configuration.
    #[must_use]
    pub fn with_config(config: CliChannelConfig) -> Self {
        Self {
            base: ChannelBase::new("cli"),
            config,
        }
    }

    /// Parse one input line.
    ///
    /// `/document`, `/video`, `/photo`, `/audio`, `/voice` and `/sticker`
    /// take a local path and become attachments; everything else is
    /// classified like chat text.
    fn parse_line(line: &str) -> CliInput {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return CliInput::Empty;
        }
        if matches!(trimmed, "exit" | "quit" | "/quit") {
            return CliInput::Exit;
        }

        let (word, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
        let kind = match word {
            "/document" => AttachmentKind::Document,
            "/video" => AttachmentKind::Video,
            "/photo" => AttachmentKind::Photo,
            "/audio" | "/voice" | "/sticker" => {
                AttachmentKind::Other(word.trim_start_matches('/').to_string())
            }
            _ => return CliInput::Message(MessageContent::from_text(trimmed)),
        };

        let path = rest.trim();
        if path.is_empty() {
            return CliInput::Message(MessageContent::from_text(trimmed));
        }
        let name = Path::new(path)
            .file_name()
            .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
        let mut attachment = Attachment::new(kind, path, name);
        if let Some(mime) = mime_guess::from_path(path).first() {
            attachment = attachment.with_mime_type(mime.essence_str());
        }
        CliInput::Message(MessageContent::Attachment(attachment))
    }

    /// Render a reply the way a chat client would show it.
    fn render(msg: &OutboundMessage) -> String {
        match &msg.keyboard {
            ReplyKeyboard::Show(rows) => {
                let buttons = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|label| format!("[{label}]"))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}\n{buttons}", msg.content)
            }
            ReplyKeyboard::Keep | ReplyKeyboard::Remove => msg.content.clone(),
        }
    }

    #[allow(clippy::print_stdout)] // CLI channel intentionally prints to stdout
    fn print_prompt(&self) {
        print!("{}", self.config.prompt);
        let _ = std::io::stdout().flush();
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn run(&self, controller: Arc<Controller>) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Running).await;
        info!(session = %self.config.session_id, "CLI channel started");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.print_prompt();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?
        {
            let content = match Self::parse_line(&line) {
                CliInput::Exit => break,
                CliInput::Empty => {
                    self.print_prompt();
                    continue;
                }
                CliInput::Message(content) => content,
            };

            let msg = InboundMessage::new("cli", "user", &self.config.session_id, content)
                .with_sender_name("local user");
            self.base.record_received().await;

            if let Some(reply) = controller.dispatch(&msg, &LocalFileFetcher).await {
                self.send(&reply).await?;
            }
            self.print_prompt();
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("CLI channel stopped");
        Ok(())
    }

    #[allow(clippy::print_stdout)] // CLI channel intentionally prints to stdout
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        println!("\n{}\n", Self::render(msg));
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Command;

    #[test]
    fn test_parse_commands_and_text() {
        assert!(matches!(CliChannel::parse_line("   "), CliInput::Empty));
        assert!(matches!(CliChannel::parse_line("quit"), CliInput::Exit));
        assert!(matches!(
            CliChannel::parse_line("/start"),
            CliInput::Message(MessageContent::Command(Command::Start))
        ));
        assert!(matches!(
            CliChannel::parse_line("Google Drive"),
            CliInput::Message(MessageContent::Text(ref t)) if t == "Google Drive"
        ));
    }

    #[test]
    fn test_parse_attachments() {
        let CliInput::Message(MessageContent::Attachment(doc)) =
            CliChannel::parse_line("/document ./docs/report.pdf")
        else {
            panic!("expected attachment");
        };
        assert_eq!(doc.kind, AttachmentKind::Document);
        assert_eq!(doc.file_id, "./docs/report.pdf");
        assert_eq!(doc.file_name, "report.pdf");
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));

        let CliInput::Message(MessageContent::Attachment(voice)) =
            CliChannel::parse_line("/voice note.ogg")
        else {
            panic!("expected attachment");
        };
        assert_eq!(voice.kind, AttachmentKind::Other("voice".to_string()));

        // Without a path the line is plain text.
        assert!(matches!(
            CliChannel::parse_line("/photo"),
            CliInput::Message(MessageContent::Text(_))
        ));
    }

    #[test]
    fn test_render_keyboard() {
        let inbound = InboundMessage::text("cli", "user", "local", "/start");
        let reply = OutboundMessage::reply_to(&inbound, "Choose a storage service.")
            .with_keyboard(ReplyKeyboard::Show(vec![vec![
                "S3".to_string(),
                "Google Drive".to_string(),
            ]]));

        assert_eq!(
            CliChannel::render(&reply),
            "Choose a storage service.\n[S3] [Google Drive]"
        );
    }

    #[tokio::test]
    async fn test_send_counts_messages() {
        let channel = CliChannel::with_config(CliChannelConfig::new().session_id("test"));
        let inbound = InboundMessage::text("cli", "user", "test", "/cancel");
        channel
            .send(&OutboundMessage::reply_to(&inbound, "Finished."))
            .await
            .unwrap();

        let status = channel.status().await;
        assert_eq!(status.messages_sent, 1);
        assert_eq!(status.state, ChannelState::Stopped);
    }
}
