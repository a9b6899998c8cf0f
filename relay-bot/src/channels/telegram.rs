//! Telegram channel implementation using teloxide.
//!
//! Every message from an allowed user is converted into an
//! [`InboundMessage`], handled by the [`Controller`], and answered in the
//! same chat. Attachment bytes are pulled through the Bot API only when the
//! controller decides to relay them.
//!
//! # Setup
//!
//! 1. Create a bot via [@BotFather](https://t.me/botfather)
//! 2. Put the token in `BOT_TOKEN`
//! 3. Optionally restrict access with `RELAY_ALLOWED_USERS`

use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::conversation::{AttachmentFetcher, Controller};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{
    Attachment, AttachmentKind, InboundMessage, MessageContent, OutboundMessage, ReplyKeyboard,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileMeta, KeyboardButton, KeyboardMarkup, KeyboardRemove};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Channel name used in session keys.
const CHANNEL_NAME: &str = "telegram";

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Allowed user IDs. Empty means allow all.
    pub allowed_users: Vec<i64>,
}

impl TelegramChannelConfig {
    /// Create a new Telegram channel config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            allowed_users: Vec::new(),
        }
    }

    /// Add multiple allowed user IDs.
    #[must_use]
    pub fn allow_users(mut self, user_ids: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_users.extend(user_ids);
        self
    }

    /// Check if a user is allowed.
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

/// Telegram channel implementation.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    config: Arc<TelegramChannelConfig>,
    bot: Bot,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("allowed_users", &self.config.allowed_users)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a new Telegram channel with the given configuration.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        let bot = Bot::new(&config.token);
        Self {
            base: Arc::new(ChannelBase::new(CHANNEL_NAME)),
            config: Arc::new(config),
            bot,
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn run(&self, controller: Arc<Controller>) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let me = match self.bot.get_me().await {
            Ok(me) => me,
            Err(e) => {
                self.base.set_state(ChannelState::Error).await;
                self.base.record_error(e.to_string()).await;
                return Err(ChannelError::start(e.to_string()));
            }
        };

        let base = Arc::clone(&self.base);
        let config = Arc::clone(&self.config);
        let username: Arc<Option<String>> = Arc::new(me.user.username.clone());

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let controller = Arc::clone(&controller);
            let base = Arc::clone(&base);
            let config = Arc::clone(&config);
            let username = Arc::clone(&username);

            async move {
                let client = TelegramClient {
                    bot: &bot,
                    username: username.as_deref(),
                };
                handle_message(client, &msg, &config, &controller, &base).await;
                Ok::<(), teloxide::RequestError>(())
            }
        });

        self.base.set_state(ChannelState::Running).await;
        info!(bot = ?me.user.username, "Telegram channel started");

        // Updates for one chat are delivered in order; different chats run
        // concurrently.
        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        self.base.set_state(ChannelState::Stopped).await;
        info!("Telegram channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        send_reply(&self.bot, msg).await?;
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

/// The bot handle plus its own username, for matching addressed commands.
#[derive(Debug, Clone, Copy)]
struct TelegramClient<'a> {
    bot: &'a Bot,
    username: Option<&'a str>,
}

async fn handle_message(
    client: TelegramClient<'_>,
    msg: &Message,
    config: &TelegramChannelConfig,
    controller: &Controller,
    base: &ChannelBase,
) {
    #[allow(clippy::cast_possible_wrap)] // User ID won't exceed i64 max
    let user_id = msg.from.as_ref().map_or(0, |u| u.id.0 as i64);
    if !config.is_user_allowed(user_id) {
        debug!(user_id, chat_id = msg.chat.id.0, "message from unauthorized user");
        return;
    }

    let Some(inbound) = inbound_from_message(msg, client.username) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without content");
        return;
    };
    base.record_received().await;

    let fetcher = TelegramFetcher {
        bot: client.bot.clone(),
    };
    let Some(reply) = controller.dispatch(&inbound, &fetcher).await else {
        return;
    };

    match send_reply(client.bot, &reply).await {
        Ok(()) => base.record_sent().await,
        Err(e) => base.record_error(e.to_string()).await,
    }
}

/// Convert a Telegram message into the controller's view of it.
///
/// Returns `None` for messages that carry neither text nor media (service
/// messages such as a member joining). Commands addressed to another bot
/// are classified as text.
fn inbound_from_message(msg: &Message, bot_username: Option<&str>) -> Option<InboundMessage> {
    let content = if let Some(other) = other_media_kind(msg) {
        MessageContent::Attachment(Attachment::new(
            AttachmentKind::Other(other.to_string()),
            String::new(),
            other,
        ))
    } else if let Some(doc) = msg.document() {
        let mime = doc.mime_type.as_ref().map(ToString::to_string);
        MessageContent::Attachment(file_attachment(
            AttachmentKind::Document,
            &doc.file,
            doc.file_name.as_deref(),
            mime,
        ))
    } else if let Some(video) = msg.video() {
        let mime = video.mime_type.as_ref().map(ToString::to_string);
        MessageContent::Attachment(file_attachment(
            AttachmentKind::Video,
            &video.file,
            video.file_name.as_deref(),
            mime,
        ))
    } else if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        // Sizes are ordered smallest first.
        MessageContent::Attachment(file_attachment(AttachmentKind::Photo, &photo.file, None, None))
    } else {
        MessageContent::from_addressed_text(msg.text()?, bot_username)
    };

    let mut inbound = InboundMessage::new(
        CHANNEL_NAME,
        msg.from
            .as_ref()
            .map_or_else(String::new, |u| u.id.0.to_string()),
        msg.chat.id.0.to_string(),
        content,
    );
    if let Some(user) = &msg.from {
        inbound = inbound.with_sender_name(user.first_name.clone());
    }
    Some(inbound)
}

/// Media kinds that are never relayed.
fn other_media_kind(msg: &Message) -> Option<&'static str> {
    if msg.animation().is_some() {
        Some("animation")
    } else if msg.audio().is_some() {
        Some("audio")
    } else if msg.voice().is_some() {
        Some("voice")
    } else if msg.sticker().is_some() {
        Some("sticker")
    } else if msg.video_note().is_some() {
        Some("video_note")
    } else {
        None
    }
}

fn file_attachment(
    kind: AttachmentKind,
    file: &FileMeta,
    file_name: Option<&str>,
    mime_type: Option<String>,
) -> Attachment {
    let name = file_name.filter(|name| !name.trim().is_empty()).map_or_else(
        || fallback_file_name(&file.unique_id, &kind, mime_type.as_deref()),
        str::to_string,
    );

    let mut attachment =
        Attachment::new(kind, file.id.clone(), name).with_file_size(u64::from(file.size));
    if let Some(mime) = mime_type {
        attachment = attachment.with_mime_type(mime);
    }
    attachment
}

/// Name for a file Telegram sent without one: its unique id plus an
/// extension derived from the MIME type or the attachment kind.
fn fallback_file_name(unique_id: &str, kind: &AttachmentKind, mime_type: Option<&str>) -> String {
    let from_mime = match kind {
        // Telegram re-encodes photos as JPEG.
        AttachmentKind::Photo => None,
        _ => mime_type
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|exts| exts.first().copied()),
    };
    let ext = from_mime.unwrap_or(match kind {
        AttachmentKind::Photo => "jpg",
        AttachmentKind::Video => "mp4",
        AttachmentKind::Document | AttachmentKind::Other(_) => "bin",
    });
    format!("{unique_id}.{ext}")
}

/// Build a one-time reply keyboard for a set of button rows.
fn keyboard_markup(rows: &[Vec<String>]) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>()),
    )
    .one_time_keyboard()
    .resize_keyboard()
}

async fn send_reply(bot: &Bot, msg: &OutboundMessage) -> ChannelResult<()> {
    let chat_id: i64 = msg
        .chat_id
        .parse()
        .map_err(|_| ChannelError::send(format!("invalid chat ID: {}", msg.chat_id)))?;

    let request = bot.send_message(ChatId(chat_id), &msg.content);
    let result = match &msg.keyboard {
        ReplyKeyboard::Keep => request.await,
        ReplyKeyboard::Show(rows) => request.reply_markup(keyboard_markup(rows)).await,
        ReplyKeyboard::Remove => request.reply_markup(KeyboardRemove::new()).await,
    };

    result.map_err(|e| ChannelError::send(e.to_string()))?;
    Ok(())
}

/// Downloads attachments through the Bot API.
struct TelegramFetcher {
    bot: Bot,
}

#[async_trait]
impl AttachmentFetcher for TelegramFetcher {
    async fn fetch(&self, attachment: &Attachment, dest: &Path) -> ChannelResult<()> {
        let file = self
            .bot
            .get_file(attachment.file_id.clone())
            .await
            .map_err(|e| ChannelError::download(e.to_string()))?;

        let mut out = tokio::fs::File::create(dest).await?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| ChannelError::download(e.to_string()))?;
        out.flush().await?;

        if file.meta.size == 0 {
            warn!(file = %attachment.file_name, "Telegram reported an empty file");
        }
        debug!(file = %attachment.file_name, path = %dest.display(), "attachment downloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Command;

    /// Build a private-chat message from Bot API JSON plus `fields`.
    fn message(fields: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": 1001, "type": "private", "first_name": "Ada" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), fields.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(json).unwrap()
    }

    fn attachment_of(msg: &Message) -> Attachment {
        match inbound_from_message(msg, Some("relay_bot")).map(|m| m.content) {
            Some(MessageContent::Attachment(attachment)) => attachment,
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_document_message() {
        let msg = message(serde_json::json!({
            "document": {
                "file_id": "BQACAgIAAxkBAAIB",
                "file_unique_id": "AgADxw8AAk",
                "file_size": 2048,
                "file_name": "report.pdf",
                "mime_type": "application/pdf"
            }
        }));

        let inbound = inbound_from_message(&msg, None).unwrap();
        assert_eq!(inbound.session_key(), "telegram:1001");
        assert_eq!(inbound.sender_id, "42");
        assert_eq!(inbound.sender_label(), "Ada");

        let doc = attachment_of(&msg);
        assert_eq!(doc.kind, AttachmentKind::Document);
        assert_eq!(doc.file_id, "BQACAgIAAxkBAAIB");
        assert_eq!(doc.file_name, "report.pdf");
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.file_size, Some(2048));
    }

    #[test]
    fn test_video_without_name_gets_fallback() {
        let msg = message(serde_json::json!({
            "video": {
                "file_id": "BAACAgIAAxkBAAIC",
                "file_unique_id": "AgADyA8AAk",
                "file_size": 4096,
                "width": 1280,
                "height": 720,
                "duration": 3,
                "mime_type": "video/mp4"
            }
        }));

        let video = attachment_of(&msg);
        assert_eq!(video.kind, AttachmentKind::Video);
        assert_eq!(video.file_name, "AgADyA8AAk.mp4");
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let msg = message(serde_json::json!({
            "photo": [
                { "file_id": "small", "file_unique_id": "u-small", "file_size": 900, "width": 90, "height": 90 },
                { "file_id": "large", "file_unique_id": "u-large", "file_size": 90_000, "width": 1280, "height": 1280 }
            ]
        }));

        let photo = attachment_of(&msg);
        assert_eq!(photo.kind, AttachmentKind::Photo);
        assert_eq!(photo.file_id, "large");
        assert_eq!(photo.file_name, "u-large.jpg");
    }

    #[test]
    fn test_other_media_is_unsupported() {
        let voice = message(serde_json::json!({
            "voice": {
                "file_id": "AwACAgIAAxkBAAID",
                "file_unique_id": "AgADyQ8AAk",
                "file_size": 512,
                "duration": 2,
                "mime_type": "audio/ogg"
            }
        }));
        assert_eq!(
            attachment_of(&voice).kind,
            AttachmentKind::Other("voice".to_string())
        );

        // Telegram sends an animation with a `document` copy; it must not be
        // relayed as a document.
        let animation = message(serde_json::json!({
            "animation": {
                "file_id": "CgACAgIAAxkBAAIE",
                "file_unique_id": "AgADyg8AAk",
                "file_size": 1024,
                "width": 320,
                "height": 240,
                "duration": 1,
                "file_name": "funny.mp4",
                "mime_type": "video/mp4"
            },
            "document": {
                "file_id": "CgACAgIAAxkBAAIE",
                "file_unique_id": "AgADyg8AAk",
                "file_size": 1024,
                "file_name": "funny.mp4",
                "mime_type": "video/mp4"
            }
        }));
        assert_eq!(
            attachment_of(&animation).kind,
            AttachmentKind::Other("animation".to_string())
        );
    }

    #[test]
    fn test_text_and_addressed_commands() {
        let text = |t: &str| {
            let msg = message(serde_json::json!({ "text": t }));
            inbound_from_message(&msg, Some("relay_bot")).map(|m| m.content)
        };

        assert!(matches!(
            text("/start@relay_bot"),
            Some(MessageContent::Command(Command::Start))
        ));
        assert!(matches!(
            text("/start@other_bot"),
            Some(MessageContent::Text(ref t)) if t == "/start@other_bot"
        ));
        assert!(matches!(
            text("Google Drive"),
            Some(MessageContent::Text(ref t)) if t == "Google Drive"
        ));
    }

    #[test]
    fn test_service_message_is_ignored() {
        let msg = message(serde_json::json!({
            "chat": { "id": -1001, "type": "group", "title": "Team" },
            "delete_chat_photo": true
        }));
        assert!(inbound_from_message(&msg, Some("relay_bot")).is_none());
    }

    #[test]
    fn test_config_allowlist() {
        let config = TelegramChannelConfig::new("token123").allow_users([12345, 777]);

        assert_eq!(config.token, "token123");
        assert!(config.is_user_allowed(12345));
        assert!(config.is_user_allowed(777));
        assert!(!config.is_user_allowed(99999));
    }

    #[test]
    fn test_empty_allowlist() {
        let config = TelegramChannelConfig::new("token");
        assert!(config.is_user_allowed(12345));
    }

    #[test]
    fn test_fallback_file_names() {
        assert_eq!(
            fallback_file_name("AgADBAAD", &AttachmentKind::Photo, None),
            "AgADBAAD.jpg"
        );
        assert_eq!(
            fallback_file_name("BAADBAAD", &AttachmentKind::Video, None),
            "BAADBAAD.mp4"
        );
        assert_eq!(
            fallback_file_name("BQADBAAD", &AttachmentKind::Document, None),
            "BQADBAAD.bin"
        );
        assert_eq!(
            fallback_file_name("BQADBAAD", &AttachmentKind::Document, Some("application/pdf")),
            "BQADBAAD.pdf"
        );
    }

    #[test]
    fn test_keyboard_markup() {
        let rows = vec![vec!["S3".to_string(), "Google Drive".to_string()]];
        let markup = keyboard_markup(&rows);

        assert!(markup.one_time_keyboard);
        assert!(markup.resize_keyboard);
        assert_eq!(markup.keyboard.len(), 1);
        let labels: Vec<_> = markup.keyboard[0].iter().map(|b| b.text.as_str()).collect();
        assert_eq!(labels, vec!["S3", "Google Drive"]);
    }
}
