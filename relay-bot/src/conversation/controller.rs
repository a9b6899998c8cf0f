//! Conversation controller: routes each inbound message to the handler for
//! its session's state and produces the reply.

use super::fetch::AttachmentFetcher;
use crate::error::{BotError, ErrorContext, Result};
use crate::events::{
    Attachment, AttachmentKind, Command, InboundMessage, MessageContent, OutboundMessage,
    ReplyKeyboard,
};
use crate::session::{Session, SessionManager, State};
use crate::storage::{BackendKind, BackendRegistry};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// User-facing reply texts.
pub mod replies {
    use crate::storage::BackendKind;

    /// Prompt shown after `/start`.
    pub const CHOOSE_BACKEND: &str = "Choose a storage service.\nSend /cancel to stop.";
    /// Reply to `/cancel`.
    pub const FINISHED: &str = "Finished.";
    /// Photo rejection.
    pub const PHOTO_REJECTED: &str = "Compressed images are not accepted. \
        Please send the image as a file (document) so it is uploaded without quality loss.";
    /// Attachment kind outside the accepted set.
    pub const UNSUPPORTED: &str = "Unsupported file type. Please send a document or a video.";
    /// Reply when handling failed unexpectedly.
    pub const GENERIC_ERROR: &str =
        "Sorry, I encountered an error while processing your message. Please try again.";

    /// Reply to an unrecognized backend choice.
    #[must_use]
    pub fn choose_again() -> String {
        format!(
            "Please choose one of the listed storage services: {}.\nSend /cancel to stop.",
            BackendKind::labels().join(", ")
        )
    }

    /// Confirmation after a backend was chosen.
    #[must_use]
    pub fn backend_selected(kind: BackendKind) -> String {
        format!("I will upload files that you send me to {kind}. I'm ready to receive files.")
    }

    /// Reminder for non-file input while waiting for files.
    #[must_use]
    pub fn send_a_file(kind: BackendKind) -> String {
        format!("Send me a document or a video to upload to {kind}, or /cancel to stop.")
    }

    /// Upload confirmed.
    #[must_use]
    pub fn uploaded(file_name: &str, kind: BackendKind) -> String {
        format!("File received. {file_name} was uploaded to {kind}.")
    }

    /// Upload failed.
    #[must_use]
    pub fn upload_failed(file_name: &str, kind: BackendKind) -> String {
        format!("File received, but uploading {file_name} to {kind} failed. Please try again.")
    }
}

/// Drives every chat's conversation.
#[derive(Debug)]
pub struct Controller {
    sessions: SessionManager,
    backends: BackendRegistry,
    staging_dir: PathBuf,
}

impl Controller {
    /// Create a controller that stages downloads under `staging_dir`.
    pub fn new(backends: BackendRegistry, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions: SessionManager::new(),
            backends,
            staging_dir: staging_dir.into(),
        }
    }

    /// Live sessions.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one message and always produce a usable outcome.
    ///
    /// Failures are logged together with the message and answered with a
    /// generic error reply; the session state is left as it was so the user
    /// can retry.
    pub async fn dispatch(
        &self,
        msg: &InboundMessage,
        fetcher: &dyn AttachmentFetcher,
    ) -> Option<OutboundMessage> {
        match self.handle(msg, fetcher).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(message = ?msg, error = %e, "failed to handle message");
                Some(OutboundMessage::reply_to(msg, replies::GENERIC_ERROR))
            }
        }
    }

    /// Handle one message. `Ok(None)` means the message is ignored.
    pub async fn handle(
        &self,
        msg: &InboundMessage,
        fetcher: &dyn AttachmentFetcher,
    ) -> Result<Option<OutboundMessage>> {
        let key = msg.session_key();

        if matches!(msg.content, MessageContent::Command(Command::Cancel)) {
            return Ok(Some(self.cancel(msg, &key).await));
        }

        let Some(handle) = self.sessions.get(&key).await else {
            if matches!(msg.content, MessageContent::Command(Command::Start)) {
                return Ok(Some(self.start(msg, &key).await));
            }
            debug!(key = %key, "no conversation; message ignored");
            return Ok(None);
        };

        let mut session = handle.lock().await;
        match session.state() {
            State::AwaitingBackendChoice => Ok(Some(Self::on_backend_choice(msg, &mut session))),
            State::AwaitingFile => self.on_file(msg, &session, fetcher).await.map(Some),
            // Cancelled while this message waited for the lock.
            State::Terminated => Ok(None),
        }
    }

    async fn start(&self, msg: &InboundMessage, key: &str) -> OutboundMessage {
        self.sessions.create(key).await;
        info!(user = %msg.sender_label(), "conversation started with /start");
        choice_prompt(msg, replies::CHOOSE_BACKEND)
    }

    async fn cancel(&self, msg: &InboundMessage, key: &str) -> OutboundMessage {
        if let Some(handle) = self.sessions.get(key).await {
            // Waits for an in-flight upload on this chat to finish.
            handle.lock().await.terminate();
            self.sessions.remove(key).await;
        }
        info!(user = %msg.sender_label(), "conversation canceled");
        OutboundMessage::reply_to(msg, replies::FINISHED).with_keyboard(ReplyKeyboard::Remove)
    }

    fn on_backend_choice(msg: &InboundMessage, session: &mut Session) -> OutboundMessage {
        let chosen = match &msg.content {
            MessageContent::Text(text) => BackendKind::from_label(text),
            _ => None,
        };

        let Some(kind) = chosen else {
            return choice_prompt(msg, &replies::choose_again());
        };

        session.select_backend(kind);
        info!(user = %msg.sender_label(), backend = %kind, "storage service selected");
        OutboundMessage::reply_to(msg, replies::backend_selected(kind))
            .with_keyboard(ReplyKeyboard::Remove)
    }

    async fn on_file(
        &self,
        msg: &InboundMessage,
        session: &Session,
        fetcher: &dyn AttachmentFetcher,
    ) -> Result<OutboundMessage> {
        let kind = session
            .backend()
            .ok_or_else(|| BotError::internal("awaiting files without a selected backend"))?;

        let text = match &msg.content {
            MessageContent::Attachment(attachment) if attachment.kind.is_uploadable() => {
                self.relay(msg, attachment, kind, fetcher).await?
            }
            MessageContent::Attachment(attachment) if attachment.kind == AttachmentKind::Photo => {
                info!(user = %msg.sender_label(), "compressed photo rejected");
                replies::PHOTO_REJECTED.to_string()
            }
            MessageContent::Attachment(attachment) => {
                warn!(
                    kind = %attachment.kind,
                    mime = ?attachment.mime_type,
                    "unsupported attachment type; review message filters"
                );
                replies::UNSUPPORTED.to_string()
            }
            MessageContent::Text(_) | MessageContent::Command(_) => replies::send_a_file(kind),
        };

        Ok(OutboundMessage::reply_to(msg, text))
    }

    /// Download an attachment into its own staging directory, upload it,
    /// and clean up.
    async fn relay(
        &self,
        msg: &InboundMessage,
        attachment: &Attachment,
        kind: BackendKind,
        fetcher: &dyn AttachmentFetcher,
    ) -> Result<String> {
        let staging = self.staging_dir.join(&msg.id);
        tokio::fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("creating staging dir {}", staging.display()))?;

        let local_path = staging.join(&attachment.file_name);
        let outcome = self
            .fetch_and_upload(msg, attachment, &local_path, kind, fetcher)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!(path = %staging.display(), error = %e, "failed to clean up staged file");
        }
        outcome
    }

    async fn fetch_and_upload(
        &self,
        msg: &InboundMessage,
        attachment: &Attachment,
        local_path: &Path,
        kind: BackendKind,
        fetcher: &dyn AttachmentFetcher,
    ) -> Result<String> {
        fetcher
            .fetch(attachment, local_path)
            .await
            .with_context(|| format!("downloading {}", attachment.file_name))?;
        info!(
            user = %msg.sender_label(),
            file = %attachment.file_name,
            kind = %attachment.kind,
            size = ?attachment.file_size,
            "file received"
        );

        let uploaded = match self.backends.get(kind).await {
            Ok(backend) => backend.upload(local_path, None).await,
            Err(e) => {
                error!(backend = %kind, error = %e, "storage backend unavailable");
                false
            }
        };

        Ok(if uploaded {
            replies::uploaded(&attachment.file_name, kind)
        } else {
            replies::upload_failed(&attachment.file_name, kind)
        })
    }
}

fn choice_prompt(msg: &InboundMessage, text: &str) -> OutboundMessage {
    let row: Vec<String> = BackendKind::labels().into_iter().map(String::from).collect();
    OutboundMessage::reply_to(msg, text).with_keyboard(ReplyKeyboard::Show(vec![row]))
}
