//! Attachment retrieval.

use crate::error::{ChannelError, ChannelResult};
use crate::events::Attachment;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Downloads attachment bytes to a local file.
///
/// Each channel provides its own implementation; the controller only knows
/// the attachment handle and where the bytes should land.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Write the attachment's content to `dest`.
    async fn fetch(&self, attachment: &Attachment, dest: &Path) -> ChannelResult<()>;
}

/// Fetcher for attachments whose `file_id` is a local path.
///
/// Used by the CLI channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileFetcher;

#[async_trait]
impl AttachmentFetcher for LocalFileFetcher {
    async fn fetch(&self, attachment: &Attachment, dest: &Path) -> ChannelResult<()> {
        let source = PathBuf::from(&attachment.file_id);
        tokio::fs::copy(&source, dest).await.map_err(|e| {
            ChannelError::download(format!("cannot copy {}: {e}", source.display()))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AttachmentKind;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn test_local_fetch_copies_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.child("notes.txt");
        source.write_str("hello").unwrap();

        let attachment = Attachment::new(
            AttachmentKind::Document,
            source.path().to_string_lossy(),
            "notes.txt",
        );
        let dest = dir.path().join("copy.txt");
        LocalFileFetcher.fetch(&attachment, &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_local_fetch_missing_source() {
        let dir = TempDir::new().unwrap();
        let attachment = Attachment::new(AttachmentKind::Video, "/does/not/exist.mp4", "exist.mp4");
        let result = LocalFileFetcher
            .fetch(&attachment, &dir.path().join("out.mp4"))
            .await;
        assert!(matches!(result, Err(ChannelError::DownloadFailed(_))));
    }
}
