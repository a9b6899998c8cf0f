//! Storage backend trait and common types.

use super::BackendKind;
use crate::error::UploadResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to read.
    pub local_path: PathBuf,
    /// Name of the object at the destination.
    pub remote_name: String,
}

impl UploadRequest {
    /// Build a request; `remote_name` defaults to the local file's base name.
    pub fn new(local_path: impl Into<PathBuf>, remote_name: Option<&str>) -> Self {
        let local_path = local_path.into();
        let remote_name = remote_name.map_or_else(|| default_remote_name(&local_path), String::from);
        Self {
            local_path,
            remote_name,
        }
    }
}

fn default_remote_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Provider confirmation of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Provider identifier of the stored object (S3 key, Drive file id).
    pub remote_id: String,
    /// Human-readable location, e.g. `s3://bucket/key`.
    pub location: String,
}

/// Trait for storage backends.
///
/// Construction only captures settings. [`init`](Self::init) loads
/// credentials and builds the provider client; it runs once before the
/// first upload.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Load credentials and build the client handle.
    async fn init(&self) -> UploadResult<()>;

    /// Upload one file and return the provider's confirmation.
    async fn put(&self, request: &UploadRequest) -> UploadResult<UploadReceipt>;

    /// Upload a file, logging any failure instead of returning it.
    ///
    /// Returns `true` only when the provider confirmed the file.
    async fn upload(&self, local_path: &Path, remote_name: Option<&str>) -> bool {
        let request = UploadRequest::new(local_path, remote_name);
        match self.put(&request).await {
            Ok(receipt) => {
                info!(
                    backend = %self.kind(),
                    file = %request.local_path.display(),
                    location = %receipt.location,
                    "uploaded successfully"
                );
                true
            }
            Err(e) => {
                error!(
                    backend = %self.kind(),
                    file = %request.local_path.display(),
                    error = %e,
                    "failed to upload"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;

    #[test]
    fn test_remote_name_defaults_to_base_name() {
        let request = UploadRequest::new("/tmp/staging/abc/report.pdf", None);
        assert_eq!(request.remote_name, "report.pdf");

        let request = UploadRequest::new("clip.mp4", Some("videos/clip.mp4"));
        assert_eq!(request.remote_name, "videos/clip.mp4");
    }

    struct Flaky(bool);

    #[async_trait]
    impl StorageBackend for Flaky {
        fn kind(&self) -> BackendKind {
            BackendKind::ObjectStorage
        }

        async fn init(&self) -> UploadResult<()> {
            Ok(())
        }

        async fn put(&self, request: &UploadRequest) -> UploadResult<UploadReceipt> {
            if self.0 {
                Ok(UploadReceipt {
                    remote_id: request.remote_name.clone(),
                    location: format!("mem://{}", request.remote_name),
                })
            } else {
                Err(UploadError::provider("access denied"))
            }
        }
    }

    #[tokio::test]
    async fn test_upload_maps_result_to_bool() {
        assert!(Flaky(true).upload(Path::new("a.txt"), None).await);
        assert!(!Flaky(false).upload(Path::new("a.txt"), None).await);
    }
}
