//! Google Drive backend.
//!
//! Uploads use the Drive v3 resumable protocol: a metadata POST opens an
//! upload session, then the file bytes are PUT to the session URI.

use super::BackendKind;
use super::provider::{StorageBackend, UploadReceipt, UploadRequest};
use super::token::{OAuthToken, TokenStatus};
use crate::error::{UploadError, UploadResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Drive v3 upload endpoint.
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Limit for token refresh and session requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Limit for sending the file body.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Google Drive settings.
#[derive(Debug, Clone)]
pub struct DriveSettings {
    /// Path of the persisted OAuth token file.
    pub token_path: PathBuf,
    /// Parent folder for uploaded files; Drive root when `None`.
    pub folder_id: Option<String>,
    /// Upload endpoint, overridable for tests and proxies.
    pub upload_url: String,
    /// Timeout for token refresh and session requests.
    pub request_timeout: Duration,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            token_path: crate::util::home_dir().join("token.json"),
            folder_id: None,
            upload_url: DRIVE_UPLOAD_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Drive file resource, as much of it as the upload needs.
#[derive(Debug, Deserialize)]
struct DriveFile {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Google Drive backend.
#[derive(Debug)]
pub struct DriveBackend {
    settings: DriveSettings,
    http: reqwest::Client,
    token: RwLock<Option<OAuthToken>>,
}

impl DriveBackend {
    /// Create a backend; call [`StorageBackend::init`] before uploading.
    #[must_use]
    pub fn new(settings: DriveSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            settings,
            http,
            token: RwLock::new(None),
        }
    }

    /// Return a usable access token, refreshing and persisting it first if
    /// it has expired.
    async fn access_token(&self) -> UploadResult<String> {
        let mut guard = self.token.write().await;
        let token = guard.as_mut().ok_or(UploadError::NotInitialized("gdrive"))?;

        match token.status_at(Utc::now()) {
            TokenStatus::Valid => {}
            TokenStatus::NeedsRefresh => {
                token.refresh(&self.http).await?;
                if let Err(e) = token.save(&self.settings.token_path).await {
                    warn!(
                        path = %self.settings.token_path.display(),
                        error = %e,
                        "failed to persist refreshed token"
                    );
                }
            }
            TokenStatus::Unusable => {
                return Err(UploadError::credentials(
                    "Drive token expired and has no refresh token; re-authorize",
                ));
            }
        }

        token
            .access_token()
            .map(String::from)
            .ok_or_else(|| UploadError::credentials("Drive token has no access token"))
    }

    /// Open a resumable upload session and return its URI.
    async fn open_session(
        &self,
        access_token: &str,
        request: &UploadRequest,
        content_type: &str,
        length: u64,
    ) -> UploadResult<String> {
        let mut metadata = serde_json::json!({ "name": request.remote_name });
        if let Some(folder) = &self.settings.folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        let response = self
            .http
            .post(format!("{}?uploadType=resumable", self.settings.upload_url))
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", length.to_string())
            .json(&metadata)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(UploadError::provider(format!(
                "opening upload session failed: HTTP {status}: {body}"
            )));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .ok_or_else(|| UploadError::provider("upload session response has no Location"))
    }
}

#[async_trait]
impl StorageBackend for DriveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FileHosting
    }

    async fn init(&self) -> UploadResult<()> {
        let token = OAuthToken::load(&self.settings.token_path).await?;
        *self.token.write().await = Some(token);
        // Refresh now so a dead token is reported at init, not mid-upload.
        self.access_token().await?;
        debug!(path = %self.settings.token_path.display(), "drive credentials ready");
        Ok(())
    }

    async fn put(&self, request: &UploadRequest) -> UploadResult<UploadReceipt> {
        let access_token = self.access_token().await?;

        let file = tokio::fs::File::open(&request.local_path).await?;
        let length = file.metadata().await?.len();
        let content_type = mime_guess::from_path(&request.local_path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let session_uri = self
            .open_session(&access_token, request, &content_type, length)
            .await?;
        debug!(file = %request.remote_name, "drive upload session opened");

        let response = self
            .http
            .put(&session_uri)
            .timeout(UPLOAD_TIMEOUT)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .body(reqwest::Body::from(file))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(UploadError::provider(format!(
                "upload failed: HTTP {status}: {body}"
            )));
        }

        let file: DriveFile = response.json().await?;
        if file.id.is_empty() {
            return Err(UploadError::provider("Drive returned no file id"));
        }

        info!(id = %file.id, name = ?file.name, "drive file created");
        Ok(UploadReceipt {
            location: format!("gdrive://{}", file.id),
            remote_id: file.id,
        })
    }
}
