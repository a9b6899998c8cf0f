//! Storage backends that received files are forwarded to.
//!
//! - [`S3Backend`] - Amazon S3 (or any S3-compatible object store)
//! - [`DriveBackend`] - Google Drive, authenticated with a persisted OAuth token
//!
//! [`build_backend`] maps a user-facing name to a backend instance and
//! [`BackendRegistry`] keeps one initialized instance per kind.

mod gdrive;
mod provider;
mod s3;
mod token;

pub use gdrive::{DriveBackend, DriveSettings};
pub use provider::{StorageBackend, UploadReceipt, UploadRequest};
pub use s3::{S3Backend, S3Settings};
pub use token::{OAuthToken, TokenStatus};

use crate::error::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// The kinds of storage a user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Object storage (Amazon S3).
    ObjectStorage,
    /// File hosting (Google Drive).
    FileHosting,
}

impl BackendKind {
    /// Every kind, in the order offered to the user.
    pub const ALL: [Self; 2] = [Self::ObjectStorage, Self::FileHosting];

    /// Label shown on the choice keyboard.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ObjectStorage => "S3",
            Self::FileHosting => "Google Drive",
        }
    }

    /// Short machine name used by the factory and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ObjectStorage => "s3",
            Self::FileHosting => "gdrive",
        }
    }

    /// Match a keyboard label exactly (case-sensitive).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Match a backend name case-insensitively.
    ///
    /// Accepts the short name (`s3`, `gdrive`) or the label (`Google Drive`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.name().eq_ignore_ascii_case(name) || kind.label().eq_ignore_ascii_case(name)
        })
    }

    /// Labels of all kinds, for prompts.
    #[must_use]
    pub fn labels() -> Vec<&'static str> {
        Self::ALL.into_iter().map(Self::label).collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Settings for every backend the factory can build.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    /// S3 settings.
    pub s3: S3Settings,
    /// Google Drive settings.
    pub drive: DriveSettings,
}

/// Build a backend from a case-insensitive name.
///
/// Returns `None` for names that match no backend; callers treat that as
/// "cannot upload". The returned backend still needs [`StorageBackend::init`].
#[must_use]
pub fn build_backend(name: &str, settings: &BackendSettings) -> Option<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match BackendKind::from_name(name)? {
        BackendKind::ObjectStorage => Arc::new(S3Backend::new(settings.s3.clone())),
        BackendKind::FileHosting => Arc::new(DriveBackend::new(settings.drive.clone())),
    };
    debug!(name = %name, backend = %backend.kind(), "built storage backend");
    Some(backend)
}

/// Initialized backends, one per kind.
///
/// A backend is built and initialized on first use. A failed
/// initialization is not cached, so fixing credentials takes effect on the
/// next upload without a restart. Each kind initializes independently: a
/// slow Drive token refresh never delays an S3 lookup.
pub struct BackendRegistry {
    settings: BackendSettings,
    ready: HashMap<BackendKind, OnceCell<Arc<dyn StorageBackend>>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BackendRegistry {
    /// Create a registry that builds backends from the given settings.
    #[must_use]
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            ready: BackendKind::ALL
                .into_iter()
                .map(|kind| (kind, OnceCell::new()))
                .collect(),
        }
    }

    /// Register an already-initialized backend for its kind.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.ready
            .insert(backend.kind(), OnceCell::new_with(Some(backend)));
        self
    }

    /// Get the initialized backend for a kind, building it if needed.
    pub async fn get(&self, kind: BackendKind) -> UploadResult<Arc<dyn StorageBackend>> {
        let cell = self
            .ready
            .get(&kind)
            .ok_or_else(|| UploadError::UnknownBackend(kind.name().to_string()))?;

        let backend = cell
            .get_or_try_init(|| async {
                let backend = build_backend(kind.name(), &self.settings)
                    .ok_or_else(|| UploadError::UnknownBackend(kind.name().to_string()))?;
                backend.init().await?;
                info!(backend = %kind, "storage backend ready");
                Ok::<_, UploadError>(backend)
            })
            .await?;
        Ok(Arc::clone(backend))
    }
}
