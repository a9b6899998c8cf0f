//! Amazon S3 backend.

use super::BackendKind;
use super::provider::{StorageBackend, UploadReceipt, UploadRequest};
use crate::error::{UploadError, UploadResult};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::sync::OnceLock;
use tracing::debug;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static S3 credentials and target bucket.
#[derive(Clone, Default)]
pub struct S3Settings {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Destination bucket.
    pub bucket: String,
    /// Region; [`DEFAULT_REGION`] when `None`.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores. Enables path-style addressing.
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl S3Settings {
    fn check(&self) -> UploadResult<()> {
        let missing = [
            ("AWS_ACCESS_KEY", &self.access_key),
            ("AWS_SECRET_ACCESS_KEY", &self.secret_key),
            ("BUCKET_NAME", &self.bucket),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::credentials(format!(
                "S3 settings missing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// S3 backend with one client reused across uploads.
#[derive(Debug)]
pub struct S3Backend {
    settings: S3Settings,
    client: OnceLock<Client>,
}

impl S3Backend {
    /// Create a backend; call [`StorageBackend::init`] before uploading.
    #[must_use]
    pub const fn new(settings: S3Settings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    fn build_client(&self) -> Client {
        let credentials = Credentials::new(
            self.settings.access_key.clone(),
            self.settings.secret_key.clone(),
            None,
            None,
            "relay-bot",
        );
        let region = self
            .settings
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &self.settings.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Client::from_conf(builder.build())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStorage
    }

    async fn init(&self) -> UploadResult<()> {
        self.settings.check()?;
        self.client.get_or_init(|| self.build_client());
        debug!(bucket = %self.settings.bucket, "s3 client ready");
        Ok(())
    }

    async fn put(&self, request: &UploadRequest) -> UploadResult<UploadReceipt> {
        let client = self
            .client
            .get()
            .ok_or(UploadError::NotInitialized("s3"))?;

        let body = ByteStream::from_path(&request.local_path)
            .await
            .map_err(|e| UploadError::Io(std::io::Error::other(e)))?;
        let content_type = mime_guess::from_path(&request.local_path).first_or_octet_stream();

        client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(&request.remote_name)
            .content_type(content_type.essence_str())
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::provider(DisplayErrorContext(&e).to_string()))?;

        Ok(UploadReceipt {
            remote_id: request.remote_name.clone(),
            location: format!("s3://{}/{}", self.settings.bucket, request.remote_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: Option<String>) -> S3Settings {
        S3Settings {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            bucket: "uploads".to_string(),
            region: Some("eu-west-1".to_string()),
            endpoint_url: endpoint,
        }
    }

    #[tokio::test]
    async fn test_init_requires_credentials() {
        let backend = S3Backend::new(S3Settings {
            bucket: "uploads".to_string(),
            ..S3Settings::default()
        });
        let err = backend.init().await.unwrap_err();
        assert!(err.to_string().contains("AWS_ACCESS_KEY"));
        assert!(err.to_string().contains("AWS_SECRET_ACCESS_KEY"));
        assert!(!err.to_string().contains("BUCKET_NAME"));
    }

    #[tokio::test]
    async fn test_put_before_init_fails() {
        let backend = S3Backend::new(settings(None));
        let request = UploadRequest::new("report.pdf", None);
        assert!(matches!(
            backend.put(&request).await,
            Err(UploadError::NotInitialized("s3"))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", settings(None));
        assert!(!rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("EXAMPLEKEY"));
        assert!(rendered.contains("uploads"));
    }

    #[tokio::test]
    async fn test_put_object_against_compatible_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/uploads/report.pdf"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc123\""))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.child("report.pdf");
        file.write_binary(b"%PDF-1.4 test").unwrap();

        let backend = S3Backend::new(settings(Some(server.uri())));
        backend.init().await.unwrap();

        assert!(backend.upload(file.path(), None).await);
    }

    #[tokio::test]
    async fn test_rejected_put_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/uploads/report.pdf"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("Content-Type", "application/xml")
                    .set_body_string(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                    ),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.child("report.pdf");
        file.write_binary(b"%PDF-1.4 test").unwrap();

        let backend = S3Backend::new(settings(Some(server.uri())));
        backend.init().await.unwrap();

        assert!(!backend.upload(file.path(), None).await);
    }
}
