//! Persisted OAuth token for the Google Drive backend.
//!
//! The file uses Google's `authorized_user` JSON layout, so a token created
//! by the Google client libraries can be dropped in as-is.

use crate::error::{UploadError, UploadResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Google's token endpoint, used when the file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth credentials loaded from the token file.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Access token sent as the bearer credential.
    #[serde(alias = "access_token")]
    pub token: Option<String>,
    /// Refresh token, if the grant included one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token endpoint for the refresh grant.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Access token expiry; `None` means unknown.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("token_uri", &self.token_uri)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Usability of a token at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Access token present and not expired.
    Valid,
    /// Access token missing or expired, but a refresh is possible.
    NeedsRefresh,
    /// Access token missing or expired and no refresh token.
    Unusable,
}

/// Response of the refresh grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl OAuthToken {
    /// Read a token file.
    pub async fn load(path: &Path) -> UploadResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            UploadError::credentials(format!("cannot read token file {}: {e}", path.display()))
        })?;
        let token = serde_json::from_str(&content).map_err(|e| {
            UploadError::credentials(format!("malformed token file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded oauth token");
        Ok(token)
    }

    /// Write the token file, creating parent directories.
    pub async fn save(&self, path: &Path) -> UploadResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        debug!(path = %path.display(), "saved oauth token");
        Ok(())
    }

    /// Whether the access token is missing or expires within the skew window.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().is_none_or(str::is_empty) {
            return true;
        }
        self.expiry
            .is_some_and(|expiry| expiry <= now + Duration::seconds(EXPIRY_SKEW_SECS))
    }

    /// Classify the token at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if !self.is_expired_at(now) {
            TokenStatus::Valid
        } else if self.can_refresh() {
            TokenStatus::NeedsRefresh
        } else {
            TokenStatus::Unusable
        }
    }

    /// Whether the refresh grant can be attempted.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Access token, if present.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&mut self, http: &reqwest::Client) -> UploadResult<()> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| UploadError::credentials("token expired and no refresh token"))?;

        // The serializer is not `Sync`; it must be gone before the first await.
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "refresh_token")
                .append_pair("refresh_token", refresh_token);
            if let Some(client_id) = &self.client_id {
                form.append_pair("client_id", client_id);
            }
            if let Some(client_secret) = &self.client_secret {
                form.append_pair("client_secret", client_secret);
            }
            form.finish()
        };

        let response = http
            .post(&self.token_uri)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(UploadError::credentials(format!(
                "token refresh failed: HTTP {status}: {body}"
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        self.token = Some(refreshed.access_token);
        self.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }

        info!(expiry = ?self.expiry, "oauth token refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUTHORIZED_USER: &str = r#"{
        "token": "ya29.old",
        "refresh_token": "1//refresh",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "client.apps.googleusercontent.com",
        "client_secret": "shh",
        "scopes": ["https://www.googleapis.com/auth/drive"],
        "expiry": "2021-03-01T12:00:00.000000Z"
    }"#;

    #[tokio::test]
    async fn test_load_authorized_user_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("token.json");
        file.write_str(AUTHORIZED_USER).unwrap();

        let token = OAuthToken::load(file.path()).await.unwrap();
        assert_eq!(token.access_token(), Some("ya29.old"));
        assert!(token.can_refresh());
        assert_eq!(token.scopes.len(), 1);
        assert_eq!(token.status_at(Utc::now()), TokenStatus::NeedsRefresh);
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = OAuthToken::load(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(UploadError::Credentials(_))));

        let file = dir.child("bad.json");
        file.write_str("not json").unwrap();
        let malformed = OAuthToken::load(file.path()).await;
        assert!(matches!(malformed, Err(UploadError::Credentials(_))));
    }

    #[test]
    fn test_status() {
        let now = Utc::now();
        let mut token: OAuthToken = serde_json::from_str(AUTHORIZED_USER).unwrap();

        token.expiry = Some(now + Duration::hours(1));
        assert_eq!(token.status_at(now), TokenStatus::Valid);

        token.expiry = Some(now + Duration::seconds(10));
        assert_eq!(token.status_at(now), TokenStatus::NeedsRefresh);

        token.refresh_token = None;
        assert_eq!(token.status_at(now), TokenStatus::Unusable);

        token.expiry = None;
        assert_eq!(token.status_at(now), TokenStatus::Valid);

        token.token = None;
        assert_eq!(token.status_at(now), TokenStatus::Unusable);
    }

    #[tokio::test]
    async fn test_refresh_updates_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut token: OAuthToken = serde_json::from_str(AUTHORIZED_USER).unwrap();
        token.token_uri = format!("{}/token", server.uri());

        token.refresh(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token.access_token(), Some("ya29.new"));
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(token.status_at(Utc::now()), TokenStatus::Valid);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_refresh_future_is_send() {
        let mut token: OAuthToken = serde_json::from_str(AUTHORIZED_USER).unwrap();
        let http = reqwest::Client::new();
        let refresh = token.refresh(&http);
        assert_send(&refresh);
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let mut token: OAuthToken = serde_json::from_str(AUTHORIZED_USER).unwrap();
        token.token_uri = format!("{}/token", server.uri());

        let err = token.refresh(&reqwest::Client::new()).await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
        assert_eq!(token.access_token(), Some("ya29.old"));
    }

    #[tokio::test]
    async fn test_save_round_trip_keeps_refresh_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");

        let token: OAuthToken = serde_json::from_str(AUTHORIZED_USER).unwrap();
        token.save(&path).await.unwrap();

        let reloaded = OAuthToken::load(&path).await.unwrap();
        assert_eq!(reloaded.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(reloaded.expiry, token.expiry);
    }
}
