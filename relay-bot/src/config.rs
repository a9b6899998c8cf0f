//! Environment-sourced configuration.
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file in the working directory.

use crate::error::{ConfigError, ConfigResult};
use crate::storage::{BackendSettings, DriveSettings, S3Settings};
use std::path::PathBuf;
use tracing::debug;

/// Telegram bot token.
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
/// Alternate name for the bot token.
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// S3 access key id.
pub const ENV_AWS_ACCESS_KEY: &str = "AWS_ACCESS_KEY";
/// S3 secret access key.
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// S3 bucket name.
pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
/// S3 region.
pub const ENV_AWS_REGION: &str = "AWS_REGION";
/// Custom S3-compatible endpoint.
pub const ENV_S3_ENDPOINT_URL: &str = "S3_ENDPOINT_URL";
/// Drive token file path.
pub const ENV_GDRIVE_TOKEN_PATH: &str = "GDRIVE_TOKEN_PATH";
/// Drive parent folder id.
pub const ENV_GDRIVE_FOLDER_ID: &str = "GDRIVE_FOLDER_ID";
/// Directory attachments are staged in before upload.
pub const ENV_DOWNLOAD_DIR: &str = "RELAY_DOWNLOAD_DIR";
/// Comma-separated Telegram user ids allowed to use the bot.
pub const ENV_ALLOWED_USERS: &str = "RELAY_ALLOWED_USERS";

/// Complete bot configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Telegram bot token.
    pub bot_token: Option<String>,
    /// Telegram user ids allowed to talk to the bot. Empty means everyone.
    pub allowed_users: Vec<i64>,
    /// Where attachments are downloaded before upload.
    pub download_dir: PathBuf,
    /// Storage backend settings.
    pub backends: BackendSettings,
}

impl RelayConfig {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> ConfigResult<Self> {
        match dotenv::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::invalid(format!(".env: {e}"))),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let allowed_users = get(ENV_ALLOWED_USERS)
            .map(|raw| parse_user_ids(&raw))
            .transpose()?
            .unwrap_or_default();

        let drive_defaults = DriveSettings::default();
        let drive = DriveSettings {
            token_path: get(ENV_GDRIVE_TOKEN_PATH).map_or(drive_defaults.token_path, PathBuf::from),
            folder_id: get(ENV_GDRIVE_FOLDER_ID),
            ..drive_defaults
        };

        let s3 = S3Settings {
            access_key: get(ENV_AWS_ACCESS_KEY).unwrap_or_default(),
            secret_key: get(ENV_AWS_SECRET_ACCESS_KEY).unwrap_or_default(),
            bucket: get(ENV_BUCKET_NAME).unwrap_or_default(),
            region: get(ENV_AWS_REGION),
            endpoint_url: get(ENV_S3_ENDPOINT_URL),
        };

        Ok(Self {
            bot_token: get(ENV_BOT_TOKEN).or_else(|| get(ENV_TELEGRAM_BOT_TOKEN)),
            allowed_users,
            download_dir: get(ENV_DOWNLOAD_DIR)
                .map_or_else(default_download_dir, PathBuf::from),
            backends: BackendSettings { s3, drive },
        })
    }

    /// Fail fast when anything the bot needs at startup is missing.
    pub fn validate_for_bot(&self) -> ConfigResult<()> {
        if self.bot_token.is_none() {
            return Err(ConfigError::missing(ENV_BOT_TOKEN));
        }
        let s3 = &self.backends.s3;
        for (name, value) in [
            (ENV_AWS_ACCESS_KEY, &s3.access_key),
            (ENV_AWS_SECRET_ACCESS_KEY, &s3.secret_key),
            (ENV_BUCKET_NAME, &s3.bucket),
        ] {
            if value.is_empty() {
                return Err(ConfigError::missing(name));
            }
        }
        Ok(())
    }

    /// The bot token, or an error naming the variable to set.
    pub fn require_bot_token(&self) -> ConfigResult<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| ConfigError::missing(ENV_BOT_TOKEN))
    }
}

/// Default staging directory under the system temp dir.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("relay-bot")
}

fn parse_user_ids(raw: &str) -> ConfigResult<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ConfigError::invalid(format!("{ENV_ALLOWED_USERS}: not a user id: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_full_environment() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("AWS_ACCESS_KEY", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("BUCKET_NAME", "uploads"),
            ("AWS_REGION", "eu-central-1"),
            ("GDRIVE_TOKEN_PATH", "/srv/relay/token.json"),
            ("GDRIVE_FOLDER_ID", "folder-1"),
            ("RELAY_DOWNLOAD_DIR", "/var/tmp/relay"),
            ("RELAY_ALLOWED_USERS", "42, 7"),
        ]))
        .unwrap();

        assert_eq!(config.require_bot_token().unwrap(), "123:abc");
        assert_eq!(config.allowed_users, vec![42, 7]);
        assert_eq!(config.download_dir, PathBuf::from("/var/tmp/relay"));
        assert_eq!(config.backends.s3.bucket, "uploads");
        assert_eq!(config.backends.s3.region.as_deref(), Some("eu-central-1"));
        assert_eq!(
            config.backends.drive.token_path,
            PathBuf::from("/srv/relay/token.json")
        );
        assert_eq!(config.backends.drive.folder_id.as_deref(), Some("folder-1"));
        assert!(config.validate_for_bot().is_ok());
    }

    #[test]
    fn test_missing_values_fail_validation() {
        let config = RelayConfig::from_lookup(lookup(&[("BOT_TOKEN", "123:abc")])).unwrap();
        let err = config.validate_for_bot().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref name) if name == "AWS_ACCESS_KEY"));

        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(
            config.validate_for_bot(),
            Err(ConfigError::Missing(ref name)) if name == "BOT_TOKEN"
        ));
        assert_eq!(config.download_dir, default_download_dir());
        assert!(config.allowed_users.is_empty());
    }

    #[test]
    fn test_telegram_token_fallback_and_blank_values() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "   "),
            ("TELEGRAM_BOT_TOKEN", "999:xyz"),
        ]))
        .unwrap();
        assert_eq!(config.bot_token.as_deref(), Some("999:xyz"));
    }

    #[test]
    fn test_invalid_allowed_users() {
        let result = RelayConfig::from_lookup(lookup(&[("RELAY_ALLOWED_USERS", "42,bob")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
