//! Small shared helpers.

use std::path::PathBuf;

/// Directory name used under the home directory for persisted bot state.
const HOME_DIR_NAME: &str = ".relay-bot";

/// Generate a unique message identifier.
#[must_use]
pub fn generate_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// The bot's state directory (`~/.relay-bot`).
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOME_DIR_NAME)
}

/// Reduce an untrusted file name to a single safe path component.
///
/// Keeps only the last path segment, drops control characters, and never
/// returns an empty name, `.` or `..`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => "file".to_string(),
        other => other.to_string(),
    }
}
