//! Channel implementations for the supported transports.
//!
//! - [`cli::CliChannel`] - stdin/stdout channel for local testing (always available)
//! - [`telegram::TelegramChannel`] - Telegram bot (requires `telegram` feature)

pub mod cli;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use cli::CliChannel;

#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
