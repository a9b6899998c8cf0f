//! Relay Bot CLI
//!
//! Runs the Telegram relay, a local chat session, or one-shot uploads.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use relay_bot::config::{
    ENV_ALLOWED_USERS, ENV_AWS_ACCESS_KEY, ENV_AWS_REGION, ENV_AWS_SECRET_ACCESS_KEY,
    ENV_BOT_TOKEN, ENV_BUCKET_NAME, ENV_GDRIVE_FOLDER_ID, ENV_GDRIVE_TOKEN_PATH,
    ENV_S3_ENDPOINT_URL, ENV_TELEGRAM_BOT_TOKEN,
};
use relay_bot::error::DisplayError;
use relay_bot::prelude::*;
use relay_bot::storage::{OAuthToken, TokenStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Relay Bot - forward files sent in a chat to S3 or Google Drive
#[derive(Parser)]
#[command(name = "relay-bot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory attachments are staged in (overrides RELAY_DOWNLOAD_DIR)
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Google Drive token file (overrides GDRIVE_TOKEN_PATH)
    #[arg(long, global = true)]
    token_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot
    Run,

    /// Drive the conversation from the terminal
    Chat(ChatArgs),

    /// Upload one file directly to a backend
    Upload(UploadArgs),

    /// Show configuration and credential status
    Status,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Custom prompt prefix
    #[arg(short, long, default_value = "> ")]
    prompt: String,

    /// Chat ID for this session
    #[arg(short, long, default_value = "local")]
    session: String,
}

/// Arguments for the upload command
#[derive(Args)]
struct UploadArgs {
    /// Backend name: s3 or gdrive (case-insensitive)
    backend: String,

    /// File to upload
    path: PathBuf,

    /// Name at the destination (defaults to the file's base name)
    #[arg(short, long)]
    name: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "relay_bot={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let mut config = RelayConfig::load()?;
    if let Some(dir) = cli.download_dir {
        config.download_dir = dir;
    }
    if let Some(path) = cli.token_path {
        config.backends.drive.token_path = path;
    }

    match cli.command {
        Commands::Run => cmd_run(config).await,
        Commands::Chat(args) => cmd_chat(args, config).await,
        Commands::Upload(args) => cmd_upload(args, &config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

fn controller(config: &RelayConfig) -> Arc<Controller> {
    let registry = BackendRegistry::new(config.backends.clone());
    Arc::new(Controller::new(registry, config.download_dir.clone()))
}

/// Start the Telegram bot.
#[cfg(feature = "telegram")]
async fn cmd_run(config: RelayConfig) -> Result<()> {
    config.validate_for_bot()?;
    let token = config.require_bot_token()?;

    tracing::info!(
        download_dir = %config.download_dir.display(),
        allowed_users = config.allowed_users.len(),
        "starting relay bot"
    );

    let channel = TelegramChannel::new(
        TelegramChannelConfig::new(token).allow_users(config.allowed_users.iter().copied()),
    );
    println!("Relay bot running. Press Ctrl+C to stop.\n");
    channel.run(controller(&config)).await?;
    Ok(())
}

#[cfg(not(feature = "telegram"))]
async fn cmd_run(_config: RelayConfig) -> Result<()> {
    Err(BotError::config(
        "relay-bot was built without the `telegram` feature",
    ))
}

/// Start an interactive local session.
async fn cmd_chat(args: ChatArgs, config: RelayConfig) -> Result<()> {
    let cli = CliChannel::with_config(
        CliChannelConfig::new()
            .prompt(args.prompt)
            .session_id(args.session),
    );

    println!("Relay Bot Chat | /start to begin, /document PATH to send a file, 'exit' to quit\n");
    cli.run(controller(&config)).await?;
    Ok(())
}

/// Upload a single file through the backend factory.
async fn cmd_upload(args: UploadArgs, config: &RelayConfig) -> Result<()> {
    let backend = build_backend(&args.backend, &config.backends)
        .ok_or_else(|| UploadError::UnknownBackend(args.backend.clone()))?;
    backend.init().await?;

    if backend.upload(&args.path, args.name.as_deref()).await {
        println!("Uploaded {} to {}", args.path.display(), backend.kind());
        Ok(())
    } else {
        Err(UploadError::provider(format!(
            "uploading {} to {} failed",
            args.path.display(),
            backend.kind()
        ))
        .into())
    }
}

/// Show status.
async fn cmd_status(config: &RelayConfig) -> Result<()> {
    println!("Relay Bot Status\n");

    println!("Environment:");
    println!("  {}", bot_token_status(config));
    for name in [
        ENV_AWS_ACCESS_KEY,
        ENV_AWS_SECRET_ACCESS_KEY,
        ENV_BUCKET_NAME,
        ENV_AWS_REGION,
        ENV_S3_ENDPOINT_URL,
        ENV_GDRIVE_TOKEN_PATH,
        ENV_GDRIVE_FOLDER_ID,
        ENV_ALLOWED_USERS,
    ] {
        print_env_status(name);
    }

    println!();
    println!("Bot:");
    println!(
        "  Ready:        {}",
        match config.validate_for_bot() {
            Ok(()) => "yes".to_string(),
            Err(e) => format!("no ({e})"),
        }
    );
    println!("  Download dir: {}", config.download_dir.display());
    println!(
        "  Allowed:      {}",
        if config.allowed_users.is_empty() {
            "everyone".to_string()
        } else {
            format!("{} user(s)", config.allowed_users.len())
        }
    );

    let token_path = &config.backends.drive.token_path;
    println!();
    println!("Google Drive:");
    println!("  Token file: {}", token_path.display());
    match OAuthToken::load(token_path).await {
        Ok(token) => {
            let state = match token.status_at(Utc::now()) {
                TokenStatus::Valid => "valid",
                TokenStatus::NeedsRefresh => "expired (will refresh)",
                TokenStatus::Unusable => "expired, no refresh token (re-authorize)",
            };
            println!("  Token:      {state}");
            if let Some(expiry) = token.expiry {
                println!("  Expires:    {expiry}");
            }
        }
        Err(e) => println!("  Token:      unavailable ({e})"),
    }

    Ok(())
}

/// Bot token line; the token may come from either variable.
fn bot_token_status(config: &RelayConfig) -> String {
    let status = if config.bot_token.is_some() { "set" } else { "-" };
    format!("{ENV_BOT_TOKEN} (or {ENV_TELEGRAM_BOT_TOKEN}): {status}")
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok_and(|v| !v.trim().is_empty()) {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
