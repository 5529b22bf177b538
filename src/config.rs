use crate::services::chat_service::OpenAiConfig;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Blob account base URL, e.g. `https://acct.blob.core.windows.net`.
    pub blob_account_url: String,
    pub chat: Option<OpenAiConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Lost item record service")]
pub struct Args {
    /// Host to bind to (overrides LOST_ITEMS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides LOST_ITEMS_PORT / FUNCTIONS_CUSTOMHANDLER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides LOST_ITEMS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Blob storage account URL (overrides AZURE_BLOB_ACCOUNT_URL)
    #[arg(long)]
    pub blob_account_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 30;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("LOST_ITEMS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match read_port("LOST_ITEMS_PORT")? {
            Some(port) => port,
            // Port handed to custom handlers by the Functions host.
            None => read_port("FUNCTIONS_CUSTOMHANDLER_PORT")?.unwrap_or(DEFAULT_PORT),
        };
        let env_db = env::var("LOST_ITEMS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/lost_items.db".into());
        let env_blob = env::var("AZURE_BLOB_ACCOUNT_URL").ok();

        let blob_account_url = match args.blob_account_url.or(env_blob) {
            Some(url) if !url.trim().is_empty() => url,
            _ => bail!("AZURE_BLOB_ACCOUNT_URL (or --blob-account-url) must be set"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            blob_account_url,
            chat: chat_from_env()?,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_port(name: &str) -> Result<Option<u16>> {
    match env::var(name) {
        Ok(value) => parse_port(name, &value).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .with_context(|| format!("parsing {} value `{}`", name, value))
}

/// `None` when `CHAT_ENDPOINT` is unset, which selects the pass-through normaliser.
fn chat_from_env() -> Result<Option<OpenAiConfig>> {
    let Some(endpoint) = env::var("CHAT_ENDPOINT").ok().filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let timeout_secs = match env::var("CHAT_TIMEOUT_SECS") {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("parsing CHAT_TIMEOUT_SECS value `{}`", value))?,
        Err(_) => DEFAULT_CHAT_TIMEOUT_SECS,
    };

    Ok(Some(OpenAiConfig {
        endpoint,
        api_key: env::var("CHAT_API_KEY").ok().filter(|v| !v.is_empty()),
        model: env::var("CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.into()),
        timeout: Duration::from_secs(timeout_secs),
    }))
}
