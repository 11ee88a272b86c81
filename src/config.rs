use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TRANSLATE_API_URL: &str = "https://translateapi.ai/api";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub discord_api_url: String,
    pub discord_timeout: Duration,

    // Translation API
    pub translate_api_key: String,
    pub translate_api_url: String,
    pub translate_timeout: Duration,
    pub translate_response_field: String,
    pub translate_error_field: String,

    // Channel allow-list
    pub target_channels: Vec<String>,
    pub channels_file: String,
}

/// Legacy JSON config file layout (`CONFIG_FILE`).
#[derive(Debug, Deserialize)]
struct FileConfig {
    discord_token: String,
    translate_api_key: String,
    #[serde(default)]
    target_channels: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// When `CONFIG_FILE` is set, the Discord token, the translation API key
    /// and the initial channel list come from that JSON file instead.
    pub fn from_env() -> Result<Self> {
        let (discord_token, translate_api_key, target_channels) =
            match std::env::var("CONFIG_FILE") {
                Ok(path) => {
                    let file = load_file_config(Path::new(&path))?;
                    (file.discord_token, file.translate_api_key, file.target_channels)
                }
                Err(_) => (
                    std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
                    std::env::var("TRANSLATE_API_KEY").context("TRANSLATE_API_KEY not set")?,
                    std::env::var("TARGET_CHANNELS")
                        .map(|v| parse_channel_list(&v))
                        .unwrap_or_default(),
                ),
            };

        Ok(Self {
            discord_token,
            discord_api_url: std::env::var("DISCORD_API_URL")
                .unwrap_or_else(|_| DEFAULT_DISCORD_API_URL.to_string()),
            discord_timeout: timeout_from_env("DISCORD_TIMEOUT_SECS"),

            translate_api_key,
            translate_api_url: std::env::var("TRANSLATE_API_URL")
                .unwrap_or_else(|_| DEFAULT_TRANSLATE_API_URL.to_string()),
            translate_timeout: timeout_from_env("TRANSLATE_TIMEOUT_SECS"),
            translate_response_field: std::env::var("TRANSLATE_RESPONSE_FIELD")
                .unwrap_or_else(|_| "translation".to_string()),
            translate_error_field: std::env::var("TRANSLATE_ERROR_FIELD")
                .unwrap_or_else(|_| "error".to_string()),

            target_channels,
            channels_file: std::env::var("CHANNELS_FILE")
                .unwrap_or_else(|_| "channels.json".to_string()),
        })
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .context(format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw).context(format!("Invalid config file {}", path.display()))
}

/// Whole seconds from `var`. Unset, unparseable or zero falls back to the
/// default; a zero timeout would fail every request.
fn timeout_from_env(var: &str) -> Duration {
    Duration::from_secs(
        std::env::var(var)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
    )
}

/// Split a comma separated channel list, dropping blanks.
fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
