//! Application configuration.
//!
//! Loaded from `video_bot.toml` (working directory, optional) with env-var
//! overrides in the form `VIDEO_BOT__SECTION__KEY`. The plain variables used
//! by existing deployments (`TELEGRAM_BOT_TOKEN`, `MISTRAL_API_KEY`,
//! `MISTRAL_MODEL`, `DATABASE_PATH`) are honoured as well.

use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub token: Option<String>,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Long-polling timeout passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl TelegramConfig {
    /// The configured token, checked for the `<bot id>:<secret>` shape.
    pub fn validated_token(&self) -> Result<&str> {
        let token = match self.token.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => bail!("TELEGRAM_BOT_TOKEN is not set"),
        };
        if !token.contains(':') {
            let prefix: String = token.chars().take(10).collect();
            bail!("Telegram token does not contain ':' ({prefix}...)");
        }
        Ok(token)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Prefer env MISTRAL_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.mistral.ai/v1".to_string()
}
fn default_llm_model() -> String {
    "mistral-medium".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    200
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "video_analytics.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_json_path")]
    pub json_path: String,
    /// Videos per commit during bulk import
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_json_path() -> String {
    "data/videos_data.json".to_string()
}
fn default_batch_size() -> usize {
    20
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for `bot.log`; defaults to the platform data dir
    pub dir: Option<String>,
    #[serde(default = "default_log_to_file")]
    pub file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            file: default_log_to_file(),
        }
    }
}

pub fn load_config() -> Result<AppConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("video_bot").required(false))
        .add_source(config::Environment::with_prefix("VIDEO_BOT").separator("__"))
        .build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    apply_plain_env(&mut app, |key| std::env::var(key).ok());
    Ok(app)
}

/// Fill unset fields from the unprefixed variables.
fn apply_plain_env(app: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if app.telegram.token.is_none() {
        app.telegram.token = lookup("TELEGRAM_BOT_TOKEN");
    }
    if app.llm.api_key.is_none() {
        app.llm.api_key = lookup("MISTRAL_API_KEY");
    }
    if let Some(model) = lookup("MISTRAL_MODEL").filter(|m| !m.is_empty()) {
        app.llm.model = model;
    }
    if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.is_empty()) {
        app.database.path = path;
    }
}
