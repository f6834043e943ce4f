//! Configuration system for Parley
//!
//! Settings come from a TOML file (explicit path or standard locations) with
//! a small set of environment variables layered on top. Secrets are only read
//! from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, Result};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// Fallback system prompt when neither the user nor the config provides one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub catalog: CatalogConfig,
    pub defaults: DefaultsConfig,
    pub chat: ChatConfig,
    pub backend: BackendConfig,
    pub discord: DiscordConfig,
    pub database: DatabaseConfig,
}

/// Curation thresholds and refresh schedule for the model catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the model registry
    pub registry_url: String,
    /// Models older than this are dropped
    pub recency_days: i64,
    /// Minimum context length in tokens
    pub min_context_length: u64,
    /// Ceiling for the per-token prompt price
    pub max_prompt_price: f64,
    /// Ceiling for the per-token completion price
    pub max_completion_price: f64,
    /// Ceiling for the per-image price
    pub max_image_price: f64,
    /// Model id prefixes that are allowed through
    pub allowed_providers: Vec<String>,
    /// Serving providers whose endpoints are ignored
    pub excluded_endpoint_providers: Vec<String>,
    /// Name fragments marking unfinished models
    pub excluded_name_markers: Vec<String>,
    pub refresh_interval_secs: u64,
    /// How many models are offered as command choices
    pub selectable_models: usize,
}

impl CatalogConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            registry_url: OPENROUTER_API_URL.to_string(),
            recency_days: 180,
            min_context_length: 100_000,
            max_prompt_price: 0.000015,
            max_completion_price: 0.000075,
            max_image_price: 0.024,
            allowed_providers: [
                "anthropic",
                "google",
                "x-ai",
                "deepseek",
                "meta-llama",
                "openai",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_endpoint_providers: vec!["OpenAI".to_string()],
            excluded_name_markers: ["preview", "experimental", "beta"]
                .into_iter()
                .map(String::from)
                .collect(),
            refresh_interval_secs: 60 * 60,
            selectable_models: 25,
        }
    }
}

/// Process-wide fallbacks for users without preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum number of messages followed up a reply chain
    pub max_reply_depth: usize,
    /// Number of thread messages used as context
    pub thread_history_limit: usize,
    /// Maximum characters per delivered chunk
    pub chunk_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_reply_depth: 50,
            thread_history_limit: 100,
            chunk_size: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sent as `HTTP-Referer` for provider attribution
    pub app_url: Option<String>,
    /// Sent as `X-Title` for provider attribution
    pub app_title: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: OPENROUTER_API_URL.to_string(),
            api_key: None,
            app_url: None,
            app_title: Some("Parley".to_string()),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

/// Database configuration for SQLite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("parley")
                .join("parley.db"),
        }
    }
}

impl ParleyConfig {
    /// Layer environment variables over the file-based settings.
    ///
    /// Recognized: `DEFAULT_MODEL`, `DEFAULT_PROMPT`, `DB_PATH`,
    /// `OPENROUTER_API_KEY`, `DISCORD_TOKEN`.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides from an arbitrary lookup, used by [`Self::apply_env`].
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("DEFAULT_MODEL") {
            self.defaults.model = Some(model);
        }
        if let Some(prompt) = non_empty("DEFAULT_PROMPT") {
            self.defaults.system_prompt = Some(prompt);
        }
        if let Some(path) = non_empty("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(key) = non_empty("OPENROUTER_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Some(token) = non_empty("DISCORD_TOKEN") {
            self.discord.token = Some(token);
        }
    }

    /// The generation API key, required at startup.
    pub fn require_api_key(&self) -> Result<&str> {
        self.backend
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::missing_config("OPENROUTER_API_KEY", "backend.api_key"))
    }

    /// The Discord bot token, required to run the bot.
    pub fn require_discord_token(&self) -> Result<&str> {
        self.discord
            .token
            .as_deref()
            .ok_or_else(|| CoreError::missing_config("DISCORD_TOKEN", "discord.token"))
    }

    /// Check values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.chat.chunk_size == 0 {
            return Err(CoreError::invalid_config(
                "config",
                "chat.chunk_size",
                "must be greater than zero",
            ));
        }
        if self.chat.max_reply_depth == 0 {
            return Err(CoreError::invalid_config(
                "config",
                "chat.max_reply_depth",
                "must be greater than zero",
            ));
        }
        if self.catalog.refresh_interval_secs == 0 {
            return Err(CoreError::invalid_config(
                "config",
                "catalog.refresh_interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<ParleyConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    parse_config(&content, path)
}

fn parse_config(content: &str, path: &Path) -> Result<ParleyConfig> {
    let config: ParleyConfig =
        toml::from_str(content).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "content".to_string(),
            cause: ConfigError::TomlParse(e.to_string()),
        })?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to a TOML file
pub async fn save_config(config: &ParleyConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "content".to_string(),
        cause: ConfigError::TomlSerialize(e.to_string()),
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: path.display().to_string(),
                field: "directory".to_string(),
                cause: ConfigError::Io(e.to_string()),
            })?;
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

    Ok(())
}

/// Standard config file locations, highest priority first
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("parley.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("parley").join("config.toml"));
    }

    paths
}

/// Load from the first standard location that exists, or use defaults
pub async fn load_config_from_standard_locations() -> Result<ParleyConfig> {
    for path in config_paths() {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!("Loading config from: {:?}", path);
            return load_config(&path).await;
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(ParleyConfig::default())
}
