use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HabitConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite` or `memory`.
    pub backend: String,
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Identity to sign in as when the CLI is not given `--user`.
    pub user: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub suppression_window_secs: i64,
    /// Offset used to read the wall clock for daily reminders. `None` means host local time.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub completion_days: i64,
    pub todo_days: i64,
    pub sleep_log_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompletionConfig {
    /// `template` (offline) or `http` (OpenAI-compatible chat completions).
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_habitloop_dir()
            .join("habitloop.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "sqlite".into(),
            db_path,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            suppression_window_secs: 90,
            utc_offset_minutes: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
            completion_days: 7,
            todo_days: 7,
            sleep_log_days: 30,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "template".into(),
            endpoint: "https://openrouter.ai/api/v1".into(),
            model: "openai/gpt-4o-mini".into(),
            api_key_env: "HABITLOOP_API_KEY".into(),
            timeout_secs: 30,
            system_prompt: "You are a warm, concise accountability coach. \
                            Reply with one or two sentences and no preamble."
                .into(),
        }
    }
}

/// Returns `~/.habitloop/`
pub fn default_habitloop_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".habitloop")
}

/// Returns the default config file path: `~/.habitloop/config.toml`
pub fn default_config_path() -> PathBuf {
    default_habitloop_dir().join("config.toml")
}

impl HabitConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HabitConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (HABITLOOP_DB, HABITLOOP_USER, HABITLOOP_LOG_LEVEL, HABITLOOP_COMPLETION_PROVIDER).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HABITLOOP_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("HABITLOOP_USER") {
            self.identity.user = Some(val);
        }
        if let Ok(val) = std::env::var("HABITLOOP_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("HABITLOOP_COMPLETION_PROVIDER") {
            self.completion.provider = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
