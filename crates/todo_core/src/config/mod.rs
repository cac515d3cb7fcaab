use crate::conversation::ConversationScope;
use crate::error::AppError;
use crate::reminder::{DEFAULT_INTERVAL, ReminderPolicy};
use crate::storage::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "todobot";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TODOBOT_CONFIG_PATH";
const STORE_ENV_VAR: &str = "TODOBOT_STORE_PATH";
const TOKEN_ENV_VAR: &str = "TELEGRAM_APITOKEN";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub store_backend: StoreBackend,
    pub store_path: Option<PathBuf>,
    pub conversation_scope: ConversationScope,
    pub reminder_hour: u8,
    pub reminder_minute: u8,
    pub reminder_first_delay_secs: Option<u64>,
    pub reminder_interval_secs: u64,
    pub telegram_token: Option<String>,
    pub telegram_api_base: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::default(),
            store_path: None,
            conversation_scope: ConversationScope::default(),
            reminder_hour: 9,
            reminder_minute: 0,
            reminder_first_delay_secs: None,
            reminder_interval_secs: DEFAULT_INTERVAL.as_secs(),
            telegram_token: None,
            telegram_api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }
}

impl BotConfig {
    pub fn reminder_policy(&self) -> Result<ReminderPolicy, AppError> {
        let interval = Duration::from_secs(self.reminder_interval_secs);
        match self.reminder_first_delay_secs {
            Some(delay) => ReminderPolicy::after(Duration::from_secs(delay), interval),
            None => ReminderPolicy::daily_at(self.reminder_hour, self.reminder_minute, interval),
        }
    }

    pub fn store_path(&self) -> Result<PathBuf, AppError> {
        self.store_path_with(&env_value)
    }

    fn store_path_with(&self, env: &dyn Fn(&str) -> Option<String>) -> Result<PathBuf, AppError> {
        if let Some(path) = self.store_path.as_ref() {
            return Ok(path.clone());
        }
        if let Some(path) = env(STORE_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }

        let file_name = match self.store_backend {
            StoreBackend::Json => "todobot.json",
            StoreBackend::Sqlite | StoreBackend::Memory => "todobot.db",
        };
        Ok(app_dir_with(env)?.join(file_name))
    }

    /// `TELEGRAM_APITOKEN` wins over the config file.
    pub fn telegram_token(&self) -> Result<String, AppError> {
        self.telegram_token_with(&env_value)
    }

    fn telegram_token_with(&self, env: &dyn Fn(&str) -> Option<String>) -> Result<String, AppError> {
        env(TOKEN_ENV_VAR)
            .or_else(|| {
                self.telegram_token
                    .as_ref()
                    .filter(|token| !token.trim().is_empty())
                    .cloned()
            })
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "telegram token is required; set {TOKEN_ENV_VAR} or telegram_token"
                ))
            })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: BotConfig,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_backend: Option<StoreBackend>,
    pub store_path: Option<PathBuf>,
    pub conversation_scope: Option<ConversationScope>,
    pub reminder_hour: Option<u8>,
    pub reminder_minute: Option<u8>,
    pub reminder_first_delay_secs: Option<u64>,
    pub reminder_interval_secs: Option<u64>,
    pub telegram_token: Option<String>,
    pub telegram_api_base: Option<String>,
}

impl ConfigOverrides {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, AppError> {
        let mut overrides = Self::default();
        for entry in entries {
            overrides.apply(entry.as_ref())?;
        }
        Ok(overrides)
    }

    fn apply(&mut self, entry: &str) -> Result<(), AppError> {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            AppError::invalid_input(format!("config override must be KEY=VALUE: {entry}"))
        })?;
        let value = value.trim();

        match key.trim() {
            "store_backend" => self.store_backend = Some(value.parse()?),
            "store_path" => self.store_path = Some(PathBuf::from(value)),
            "conversation_scope" => self.conversation_scope = Some(value.parse()?),
            "reminder_hour" => self.reminder_hour = Some(parse_number(key, value)?),
            "reminder_minute" => self.reminder_minute = Some(parse_number(key, value)?),
            "reminder_first_delay_secs" => {
                self.reminder_first_delay_secs = Some(parse_number(key, value)?)
            }
            "reminder_interval_secs" => {
                self.reminder_interval_secs = Some(parse_number(key, value)?)
            }
            "telegram_token" => self.telegram_token = Some(value.to_string()),
            "telegram_api_base" => self.telegram_api_base = Some(value.to_string()),
            other => {
                return Err(AppError::invalid_input(format!(
                    "unknown config key: {other}"
                )));
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::invalid_input(format!("{key} expects a number, got {value:?}")))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn app_dir_with(env: &dyn Fn(&str) -> Option<String>) -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata = env("APPDATA").ok_or_else(|| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = env("HOME").ok_or_else(|| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

/// `explicit` (from `--config`), else `TODOBOT_CONFIG_PATH`, else the per-user default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, AppError> {
    config_path_with(explicit, &env_value)
}

fn config_path_with(
    explicit: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    Ok(app_dir_with(env)?.join(CONFIG_FILE_NAME))
}

pub fn load_config_with_fallback(explicit: Option<&Path>) -> ConfigLoad {
    match config_path(explicit) {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: BotConfig::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: BotConfig::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: BotConfig::default(),
            error: Some(err),
        },
    }
}

pub fn load_config_from_path(path: &Path) -> Result<BotConfig, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &BotConfig, overrides: &ConfigOverrides) -> BotConfig {
    let mut merged = base.clone();
    if let Some(backend) = overrides.store_backend {
        merged.store_backend = backend;
    }
    if let Some(path) = overrides.store_path.as_ref() {
        merged.store_path = Some(path.clone());
    }
    if let Some(scope) = overrides.conversation_scope {
        merged.conversation_scope = scope;
    }
    if let Some(hour) = overrides.reminder_hour {
        merged.reminder_hour = hour;
    }
    if let Some(minute) = overrides.reminder_minute {
        merged.reminder_minute = minute;
    }
    if let Some(delay) = overrides.reminder_first_delay_secs {
        merged.reminder_first_delay_secs = Some(delay);
    }
    if let Some(interval) = overrides.reminder_interval_secs {
        merged.reminder_interval_secs = interval;
    }
    if let Some(token) = overrides.telegram_token.as_ref() {
        merged.telegram_token = Some(token.clone());
    }
    if let Some(base_url) = overrides.telegram_api_base.as_ref() {
        merged.telegram_api_base = base_url.clone();
    }
    merged
}
