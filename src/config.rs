use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GlucoRsError;

pub const ENV_NIGHTSCOUT_URL: &str = "NIGHTSCOUT_URL";
pub const ENV_NIGHTSCOUT_API_SECRET: &str = "NIGHTSCOUT_API_SECRET";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_TIMEZONE: &str = "TZ";

pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Optional settings read from a TOML file.
///
/// Every field may be omitted; environment variables take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Data server settings
    pub nightscout: NightscoutSection,

    /// Chat API settings
    pub telegram: TelegramSection,

    /// IANA timezone name that defines the report day
    pub timezone: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NightscoutSection {
    pub url: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

impl FileConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: FileConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Load an explicit file, or the default file if one exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file simply yields empty settings.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::load_from_file(&default_path)
                } else {
                    tracing::debug!("No config file at {}, using environment only", default_path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".glucors")
            .join("config.toml")
    }
}

/// Data server connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct NightscoutConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    /// Shared secret sent as the `api-secret` header
    pub api_secret: Option<String>,
}

impl fmt::Debug for NightscoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NightscoutConfig")
            .field("base_url", &self.base_url)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Chat API settings
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramConfig {
    /// Endpoint for posting a text message
    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Validated settings for reaching the data server and the chat API
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub nightscout: NightscoutConfig,
    pub telegram: TelegramConfig,
    pub request_timeout: Duration,
}

/// Validated, immutable per-run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub connections: ConnectionConfig,
    pub timezone: Tz,
}

/// Trimmed value, with blank treated as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ConnectionConfig {
    /// Merge file settings with an environment lookup and validate.
    ///
    /// Environment values win over file values. Fails on the first missing
    /// required setting. The timezone is not read here.
    pub fn resolve<F>(file: FileConfig, env: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str, fallback: Option<String>| non_blank(env(key)).or_else(|| non_blank(fallback));
        let required = |key: &str, fallback: Option<String>| {
            setting(key, fallback).ok_or_else(|| GlucoRsError::Configuration(format!("{} is missing", key)))
        };

        let base_url = required(ENV_NIGHTSCOUT_URL, file.nightscout.url)?
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(GlucoRsError::Configuration(format!("{} is missing", ENV_NIGHTSCOUT_URL)));
        }
        let api_secret = setting(ENV_NIGHTSCOUT_API_SECRET, file.nightscout.api_secret);
        let bot_token = required(ENV_TELEGRAM_BOT_TOKEN, file.telegram.bot_token)?;
        let chat_id = required(ENV_TELEGRAM_CHAT_ID, file.telegram.chat_id)?;

        let api_base = non_blank(file.telegram.api_base)
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string());

        let timeout_secs = file.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(GlucoRsError::Configuration(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(ConnectionConfig {
            nightscout: NightscoutConfig { base_url, api_secret },
            telegram: TelegramConfig {
                bot_token,
                chat_id,
                api_base,
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Connection settings only, from the optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = FileConfig::load_or_default(path)?;
        let config = Self::resolve(file, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}

impl AppConfig {
    /// Resolve the connection settings, then the report timezone
    pub fn resolve<F>(file: FileConfig, env: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_timezone = file.timezone.clone();
        let connections = ConnectionConfig::resolve(file, &env)?;

        let timezone_name = non_blank(env(ENV_TIMEZONE))
            .or_else(|| non_blank(file_timezone))
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| GlucoRsError::Configuration(format!("unknown timezone '{}'", timezone_name)))?;

        Ok(AppConfig { connections, timezone })
    }

    /// Load the optional config file, then overlay the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = FileConfig::load_or_default(path)?;
        let config = Self::resolve(file, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}
