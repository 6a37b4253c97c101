use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::entities::contact::EmergencyContact;
use crate::domain::ports::store::{ContactStore, StoreError};

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub contacts: Vec<ContactConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Escalation settings: countdown, alert text, monitoring at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_countdown")]
    pub countdown_secs: u64,
    #[serde(default = "default_true")]
    pub monitor_on_start: bool,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

/// Notification providers. A section that is present but incomplete still
/// yields a channel, which reports its missing credentials on every send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub clicksend: Option<ClickSendConfig>,
    #[serde(default)]
    pub twilio: Option<TwilioConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

/// ClickSend SMS credentials; empty fields fall back to `CLICKSEND_*` env vars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClickSendConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

/// Twilio credentials; SMS and WhatsApp become two separate channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub from_sms: Option<String>,
    #[serde(default)]
    pub from_whatsapp: Option<String>,
    #[serde(default = "default_true")]
    pub sms: bool,
    #[serde(default)]
    pub whatsapp: bool,
}

/// Caretaker webhook (Slack, Discord or generic JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

/// Which device transport to use and how the wearable is recognised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default)]
    pub auto_connect_default: bool,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

/// One emergency contact as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    pub id: String,
    pub name: String,
    pub phone: String,
}

/// Database storage path (tilde-expanded at point of use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

// --- Defaults ---

const fn default_countdown() -> u64 {
    15
}

const fn default_true() -> bool {
    true
}

pub const DEFAULT_ALERT_MESSAGE: &str =
    "SmartStep Alert: A potential fall has been detected. Please check on the user immediately.";

fn default_message() -> String {
    DEFAULT_ALERT_MESSAGE.into()
}

const fn default_send_timeout() -> u64 {
    30
}

fn default_transport() -> String {
    "none".into()
}

const fn default_scan_timeout() -> u64 {
    10
}

const fn default_connect_timeout() -> u64 {
    15
}

fn default_service_uuid() -> String {
    "4fafc201-1fb5-459e-8fcc-c5c9c331914b".into()
}

fn default_characteristic_uuid() -> String {
    "beb5483e-36e1-4688-b7f5-ea07361b26a8".into()
}

fn default_sentinel() -> String {
    "FALL".into()
}

fn default_database_path() -> String {
    "~/.local/share/fallsentry/fallsentry.db".into()
}

// --- Default impls ---

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown(),
            monitor_on_start: default_true(),
            message: default_message(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_sms: None,
            from_whatsapp: None,
            sms: default_true(),
            whatsapp: false,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            auto_connect_default: false,
            scan_timeout_secs: default_scan_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            sentinel: default_sentinel(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub const fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl From<&ContactConfig> for EmergencyContact {
    fn from(config: &ContactConfig) -> Self {
        Self::new(config.id.clone(), config.name.clone(), config.phone.clone())
    }
}

/// Resolve a credential from config, falling back to an environment variable.
/// Blank values count as missing.
#[must_use]
pub fn config_or_env(value: Option<&str>, env_var: &str) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            std::env::var(env_var)
                .ok()
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        })
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load config from default path or create default config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the file cannot be read, or the TOML content is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_or_create(&path)
    }

    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make escalation or fall detection misfire.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.general.countdown_secs == 0 {
            anyhow::bail!("general.countdown_secs must be greater than 0");
        }
        if self.general.send_timeout_secs == 0 {
            anyhow::bail!("general.send_timeout_secs must be greater than 0");
        }
        if self.device.scan_timeout_secs == 0 {
            anyhow::bail!("device.scan_timeout_secs must be greater than 0");
        }
        if self.device.connect_timeout_secs == 0 {
            anyhow::bail!("device.connect_timeout_secs must be greater than 0");
        }
        if self.device.sentinel.trim().is_empty() {
            anyhow::bail!("device.sentinel must not be empty");
        }
        Ok(())
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("fallsentry").join("config.toml"))
    }
}

/// Contact store backed by the `[[contacts]]` tables of the config file.
pub struct ConfigContactStore {
    contacts: Vec<EmergencyContact>,
}

impl ConfigContactStore {
    #[must_use]
    pub fn new(contacts: &[ContactConfig]) -> Self {
        Self {
            contacts: contacts.iter().map(EmergencyContact::from).collect(),
        }
    }
}

impl ContactStore for ConfigContactStore {
    fn list(&self) -> Result<Vec<EmergencyContact>, StoreError> {
        Ok(self.contacts.clone())
    }
}
