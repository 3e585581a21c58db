//! Knotify configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KnotifyError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnotifyConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl KnotifyConfig {
    /// Load config from the default path (~/.knotify/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KnotifyError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| KnotifyError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| KnotifyError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Knotify home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".knotify")
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8090
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// Datastore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.knotify/knotify.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max due messages handled per trigger invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Delay between outbound sends within one channel, in milliseconds.
    /// Provider rate limits dominate at wedding-guest-list scale.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

fn default_batch_size() -> u32 {
    50
}
fn default_send_delay_ms() -> u64 {
    50
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

/// Per-channel provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub sms: Option<SmsChannelConfig>,
    #[serde(default)]
    pub push: Option<PushChannelConfig>,
    #[serde(default)]
    pub email: Option<EmailChannelConfig>,
}

/// SMS gateway configuration (REST provider: one POST per message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsChannelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider send endpoint, e.g. "https://api.example-sms.com/v1/messages".
    pub api_url: String,
    pub api_key: String,
    /// Sender ID or origin number shown to recipients.
    #[serde(default)]
    pub sender_id: String,
    /// Country calling code prepended to national-format numbers, e.g. "1" or "84".
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

fn default_country_code() -> String {
    "1".into()
}

/// Push notification configuration. Delivery is stubbed until a provider
/// integration lands; the flag exists so records track the channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushChannelConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Email delivery configuration. Stubbed, same as push.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailChannelConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = KnotifyConfig::default();
        assert_eq!(cfg.gateway.port, 8090);
        assert_eq!(cfg.scheduler.batch_size, 50);
        assert_eq!(cfg.scheduler.send_delay_ms, 50);
        assert!(cfg.channel.sms.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg: KnotifyConfig = toml::from_str(
            r#"
            [scheduler]
            batch_size = 10

            [channel.sms]
            api_url = "https://sms.local/send"
            api_key = "k"
            country_code = "84"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduler.batch_size, 10);
        assert_eq!(cfg.scheduler.send_delay_ms, 50);
        let sms = cfg.channel.sms.unwrap();
        assert!(sms.enabled);
        assert_eq!(sms.country_code, "84");
        assert_eq!(sms.sender_id, "");
    }
}
