// Tracker configuration
//
// One explicitly constructed value, loaded from TOML and passed by
// reference wherever it is needed. There is no global configuration state.

use crate::model::NotificationRule;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub notifications: NotificationSettings,
    /// Expiration alert rules, evaluated in order
    #[serde(default)]
    pub rules: Vec<NotificationRule>,
}

/// Scanner defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub timeout_secs: u64,
    /// Validate the presented chain against the system trust roots. Off by
    /// default: internal inventories are full of self-signed and
    /// internal-CA certificates.
    pub verify_chain: bool,
    pub max_concurrent: usize,
    pub default_port: u16,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            verify_chain: false,
            max_concurrent: 10,
            default_port: 443,
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// SMTP settings and the global default recipient list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub from_address: String,
    pub from_name: String,
    /// Used when a rule has no recipients of its own
    #[serde(default)]
    pub default_recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "localhost".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            use_tls: true,
            from_address: "noreply@certitrack.local".to_string(),
            from_name: "CertiTrack".to_string(),
            default_recipients: Vec::new(),
        }
    }
}

impl EmailConfig {
    /// `Name <address>` sender header value
    pub fn sender(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

/// Notification toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl TrackerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("failed to read config file {:?}: {}", path.as_ref(), e)
        })?;

        let config: TrackerConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse TOML config: {}", e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {}", e))?;

        fs::write(path.as_ref(), toml_str).map_err(|e| {
            anyhow::anyhow!("failed to write config file {:?}: {}", path.as_ref(), e)
        })?;

        Ok(())
    }

    /// Active rules, in declaration order
    pub fn active_rules(&self) -> Vec<&NotificationRule> {
        self.rules.iter().filter(|r| r.active).collect()
    }
}
