// Monitoring configuration

use crate::error::MonitorError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-worker monitoring configuration, loaded once from a YAML file.
///
/// The `probes` mapping preserves file order: probe types run in the order
/// they appear in the config, targets in list order.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub common: CommonConfig,
    #[serde(default)]
    pub notifications: Option<NotificationsConfig>,
    #[serde(default)]
    pub probes: serde_yaml::Mapping,
}

/// Common worker settings
#[derive(Debug, Clone, Deserialize)]
pub struct CommonConfig {
    /// Seconds between monitoring cycles
    pub delay: u64,
    #[serde(default)]
    pub debug: bool,
    /// Seconds to wait before the first cycle
    #[serde(default)]
    pub delay_at_startup: u64,
    /// Send a test email when the worker starts
    #[serde(default)]
    pub email_at_startup: bool,
}

/// Notification channels. Notifications are enabled for a worker iff this
/// section is present in its config file.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    pub email: EmailSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSection {
    pub config: EmailConfig,
}

/// SMTP server settings for outgoing alerts
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub sender_address: String,
    pub recipient_address: String,
}

impl MonitorConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        let contents = fs::read_to_string(path).map_err(|e| MonitorError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| MonitorError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// List every `.yaml` config file in a directory, sorted by name.
    ///
    /// Returns `NoConfig` if the directory does not exist or holds no
    /// config files. Parsing happens separately so the caller can skip
    /// broken files with a warning and keep the rest.
    pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, MonitorError> {
        if !dir.is_dir() {
            return Err(MonitorError::NoConfig {
                dir: dir.to_path_buf(),
            });
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| MonitorError::ConfigRead {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
            })
            .collect();
        entries.sort();

        if entries.is_empty() {
            return Err(MonitorError::NoConfig {
                dir: dir.to_path_buf(),
            });
        }

        Ok(entries)
    }

    /// Whether a notification channel is configured
    pub fn notifications_enabled(&self) -> bool {
        self.notifications.is_some()
    }
}
