use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::notifications::DEFAULT_DELIVERY_TIMEOUT;
use crate::pipeline::{RunMode, DEFAULT_ACTION_TIMEOUT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds a single action may run before it fails (default: 30)
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
    /// What a failed run returns: partial_success or all_or_nothing
    #[serde(default)]
    pub mode: RunMode,
}

fn default_action_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT.as_secs()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: default_action_timeout(),
            mode: RunMode::default(),
        }
    }
}

impl PipelineConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

/// Notification endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false, tickets are only written to the log
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    #[serde(default = "default_notification_url")]
    pub url: String,
    /// Seconds before a delivery attempt is abandoned (default: 5)
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
    /// Authentication type: "bearer" or unset
    #[serde(default)]
    pub auth_type: Option<String>,
    /// Environment variable holding the bearer token
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_notification_url() -> String {
    "https://api.notification-service.com/notify".to_string()
}

fn default_notification_timeout() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_secs()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            url: default_notification_url(),
            timeout_secs: default_notification_timeout(),
            auth_type: None,
            token_env: None,
        }
    }
}

impl NotificationsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Recorded as `metadata.source` on every ticket
    #[serde(default = "default_ticket_source")]
    pub source: String,
}

fn default_ticket_source() -> String {
    crate::triage::DEFAULT_SOURCE.to_string()
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            source: default_ticket_source(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: ".triage".to_string(),
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".triage/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so triage works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/triage/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("triage").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with TRIAGE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TRIAGE")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.action_timeout_secs == 0 {
            bail!("pipeline.action_timeout_secs must be greater than zero");
        }
        if self.notifications.enabled {
            if self.notifications.url.trim().is_empty() {
                bail!("notifications.url is required when notifications are enabled");
            }
            if self.notifications.timeout_secs == 0 {
                bail!("notifications.timeout_secs must be greater than zero");
            }
            // createTicket must outlive the delivery attempt or the ticket is lost
            if self.notifications.timeout_secs >= self.pipeline.action_timeout_secs {
                bail!(
                    "notifications.timeout_secs ({}) must be less than pipeline.action_timeout_secs ({})",
                    self.notifications.timeout_secs,
                    self.pipeline.action_timeout_secs
                );
            }
            if self.notifications.auth_type.as_deref() == Some("bearer")
                && self.notifications.token_env.as_deref().unwrap_or("").is_empty()
            {
                bail!("notifications.token_env is required for bearer auth");
            }
        }
        if self.tickets.source.trim().is_empty() {
            bail!("tickets.source must not be empty");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}
