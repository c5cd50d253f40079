//! Runtime configuration, loaded from a TOML file with environment
//! overrides for deployment-specific values.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::notifications::webhook::WebhookConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Directory for failure screenshots; unset disables capture.
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Scheduler tick for interval mode, seconds.
    #[serde(default = "default_tick_seconds")]
    pub interval_seconds: u64,
    /// When set, switches to wall-clock mode: one full batch at each of
    /// these hours of day.
    #[serde(default)]
    pub hours: Option<Vec<u32>>,
    /// IANA timezone the scheduled hours are interpreted in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_database_url() -> String {
    "sqlite://sitewatch.db?mode=rwc".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_tick_seconds() -> u64 {
    60
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            screenshot_dir: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_tick_seconds(),
            hours: None,
            timezone: default_timezone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            check: CheckConfig::default(),
            schedule: ScheduleConfig::default(),
            webhooks: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not
    /// exist. `DATABASE_URL` in the environment wins over the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.check.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "check.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.schedule.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "schedule.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if let Some(hours) = &self.schedule.hours {
            if hours.is_empty() {
                return Err(ConfigError::Invalid(
                    "schedule.hours must not be empty when set".to_string(),
                ));
            }
            if let Some(bad) = hours.iter().find(|h| **h > 23) {
                return Err(ConfigError::Invalid(format!(
                    "schedule.hours entry {bad} is out of range (0-23)"
                )));
            }
        }
        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.schedule.timezone.parse().map_err(|_| {
            ConfigError::Invalid(format!("unknown timezone '{}'", self.schedule.timezone))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(text: &str) -> Result<Config, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        Config::load(file.path())
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/sitewatch.toml")).unwrap();
        assert_eq!(config.check.timeout_seconds, 30);
        assert!(config.schedule.hours.is_none());
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn parses_wall_clock_schedule() {
        let config = load_str(
            r#"
            database_url = "sqlite::memory:"

            [schedule]
            hours = [6, 18]
            timezone = "Europe/Berlin"
            "#,
        )
        .unwrap();
        assert_eq!(config.schedule.hours, Some(vec![6, 18]));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Tz::Europe__Berlin);
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let err = load_str(
            r#"
            [schedule]
            hours = [25]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = load_str(
            r#"
            [schedule]
            timezone = "Mars/Olympus_Mons"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parses_webhook_channels() {
        let config = load_str(
            r#"
            [[webhooks]]
            url = "https://hooks.example.com/notify"
            body_template = '{"text": "{{ name }} is {{ new_status }}"}'
            "#,
        )
        .unwrap();
        assert_eq!(config.webhooks.len(), 1);
        assert_eq!(config.webhooks[0].method, "POST");
    }
}
