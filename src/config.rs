use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Settings for a LAN session.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Seconds after key derivation before the session must be re-keyed.
    #[serde(default = "SessionConfig::default_rekey_interval")]
    pub rekey_interval: f64,
    /// Property holding the base64 monitor frame.
    #[serde(default = "SessionConfig::default_monitor_property_name")]
    pub monitor_property_name: String,
    /// Fixed local random nonce, for reproducible sessions.
    #[serde(default)]
    pub fixed_random: Option<String>,
    /// Fixed local timestamp nonce, for reproducible sessions.
    #[serde(default)]
    pub fixed_time: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            rekey_interval: Self::default_rekey_interval(),
            monitor_property_name: Self::default_monitor_property_name(),
            fixed_random: None,
            fixed_time: None,
        }
    }
}

impl SessionConfig {
    fn default_rekey_interval() -> f64 {
        60.0
    }

    fn default_monitor_property_name() -> String {
        "d302_monitor".to_owned()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: SessionConfig = serde_json::from_str(json)?;
        if !config.rekey_interval.is_finite() || config.rekey_interval <= 0.0 {
            config.rekey_interval = Self::default_rekey_interval();
        }
        if config.monitor_property_name.trim().is_empty() {
            config.monitor_property_name = Self::default_monitor_property_name();
        }
        Ok(config)
    }

    /// Loads the config from a JSON file, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_json_str(&std::fs::read_to_string(path)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn rekey_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.rekey_interval)
            .unwrap_or_else(|_| Duration::from_secs_f64(Self::default_rekey_interval()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::from_json_str("{}").expect("config");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.rekey_interval(), Duration::from_secs(60));
        assert_eq!(config.monitor_property_name, "d302_monitor");
    }

    #[test]
    fn overrides_and_sanitising() {
        let config = SessionConfig::from_json_str(
            r#"{"rekey_interval": 2.5, "fixed_random": "abc", "fixed_time": "1700000000000"}"#,
        )
        .expect("config");
        assert_eq!(config.rekey_interval(), Duration::from_millis(2500));
        assert_eq!(config.fixed_random.as_deref(), Some("abc"));

        let config = SessionConfig::from_json_str(
            r#"{"rekey_interval": -1, "monitor_property_name": " "}"#,
        )
        .expect("config");
        assert_eq!(config, SessionConfig::default());
        assert!(SessionConfig::from_json_str("[]").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let config = SessionConfig::load(Path::new("/nonexistent/ecamlink.json")).expect("config");
        assert_eq!(config, SessionConfig::default());
    }
}
