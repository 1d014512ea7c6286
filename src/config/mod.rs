//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`).

use std::env;

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Bot running mode
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("WEBHOOK_URL must be set when BOT_MODE is webhook")]
    MissingWebhookUrl,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Collection holding conversation states.
    pub state_collection: String,

    // Logging
    pub log_collection: String,

    /// Chat receiving failure notifications.
    pub log_chat_id: Option<i64>,

    /// Offset notification timestamps are shown in, e.g. `+03:00`.
    pub log_timezone: FixedOffset,

    /// Store every inbound update in the log collection.
    pub log_updates: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's
    /// value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let optional = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_mode = match optional("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("polling") => BotMode::Polling,
            Some("webhook") => BotMode::Webhook,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    value: other.to_string(),
                });
            }
        };

        let webhook_url = optional("WEBHOOK_URL");
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::MissingWebhookUrl);
        }

        let webhook_port = parse_or("WEBHOOK_PORT", optional("WEBHOOK_PORT"), 8443)?;

        let log_chat_id = optional("LOG_CHAT_ID")
            .map(|v| parse_value("LOG_CHAT_ID", v))
            .transpose()?;

        let log_timezone = optional("LOG_TIMEZONE")
            .map(|v| parse_value("LOG_TIMEZONE", v))
            .transpose()?
            .unwrap_or_else(|| Utc.fix());

        let log_updates = match optional("LOG_UPDATES").map(|v| v.to_lowercase()).as_deref() {
            None | Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_UPDATES",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: optional("WEBHOOK_SECRET"),
            mongodb_uri: required("MONGODB_URI")?,
            mongodb_database: optional("MONGODB_DATABASE").unwrap_or_else(|| "tgstarter".to_string()),
            state_collection: optional("STATE_COLLECTION").unwrap_or_else(|| "users".to_string()),
            log_collection: optional("LOG_COLLECTION").unwrap_or_else(|| "logs".to_string()),
            log_chat_id,
            log_timezone,
            log_updates,
        })
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |v| parse_value(name, v))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const BASE: [(&str, &str); 2] = [("BOT_TOKEN", "123:abc"), ("MONGODB_URI", "mongodb://localhost")];

    #[test]
    fn test_defaults() {
        let config = load(&BASE).unwrap();

        assert_eq!(config.bot_mode, BotMode::Polling);
        assert_eq!(config.webhook_port, 8443);
        assert_eq!(config.mongodb_database, "tgstarter");
        assert_eq!(config.state_collection, "users");
        assert_eq!(config.log_collection, "logs");
        assert_eq!(config.log_chat_id, None);
        assert_eq!(config.log_timezone.local_minus_utc(), 0);
        assert!(config.log_updates);
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[("MONGODB_URI", "mongodb://localhost")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn test_webhook_requires_url() {
        let mut vars = BASE.to_vec();
        vars.push(("BOT_MODE", "Webhook"));
        assert_eq!(load(&vars).unwrap_err(), ConfigError::MissingWebhookUrl);

        vars.push(("WEBHOOK_URL", "https://example.com/hook"));
        assert_eq!(load(&vars).unwrap().bot_mode, BotMode::Webhook);
    }

    #[test]
    fn test_unknown_bot_mode_is_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("BOT_MODE", "webhok"));
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "BOT_MODE",
                value: "webhok".to_string(),
            }
        );

        vars.pop();
        vars.push(("BOT_MODE", "POLLING"));
        assert_eq!(load(&vars).unwrap().bot_mode, BotMode::Polling);
    }

    #[test]
    fn test_log_settings() {
        let mut vars = BASE.to_vec();
        vars.extend([
            ("LOG_CHAT_ID", "-100500"),
            ("LOG_TIMEZONE", "+03:00"),
            ("LOG_UPDATES", "off"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.log_chat_id, Some(-100500));
        assert_eq!(config.log_timezone.local_minus_utc(), 3 * 3600);
        assert!(!config.log_updates);
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = BASE.to_vec();
        vars.push(("LOG_CHAT_ID", "chat"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name: "LOG_CHAT_ID", .. }
        ));
    }
}
