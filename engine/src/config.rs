//! Engine configuration.
//!
//! Values come from, in order of precedence: `METAMODEL_*` environment
//! variables, an optional JSON file, and the defaults below. The CLI loads a
//! `.env` file before reading the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::bridge::FormatMode;
use crate::error::{LoaderError, LoaderResult};
use crate::meta::DEFAULT_ORDER_STEP;
use crate::types::DateFormats;

/// Prefix of the environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "METAMODEL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Increment between implicit item orders
    pub order_step: i64,

    /// Record which fields are read
    pub track_usage: bool,

    /// How the display bridge formats values
    pub format_mode: FormatMode,

    /// Default date formats, PHP notation
    pub date_formats: DateFormats,

    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order_step: DEFAULT_ORDER_STEP,
            track_usage: false,
            format_mode: FormatMode::default(),
            date_formats: DateFormats::default(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Read a JSON configuration file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> LoaderResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())?;
        Ok(config)
    }

    /// Override fields from a variable lookup (`ORDER_STEP`, `TRACK_USAGE`,
    /// `FORMAT_MODE`, `LOG_LEVEL`, `DATE_FORMAT`, `DATE_STORAGE_FORMAT`,
    /// `DATETIME_FORMAT`, `DATETIME_STORAGE_FORMAT`, `TIME_FORMAT`,
    /// `TIME_STORAGE_FORMAT`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> LoaderResult<()> {
        let invalid = |key: &str, value: &str| {
            LoaderError::InvalidDefinition(format!("{ENV_PREFIX}{key}: invalid value '{value}'"))
        };

        if let Some(value) = lookup("ORDER_STEP") {
            self.order_step = value.trim().parse().map_err(|_| invalid("ORDER_STEP", &value))?;
        }
        if let Some(value) = lookup("TRACK_USAGE") {
            self.track_usage = parse_bool(&value).ok_or_else(|| invalid("TRACK_USAGE", &value))?;
        }
        if let Some(value) = lookup("FORMAT_MODE") {
            self.format_mode = serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase()))
                .map_err(|_| invalid("FORMAT_MODE", &value))?;
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            self.log_level = value.trim().to_lowercase();
        }

        let dates = &mut self.date_formats;
        for (key, target) in [
            ("DATE_FORMAT", &mut dates.date_display),
            ("DATE_STORAGE_FORMAT", &mut dates.date_storage),
            ("DATETIME_FORMAT", &mut dates.datetime_display),
            ("DATETIME_STORAGE_FORMAT", &mut dates.datetime_storage),
            ("TIME_FORMAT", &mut dates.time_display),
            ("TIME_STORAGE_FORMAT", &mut dates.time_storage),
        ] {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        }
        Ok(())
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ORDER_STEP", "5"),
            ("TRACK_USAGE", "yes"),
            ("FORMAT_MODE", "eager_multi_row"),
            ("DATE_FORMAT", "d/m/Y"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.order_step, 5);
        assert!(config.track_usage);
        assert_eq!(config.format_mode, FormatMode::EagerMultiRow);
        assert_eq!(config.date_formats.date_display, "d/m/Y");
        assert_eq!(config.date_formats.date_storage, "Y-m-d");
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(|key| (key == "ORDER_STEP").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("METAMODEL_ORDER_STEP"));
    }

    #[test]
    fn test_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "trackUsage": true, "logLevel": "debug" }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(config.track_usage);
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
        assert_eq!(config.order_step, DEFAULT_ORDER_STEP);
    }
}
