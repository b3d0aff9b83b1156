//! Environment variable names used by this crate for convenient
//! configuration of a logger from services.
//!
//! These are purely helpers; [`LoggerConfig`] itself stays decoupled from
//! environment access.

use crate::config::{parse_destination, LoggerConfig, SinkOptions, SinkSetting};
use crate::severity::Severity;

/// Machine (NDJSON) sink: `true`/`false` or a level name.
pub const NORMLOG_MACHINE_ENV: &str = "NORMLOG_MACHINE";

/// Human sink: `true`/`false` or a level name.
pub const NORMLOG_HUMAN_ENV: &str = "NORMLOG_HUMAN";

/// In-process test sink: `true`/`false` or a level name.
pub const NORMLOG_TEST_ENV: &str = "NORMLOG_TEST";

/// Destination shared by the machine and human sinks.
pub const NORMLOG_DESTINATION_ENV: &str = "NORMLOG_DESTINATION";

/// Byte ceiling per record; `0` disables it.
pub const NORMLOG_MAX_SIZE_ENV: &str = "NORMLOG_MAX_SIZE";

/// Force synchronous dispatch.
pub const NORMLOG_SYNC_ENV: &str = "NORMLOG_SYNC";

/// Comma-separated extra redaction paths.
pub const NORMLOG_REDACT_PATHS_ENV: &str = "NORMLOG_REDACT_PATHS";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{key}: invalid value {value:?} ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl LoggerConfig {
    /// Build a config from the process environment. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = LoggerConfig::default();

        let destination = match lookup(NORMLOG_DESTINATION_ENV) {
            Some(raw) => Some(parse_destination(&raw).map_err(|e| ConfigError {
                key: NORMLOG_DESTINATION_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        if let Some(raw) = lookup(NORMLOG_MACHINE_ENV) {
            config.machine = sink_setting(NORMLOG_MACHINE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(NORMLOG_HUMAN_ENV) {
            config.human = sink_setting(NORMLOG_HUMAN_ENV, &raw)?;
        }
        if let Some(raw) = lookup(NORMLOG_TEST_ENV) {
            config.test = sink_setting(NORMLOG_TEST_ENV, &raw)?;
        }
        if let Some(destination) = destination {
            for setting in [&mut config.machine, &mut config.human] {
                if setting.is_enabled() {
                    let level = match setting {
                        SinkSetting::Options(options) => options.level,
                        SinkSetting::Enabled(_) => None,
                    };
                    *setting = SinkSetting::Options(SinkOptions {
                        level,
                        destination: Some(destination.clone()),
                    });
                }
            }
        }

        if let Some(raw) = lookup(NORMLOG_MAX_SIZE_ENV) {
            let max = raw.trim().parse::<usize>().map_err(|e| ConfigError {
                key: NORMLOG_MAX_SIZE_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.max_size = (max > 0).then_some(max);
        }
        if let Some(raw) = lookup(NORMLOG_SYNC_ENV) {
            config.sync = parse_bool(&raw).ok_or_else(|| ConfigError {
                key: NORMLOG_SYNC_ENV,
                value: raw.clone(),
                reason: "expected a boolean".to_string(),
            })?;
        }
        if let Some(raw) = lookup(NORMLOG_REDACT_PATHS_ENV) {
            config.redact.paths = raw
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn sink_setting(key: &'static str, raw: &str) -> Result<SinkSetting, ConfigError> {
    if let Some(enabled) = parse_bool(raw) {
        return Ok(SinkSetting::Enabled(enabled));
    }
    raw.parse::<Severity>()
        .map(SinkSetting::from)
        .map_err(|e| ConfigError {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
