use crate::assemble::DEFAULT_MAX_SIZE;
use crate::context::ContextStore;
use crate::redact::DEFAULT_CENSOR;
use crate::severity::Severity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Smallest accepted `max_size`; below this the oversize diagnostic itself
/// could not fit.
pub const MIN_MAX_SIZE: usize = 512;

/// Where a writing sink sends its output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Stdout,
    Stderr,
    /// Appended to, created if missing.
    File(PathBuf),
}

/// Error type returned when parsing a destination string.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DestinationError {
    #[error("empty destination")]
    Empty,

    #[error("unknown or unsupported destination scheme: {0}")]
    UnknownScheme(String),

    #[error("destination path is not valid percent-encoding: {0}")]
    InvalidEncoding(String),
}

/// Parse a destination string.
///
/// Examples:
/// - "stdout" / "1", "stderr" / "2"
/// - "file:///var/log/app%20name.log"
/// - "/var/log/app.log" (bare path)
pub fn parse_destination(raw: &str) -> Result<Destination, DestinationError> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();

    if raw.is_empty() {
        Err(DestinationError::Empty)
    } else if lower == "stdout" || lower == "1" {
        Ok(Destination::Stdout)
    } else if lower == "stderr" || lower == "2" {
        Ok(Destination::Stderr)
    } else if lower.starts_with("file://") {
        let encoded = &raw["file://".len()..];
        let path = urlencoding::decode(encoded)
            .map_err(|_| DestinationError::InvalidEncoding(encoded.to_string()))?;
        if path.is_empty() {
            return Err(DestinationError::Empty);
        }
        Ok(Destination::File(PathBuf::from(path.into_owned())))
    } else if let Some((scheme, _)) = lower.split_once("://") {
        Err(DestinationError::UnknownScheme(scheme.to_string()))
    } else {
        Ok(Destination::File(PathBuf::from(raw)))
    }
}

impl Destination {
    /// Open a writer for this destination.
    pub fn open(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(match self {
            Destination::Stdout => Box::new(io::stdout()),
            Destination::Stderr => Box::new(io::stderr()),
            Destination::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Box::new(BufWriter::new(file))
            }
        })
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_destination(s)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str("stdout"),
            Destination::Stderr => f.write_str("stderr"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Destination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_destination(&raw).map_err(serde::de::Error::custom)
    }
}

/// Per-sink options when a sink is enabled with more than a boolean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkOptions {
    pub level: Option<Severity>,
    pub destination: Option<Destination>,
}

/// A sink switch: `true`/`false` or `{ level, destination }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SinkSetting {
    Enabled(bool),
    Options(SinkOptions),
}

impl Default for SinkSetting {
    fn default() -> Self {
        SinkSetting::Enabled(false)
    }
}

impl SinkSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SinkSetting::Enabled(false))
    }

    pub fn level_or(&self, default: Severity) -> Severity {
        match self {
            SinkSetting::Options(SinkOptions { level: Some(level), .. }) => *level,
            _ => default,
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            SinkSetting::Options(SinkOptions {
                destination: Some(destination),
                ..
            }) => destination.clone(),
            _ => Destination::default(),
        }
    }
}

impl From<bool> for SinkSetting {
    fn from(enabled: bool) -> Self {
        SinkSetting::Enabled(enabled)
    }
}

impl From<Severity> for SinkSetting {
    fn from(level: Severity) -> Self {
        SinkSetting::Options(SinkOptions {
            level: Some(level),
            destination: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactConfig {
    /// Extra paths merged with the built-in baseline.
    pub paths: Vec<String>,
    pub censor: String,
}

impl Default for RedactConfig {
    fn default() -> Self {
        RedactConfig {
            paths: Vec::new(),
            censor: DEFAULT_CENSOR.to_string(),
        }
    }
}

/// Logger configuration.
///
/// **Fields**
/// - `machine`, `human`, `test`: which sinks are enabled and at what level.
/// - `store`: an existing [`ContextStore`] to share; a fresh one otherwise.
/// - `max_size`: byte ceiling for one serialized record, `None` disables.
/// - `sync`: write on the calling thread instead of the background task.
///   Forced on when the test sink is enabled.
/// - `redact`: extra redaction paths and the censor string.
/// - `channel_buffer`, `batch_size`, `flush_interval_ms`: asynchronous
///   dispatch tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub machine: SinkSetting,
    pub human: SinkSetting,
    pub test: SinkSetting,
    #[serde(skip)]
    pub store: Option<ContextStore>,
    pub max_size: Option<usize>,
    pub sync: bool,
    pub redact: RedactConfig,
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            machine: SinkSetting::default(),
            human: SinkSetting::default(),
            test: SinkSetting::default(),
            store: None,
            max_size: Some(DEFAULT_MAX_SIZE),
            sync: false,
            redact: RedactConfig::default(),
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval_ms: 1000,
        }
    }
}

impl LoggerConfig {
    /// Only the in-process test sink, synchronous.
    pub fn for_tests() -> Self {
        Self {
            test: SinkSetting::Enabled(true),
            ..Self::default()
        }
    }

    pub fn effective_sync(&self) -> bool {
        self.sync || self.test.is_enabled()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}
