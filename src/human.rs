//! ANSI-coloured, human-oriented sink.
//!
//! ```text
//! [14:03:07.120] INFO: request finished
//!     status: 200
//!     user: {
//!       "id": 7
//!     }
//! ```

use crate::config::Destination;
use crate::record::LogRecord;
use crate::severity::Severity;
use crate::sink::{LogSink, SinkError};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Trace => "\x1b[90m",
        Severity::Debug => "\x1b[34m",
        Severity::Info => "\x1b[32m",
        Severity::Warn => "\x1b[33m",
        Severity::Error => "\x1b[31m",
        Severity::Fatal => "\x1b[41;97m",
    }
}

pub struct HumanSink {
    writer: Mutex<Box<dyn Write + Send>>,
    colors: bool,
}

impl HumanSink {
    pub fn open(destination: &Destination) -> io::Result<Self> {
        Ok(Self::new(destination.open()?, true))
    }

    pub fn new(writer: Box<dyn Write + Send>, colors: bool) -> Self {
        HumanSink {
            writer: Mutex::new(writer),
            colors,
        }
    }

    /// Render a record as text, trailing newline included.
    pub fn format(&self, record: &LogRecord) -> String {
        let paint = |code: &str, text: &str| {
            if self.colors {
                format!("{code}{text}{RESET}")
            } else {
                text.to_string()
            }
        };

        let time = Utc
            .timestamp_millis_opt(record.time)
            .single()
            .map(|t: DateTime<Utc>| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| record.time.to_string());
        let label = record.severity.label().to_ascii_uppercase();

        let mut out = format!(
            "{} {}:",
            paint(DIM, &format!("[{time}]")),
            paint(color(record.severity), &label)
        );
        if let Some(message) = &record.message {
            let _ = write!(out, " {}", paint(CYAN, &message.to_string()));
        }
        out.push('\n');

        for (key, value) in &record.ctx {
            let rendered = match value {
                serde_json::Value::String(s) if !s.contains('\n') => format!("{s:?}"),
                serde_json::Value::String(s) => s.replace('\n', "\n        "),
                other => serde_json::to_string_pretty(other)
                    .unwrap_or_default()
                    .replace('\n', "\n    "),
            };
            let _ = writeln!(out, "    {}: {rendered}", paint(DIM, key));
        }
        out
    }
}

impl LogSink for HumanSink {
    fn name(&self) -> &str {
        "human"
    }

    fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let text = self.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}
