use crate::severity::Severity;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Scalar log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Message {
    /// Undefined-or-blank check used by the emptiness rule.
    pub fn is_blank(&self) -> bool {
        matches!(self, Message::Text(text) if text.trim().is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Bool(b) => write!(f, "{b}"),
            Message::Int(i) => write!(f, "{i}"),
            Message::UInt(u) => write!(f, "{u}"),
            Message::Float(x) => write!(f, "{x}"),
            Message::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

/// Final record handed to sinks. One JSON line per record on the machine
/// sink, fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: u8,
    pub severity: Severity,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    #[serde(rename = "msg", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub ctx: Map<String, Value>,
}

impl LogRecord {
    /// Stamp a record with the severity's level and the current time.
    pub fn new(severity: Severity, message: Option<Message>, ctx: Map<String, Value>) -> Self {
        LogRecord {
            level: severity.level(),
            severity,
            time: Utc::now().timestamp_millis(),
            message,
            ctx,
        }
    }

    /// Serialized form as written by the machine sink, without newline.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `ctx` as a JSON value, convenient for assertions.
    pub fn ctx_value(&self) -> Value {
        Value::Object(self.ctx.clone())
    }
}
