//! Record assembly: ambient + explicit merge, safe serialization, redaction
//! and the size ceiling. Every path yields a structurally valid
//! [`LogRecord`]; nothing here returns an error or panics.

use crate::normalize::NormalizedInput;
use crate::record::{LogRecord, Message};
use crate::redact::Redactor;
use crate::serialize::{context_to_json, to_json};
use crate::severity::Severity;
use crate::value::{ContextMap, ErrorValue, LogValue};
use serde_json::{Map, Value};

/// Default byte ceiling for one serialized record.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Key non-mapping explicit context is nested under.
pub const VALUE_KEY: &str = "value";

#[derive(Debug, Clone)]
pub struct Assembler {
    redactor: Redactor,
    max_size: Option<usize>,
}

impl Default for Assembler {
    fn default() -> Self {
        Assembler::new(Redactor::default(), Some(DEFAULT_MAX_SIZE))
    }
}

impl Assembler {
    pub fn new(redactor: Redactor, max_size: Option<usize>) -> Self {
        Assembler { redactor, max_size }
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Build the record for one call. Explicit context wins over `ambient`
    /// on key collisions; redaction runs on the merged result.
    #[track_caller]
    pub fn assemble(&self, severity: Severity, input: NormalizedInput, ambient: ContextMap) -> LogRecord {
        let mut ctx = merge(ambient, input.context);
        self.redactor.apply_ctx(&mut ctx);
        let mut record = LogRecord::new(severity, input.message, ctx);

        let Some(max) = self.max_size else {
            return record;
        };
        let size = record_size(&record);
        if size <= max {
            return record;
        }
        // A long backtrace alone may tip the record over; retry with just
        // the call-site lines before giving up on the payload.
        if shorten_stack(&mut record) && record_size(&record) <= max {
            return record;
        }
        oversize(severity, size, max)
    }
}

fn merge(ambient: ContextMap, explicit: Option<LogValue>) -> Map<String, Value> {
    // Each side is serialized on its own so a node shared between them is
    // not mistaken for a cycle.
    let mut merged = context_to_json(&ambient, None);
    match explicit {
        Some(LogValue::Object(obj)) => {
            let mut entries = obj.snapshot();
            alias_error(&mut entries);
            merged.extend(context_to_json(&entries, Some(obj.id())));
        }
        None | Some(LogValue::Null) | Some(LogValue::Opaque(_)) => {}
        Some(other) => {
            if let Some(json) = to_json(&other) {
                merged.insert(VALUE_KEY.to_string(), json);
            }
        }
    }
    merged
}

/// `{error: <error>}` is filed under `err` unless `err` is already taken.
fn alias_error(entries: &mut ContextMap) {
    if entries.contains_key("err") || !matches!(entries.get("error"), Some(LogValue::Error(_))) {
        return;
    }
    if let Some(err) = entries.remove("error") {
        entries.insert("err".to_string(), err);
    }
}

/// Number of leading stack lines kept by [`shorten_stack`]: the
/// `Type: message` header and the call-site location.
const STACK_HEAD_LINES: usize = 2;

/// Cut `ctx.err.stack` down to its head. Returns whether anything changed.
fn shorten_stack(record: &mut LogRecord) -> bool {
    let Some(Value::Object(err)) = record.ctx.get_mut("err") else {
        return false;
    };
    let Some(Value::String(stack)) = err.get_mut("stack") else {
        return false;
    };
    match stack.match_indices('\n').nth(STACK_HEAD_LINES - 1) {
        Some((cut, _)) => {
            stack.truncate(cut);
            true
        }
        None => false,
    }
}

fn record_size(record: &LogRecord) -> usize {
    record.to_json_line().map_or(0, |line| line.len())
}

/// Compact stand-in for a record over the ceiling. The original payload is
/// dropped; the stack is dropped too if keeping it would still not fit.
#[track_caller]
fn oversize(severity: Severity, size: usize, max: usize) -> LogRecord {
    let text = format!(
        "Log record size of {} bytes exceeds maximum of {} bytes",
        group_thousands(size),
        group_thousands(max)
    );
    let mut ctx = Map::new();
    if let Some(err) = to_json(&ErrorValue::located(text.clone()).into()) {
        ctx.insert("err".to_string(), err);
    }
    let mut record = LogRecord::new(severity, Some(Message::Text(text)), ctx);

    if record_size(&record) > max {
        if let Some(Value::Object(err)) = record.ctx.get_mut("err") {
            err.remove("stack");
        }
    }
    if record_size(&record) > max {
        tracing::warn!(
            target: "normlog::assemble",
            max,
            "size ceiling too small for the oversize diagnostic"
        );
    }
    record
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
