//! Call-site argument normalization.
//!
//! A logging call carries zero or more [`LogValue`]s. They are resolved into
//! a [`NormalizedInput`] of an optional scalar message and an optional
//! context value:
//!
//! - two or more arguments: the first is the message, the second is the
//!   context (a date becomes `{ts}`, an error becomes `{err}`); the rest are
//!   ignored;
//! - one argument: scalars and wide integers become the message, a date
//!   becomes `{ts}`, an error becomes `{err}`, anything else is the context;
//! - no arguments: nothing.
//!
//! When neither part carries anything the pair is replaced by an
//! `"Empty log message"` diagnostic whose error stack names the caller.

use crate::record::Message;
use crate::serialize::{iso8601, to_json};
use crate::value::{ErrorValue, LogValue, ObjectRef};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const EMPTY_MESSAGE: &str = "Empty log message";

/// Classification of a single call-site argument.
#[derive(Debug, Clone)]
pub enum LogArg {
    Scalar(Message),
    Date(DateTime<Utc>),
    Error(Arc<ErrorValue>),
    Context(LogValue),
    Empty,
}

impl From<LogValue> for LogArg {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::Bool(b) => LogArg::Scalar(Message::Bool(b)),
            LogValue::Int(i) => LogArg::Scalar(Message::Int(i)),
            LogValue::UInt(u) => LogArg::Scalar(Message::UInt(u)),
            LogValue::Float(f) => LogArg::Scalar(Message::Float(f)),
            LogValue::String(s) => LogArg::Scalar(Message::Text(s)),
            LogValue::BigInt(b) => LogArg::Scalar(Message::Text(b.to_string())),
            LogValue::Date(d) => LogArg::Date(d),
            LogValue::Error(e) => LogArg::Error(e),
            LogValue::Null | LogValue::Opaque(_) => LogArg::Empty,
            value @ (LogValue::Object(_) | LogValue::Array(_)) => LogArg::Context(value),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub message: Option<Message>,
    pub context: Option<LogValue>,
}

impl NormalizedInput {
    pub fn message_is_empty(&self) -> bool {
        self.message.as_ref().map_or(true, Message::is_blank)
    }

    pub fn context_is_empty(&self) -> bool {
        self.context.as_ref().map_or(true, is_empty_context)
    }
}

/// Resolve raw call-site arguments into a message/context pair.
#[track_caller]
pub fn normalize(args: Vec<LogValue>) -> NormalizedInput {
    let mut args = args.into_iter();
    let input = match (args.next(), args.next()) {
        (Some(first), Some(second)) => NormalizedInput {
            message: message_of(first),
            context: Some(wrap_context(second)),
        },
        (Some(only), None) => match LogArg::from(only) {
            LogArg::Scalar(message) => NormalizedInput {
                message: Some(message),
                context: None,
            },
            LogArg::Date(date) => NormalizedInput {
                message: None,
                context: Some(single("ts", LogValue::Date(date))),
            },
            LogArg::Error(err) => NormalizedInput {
                message: None,
                context: Some(single("err", LogValue::Error(err))),
            },
            LogArg::Context(value) => NormalizedInput {
                message: None,
                context: Some(value),
            },
            LogArg::Empty => NormalizedInput::default(),
        },
        (None, _) => NormalizedInput::default(),
    };

    if input.message_is_empty() && input.context_is_empty() {
        empty_message()
    } else {
        input
    }
}

/// Diagnostic replacing a call that carried nothing.
#[track_caller]
fn empty_message() -> NormalizedInput {
    NormalizedInput {
        message: Some(Message::Text(EMPTY_MESSAGE.to_string())),
        context: Some(single("err", ErrorValue::capture(EMPTY_MESSAGE).into())),
    }
}

fn message_of(value: LogValue) -> Option<Message> {
    match LogArg::from(value) {
        LogArg::Scalar(message) => Some(message),
        LogArg::Date(date) => Some(Message::Text(iso8601(&date))),
        LogArg::Error(err) => Some(Message::Text(err.message().to_string())),
        LogArg::Context(value) => to_json(&value).map(|json| Message::Text(json.to_string())),
        LogArg::Empty => None,
    }
}

fn wrap_context(value: LogValue) -> LogValue {
    match value {
        LogValue::Date(date) => single("ts", LogValue::Date(date)),
        LogValue::Error(err) => single("err", LogValue::Error(err)),
        other => other,
    }
}

fn single(key: &str, value: LogValue) -> LogValue {
    LogValue::Object([(key, value)].into_iter().collect::<ObjectRef>())
}

fn is_empty_context(value: &LogValue) -> bool {
    match value {
        LogValue::Null | LogValue::Opaque(_) => true,
        LogValue::Object(obj) => obj.is_empty(),
        LogValue::Array(arr) => arr.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object;
    use chrono::TimeZone;
    use num_bigint::BigInt;
    use serde_json::json;

    fn ctx_json(input: &NormalizedInput) -> serde_json::Value {
        input.context.as_ref().and_then(to_json).unwrap_or(serde_json::Value::Null)
    }

    #[test]
    fn single_scalars_become_the_message() {
        for (arg, expected) in [
            (LogValue::from("hello"), Message::Text("hello".into())),
            (LogValue::from(42), Message::Int(42)),
            (LogValue::from(1.5), Message::Float(1.5)),
            (LogValue::from(false), Message::Bool(false)),
        ] {
            let input = normalize(vec![arg]);
            assert_eq!(input.message, Some(expected));
            assert!(input.context.is_none());
        }
    }

    #[test]
    fn bigint_is_stringified_without_loss() {
        let huge: BigInt = "123456789012345678901234567890123456789012345678901234567890".parse().unwrap();
        let input = normalize(vec![LogValue::from(huge.clone())]);
        assert_eq!(input.message, Some(Message::Text(huge.to_string())));

        let input = normalize(vec![LogValue::from(u128::MAX)]);
        assert_eq!(input.message, Some(Message::Text("340282366920938463463374607431768211455".into())));
    }

    #[test]
    fn lone_date_and_error_are_wrapped() {
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let input = normalize(vec![LogValue::from(date)]);
        assert!(input.message.is_none());
        assert_eq!(ctx_json(&input), json!({"ts": "2020-01-02T03:04:05.000Z"}));

        let input = normalize(vec![ErrorValue::new("Error", "boom").into()]);
        assert!(input.message.is_none());
        assert_eq!(ctx_json(&input)["err"]["message"], "boom");
    }

    #[test]
    fn lone_object_is_the_context() {
        let input = normalize(vec![object! { "foo" => "bar" }]);
        assert!(input.message.is_none());
        assert_eq!(ctx_json(&input), json!({"foo": "bar"}));
    }

    #[test]
    fn second_argument_is_inspected() {
        let date = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let input = normalize(vec!["at".into(), date.into()]);
        assert_eq!(input.message, Some(Message::Text("at".into())));
        assert_eq!(ctx_json(&input), json!({"ts": "2021-06-01T00:00:00.000Z"}));

        let input = normalize(vec!["failed".into(), ErrorValue::new("IoError", "eof").into()]);
        assert_eq!(ctx_json(&input)["err"]["type"], "IoError");

        let input = normalize(vec!["m".into(), object! { "a" => 1 }, "ignored".into()]);
        assert_eq!(ctx_json(&input), json!({"a": 1}));
    }

    #[test]
    fn non_scalar_first_argument_is_rendered() {
        let input = normalize(vec![object! { "a" => 1 }, object! { "b" => 2 }]);
        assert_eq!(input.message, Some(Message::Text(r#"{"a":1}"#.into())));
    }

    #[test]
    fn nothing_usable_becomes_diagnostic() {
        for args in [
            vec![],
            vec![LogValue::from("   ")],
            vec![object! {}],
            vec![LogValue::Null],
            vec![LogValue::from(""), LogValue::Null],
        ] {
            let input = normalize(args);
            assert_eq!(input.message, Some(Message::Text(EMPTY_MESSAGE.into())));
            let ctx = ctx_json(&input);
            assert_eq!(ctx["err"]["message"], EMPTY_MESSAGE);
            assert!(ctx["err"]["stack"].as_str().unwrap().contains("normalize.rs"));
        }
    }

    #[test]
    fn blank_message_with_context_is_kept() {
        let input = normalize(vec!["".into(), object! { "a" => 1 }]);
        assert_eq!(input.message, Some(Message::Text(String::new())));
        assert_eq!(ctx_json(&input), json!({"a": 1}));
    }
}
