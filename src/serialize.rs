//! Depth-first conversion of [`LogValue`] graphs into owned JSON.
//!
//! The traversal keeps the identities of the objects and arrays on the
//! current path. Re-entering one of them yields [`CIRCULAR`] instead of
//! recursing. Opaque values are dropped from objects and become `null`
//! inside arrays so positions are preserved.

use crate::value::{ContextMap, ErrorValue, LogValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

/// Marker written where a reference cycle closes.
pub const CIRCULAR: &str = "[Circular]";

/// Serialize a single value. `None` means the value has no representation.
pub fn to_json(value: &LogValue) -> Option<Value> {
    Traversal::default().value(value)
}

/// Serialize a context mapping into a JSON object.
///
/// `root` is the identity of the object the mapping was copied from, if any,
/// so a member pointing back at it is reported as circular right away.
pub fn context_to_json(map: &ContextMap, root: Option<usize>) -> Map<String, Value> {
    let mut traversal = Traversal::default();
    if let Some(id) = root {
        traversal.path.insert(id);
    }
    traversal.entries(map)
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn iso8601(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Default)]
struct Traversal {
    path: HashSet<usize>,
}

impl Traversal {
    fn value(&mut self, value: &LogValue) -> Option<Value> {
        let json = match value {
            LogValue::Null => Value::Null,
            LogValue::Bool(b) => Value::Bool(*b),
            LogValue::Int(i) => Value::from(*i),
            LogValue::UInt(u) => Value::from(*u),
            LogValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            LogValue::BigInt(b) => Value::String(b.to_string()),
            LogValue::String(s) => Value::String(s.clone()),
            LogValue::Date(d) => Value::String(iso8601(d)),
            LogValue::Error(err) => Value::Object(self.error(err)),
            LogValue::Object(obj) => {
                let id = obj.id();
                if !self.path.insert(id) {
                    return Some(Value::String(CIRCULAR.to_string()));
                }
                // Snapshot before descending so no lock is held across recursion.
                let entries = obj.snapshot();
                let json = Value::Object(self.entries(&entries));
                self.path.remove(&id);
                json
            }
            LogValue::Array(arr) => {
                let id = arr.id();
                if !self.path.insert(id) {
                    return Some(Value::String(CIRCULAR.to_string()));
                }
                let items = arr
                    .snapshot()
                    .iter()
                    .map(|item| self.value(item).unwrap_or(Value::Null))
                    .collect();
                self.path.remove(&id);
                Value::Array(items)
            }
            LogValue::Opaque(_) => return None,
        };
        Some(json)
    }

    fn entries(&mut self, map: &ContextMap) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in map {
            if let Some(json) = self.value(value) {
                out.insert(key.clone(), json);
            }
        }
        out
    }

    fn error(&mut self, err: &ErrorValue) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("type".to_string(), Value::String(err.type_name().to_string()));
        out.insert("message".to_string(), Value::String(err.message().to_string()));
        if !err.stack().is_empty() {
            out.insert("stack".to_string(), Value::String(err.stack().to_string()));
        }
        out.extend(self.entries(err.properties()));
        if let Some(cause) = err.cause() {
            out.insert("cause".to_string(), Value::Object(self.error(cause)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ArrayRef, ObjectRef};
    use crate::{context, object};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn self_reference_becomes_marker() {
        let obj = ObjectRef::new();
        obj.insert("name", "loop");
        obj.insert("me", obj.clone());

        let json = to_json(&LogValue::Object(obj)).expect("object");
        assert_eq!(json, json!({"name": "loop", "me": "[Circular]"}));
    }

    #[test]
    fn indirect_cycle_through_array_terminates() {
        let obj = ObjectRef::new();
        let arr = ArrayRef::new();
        arr.push(obj.clone());
        obj.insert("items", arr);

        let json = to_json(&LogValue::Object(obj)).expect("object");
        assert_eq!(json, json!({"items": ["[Circular]"]}));
    }

    #[test]
    fn shared_but_acyclic_nodes_are_not_circular() {
        let shared = object! { "x" => 1 };
        let outer = object! { "a" => shared.clone(), "b" => shared };

        let json = to_json(&outer).expect("object");
        assert_eq!(json, json!({"a": {"x": 1}, "b": {"x": 1}}));
    }

    #[test]
    fn root_identity_marks_direct_back_reference() {
        let obj = ObjectRef::new();
        obj.insert("me", obj.clone());

        let json = context_to_json(&obj.snapshot(), Some(obj.id()));
        assert_eq!(Value::Object(json), json!({"me": "[Circular]"}));
    }

    #[test]
    fn opaque_members_are_omitted_and_array_slots_nulled() {
        let value = object! {
            "foo" => "bar",
            "fn" => LogValue::Opaque("function"),
            "list" => vec![LogValue::from(1), LogValue::Opaque("symbol")],
        };

        let json = to_json(&value).expect("object");
        assert_eq!(json, json!({"foo": "bar", "list": [1, null]}));
    }

    #[test]
    fn dates_bigints_and_floats() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let map = context! {
            "at" => date,
            "big" => 123_456_789_012_345_678_901_234_567_890_u128,
            "nan" => f64::NAN,
        };

        let json = context_to_json(&map, None);
        assert_eq!(
            Value::Object(json),
            json!({
                "at": "2024-03-01T12:30:00.000Z",
                "big": "123456789012345678901234567890",
                "nan": null,
            })
        );
    }

    #[test]
    fn errors_carry_type_message_stack_and_properties() {
        let err = ErrorValue::new("TimeoutError", "took too long")
            .with_property("code", "ETIMEDOUT")
            .with_property("attempts", 3);

        let json = to_json(&LogValue::from(err)).expect("error");
        assert_eq!(json["type"], "TimeoutError");
        assert_eq!(json["message"], "took too long");
        assert_eq!(json["code"], "ETIMEDOUT");
        assert_eq!(json["attempts"], 3);
        assert!(json["stack"].as_str().unwrap().starts_with("TimeoutError: took too long"));
    }
}
