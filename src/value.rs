//! Loosely-typed values accepted at logging call sites.
//!
//! [`LogValue`] mirrors what a caller might hand to a logger: scalars, wide
//! integers, dates, errors, nested objects and arrays, and values that have
//! no serialized form at all. Objects and arrays are shared, interior-mutable
//! nodes so a graph may legally contain cycles; the serializer detects them
//! by node identity.

use chrono::{DateTime, FixedOffset, Utc};
use num_bigint::BigInt;
use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

/// Key/value mapping used for ambient and explicit context.
pub type ContextMap = BTreeMap<String, LogValue>;

#[derive(Clone, Debug)]
pub enum LogValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Arbitrary-precision integer; never narrowed to a float.
    BigInt(BigInt),
    String(String),
    Date(DateTime<Utc>),
    Error(Arc<ErrorValue>),
    Object(ObjectRef),
    Array(ArrayRef),
    /// A value with no serialized form (callback, handle, symbol...). The
    /// payload names its kind for debugging only.
    Opaque(&'static str),
}

impl LogValue {
    /// Wrap any `std::error::Error`, capturing the caller's location.
    #[track_caller]
    pub fn error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        LogValue::Error(Arc::new(ErrorValue::from_error(err)))
    }

    /// Convert through `serde`. Values whose `Serialize` impl fails become
    /// [`LogValue::Opaque`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => LogValue::from(json),
            Err(_) => LogValue::Opaque("unserializable"),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LogValue::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            LogValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Shared, identity-bearing object node.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<ContextMap>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<LogValue>) -> Option<LogValue> {
        self.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<LogValue> {
        self.write().remove(key)
    }

    pub fn get(&self, key: &str) -> Option<LogValue> {
        self.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current entries. Children stay shared.
    pub fn snapshot(&self) -> ContextMap {
        self.read().clone()
    }

    /// Identity of the node, stable for its lifetime.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, ContextMap> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextMap> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ObjectRef {
    // Never recurse: the node may be part of a cycle.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("keys", &self.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K: Into<String>> FromIterator<(K, LogValue)> for ObjectRef {
    fn from_iter<I: IntoIterator<Item = (K, LogValue)>>(iter: I) -> Self {
        let map: ContextMap = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        ObjectRef(Arc::new(RwLock::new(map)))
    }
}

/// Shared, identity-bearing array node.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<LogValue>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<LogValue>) {
        self.write().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<LogValue> {
        self.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<LogValue> {
        self.read().clone()
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LogValue>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<LogValue>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("len", &self.len())
            .finish()
    }
}

impl FromIterator<LogValue> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = LogValue>>(iter: I) -> Self {
        ArrayRef(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

/// Captured error: constructor-like type name, message, stack text and any
/// extra properties the caller attached.
#[derive(Debug, Clone)]
pub struct ErrorValue {
    type_name: String,
    message: String,
    stack: String,
    properties: ContextMap,
    cause: Option<Arc<ErrorValue>>,
}

impl ErrorValue {
    /// New error whose stack starts at the caller's location. A backtrace is
    /// appended when `RUST_BACKTRACE` enables capture.
    #[track_caller]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let message = message.into();
        let stack = render_stack(&type_name, &message, Location::caller(), Backtrace::capture());
        ErrorValue {
            type_name,
            message,
            stack,
            properties: ContextMap::new(),
            cause: None,
        }
    }

    /// Plain `Error` with a backtrace captured unconditionally.
    #[track_caller]
    pub fn capture(message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = render_stack("Error", &message, Location::caller(), Backtrace::force_capture());
        ErrorValue {
            type_name: "Error".to_string(),
            message,
            stack,
            properties: ContextMap::new(),
            cause: None,
        }
    }

    /// Same as [`ErrorValue::capture`] but with only the call-site line as
    /// stack, for diagnostics that must stay small.
    #[track_caller]
    pub fn located(message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = render_stack("Error", &message, Location::caller(), Backtrace::disabled());
        ErrorValue {
            type_name: "Error".to_string(),
            message,
            stack,
            properties: ContextMap::new(),
            cause: None,
        }
    }

    /// Plain `Error` whose stack is a single source line, for events that
    /// carry their origin as data rather than as a caller location.
    pub fn at(message: impl Into<String>, file: &str, line: u32) -> Self {
        let message = message.into();
        ErrorValue {
            type_name: "Error".to_string(),
            stack: format!("Error: {message}\n    at {file}:{line}"),
            message,
            properties: ContextMap::new(),
            cause: None,
        }
    }

    #[track_caller]
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut value = ErrorValue::new(short_type_name(std::any::type_name::<E>()), err.to_string());
        value.cause = err.source().map(|source| Arc::new(cause_chain(source)));
        value
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<LogValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn properties(&self) -> &ContextMap {
        &self.properties
    }

    pub fn cause(&self) -> Option<&ErrorValue> {
        self.cause.as_deref()
    }
}

fn cause_chain(err: &(dyn std::error::Error + 'static)) -> ErrorValue {
    ErrorValue {
        type_name: "Error".to_string(),
        message: err.to_string(),
        stack: String::new(),
        properties: ContextMap::new(),
        cause: err.source().map(|source| Arc::new(cause_chain(source))),
    }
}

/// Upper bound on the backtrace text appended after the call-site line.
const MAX_BACKTRACE_LEN: usize = 4_096;

fn render_stack(type_name: &str, message: &str, location: &Location<'_>, backtrace: Backtrace) -> String {
    let mut stack = format!(
        "{type_name}: {message}\n    at {}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    );
    if backtrace.status() == BacktraceStatus::Captured {
        let text = backtrace.to_string();
        stack.push('\n');
        stack.push_str(truncate_lines(&text, MAX_BACKTRACE_LEN));
    }
    stack
}

/// Longest prefix of `text` ending on a line break and not longer than `max`.
fn truncate_lines(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let cut = text
        .match_indices('\n')
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    &text[..cut]
}

/// `std::io::error::Error` -> `Error`, `app::Wrapper<x::Y>` -> `Wrapper`.
fn short_type_name(full: &str) -> String {
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let full = full.split(" +").next().unwrap_or(full);
    let full = full.split('<').next().unwrap_or(full);
    full.rsplit("::").next().unwrap_or(full).to_string()
}

macro_rules! from_via {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(impl From<$source> for LogValue {
            fn from(value: $source) -> Self {
                LogValue::$variant(<$target>::from(value))
            }
        })+
    };
}

from_via!(Bool, bool, bool);
from_via!(Int, i64, i8, i16, i32, i64);
from_via!(UInt, u64, u8, u16, u32, u64);
from_via!(Float, f64, f32, f64);
from_via!(BigInt, BigInt, i128, u128, BigInt);
from_via!(String, String, &str, String, &String, char);

impl From<isize> for LogValue {
    fn from(value: isize) -> Self {
        LogValue::Int(value as i64)
    }
}

impl From<usize> for LogValue {
    fn from(value: usize) -> Self {
        LogValue::UInt(value as u64)
    }
}

impl From<DateTime<Utc>> for LogValue {
    fn from(value: DateTime<Utc>) -> Self {
        LogValue::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for LogValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        LogValue::Date(value.with_timezone(&Utc))
    }
}

impl From<SystemTime> for LogValue {
    fn from(value: SystemTime) -> Self {
        LogValue::Date(DateTime::<Utc>::from(value))
    }
}

impl From<ErrorValue> for LogValue {
    fn from(value: ErrorValue) -> Self {
        LogValue::Error(Arc::new(value))
    }
}

impl From<Arc<ErrorValue>> for LogValue {
    fn from(value: Arc<ErrorValue>) -> Self {
        LogValue::Error(value)
    }
}

impl From<ObjectRef> for LogValue {
    fn from(value: ObjectRef) -> Self {
        LogValue::Object(value)
    }
}

impl From<ArrayRef> for LogValue {
    fn from(value: ArrayRef) -> Self {
        LogValue::Array(value)
    }
}

impl From<ContextMap> for LogValue {
    fn from(value: ContextMap) -> Self {
        LogValue::Object(value.into_iter().collect())
    }
}

impl<T: Into<LogValue>> From<Vec<T>> for LogValue {
    fn from(value: Vec<T>) -> Self {
        LogValue::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(LogValue::Null)
    }
}

impl From<serde_json::Value> for LogValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => LogValue::Null,
            Value::Bool(b) => LogValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    LogValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    LogValue::UInt(u)
                } else {
                    LogValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => LogValue::String(s),
            Value::Array(items) => LogValue::Array(items.into_iter().map(LogValue::from).collect()),
            Value::Object(map) => {
                LogValue::Object(map.into_iter().map(|(k, v)| (k, LogValue::from(v))).collect())
            }
        }
    }
}

/// Build a [`LogValue::Object`] from `key => value` pairs.
#[macro_export]
macro_rules! object {
    () => {
        $crate::LogValue::Object($crate::ObjectRef::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::LogValue::Object(
            [$(($key, $crate::LogValue::from($value))),+]
                .into_iter()
                .collect::<$crate::ObjectRef>(),
        )
    };
}

/// Build a [`ContextMap`] from `key => value` pairs.
#[macro_export]
macro_rules! context {
    () => {
        $crate::ContextMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        [$((::std::string::String::from($key), $crate::LogValue::from($value))),+]
            .into_iter()
            .collect::<$crate::ContextMap>()
    };
}
