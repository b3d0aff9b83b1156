//! Declarative field redaction.
//!
//! Paths are rooted at the record, so explicit fields live under `ctx`:
//!
//! - `ctx.user.ssn` - a plain key path
//! - `ctx.items[*].token`, `ctx.items.*.token` - any element or key
//! - `ctx.items[0]`, `ctx["odd.key"]` - an index, a quoted key
//! - `**.password` - `**` matches zero or more levels
//!
//! Only fields that exist are replaced; siblings are left untouched.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Replacement written over redacted fields.
pub const DEFAULT_CENSOR: &str = "[Redacted]";

/// Always-on paths: common secrets anywhere, and header blocks of any
/// request/response object including those wrapped in `err`/`res`/`resp`.
pub const BASELINE_PATHS: &[&str] = &[
    "**.password",
    "**.email",
    "**.req.headers",
    "**.res.headers",
    "**.resp.headers",
    "**.request.headers",
    "**.response.headers",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RedactError {
    #[error("empty redaction path")]
    Empty,

    #[error("invalid redaction path {path:?}: {reason}")]
    Invalid { path: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Any,
    Deep,
}

/// A parsed redaction path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactPath {
    raw: String,
    segments: Vec<Segment>,
}

impl RedactPath {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RedactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for RedactPath {
    type Err = RedactError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let path = path.trim();
        if path.is_empty() {
            return Err(RedactError::Empty);
        }
        let invalid = |reason| RedactError::Invalid {
            path: path.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut after_bracket = false;
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if current.is_empty() && !after_bracket {
                        return Err(invalid("empty segment"));
                    }
                    if !current.is_empty() {
                        segments.push(word(&current));
                        current.clear();
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(word(&current));
                        current.clear();
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(invalid("unclosed `[`"));
                    }
                    segments.push(bracket(inner.trim()).ok_or_else(|| invalid("bad bracket segment"))?);
                    after_bracket = true;
                }
                ']' => return Err(invalid("unexpected `]`")),
                c => {
                    if after_bracket {
                        return Err(invalid("expected `.` or `[` after `]`"));
                    }
                    current.push(c);
                }
            }
        }

        if !current.is_empty() {
            segments.push(word(&current));
        } else if !after_bracket {
            return Err(invalid("empty segment"));
        }
        if segments.last() == Some(&Segment::Deep) {
            return Err(invalid("`**` cannot end a path"));
        }

        Ok(RedactPath {
            raw: path.to_string(),
            segments,
        })
    }
}

fn word(text: &str) -> Segment {
    match text {
        "*" => Segment::Any,
        "**" => Segment::Deep,
        key => Segment::Key(key.to_string()),
    }
}

fn bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Any);
    }
    if let Ok(index) = inner.parse::<usize>() {
        return Some(Segment::Index(index));
    }
    let quoted = (inner.starts_with('"') && inner.ends_with('"'))
        || (inner.starts_with('\'') && inner.ends_with('\''));
    if quoted && inner.len() >= 2 {
        return Some(Segment::Key(inner[1..inner.len() - 1].to_string()));
    }
    None
}

/// Compiled set of redaction paths plus the censor value.
#[derive(Debug, Clone)]
pub struct Redactor {
    paths: Vec<RedactPath>,
    censor: Value,
}

impl Default for Redactor {
    fn default() -> Self {
        Redactor {
            paths: baseline(),
            censor: Value::String(DEFAULT_CENSOR.to_string()),
        }
    }
}

impl Redactor {
    /// Baseline paths merged with `extra`.
    pub fn new<I, S>(extra: I, censor: impl Into<String>) -> Result<Self, RedactError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths = baseline();
        for raw in extra {
            let path: RedactPath = raw.as_ref().parse()?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(Redactor {
            paths,
            censor: Value::String(censor.into()),
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(RedactPath::as_str)
    }

    /// Redact in place, treating `root` as the record root.
    pub fn apply(&self, root: &mut Value) {
        for path in &self.paths {
            redact(root, &path.segments, &self.censor);
        }
    }

    /// Redact a record's `ctx` object, addressed as `ctx.*` from the root.
    pub fn apply_ctx(&self, ctx: &mut Map<String, Value>) {
        let mut root = Map::new();
        root.insert("ctx".to_string(), Value::Object(std::mem::take(ctx)));
        let mut root = Value::Object(root);
        self.apply(&mut root);
        if let Value::Object(mut root) = root {
            if let Some(Value::Object(redacted)) = root.remove("ctx") {
                *ctx = redacted;
            }
        }
    }
}

fn baseline() -> Vec<RedactPath> {
    BASELINE_PATHS
        .iter()
        .filter_map(|raw| raw.parse().ok())
        .collect()
}

fn redact(node: &mut Value, segments: &[Segment], censor: &Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match head {
        Segment::Deep => {
            redact(node, rest, censor);
            for_each_child(node, |child| redact(child, segments, censor));
        }
        Segment::Key(key) => {
            if let Value::Object(map) = node {
                if let Some(child) = map.get_mut(key) {
                    visit(child, rest, censor);
                }
            }
        }
        Segment::Index(index) => {
            if let Value::Array(items) = node {
                if let Some(child) = items.get_mut(*index) {
                    visit(child, rest, censor);
                }
            }
        }
        Segment::Any => for_each_child(node, |child| visit(child, rest, censor)),
    }
}

fn visit(child: &mut Value, rest: &[Segment], censor: &Value) {
    if rest.is_empty() {
        *child = censor.clone();
    } else {
        redact(child, rest, censor);
    }
}

fn for_each_child(node: &mut Value, mut f: impl FnMut(&mut Value)) {
    match node {
        Value::Object(map) => map.values_mut().for_each(&mut f),
        Value::Array(items) => items.iter_mut().for_each(&mut f),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn redacted(value: Value) -> Value {
        let mut root = json!({ "ctx": value });
        Redactor::default().apply(&mut root);
        root["ctx"].take()
    }

    #[test]
    fn baseline_secrets_at_any_depth() {
        let out = redacted(json!({
            "password": "hunter2",
            "user": {"email": "a@b.c", "name": "ann"},
            "users": [{"email": "x@y.z", "id": 1}, {"id": 2}],
        }));
        assert_eq!(
            out,
            json!({
                "password": "[Redacted]",
                "user": {"email": "[Redacted]", "name": "ann"},
                "users": [{"email": "[Redacted]", "id": 1}, {"id": 2}],
            })
        );
    }

    #[test]
    fn header_blocks_under_wrappers() {
        let out = redacted(json!({
            "req": {"method": "GET", "headers": {"authorization": "secret"}},
            "res": {"statusCode": 500, "headers": {"set-cookie": "c"}},
            "err": {"res": {"req": {"headers": {"cookie": "c"}, "url": "/x"}}},
            "resp": {"headers": {}},
            "headers": {"kept": true},
        }));
        assert_eq!(out["req"], json!({"method": "GET", "headers": "[Redacted]"}));
        assert_eq!(out["res"], json!({"statusCode": 500, "headers": "[Redacted]"}));
        assert_eq!(out["err"]["res"]["req"], json!({"headers": "[Redacted]", "url": "/x"}));
        assert_eq!(out["resp"]["headers"], "[Redacted]");
        assert_eq!(out["headers"], json!({"kept": true}));
    }

    #[test]
    fn missing_paths_are_not_created() {
        let out = redacted(json!({"foo": "bar"}));
        assert_eq!(out, json!({"foo": "bar"}));
    }

    #[test]
    fn custom_paths_with_indexes_and_wildcards() {
        let redactor = Redactor::new(["ctx.items[*].token", "ctx.list[1]", "ctx[\"odd.key\"]"], "***").unwrap();
        let mut root = json!({"ctx": {
            "items": [{"token": "a", "n": 1}, {"token": "b"}],
            "list": [1, 2, 3],
            "odd.key": "x",
        }});
        redactor.apply(&mut root);
        assert_eq!(
            root["ctx"],
            json!({
                "items": [{"token": "***", "n": 1}, {"token": "***"}],
                "list": [1, "***", 3],
                "odd.key": "***",
            })
        );
    }

    #[test]
    fn apply_ctx_round_trips_the_map() {
        let mut ctx = Map::new();
        ctx.insert("password".into(), json!("p"));
        ctx.insert("ok".into(), json!(1));
        Redactor::default().apply_ctx(&mut ctx);
        assert_eq!(Value::Object(ctx), json!({"password": "[Redacted]", "ok": 1}));
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", ".a", "a.", "a[", "a]b", "a[x]", "a[0]b", "a.**"] {
            assert!(bad.parse::<RedactPath>().is_err(), "{bad:?} should be rejected");
        }
        assert!("a[0].b".parse::<RedactPath>().is_ok());
    }
}
