use chrono::{TimeZone, Utc};
use normlog::{
    context, error, info, initialize, object, warn, ContextStore, ErrorValue, LogRecord, LogValue, Logger,
    LoggerConfig, LoggerError, Message, NormalizingLayer, ObjectRef, RedactConfig, Severity, SinkSetting,
    DEFAULT_MAX_SIZE, EMPTY_MESSAGE,
};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn capture(config: LoggerConfig) -> (Logger, Arc<Mutex<Vec<LogRecord>>>) {
    let logger = initialize(config).expect("init logger");
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    logger
        .on_message(move |record| sink.lock().unwrap().push(record.clone()))
        .expect("test sink enabled");
    (logger, records)
}

fn last(records: &Arc<Mutex<Vec<LogRecord>>>) -> LogRecord {
    records.lock().unwrap().last().cloned().expect("a record")
}

#[test]
fn message_with_context() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    info!(logger, "Some message", object! { "foo" => "bar" });

    let record = last(&records);
    assert_eq!(record.severity, Severity::Info);
    assert_eq!(record.level, 30);
    assert_eq!(record.message, Some(Message::Text("Some message".into())));
    assert_eq!(record.ctx_value(), json!({"foo": "bar"}));
    assert!(record.time > 0);
}

#[test]
fn each_record_reaches_subscriber_once() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    info!(logger, "one");
    warn!(logger, "two");
    assert_eq!(records.lock().unwrap().len(), 2);
}

#[test]
fn ambient_context_merges_under_explicit() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    logger
        .store()
        .sync_scope(context! { "tracer" => 123, "foo" => "baz" }, || {
            info!(logger, "merged", object! { "foo" => "bar" });
        });

    assert_eq!(last(&records).ctx_value(), json!({"tracer": 123, "foo": "bar"}));

    info!(logger, "outside");
    assert_eq!(last(&records).ctx_value(), json!({}));
}

#[test]
fn identical_ambient_and_explicit_keys() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    logger.store().sync_scope(context! { "a" => 1 }, || {
        info!(logger, object! { "a" => 1 });
    });
    assert_eq!(last(&records).ctx_value(), json!({"a": 1}));
}

#[test]
fn injected_store_is_shared() {
    let store = ContextStore::new();
    let (logger, records) = capture(LoggerConfig {
        store: Some(store.clone()),
        ..LoggerConfig::for_tests()
    });

    store.sync_scope(context! { "request" => "r-1" }, || info!(logger, "handled"));
    assert_eq!(last(&records).ctx_value(), json!({"request": "r-1"}));
}

#[test]
fn empty_calls_report_the_call_site() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    info!(logger);
    error!(logger, "   ");
    info!(logger, object! {});

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 3);
    for record in records.iter() {
        assert_eq!(record.message, Some(Message::Text(EMPTY_MESSAGE.into())));
        let ctx = record.ctx_value();
        assert_eq!(ctx["err"]["message"], EMPTY_MESSAGE);
        assert_eq!(ctx["err"]["type"], "Error");
        let stack = ctx["err"]["stack"].as_str().expect("stack");
        assert!(stack.contains("tests/pipeline.rs"), "{stack}");
    }
    assert_eq!(records[1].severity, Severity::Error);
}

#[test]
fn errors_land_under_err() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");

    error!(logger, LogValue::error(&io));
    let ctx = last(&records).ctx_value();
    assert_eq!(ctx["err"]["type"], "Error");
    assert_eq!(ctx["err"]["message"], "config missing");
    assert!(ctx["err"]["stack"].as_str().unwrap().contains("tests/pipeline.rs"));

    let custom = ErrorValue::new("QueryError", "timeout").with_property("query", "select 1");
    error!(logger, "db failed", custom.clone());
    let record = last(&records);
    assert_eq!(record.message, Some(Message::Text("db failed".into())));
    let ctx = record.ctx_value();
    assert_eq!(ctx["err"]["type"], "QueryError");
    assert_eq!(ctx["err"]["query"], "select 1");

    error!(logger, "wrapped", object! { "error" => custom });
    assert_eq!(last(&records).ctx_value()["err"]["type"], "QueryError");
}

#[test]
fn dates_become_iso_strings_everywhere() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    let date = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();

    info!(logger, date);
    assert_eq!(last(&records).ctx_value(), json!({"ts": "2023-11-14T22:13:20.000Z"}));

    info!(logger, "at", date);
    assert_eq!(last(&records).ctx_value(), json!({"ts": "2023-11-14T22:13:20.000Z"}));

    info!(logger, "nested", object! { "job" => object! { "started" => date } });
    assert_eq!(
        last(&records).ctx_value(),
        json!({"job": {"started": "2023-11-14T22:13:20.000Z"}})
    );
}

#[test]
fn scalars_and_bigints_as_message() {
    let (logger, records) = capture(LoggerConfig::for_tests());

    info!(logger, 42);
    assert_eq!(last(&records).message, Some(Message::Int(42)));
    info!(logger, true);
    assert_eq!(last(&records).message, Some(Message::Bool(true)));

    let big: num_bigint::BigInt = "9007199254740993123456789".parse().unwrap();
    info!(logger, big);
    let record = last(&records);
    assert_eq!(record.message, Some(Message::Text("9007199254740993123456789".into())));
    assert_eq!(record.ctx_value(), json!({}));
}

#[test]
fn cycles_and_functions_in_context() {
    let (logger, records) = capture(LoggerConfig::for_tests());

    let obj = ObjectRef::new();
    obj.insert("id", 1);
    obj.insert("parent", obj.clone());
    info!(logger, "cyclic", obj);
    assert_eq!(last(&records).ctx_value(), json!({"id": 1, "parent": "[Circular]"}));

    info!(logger, "fn", object! { "foo" => "bar", "callback" => LogValue::Opaque("function") });
    assert_eq!(last(&records).ctx_value(), json!({"foo": "bar"}));
}

#[test]
fn baseline_redaction() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    let payload = json!({
        "users": [{"email": "a@b.c", "password": "x", "id": 1}],
        "err": {"res": {"req": {"headers": {"authorization": "t"}, "path": "/p"}}},
        "resp": {"headers": {"set-cookie": "c"}, "status": 401},
    });

    warn!(logger, "denied", LogValue::from(payload));
    assert_eq!(
        last(&records).ctx_value(),
        json!({
            "users": [{"email": "[Redacted]", "password": "[Redacted]", "id": 1}],
            "err": {"res": {"req": {"headers": "[Redacted]", "path": "/p"}}},
            "resp": {"headers": "[Redacted]", "status": 401},
        })
    );
}

#[test]
fn configured_redaction_paths() {
    let (logger, records) = capture(LoggerConfig {
        redact: RedactConfig {
            paths: vec!["ctx.card.number".into(), "ctx.tokens[*]".into()],
            censor: "***".into(),
        },
        ..LoggerConfig::for_tests()
    });

    info!(
        logger,
        "paid",
        object! {
            "card" => object! { "number" => "4111", "brand" => "visa" },
            "tokens" => vec!["a", "b"],
            "password" => "pw",
        }
    );
    assert_eq!(
        last(&records).ctx_value(),
        json!({"card": {"number": "***", "brand": "visa"}, "tokens": ["***", "***"], "password": "***"})
    );
}

#[test]
fn oversize_records_are_replaced() {
    let (logger, records) = capture(LoggerConfig {
        max_size: Some(2_000),
        ..LoggerConfig::for_tests()
    });

    info!(logger, "huge", object! { "blob" => "z".repeat(20_000) });
    let record = last(&records);
    let text = record.message.as_ref().and_then(Message::as_str).unwrap().to_string();
    assert!(text.starts_with("Log record size of 20,"), "{text}");
    assert!(text.ends_with("bytes exceeds maximum of 2,000 bytes"), "{text}");
    assert_eq!(record.ctx_value()["err"]["message"], text.as_str());
    assert!(record.to_json_line().unwrap().len() < 2_000);
}

#[test]
fn severity_filter_on_test_sink() {
    let (logger, records) = capture(LoggerConfig {
        test: SinkSetting::from(Severity::Warn),
        ..LoggerConfig::default()
    });
    info!(logger, "dropped");
    warn!(logger, "kept");

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, Some(Message::Text("kept".into())));
}

#[test]
fn on_message_requires_test_sink() {
    let logger = initialize(LoggerConfig::default()).unwrap();
    assert_eq!(logger.on_message(|_| {}), Err(LoggerError::TestSinkDisabled));
}

#[tokio::test]
async fn empty_call_in_spawned_task_fits_default_ceiling() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    assert_eq!(logger.max_size(), Some(DEFAULT_MAX_SIZE));

    let task_logger = logger.clone();
    tokio::spawn(async move { info!(task_logger) }).await.unwrap();

    let record = last(&records);
    assert_eq!(record.message, Some(Message::Text(EMPTY_MESSAGE.into())));
    let stack = record.ctx_value()["err"]["stack"].as_str().unwrap().to_string();
    assert!(stack.contains("tests/pipeline.rs"), "{stack}");
    assert!(record.to_json_line().unwrap().len() <= DEFAULT_MAX_SIZE);
}

#[test]
fn ambient_value_aliasing_explicit_context() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    let user = ObjectRef::new();
    user.insert("id", 7);

    logger.store().sync_scope(context! { "user" => user.clone() }, || {
        info!(logger, "m", user.clone());
    });
    assert_eq!(last(&records).ctx_value(), json!({"id": 7, "user": {"id": 7}}));
}

#[test]
fn serializable_structs_as_context() {
    #[derive(Serialize)]
    struct Login {
        user: &'static str,
        password: &'static str,
        attempts: u32,
    }

    let (logger, records) = capture(LoggerConfig::for_tests());
    let login = Login {
        user: "ann",
        password: "hunter2",
        attempts: 3,
    };
    warn!(logger, "login failed", LogValue::from_serialize(&login));
    assert_eq!(
        last(&records).ctx_value(),
        json!({"user": "ann", "password": "[Redacted]", "attempts": 3})
    );
}

#[test]
fn empty_tracing_event_reports_its_own_line() {
    let (logger, records) = capture(LoggerConfig::for_tests());
    let subscriber = tracing_subscriber::registry().with(NormalizingLayer::new(logger.clone()));

    let line = tracing::subscriber::with_default(subscriber, || {
        let line = line!() + 1;
        tracing::info!("  ");
        line
    });

    let record = last(&records);
    assert_eq!(record.message, Some(Message::Text(EMPTY_MESSAGE.into())));
    let stack = record.ctx_value()["err"]["stack"].as_str().unwrap().to_string();
    assert_eq!(stack, format!("Error: {EMPTY_MESSAGE}\n    at tests/pipeline.rs:{line}"));
}
