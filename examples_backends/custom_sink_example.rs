use std::sync::Arc;

use normlog::{error, initialize_with_sinks, ErrorValue, LogRecord, LogSink, LoggerConfig, Severity, SinkEntry, SinkError};

/// Example of plugging in a completely custom output by implementing the
/// `LogSink` trait directly. Imagine this talks to some proprietary store
/// for which this crate does not provide a built-in sink.
struct MyCustomDbSink;

impl LogSink for MyCustomDbSink {
    fn name(&self) -> &str {
        "my-custom-db"
    }

    fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the record.
        println!("[my-custom-db] {}", record.to_json_line()?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let logger = initialize_with_sinks(LoggerConfig::default(), vec![SinkEntry::new(sink, Severity::Info)])
        .expect("initialize logger");

    error!(
        logger,
        "simulated error sent via custom sink",
        ErrorValue::new("DbError", "connection reset")
    );

    logger.flush().await;
}
