use std::time::Duration;

use normlog::{context, info, initialize, object, warn, LoggerConfig, SinkSetting};

/// Concurrent "requests" each carry their own ambient context; every
/// record they log picks it up without passing it around.
#[tokio::main]
async fn main() {
    let logger = initialize(LoggerConfig {
        human: SinkSetting::Enabled(true),
        sync: true,
        ..LoggerConfig::default()
    })
    .expect("initialize logger");

    let mut handles = Vec::new();
    for request_id in ["req-1", "req-2", "req-3"] {
        let logger = logger.clone();
        let store = logger.store().clone();
        handles.push(tokio::spawn(store.scope(context! { "request_id" => request_id }, async move {
            info!(logger, "request started");
            tokio::time::sleep(Duration::from_millis(10)).await;
            warn!(
                logger,
                "login attempt",
                object! { "user" => "ann", "password" => "hunter2" }
            );
            info!(logger, "request finished", object! { "status" => 200 });
        })));
    }
    for handle in handles {
        let _ = handle.await;
    }

    // Degenerate call: reported with the location of this line.
    info!(logger);
}
