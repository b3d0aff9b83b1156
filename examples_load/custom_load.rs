use std::time::Instant;
use tracing::error;

use normlog::init::{init_tracing_with_config, BridgeConfig};
use normlog::{initialize, Destination, LoggerConfig, SinkOptions, SinkSetting};

#[tokio::main]
async fn main() {
    let path = std::env::temp_dir().join("normlog-custom-load.ndjson");
    let config = LoggerConfig {
        machine: SinkSetting::Options(SinkOptions {
            level: None,
            destination: Some(Destination::File(path.clone())),
        }),
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval_ms: 200,
        ..LoggerConfig::default()
    };
    let logger = initialize(config).expect("initialize logger");

    init_tracing_with_config(&logger, BridgeConfig { diagnostics_to_stderr: true })
        .expect("install tracing bridge");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().await;
    println!("{:?}, output in {}", logger.stats(), path.display());
}
