use std::time::Instant;

use normlog::{info, initialize, object, Destination, LoggerConfig, SinkOptions, SinkSetting};

#[tokio::main]
async fn main() {
    let path = std::env::temp_dir().join("normlog-default-load.ndjson");
    let config = LoggerConfig {
        machine: SinkSetting::Options(SinkOptions {
            level: None,
            destination: Some(Destination::File(path.clone())),
        }),
        ..LoggerConfig::default()
    };
    let logger = initialize(config).expect("initialize logger");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        info!(logger, "default load test", object! { "iteration" => i });
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().await;
    println!("{:?}, output in {}", logger.stats(), path.display());
}
