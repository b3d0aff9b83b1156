use crate::record::LogRecord;
use crate::severity::Severity;
use crate::sink::LogSink;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// A sink together with the lowest severity it accepts.
#[derive(Clone)]
pub struct SinkEntry {
    pub sink: Arc<dyn LogSink>,
    pub level: Severity,
}

impl SinkEntry {
    pub fn new(sink: Arc<dyn LogSink>, level: Severity) -> Self {
        SinkEntry { sink, level }
    }

    fn accepts(&self, record: &LogRecord) -> bool {
        record.severity >= self.level
    }
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Records handed to the dispatcher.
    pub total: u64,
    /// Records queued for the background task (asynchronous mode only).
    pub enqueued: u64,
    /// Records dropped because the queue was full.
    pub dropped: u64,
    /// Sink writes abandoned after failing.
    pub failed: u64,
}

enum Command {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
}

enum Mode {
    Sync,
    Async {
        sender: mpsc::Sender<Command>,
        _handle: JoinHandle<()>,
    },
}

/// Routes assembled records to every sink whose level admits them.
///
/// In synchronous mode records are written and flushed on the calling
/// thread. Otherwise they go through a bounded channel to a background task
/// that writes in batches, retries failed writes with backoff and flushes
/// at least every `flush_interval`. Application threads never wait on sink
/// I/O in that mode; when the channel is full the record is dropped.
pub struct Dispatcher {
    sinks: Arc<[SinkEntry]>,
    mode: Mode,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn sync(sinks: Vec<SinkEntry>) -> Self {
        Dispatcher {
            sinks: sinks.into(),
            mode: Mode::Sync,
            counters: Arc::default(),
        }
    }

    /// Spawn the background writer on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn(sinks: Vec<SinkEntry>, buffer: usize, batch_size: usize, flush_interval: Duration) -> Self {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let sinks: Arc<[SinkEntry]> = sinks.into();
        let counters = Arc::<Counters>::default();
        let (tx, rx) = mpsc::channel(buffer);

        let handle = tokio::spawn(run(
            Arc::clone(&sinks),
            rx,
            batch_size,
            flush_interval,
            Arc::clone(&counters),
        ));

        Dispatcher {
            sinks,
            mode: Mode::Async {
                sender: tx,
                _handle: handle,
            },
            counters,
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.mode, Mode::Sync)
    }

    /// Lowest level any sink accepts, `None` without sinks.
    pub fn min_level(&self) -> Option<Severity> {
        self.sinks.iter().map(|entry| entry.level).min()
    }

    pub fn dispatch(&self, record: LogRecord) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        if !self.sinks.iter().any(|entry| entry.accepts(&record)) {
            return;
        }

        match &self.mode {
            Mode::Sync => {
                for entry in self.sinks.iter().filter(|entry| entry.accepts(&record)) {
                    let written = entry.sink.send(&record).and_then(|()| entry.sink.flush());
                    if let Err(e) = written {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            target: "normlog::dispatch",
                            sink = entry.sink.name(),
                            error = %e,
                            "log sink write failed"
                        );
                    }
                }
            }
            Mode::Async { sender, .. } => match sender.try_send(Command::Record(record)) {
                Ok(()) => {
                    self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "normlog::dispatch", "log channel full, dropping log record");
                }
            },
        }
    }

    /// Write out everything queued so far and flush every sink.
    pub async fn flush(&self) {
        match &self.mode {
            Mode::Sync => flush_sinks(&self.sinks, &self.counters),
            Mode::Async { sender, .. } => {
                let (done_tx, done_rx) = oneshot::channel();
                if sender.send(Command::Flush(done_tx)).await.is_ok() {
                    let _ = done_rx.await;
                }
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            total: self.counters.total.load(Ordering::Relaxed),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run(
    sinks: Arc<[SinkEntry]>,
    mut rx: mpsc::Receiver<Command>,
    batch_size: usize,
    flush_interval: Duration,
    counters: Arc<Counters>,
) {
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Record(record)) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        send_batch(&sinks, &mut batch, &counters).await;
                    }
                }
                Some(Command::Flush(done)) => {
                    send_batch(&sinks, &mut batch, &counters).await;
                    flush_sinks(&sinks, &counters);
                    let _ = done.send(());
                }
                None => {
                    send_batch(&sinks, &mut batch, &counters).await;
                    flush_sinks(&sinks, &counters);
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    send_batch(&sinks, &mut batch, &counters).await;
                    flush_sinks(&sinks, &counters);
                }
            }
        }
    }
}

async fn send_batch(sinks: &[SinkEntry], batch: &mut Vec<LogRecord>, counters: &Counters) {
    for entry in sinks {
        let mut backoff = INITIAL_BACKOFF;
        for record in batch.iter().filter(|record| entry.accepts(record)) {
            let mut attempt = 1;
            loop {
                match entry.sink.send(record) {
                    Ok(()) => break,
                    Err(e) if attempt < MAX_ATTEMPTS => {
                        tracing::warn!(
                            target: "normlog::dispatch",
                            sink = entry.sink.name(),
                            error = %e,
                            ?backoff,
                            "log sink send failed, retrying"
                        );
                        sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                        attempt += 1;
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            target: "normlog::dispatch",
                            sink = entry.sink.name(),
                            error = %e,
                            "giving up on log record after {MAX_ATTEMPTS} attempts"
                        );
                        break;
                    }
                }
            }
        }
    }
    batch.clear();
}

fn flush_sinks(sinks: &[SinkEntry], counters: &Counters) {
    for entry in sinks {
        if let Err(e) = entry.sink.flush() {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target: "normlog::dispatch", sink = entry.sink.name(), error = %e, "log sink flush failed");
        }
    }
}
