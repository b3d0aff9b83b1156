use crate::assemble::Assembler;
use crate::config::{Destination, LoggerConfig, MIN_MAX_SIZE};
use crate::dispatch::{Dispatcher, SinkEntry};
use crate::layer::{is_own_target, NormalizingLayer};
use crate::logger::Logger;
use crate::machine::MachineSink;
use crate::redact::{RedactError, Redactor};
use crate::severity::Severity;
use crate::sink::LogSink;
use crate::test_sink::TestSink;
use std::io;
use std::sync::Arc;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// Error type returned when building a [`Logger`] or installing the bridge.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("cannot open {destination} for the {sink} sink: {source}")]
    Destination {
        sink: &'static str,
        destination: Destination,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Redact(#[from] RedactError),

    #[error("max_size {0} is below the minimum of {} bytes", MIN_MAX_SIZE)]
    MaxSizeTooSmall(usize),

    #[error("human feature is not enabled")]
    HumanFeatureDisabled,

    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,
}

/// Build a [`Logger`] from `config`.
///
/// **Behavior**
///
/// - Sinks are opened in the order machine, human, test.
/// - Dispatch is synchronous when `config.sync` is set or the test sink is
///   enabled. Otherwise a background writer is spawned on the current Tokio
///   runtime; without one, dispatch falls back to synchronous.
/// - The context store from `config.store` is shared when given.
pub fn initialize(config: LoggerConfig) -> Result<Logger, InitError> {
    initialize_with_sinks(config, Vec::new())
}

/// Like [`initialize`], with caller-provided sinks appended after the
/// built-in ones. Each entry carries its own minimum severity.
pub fn initialize_with_sinks(config: LoggerConfig, extra: Vec<SinkEntry>) -> Result<Logger, InitError> {
    if let Some(max) = config.max_size {
        if max < MIN_MAX_SIZE {
            return Err(InitError::MaxSizeTooSmall(max));
        }
    }
    let redactor = Redactor::new(&config.redact.paths, config.redact.censor.clone())?;

    let mut sinks = Vec::new();

    if config.machine.is_enabled() {
        let destination = config.machine.destination();
        let sink = MachineSink::open(&destination).map_err(|source| InitError::Destination {
            sink: "machine",
            destination,
            source,
        })?;
        sinks.push(SinkEntry::new(Arc::new(sink), config.machine.level_or(Severity::Info)));
    }

    if config.human.is_enabled() {
        #[cfg(feature = "human")]
        {
            use crate::human::HumanSink;

            let destination = config.human.destination();
            let sink = HumanSink::open(&destination).map_err(|source| InitError::Destination {
                sink: "human",
                destination,
                source,
            })?;
            sinks.push(SinkEntry::new(Arc::new(sink), config.human.level_or(Severity::Info)));
        }

        #[cfg(not(feature = "human"))]
        {
            return Err(InitError::HumanFeatureDisabled);
        }
    }

    let test_sink = config.test.is_enabled().then(TestSink::new);
    if let Some(sink) = &test_sink {
        let sink: Arc<dyn LogSink> = Arc::new(sink.clone());
        sinks.push(SinkEntry::new(sink, config.test.level_or(Severity::Trace)));
    }
    sinks.extend(extra);

    let dispatcher = if config.effective_sync() {
        Dispatcher::sync(sinks)
    } else if tokio::runtime::Handle::try_current().is_ok() {
        Dispatcher::spawn(sinks, config.channel_buffer, config.batch_size, config.flush_interval())
    } else {
        tracing::debug!(target: "normlog::init", "no Tokio runtime, dispatching synchronously");
        Dispatcher::sync(sinks)
    };

    tracing::debug!(
        target: "normlog::init",
        sync = dispatcher.is_sync(),
        max_size = ?config.max_size,
        "logger initialized"
    );

    Ok(Logger::new(
        Assembler::new(redactor, config.max_size),
        dispatcher,
        config.store.unwrap_or_default(),
        test_sink,
    ))
}

/// Options for [`init_tracing_with_config`].
///
/// **Fields**
/// - `diagnostics_to_stderr`: if `true`, a `fmt` layer restricted to this
///   crate's own targets is added so sink failures and dropped records are
///   visible on stderr.
#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    pub diagnostics_to_stderr: bool,
}

/// Install a global `tracing` subscriber that routes every event through
/// `logger`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`NormalizingLayer`] as the
/// global default subscriber, so all `tracing` events in the process are
/// normalized and written by the logger's sinks.
pub fn init_tracing_with_config(logger: &Logger, config: BridgeConfig) -> Result<(), InitError> {
    let layer = NormalizingLayer::new(logger.clone());

    // Two subscriber shapes, one with the diagnostics layer and one without.
    if config.diagnostics_to_stderr {
        let diagnostics = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_filter(filter_fn(|meta| is_own_target(meta.target())));
        let subscriber = Registry::default().with(layer).with(diagnostics);
        tracing::subscriber::set_global_default(subscriber).map_err(|_| InitError::SubscriberAlreadySet)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).map_err(|_| InitError::SubscriberAlreadySet)
    }
}

/// Install the bridge with [`BridgeConfig::default`].
pub fn init_tracing(logger: &Logger) -> Result<(), InitError> {
    init_tracing_with_config(logger, BridgeConfig::default())
}
