use crate::assemble::Assembler;
use crate::context::ContextStore;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::normalize::normalize;
use crate::record::LogRecord;
use crate::severity::Severity;
use crate::test_sink::TestSink;
use crate::value::LogValue;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LoggerError {
    #[error("the test sink is not enabled for this logger")]
    TestSinkDisabled,
}

struct Inner {
    assembler: Assembler,
    dispatcher: Dispatcher,
    store: ContextStore,
    test_sink: Option<TestSink>,
}

/// Cheaply cloneable logging handle returned by [`crate::initialize`].
///
/// Every call is normalized, merged with the ambient context of `store`,
/// assembled and dispatched. Logging never fails and never panics.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    pub(crate) fn new(
        assembler: Assembler,
        dispatcher: Dispatcher,
        store: ContextStore,
        test_sink: Option<TestSink>,
    ) -> Self {
        Logger {
            inner: Arc::new(Inner {
                assembler,
                dispatcher,
                store,
                test_sink,
            }),
        }
    }

    /// Log `args` at `severity`; see [`crate::normalize`] for how the
    /// arguments are read.
    #[track_caller]
    pub fn log(&self, severity: Severity, args: Vec<LogValue>) {
        if !self.enabled(severity) {
            return;
        }
        let record = self.assemble(severity, args);
        self.inner.dispatcher.dispatch(record);
    }

    /// Build the record a call would produce without dispatching it.
    #[track_caller]
    pub fn assemble(&self, severity: Severity, args: Vec<LogValue>) -> LogRecord {
        self.inner
            .assembler
            .assemble(severity, normalize(args), self.inner.store.current())
    }

    /// Whether any sink would accept a record at `severity`.
    pub fn enabled(&self, severity: Severity) -> bool {
        self.inner
            .dispatcher
            .min_level()
            .is_some_and(|min| severity >= min)
    }

    #[track_caller]
    pub fn trace(&self, args: Vec<LogValue>) {
        self.log(Severity::Trace, args);
    }

    #[track_caller]
    pub fn debug(&self, args: Vec<LogValue>) {
        self.log(Severity::Debug, args);
    }

    #[track_caller]
    pub fn info(&self, args: Vec<LogValue>) {
        self.log(Severity::Info, args);
    }

    #[track_caller]
    pub fn warn(&self, args: Vec<LogValue>) {
        self.log(Severity::Warn, args);
    }

    #[track_caller]
    pub fn error(&self, args: Vec<LogValue>) {
        self.log(Severity::Error, args);
    }

    #[track_caller]
    pub fn fatal(&self, args: Vec<LogValue>) {
        self.log(Severity::Fatal, args);
    }

    /// Subscribe to every record reaching the test sink.
    pub fn on_message<F>(&self, callback: F) -> Result<(), LoggerError>
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        let sink = self
            .inner
            .test_sink
            .as_ref()
            .ok_or(LoggerError::TestSinkDisabled)?;
        sink.on_message(callback);
        Ok(())
    }

    /// The ambient context store this logger reads from.
    pub fn store(&self) -> &ContextStore {
        &self.inner.store
    }

    pub fn is_sync(&self) -> bool {
        self.inner.dispatcher.is_sync()
    }

    pub fn max_size(&self) -> Option<usize> {
        self.inner.assembler.max_size()
    }

    pub async fn flush(&self) {
        self.inner.dispatcher.flush().await;
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.dispatcher.stats()
    }
}

/// `log!(logger, Severity::Info, "message", context)`.
#[macro_export]
macro_rules! log {
    ($logger:expr, $severity:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($severity, ::std::vec![$($crate::LogValue::from($arg)),*])
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Trace $(, $arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Debug $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Info $(, $arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Warn $(, $arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Error $(, $arg)*)
    };
}

#[macro_export]
macro_rules! fatal {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Fatal $(, $arg)*)
    };
}
