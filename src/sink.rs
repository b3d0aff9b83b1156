use crate::record::LogRecord;
use std::io;

/// Failure reported by a [`LogSink`].
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Destination for fully assembled [`LogRecord`]s.
///
/// Implementations only format and write; level filtering, batching and
/// retries are handled by the dispatcher. In asynchronous mode `send` is
/// called from the dispatcher's background task, in synchronous mode from
/// the logging call itself, so implementations must be cheap and must not
/// block for long.
pub trait LogSink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Write a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted.
    /// - `Err(..)` on I/O or serialization failure. The dispatcher logs
    ///   the error and retries it with backoff in asynchronous mode.
    fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush any buffered output. Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
