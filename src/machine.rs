use crate::config::Destination;
use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Newline-delimited JSON sink: one [`LogRecord`] per line with fields
/// `level`, `severity`, `time`, `msg`, `ctx`.
pub struct MachineSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl MachineSink {
    pub fn open(destination: &Destination) -> io::Result<Self> {
        Ok(Self::new(destination.open()?))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        MachineSink {
            writer: Mutex::new(writer),
        }
    }
}

impl LogSink for MachineSink {
    fn name(&self) -> &str {
        "machine"
    }

    fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}
