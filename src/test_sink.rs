use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use std::sync::{Arc, PoisonError, RwLock};

type Callback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// In-process sink that hands every record to registered callbacks. No I/O.
///
/// Useful for asserting on exactly what the logger produced in unit and
/// integration tests.
#[derive(Clone, Default)]
pub struct TestSink {
    subscribers: Arc<RwLock<Vec<Callback>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback receiving each record once, in order.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl LogSink for TestSink {
    fn name(&self) -> &str {
        "test"
    }

    fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        // Clone the list so a callback may register another without deadlocking.
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in subscribers {
            callback(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use serde_json::Map;
    use std::sync::Mutex;

    #[test]
    fn every_subscriber_sees_each_record_once() {
        let sink = TestSink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            sink.on_message(move |record| seen.lock().unwrap().push((tag, record.level)));
        }

        sink.send(&LogRecord::new(Severity::Warn, None, Map::new())).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![("a", 40), ("b", 40)]);
        assert_eq!(sink.subscriber_count(), 2);
    }
}
