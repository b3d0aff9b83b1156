//! Structured log normalization.
//!
//! A logging call hands over loosely-typed arguments; this crate turns them
//! into one record shape (`level`, `severity`, `time`, `msg`, `ctx`), merges
//! the ambient context of the current call chain, redacts sensitive fields,
//! guards against oversized records and routes the result to the configured
//! sinks.
//!
//! ```no_run
//! use normlog::{context, info, initialize, object, LoggerConfig, SinkSetting};
//!
//! let logger = initialize(LoggerConfig {
//!     machine: SinkSetting::Enabled(true),
//!     ..LoggerConfig::default()
//! })
//! .expect("logger");
//!
//! logger.store().sync_scope(context! { "tracer" => 123 }, || {
//!     info!(logger, "Some message", object! { "foo" => "bar" });
//! });
//! ```

pub mod assemble;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
#[cfg(feature = "human")]
pub mod human;
pub mod init;
pub mod layer;
pub mod logger;
pub mod machine;
pub mod normalize;
pub mod record;
pub mod redact;
pub mod serialize;
pub mod severity;
pub mod sink;
pub mod test_sink;
pub mod value;

pub use assemble::{Assembler, DEFAULT_MAX_SIZE};
pub use config::{Destination, LoggerConfig, RedactConfig, SinkOptions, SinkSetting};
pub use context::ContextStore;
pub use dispatch::{DispatchStats, SinkEntry};
pub use env::ConfigError;
pub use init::{init_tracing, init_tracing_with_config, initialize, initialize_with_sinks, BridgeConfig, InitError};
pub use layer::NormalizingLayer;
pub use logger::{Logger, LoggerError};
pub use normalize::{normalize, LogArg, NormalizedInput, EMPTY_MESSAGE};
pub use record::{LogRecord, Message};
pub use redact::Redactor;
pub use severity::Severity;
pub use sink::{LogSink, SinkError};
pub use value::{ArrayRef, ContextMap, ErrorValue, LogValue, ObjectRef};
