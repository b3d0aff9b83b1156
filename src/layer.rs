use crate::logger::Logger;
use crate::normalize::EMPTY_MESSAGE;
use crate::severity::Severity;
use crate::value::{ErrorValue, LogValue, ObjectRef};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target prefix of this crate's own diagnostics.
pub const CRATE_TARGET: &str = "normlog";

/// `tracing_subscriber` layer that feeds `tracing` events through a
/// [`Logger`], so existing `tracing::info!(user = 7, "...")` call sites get
/// the same normalization, ambient context, redaction and sinks.
///
/// Event fields become explicit context and the `message` field becomes
/// the message. Events emitted by this crate itself are ignored.
pub struct NormalizingLayer {
    logger: Logger,
}

impl NormalizingLayer {
    pub fn new(logger: Logger) -> Self {
        NormalizingLayer { logger }
    }
}

pub(crate) fn is_own_target(target: &str) -> bool {
    target == CRATE_TARGET
        || target
            .strip_prefix(CRATE_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S> Layer<S> for NormalizingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }
        let severity = Severity::from(*meta.level());
        if !self.logger.enabled(severity) {
            return;
        }

        let fields = ObjectRef::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let blank = message.as_deref().map_or(true, |m| m.trim().is_empty());
        let args = match (meta.file(), meta.line()) {
            // Report an empty event at its own call site, not at this layer.
            (Some(file), Some(line)) if blank && fields.is_empty() => vec![
                LogValue::from(EMPTY_MESSAGE),
                ErrorValue::at(EMPTY_MESSAGE, file, line).into(),
            ],
            _ => {
                let mut args = vec![message.map(LogValue::from).unwrap_or(LogValue::Null)];
                if !fields.is_empty() {
                    args.push(LogValue::Object(fields));
                }
                args
            }
        };
        self.logger.log(severity, args);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a ObjectRef,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name(), value);
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        self.fields.insert(field.name(), value);
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        self.fields.insert(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name(), value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name(), ErrorValue::from_error(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Formatted messages (`info!("x = {}", x)`) arrive here.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name(), format!("{:?}", value));
        }
    }
}
