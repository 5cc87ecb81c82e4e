//! Log Capture Utilities for Testing
//!
//! Captures tracing events, message and fields, so tests can assert on what
//! a run logged and on what it must never log.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

/// Captured log record
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    /// `name=value` pairs for every non-message field
    pub fields: String,
}

impl LogRecord {
    fn rendered(&self) -> String {
        format!("{} {}", self.message, self.fields)
    }
}

/// Log capture layer for testing
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    /// Get all captured log records
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Check if any message or field value contains pattern
    pub fn contains(&self, pattern: &str) -> bool {
        self.records().iter().any(|r| r.rendered().contains(pattern))
    }

    /// Assert no record mentions pattern
    pub fn assert_no_match(&self, pattern: &str) {
        let matches: Vec<String> = self
            .records()
            .iter()
            .map(LogRecord::rendered)
            .filter(|line| line.contains(pattern))
            .collect();
        assert!(
            matches.is_empty(),
            "Expected no logs matching '{}', but found {} matches:\n{}",
            pattern,
            matches.len(),
            matches.join("\n")
        );
    }

    /// Assert at least one record mentions pattern
    pub fn assert_contains(&self, pattern: &str) {
        assert!(
            self.contains(pattern),
            "Expected log matching '{}', but none found. All logs:\n{}",
            pattern,
            self.records()
                .iter()
                .map(LogRecord::rendered)
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

impl<S> tracing_subscriber::Layer<S> for LogCapture
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        use tracing::field::Visit;

        #[derive(Default)]
        struct RecordVisitor {
            message: String,
            fields: String,
        }

        impl Visit for RecordVisitor {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = value.to_string();
                } else {
                    let _ = write!(self.fields, "{}={} ", field.name(), value);
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = format!("{:?}", value);
                } else {
                    let _ = write!(self.fields, "{}={:?} ", field.name(), value);
                }
            }
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Capture every event emitted on the current thread until the guard drops
///
/// Works with `#[tokio::test]`, whose runtime runs on the test thread.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(capture.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}
