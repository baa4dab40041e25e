//! Capturing the log output of a single task run.
//!
//! The executor runs each handler under its own dispatcher whose capture
//! layer appends every event as a `"<timestamp>: <message>"` line. Events
//! from other tasks running concurrently go to their own dispatchers, so
//! outputs never interleave.

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Collected log lines of one task run.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured lines, newline separated.
    pub fn output(&self) -> String {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .join("\n")
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// A dispatcher feeding this capture. With `echo`, events passing that
    /// filter are also written to stdout.
    pub fn dispatch(&self, echo: Option<EnvFilter>) -> Dispatch {
        let targets = Targets::new()
            .with_default(LevelFilter::INFO)
            .with_target("sqlx", LevelFilter::WARN);
        let subscriber = tracing_subscriber::registry()
            .with(self.clone().with_filter(targets))
            .with(echo.map(|filter| tracing_subscriber::fmt::layer().with_filter(filter)));
        Dispatch::new(subscriber)
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        self.push(format!(
            "{}: {}{}",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            line.message,
            line.fields
        ));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::instrument::WithSubscriber;
    use tracing::{debug, info, warn};

    #[tokio::test]
    async fn test_captures_events_in_scope_only() {
        let capture = LogCapture::new();
        async {
            info!("Building stylesheet");
            debug!("not captured");
            warn!(code = 2, "Exited");
        }
        .with_subscriber(capture.dispatch(None))
        .await;
        info!("outside the task");

        let output = capture.output();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": Building stylesheet"));
        assert!(lines[1].ends_with(": Exited code=2"));
    }
}
