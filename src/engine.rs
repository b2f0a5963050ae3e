//! Engine Module
//!
//! The loop-side core that coordinates codec, classifier, dispatcher and
//! event sink for one connection.
//!
//! ## Responsibilities
//! - Decode inbound lines and classify them
//! - Gate notifications on the subscription state
//! - Complete the current request and fire its reply
//! - Forward text messages to the command dispatcher
//!
//! The engine never touches a socket; [`Connection`](crate::network::Connection)
//! owns one and feeds it lines. Tests drive it directly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::event::{EventSink, QueryEvent};
use crate::network::{Direction, QueryHandle};
use crate::protocol::{decode_line, Disposition, MessageClassifier};

/// Maximum characters of a wire line shown in logs
pub const LOG_PREVIEW_CHARS: usize = 120;

/// What happened to an inbound line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Empty line
    Blank,
    /// Malformed line, dropped
    DecodeFailed,
    /// Notification fired into the sink
    Notified,
    /// Notification dropped (not subscribed or unknown)
    Skipped,
    /// Data buffered for the current response
    Buffered,
    /// Current request completed
    Completed,
    /// Terminator with no request outstanding, dropped
    Orphaned,
}

/// Per-connection protocol core
pub struct Engine {
    handle: QueryHandle,
    classifier: MessageClassifier,
    sink: Arc<dyn EventSink>,
}

impl Engine {
    pub fn new(handle: QueryHandle, sink: Arc<dyn EventSink>) -> Self {
        Self {
            handle,
            classifier: MessageClassifier::new(),
            sink,
        }
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Encoded next request, if one may be written now
    pub fn next_outbound(&self) -> Option<String> {
        self.handle.dispatcher().peek_next()
    }

    /// The line from [`Engine::next_outbound`] was written
    pub fn mark_sent(&self) {
        self.handle.dispatcher().mark_sent();
    }

    /// Process one complete inbound line
    pub fn process_line(&mut self, line: &str) -> LineOutcome {
        self.handle.record(Direction::Received, line);
        tracing::trace!("<-- {}", preview(line.trim_end()));

        let decoded = match decode_line(line) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return LineOutcome::Blank,
            Err(e) => {
                tracing::warn!("Failed to parse line {:?}: {}", preview(line.trim_end()), e);
                return LineOutcome::DecodeFailed;
            }
        };

        let subscriptions = self.handle.dispatcher().subscriptions();
        match self.classifier.classify(decoded, subscriptions) {
            Disposition::Notification(notification) => {
                let event = QueryEvent::Notification(notification);
                self.fire(&event);
                if let QueryEvent::Notification(n) = &event {
                    if n.kind().is_text() {
                        self.handle.commands().on_text_message(n, &self.handle);
                    }
                }
                LineOutcome::Notified
            }
            Disposition::NotSubscribed(kind) => {
                tracing::debug!("Skipping notification {}: not subscribed", kind);
                LineOutcome::Skipped
            }
            Disposition::Unknown(name) => {
                tracing::warn!("Unknown notification type: {}", name);
                LineOutcome::Skipped
            }
            Disposition::Pending => LineOutcome::Buffered,
            Disposition::Response(message) => match self.handle.dispatcher().complete(message) {
                Some(reply) => {
                    if !reply.is_ok() {
                        tracing::debug!(
                            "Command '{}' returned {}",
                            reply.request.command(),
                            reply.message.error
                        );
                    }
                    self.fire(&QueryEvent::Reply(reply));
                    LineOutcome::Completed
                }
                None => {
                    tracing::warn!(
                        "Received response without sending a request: {}",
                        preview(line.trim_end())
                    );
                    LineOutcome::Orphaned
                }
            },
        }
    }

    fn fire(&self, event: &QueryEvent) {
        if catch_unwind(AssertUnwindSafe(|| self.sink.fire(event))).is_err() {
            tracing::error!("Event sink panicked");
        }
    }
}

/// Truncate a line for logging, respecting char boundaries
pub(crate) fn preview(line: &str) -> &str {
    match line.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
