//! Event Module
//!
//! Events the connection fires, the sink contract, and a type-tagged handler
//! registry implementing it.
//!
//! Events are fired synchronously from the dispatch loop. A slow sink stalls
//! request dispatch and keepalive.

mod bus;

pub use bus::{EventBus, Handler};

use crate::network::Reply;
use crate::notification::{Notification, NotificationType};

/// Event fired by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// An accepted notification
    Notification(Notification),

    /// A completed request, fired after its callback ran
    Reply(Reply),
}

impl QueryEvent {
    /// Kinds this event matches, most specific first
    pub fn kinds(&self) -> Vec<EventKind> {
        match self {
            QueryEvent::Notification(n) => {
                let mut kinds = vec![EventKind::Notification(n.kind())];
                if n.kind().is_text() {
                    kinds.push(EventKind::TextMessage);
                }
                kinds.push(EventKind::AnyNotification);
                kinds.push(EventKind::Any);
                kinds
            }
            QueryEvent::Reply(_) => vec![EventKind::Reply, EventKind::Any],
        }
    }
}

/// Tag handlers register under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Every event
    Any,
    /// Every completed request
    Reply,
    /// Every notification
    AnyNotification,
    /// Private, channel and server text messages
    TextMessage,
    /// One notification type
    Notification(NotificationType),
}

/// Receiver of connection events
pub trait EventSink: Send + Sync {
    fn fire(&self, event: &QueryEvent);
}

impl<F> EventSink for F
where
    F: Fn(&QueryEvent) + Send + Sync,
{
    fn fire(&self, event: &QueryEvent) {
        self(event)
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn fire(&self, _event: &QueryEvent) {}
}
