//! Message Classifier
//!
//! Decides what a decoded line is: a notification for the event sink, a
//! piece of the current response, or the terminator closing it.

use crate::notification::{Notification, NotificationType, SubscriptionState};

use super::{Line, Properties, QueryMessage};

/// Outcome of classifying one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Accepted notification, to be fired into the event sink
    Notification(Notification),

    /// Known notification the connection is not subscribed to
    NotSubscribed(NotificationType),

    /// `notify*` identifier without a known type
    Unknown(String),

    /// Data objects were buffered for the current response
    Pending,

    /// A terminator closed the response
    Response(QueryMessage),
}

/// Accumulates response objects across lines
#[derive(Debug, Default)]
pub struct MessageClassifier {
    objects: Vec<Properties>,
}

impl MessageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a line against the subscription state at this instant
    pub fn classify(&mut self, line: Line, subscriptions: SubscriptionState) -> Disposition {
        match line {
            Line::Notification { name, objects } => {
                match NotificationType::resolve(&name, &objects) {
                    Some(kind) if subscriptions.accepts(kind) => {
                        Disposition::Notification(Notification::new(kind, objects))
                    }
                    Some(kind) => Disposition::NotSubscribed(kind),
                    None => Disposition::Unknown(name),
                }
            }
            Line::Data(objects) => {
                self.objects.extend(objects);
                Disposition::Pending
            }
            Line::Error(error) => {
                let objects = std::mem::take(&mut self.objects);
                Disposition::Response(QueryMessage::new(objects, error))
            }
        }
    }

    /// Objects buffered so far for the response in progress
    pub fn pending_objects(&self) -> usize {
        self.objects.len()
    }
}
