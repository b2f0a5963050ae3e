//! Event Bus
//!
//! Maps an [`EventKind`] to an ordered list of handlers. A fired event is
//! delivered to the handlers of every kind it matches, specific kinds first.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{EventKind, EventSink, QueryEvent};

/// A registered event handler
pub type Handler = Arc<dyn Fn(&QueryEvent) + Send + Sync>;

/// Registry of handlers keyed by event kind
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers of one kind run in registration order
    pub fn register<F>(&self, kind: EventKind, handler: F) -> Handler
    where
        F: Fn(&QueryEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::clone(&handler));
        handler
    }

    /// Remove a handler returned by [`EventBus::register`]
    pub fn unregister(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        before != list.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every matching handler
    ///
    /// A panicking handler is logged; the remaining handlers still run.
    pub fn dispatch(&self, event: &QueryEvent) {
        // Snapshot so handlers may (un)register without deadlocking
        let kinds = event.kinds();
        let matched: Vec<Handler> = {
            let handlers = self.handlers.read();
            let matched = kinds
                .iter()
                .filter_map(|kind| handlers.get(kind))
                .flatten()
                .cloned()
                .collect();
            matched
        };

        for handler in matched {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!("Event handler panicked on {:?}", kinds.first());
            }
        }
    }
}

impl EventSink for EventBus {
    fn fire(&self, event: &QueryEvent) {
        self.dispatch(event);
    }
}
