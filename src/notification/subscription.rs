//! Subscription Tracker
//!
//! Tracks which notification categories the server is configured to push.
//! Bits are committed only once the server acknowledged the change.

use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::network::{Dispatcher, Reply};
use crate::protocol::Request;

use super::NotificationType;

/// Bitmask of confirmed subscriptions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionState {
    bits: u32,
}

impl SubscriptionState {
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// True if the type's bit is set; always false for mod-0 types
    pub fn is_subscribed(&self, kind: NotificationType) -> bool {
        self.bits & kind.mod_bit() != 0
    }

    /// Whether a notification of this type is delivered
    pub fn accepts(&self, kind: NotificationType) -> bool {
        kind.mod_bit() == 0 || self.is_subscribed(kind)
    }

    pub fn insert(&mut self, kind: NotificationType) {
        self.bits |= kind.mod_bit();
    }

    pub fn remove(&mut self, kind: NotificationType) {
        self.bits &= !kind.mod_bit();
    }
}

/// Issues subscribe/unsubscribe requests and commits their outcome
#[derive(Clone)]
pub struct SubscriptionTracker {
    dispatcher: Arc<Dispatcher>,
}

impl SubscriptionTracker {
    const SUBSCRIBE: &'static str = "servernotifyregister";
    const UNSUBSCRIBE: &'static str = "servernotifyunregister";

    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn is_subscribed(&self, kind: NotificationType) -> bool {
        self.dispatcher.with_subscriptions(|s| s.is_subscribed(kind))
    }

    pub fn state(&self) -> SubscriptionState {
        self.dispatcher.subscriptions()
    }

    /// Subscribe to a notification type, optionally scoped to a channel
    ///
    /// No-op (returns `false`) if the bit is already set. Until the server
    /// acknowledges, concurrent callers may each submit their own request.
    pub fn subscribe(&self, kind: NotificationType, scope_id: Option<u32>) -> Result<bool> {
        if self.is_subscribed(kind) {
            return Ok(false);
        }
        let request = Self::build(Self::SUBSCRIBE, kind, scope_id);
        let dispatcher = Arc::downgrade(&self.dispatcher);
        self.dispatcher.submit_with(request, move |reply| {
            commit(&dispatcher, reply, kind, scope_id, true)
        })?;
        Ok(true)
    }

    /// Unsubscribe; no-op (returns `false`) if a toggled type is not set
    pub fn unsubscribe(&self, kind: NotificationType, scope_id: Option<u32>) -> Result<bool> {
        if kind.mod_bit() != 0 && !self.is_subscribed(kind) {
            return Ok(false);
        }
        let request = Self::build(Self::UNSUBSCRIBE, kind, scope_id);
        let dispatcher = Arc::downgrade(&self.dispatcher);
        self.dispatcher.submit_with(request, move |reply| {
            commit(&dispatcher, reply, kind, scope_id, false)
        })?;
        Ok(true)
    }

    fn build(command: &str, kind: NotificationType, scope_id: Option<u32>) -> Request {
        let mut builder = Request::builder()
            .command(command)
            .add_key("event", kind.query_id());
        if let Some(id) = scope_id {
            builder = builder.add_key("id", id);
        }
        builder.build()
    }
}

fn commit(
    dispatcher: &Weak<Dispatcher>,
    reply: &Reply,
    kind: NotificationType,
    scope_id: Option<u32>,
    subscribe: bool,
) {
    let verb = if subscribe { "subscribe to" } else { "unsubscribe from" };
    if !reply.is_ok() {
        tracing::warn!(
            "Failed to {} event {}: {}",
            verb,
            kind.query_id(),
            reply.message.error
        );
        return;
    }
    tracing::debug!("Did {} event {} (scope {:?})", verb, kind.query_id(), scope_id);

    if let Some(dispatcher) = dispatcher.upgrade() {
        dispatcher.with_subscriptions(|state| {
            if subscribe {
                state.insert(kind);
            } else {
                state.remove(kind);
            }
        });
    }
}
