//! Notification Module
//!
//! Unsolicited server events and the per-connection subscription state.
//!
//! ## Subscription bits
//! - Server scope (enter/leave/server edited): bit 1
//! - Text server / channel / private: bits 2, 4, 8
//! - Token used: bit 16
//! - Channel scope events use 0 and are always delivered

mod types;
mod subscription;

pub use types::{Notification, NotificationType, TextKind, TextMessage, TEXT_MESSAGE_NAME};
pub use subscription::{SubscriptionState, SubscriptionTracker};
