//! # sqbot
//!
//! A framework for long-running ServerQuery bots:
//! - Line-oriented wire codec with the ServerQuery escaping rules
//! - Single-flight, FIFO request dispatch with inter-request cool-down
//! - Notification classification gated by confirmed subscriptions
//! - Keepalive supervision of an unreliable link
//! - Chat-style `!commands` on a worker pool
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Callers (commands, plugins, domain helpers)          │
//! │            submit / blocking_submit / subscribe              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ QueryHandle
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │             Dispatcher (queue + current + bits)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Connection loop (socket owner, keepalive)           │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ lines                            │ events
//!            ▼                                  ▼
//!   ┌─────────────────┐                 ┌───────────────┐
//!   │ Codec/Classifier│                 │  Event sink   │
//!   └─────────────────┘                 └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod notification;
pub mod network;
pub mod event;
pub mod command;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{QueryError, Result};
pub use config::Config;
pub use engine::{Engine, LineOutcome};
pub use network::{Connection, QueryHandle, Reply};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of sqbot
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
