//! Link monitor
//!
//! Keepalive state machine driven by read-timeout ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the dispatch loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Nothing to do
    Idle,
    /// Idle threshold crossed: send a keepalive
    SendKeepalive,
    /// Threshold crossed again with the keepalive unanswered
    Dead,
}

/// Tracks idle time and the outstanding keepalive
#[derive(Debug)]
pub struct LinkMonitor {
    tick: Duration,
    threshold: Duration,
    idle_ticks: u32,
    keepalive_pending: Arc<AtomicBool>,
}

impl LinkMonitor {
    /// Command used as keepalive; it has no side effects
    pub const KEEPALIVE_COMMAND: &'static str = "version";

    pub fn new(tick: Duration, threshold: Duration) -> Self {
        Self {
            tick,
            threshold,
            idle_ticks: 0,
            keepalive_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Any inbound byte resets the idle time
    pub fn on_traffic(&mut self) {
        self.idle_ticks = 0;
    }

    /// A read timed out without data
    pub fn on_timeout(&mut self) -> LinkAction {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_time() < self.threshold {
            return LinkAction::Idle;
        }
        if self.keepalive_pending.load(Ordering::SeqCst) {
            return LinkAction::Dead;
        }
        self.keepalive_pending.store(true, Ordering::SeqCst);
        self.idle_ticks = 0;
        LinkAction::SendKeepalive
    }

    pub fn idle_time(&self) -> Duration {
        self.tick * self.idle_ticks
    }

    pub fn keepalive_outstanding(&self) -> bool {
        self.keepalive_pending.load(Ordering::SeqCst)
    }

    /// Flag cleared by the keepalive's completion callback
    pub fn keepalive_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.keepalive_pending)
    }

    /// Mark the keepalive as answered
    pub fn keepalive_answered(&self) {
        self.keepalive_pending.store(false, Ordering::SeqCst);
    }
}
