//! Tests for the keepalive state machine

use std::sync::atomic::Ordering;
use std::time::Duration;

use sqbot::network::{LinkAction, LinkMonitor};

fn monitor() -> LinkMonitor {
    // Three ticks of one second each cross the threshold
    LinkMonitor::new(Duration::from_secs(1), Duration::from_secs(3))
}

fn tick(monitor: &mut LinkMonitor, n: usize) -> Vec<LinkAction> {
    (0..n).map(|_| monitor.on_timeout()).collect()
}

#[test]
fn test_idle_below_threshold() {
    let mut monitor = monitor();
    assert_eq!(tick(&mut monitor, 2), vec![LinkAction::Idle, LinkAction::Idle]);
    assert_eq!(monitor.idle_time(), Duration::from_secs(2));
    assert!(!monitor.keepalive_outstanding());
}

#[test]
fn test_keepalive_at_threshold() {
    let mut monitor = monitor();
    let actions = tick(&mut monitor, 3);
    assert_eq!(actions[2], LinkAction::SendKeepalive);
    assert!(monitor.keepalive_outstanding());
    assert_eq!(monitor.idle_time(), Duration::ZERO);
}

#[test]
fn test_traffic_resets_idle_time() {
    let mut monitor = monitor();
    tick(&mut monitor, 2);
    monitor.on_traffic();
    assert_eq!(monitor.idle_time(), Duration::ZERO);
    assert_eq!(tick(&mut monitor, 2), vec![LinkAction::Idle, LinkAction::Idle]);
}

#[test]
fn test_unanswered_keepalive_is_dead() {
    let mut monitor = monitor();
    tick(&mut monitor, 3);

    let actions = tick(&mut monitor, 3);
    assert_eq!(actions, vec![LinkAction::Idle, LinkAction::Idle, LinkAction::Dead]);
}

#[test]
fn test_answered_keepalive_rearms() {
    let mut monitor = monitor();
    tick(&mut monitor, 3);

    // The keepalive's callback owns a clone of the flag
    let flag = monitor.keepalive_flag();
    flag.store(false, Ordering::SeqCst);
    assert!(!monitor.keepalive_outstanding());

    let actions = tick(&mut monitor, 3);
    assert_eq!(actions[2], LinkAction::SendKeepalive);
}

#[test]
fn test_traffic_without_answer_still_dies() {
    let mut monitor = monitor();
    tick(&mut monitor, 3);

    // A notification resets idle time but does not answer the keepalive
    monitor.on_traffic();
    assert_eq!(tick(&mut monitor, 3)[2], LinkAction::Dead);

    // The answer itself is traffic
    monitor.keepalive_answered();
    monitor.on_traffic();
    assert_eq!(tick(&mut monitor, 3)[2], LinkAction::SendKeepalive);
}

#[test]
fn test_keepalive_command() {
    assert_eq!(LinkMonitor::KEEPALIVE_COMMAND, "version");
}
