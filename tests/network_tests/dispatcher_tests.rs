//! Tests for the request queue & dispatcher

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sqbot::network::Dispatcher;
use sqbot::protocol::{ErrorDescriptor, Properties, QueryMessage, Request};
use sqbot::QueryError;

// =============================================================================
// Helper Functions
// =============================================================================

fn ok() -> QueryMessage {
    QueryMessage::new(Vec::new(), ErrorDescriptor::ok())
}

fn request(command: &str, tag: &str) -> Request {
    Request::builder().command(command).add_option(tag).build()
}

/// Play the dispatch loop until `count` requests were answered
fn drive(dispatcher: &Dispatcher, count: usize, deadline: Duration) -> Vec<String> {
    let end = Instant::now() + deadline;
    let mut sent = Vec::new();
    while sent.len() < count && Instant::now() < end {
        match dispatcher.peek_next() {
            Some(line) => {
                dispatcher.mark_sent();
                assert!(dispatcher.peek_next().is_none(), "second request while one is in flight");
                sent.push(line);
                dispatcher.complete(ok());
            }
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    sent
}

// =============================================================================
// Queue Order & Single Flight
// =============================================================================

#[test]
fn test_submission_order_preserved() {
    let dispatcher = Dispatcher::new();
    for tag in ["a", "b", "c"] {
        dispatcher.submit(request("use", tag), None).unwrap();
    }

    assert_eq!(dispatcher.peek_next().unwrap(), "use a\n");
    // Peeking does not consume
    assert_eq!(dispatcher.peek_next().unwrap(), "use a\n");

    let sent = drive(&dispatcher, 3, Duration::from_secs(1));
    assert_eq!(sent, vec!["use a\n", "use b\n", "use c\n"]);
}

#[test]
fn test_nothing_dispatched_while_current() {
    let dispatcher = Dispatcher::new();
    dispatcher.submit(Request::new("whoami"), None).unwrap();
    dispatcher.submit(Request::new("version"), None).unwrap();

    assert!(dispatcher.peek_next().is_some());
    dispatcher.mark_sent();
    assert!(dispatcher.has_current());
    assert_eq!(dispatcher.current_command().as_deref(), Some("whoami"));
    assert!(dispatcher.peek_next().is_none());
    assert_eq!(dispatcher.queue_len(), 1);

    dispatcher.complete(ok());
    assert!(!dispatcher.has_current());
    assert_eq!(dispatcher.peek_next().unwrap(), "version\n");
}

#[test]
fn test_concurrent_submitters_keep_their_order() {
    let dispatcher = Arc::new(Dispatcher::new());
    let threads: Vec<_> = (0..4)
        .map(|t| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..25 {
                    dispatcher
                        .submit(request("use", &format!("t{}_{:02}", t, i)), None)
                        .unwrap();
                }
            })
        })
        .collect();

    let sent = drive(&dispatcher, 100, Duration::from_secs(5));
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(sent.len(), 100);

    for t in 0..4 {
        let prefix = format!("use t{}_", t);
        let mine: Vec<&String> = sent.iter().filter(|l| l.starts_with(&prefix)).collect();
        let mut sorted = mine.clone();
        sorted.sort();
        assert_eq!(mine, sorted, "thread {} reordered", t);
    }
}

// =============================================================================
// Completion
// =============================================================================

#[test]
fn test_callback_receives_reply() {
    let dispatcher = Dispatcher::new();
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = Arc::clone(&seen);

    dispatcher
        .submit_with(Request::new("whoami"), move |reply| {
            *seen_clone.lock() = Some(reply.clone());
        })
        .unwrap();

    dispatcher.peek_next();
    dispatcher.mark_sent();

    let mut object = Properties::new();
    object.insert("client_id", "3");
    let reply = dispatcher
        .complete(QueryMessage::new(vec![object], ErrorDescriptor::ok()))
        .unwrap();

    let seen = seen.lock().clone().unwrap();
    assert_eq!(seen, reply);
    assert_eq!(seen.request.command(), "whoami");
    assert_eq!(seen.message.objects[0].get("client_id"), Some("3"));
}

#[test]
fn test_complete_without_current() {
    let dispatcher = Dispatcher::new();
    assert!(dispatcher.complete(ok()).is_none());

    // Queued but not yet sent is not current either
    dispatcher.submit(Request::new("whoami"), None).unwrap();
    assert!(dispatcher.complete(ok()).is_none());
    assert_eq!(dispatcher.queue_len(), 1);
}

#[test]
fn test_panicking_callback_is_swallowed() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .submit_with(Request::new("whoami"), |_| panic!("callback failure"))
        .unwrap();
    dispatcher.submit(Request::new("version"), None).unwrap();

    dispatcher.peek_next();
    dispatcher.mark_sent();
    assert!(dispatcher.complete(ok()).is_some());
    assert!(!dispatcher.has_current());

    assert_eq!(dispatcher.peek_next().unwrap(), "version\n");
}

#[test]
fn test_reply_into_result() {
    let dispatcher = Dispatcher::new();
    dispatcher.submit(Request::new("login"), None).unwrap();
    dispatcher.peek_next();
    dispatcher.mark_sent();
    let reply = dispatcher
        .complete(QueryMessage::new(
            Vec::new(),
            ErrorDescriptor {
                id: 520,
                message: "invalid loginname or password".to_string(),
                extra: Properties::new(),
            },
        ))
        .unwrap();

    match reply.into_result() {
        Err(QueryError::Command { command, id, .. }) => {
            assert_eq!(command, "login");
            assert_eq!(id, 520);
        }
        other => panic!("Expected command error, got {:?}", other),
    }
}

// =============================================================================
// Invalid Commands
// =============================================================================

#[test]
fn test_invalid_command_is_dropped() {
    let dispatcher = Dispatcher::new();
    let called = Arc::new(AtomicUsize::new(0));
    let called_clone = Arc::clone(&called);

    dispatcher
        .submit_with(Request::new("Bad Command"), move |_| {
            called_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    dispatcher.submit(Request::new("whoami"), None).unwrap();

    // This tick skips the send and drops the bad entry
    assert!(dispatcher.peek_next().is_none());
    assert_eq!(dispatcher.queue_len(), 1);

    assert_eq!(dispatcher.peek_next().unwrap(), "whoami\n");
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

#[test]
fn test_blocking_submit_rejects_invalid_command() {
    let dispatcher = Dispatcher::new();
    let result = dispatcher.blocking_submit(
        vec![Request::new("whoami"), Request::new("DROP")],
        Duration::from_secs(1),
    );
    assert!(matches!(result, Err(QueryError::InvalidCommand(c)) if c == "DROP"));
    assert_eq!(dispatcher.queue_len(), 0);
}

// =============================================================================
// Blocking Submit
// =============================================================================

#[test]
fn test_blocking_submit_returns_all_replies_in_order() {
    let dispatcher = Arc::new(Dispatcher::new());
    let driver = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || drive(&dispatcher, 3, Duration::from_secs(5)))
    };

    let started = Instant::now();
    let replies = dispatcher
        .blocking_submit(
            vec![
                request("use", "1"),
                Request::builder()
                    .command("login")
                    .add_option("admin")
                    .add_option("secret")
                    .build(),
                Request::new("whoami"),
            ],
            Duration::from_secs(5),
        )
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    let commands: Vec<&str> = replies.iter().map(|r| r.request.command()).collect();
    assert_eq!(commands, vec!["use", "login", "whoami"]);
    assert!(replies.iter().all(|r| r.is_ok()));

    let sent = driver.join().unwrap();
    assert_eq!(sent, vec!["use 1\n", "login admin secret\n", "whoami\n"]);
}

#[test]
fn test_blocking_submit_is_contiguous() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.submit(request("use", "before"), None).unwrap();

    let blocker = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || {
            dispatcher.blocking_submit(
                vec![request("use", "x1"), request("use", "x2"), request("use", "x3")],
                Duration::from_secs(5),
            )
        })
    };
    while dispatcher.queue_len() < 4 {
        thread::sleep(Duration::from_millis(1));
    }
    dispatcher.submit(request("use", "after"), None).unwrap();

    let sent = drive(&dispatcher, 5, Duration::from_secs(5));
    assert_eq!(
        sent,
        vec!["use before\n", "use x1\n", "use x2\n", "use x3\n", "use after\n"]
    );
    assert_eq!(blocker.join().unwrap().unwrap().len(), 3);
}

#[test]
fn test_blocking_submit_times_out() {
    let dispatcher = Dispatcher::new();
    let started = Instant::now();
    let result = dispatcher.blocking_submit(vec![Request::new("whoami")], Duration::from_millis(50));
    assert!(matches!(result, Err(QueryError::Timeout(_))));
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_close_unblocks_waiter_without_callbacks() {
    let dispatcher = Arc::new(Dispatcher::new());
    let called = Arc::new(AtomicUsize::new(0));
    let called_clone = Arc::clone(&called);
    dispatcher
        .submit_with(Request::new("version"), move |_| {
            called_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    dispatcher.peek_next();
    dispatcher.mark_sent();

    let waiter = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.blocking_submit(vec![Request::new("whoami")], Duration::from_secs(5)))
    };
    while dispatcher.queue_len() < 1 {
        thread::sleep(Duration::from_millis(1));
    }

    dispatcher.close();
    assert!(matches!(waiter.join().unwrap(), Err(QueryError::Terminated)));
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(!dispatcher.has_current());
    assert!(dispatcher.complete(ok()).is_none());
}

#[test]
fn test_submit_after_close_fails() {
    let dispatcher = Dispatcher::new();
    dispatcher.close();
    assert!(dispatcher.is_closed());
    assert!(matches!(
        dispatcher.submit(Request::new("whoami"), None),
        Err(QueryError::Terminated)
    ));
    assert!(dispatcher.peek_next().is_none());
}
