//! Request Queue & Dispatcher
//!
//! Serializes concurrent submissions into ordered, one-at-a-time wire
//! transmissions.
//!
//! ## Concurrency
//! - Queue, current request slot and subscription bits share one lock
//! - Any thread may submit; only the dispatch loop dequeues and completes
//! - Callbacks never run while the lock is held

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::Mutex;

use crate::error::{QueryError, Result};
use crate::notification::SubscriptionState;
use crate::protocol::{encode_request, QueryMessage, Request};

/// Completion callback of a request
pub type Callback = Box<dyn FnOnce(&Reply) + Send + 'static>;

/// A completed request: what was sent and what came back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub request: Request,
    pub message: QueryMessage,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.message.is_ok()
    }

    /// Turn a non-zero error id into `QueryError::Command`
    pub fn into_result(self) -> Result<QueryMessage> {
        if self.message.is_ok() {
            Ok(self.message)
        } else {
            Err(QueryError::Command {
                command: self.request.command().to_string(),
                id: self.message.error.id,
                message: self.message.error.message,
            })
        }
    }
}

/// A submitted request waiting for (or awaiting the answer to) transmission
pub struct PendingRequest {
    request: Request,
    callback: Option<Callback>,
}

impl PendingRequest {
    pub fn new(request: Request, callback: Option<Callback>) -> Self {
        Self { request, callback }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("request", &self.request)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// State guarded by the dispatcher lock
#[derive(Default)]
pub(crate) struct DispatchState {
    /// Submitted requests not yet written, oldest first
    queue: VecDeque<PendingRequest>,

    /// Written request awaiting its `error` terminator
    current: Option<PendingRequest>,

    /// Acknowledged notification subscriptions
    pub(crate) subscriptions: SubscriptionState,

    /// Set by `close`; rejects further submissions
    closed: bool,
}

/// FIFO of pending requests with at-most-one-in-flight discipline
#[derive(Default)]
pub struct Dispatcher {
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Submission (any thread)
    // =========================================================================

    /// Append a request to the tail of the queue
    ///
    /// Returns immediately; the callback runs on the dispatch loop once the
    /// terminating `error` line arrives.
    pub fn submit(&self, request: Request, callback: Option<Callback>) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueryError::Terminated);
        }
        tracing::trace!("Queued request '{}'", request.command());
        state.queue.push_back(PendingRequest::new(request, callback));
        Ok(())
    }

    /// Submit with a closure callback
    pub fn submit_with<F>(&self, request: Request, on_done: F) -> Result<()>
    where
        F: FnOnce(&Reply) + Send + 'static,
    {
        self.submit(request, Some(Box::new(on_done)))
    }

    /// Enqueue all requests contiguously and wait until every one completed
    ///
    /// Replies are returned in request order. The wait is bounded by
    /// `timeout`; a kill while waiting yields `QueryError::Terminated`.
    pub fn blocking_submit(&self, requests: Vec<Request>, timeout: Duration) -> Result<Vec<Reply>> {
        if let Some(bad) = requests.iter().find(|r| !r.has_valid_command()) {
            return Err(QueryError::InvalidCommand(bad.command().to_string()));
        }

        let count = requests.len();
        let (tx, rx) = channel::bounded::<(usize, Reply)>(count);
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueryError::Terminated);
            }
            for (index, request) in requests.into_iter().enumerate() {
                let tx = tx.clone();
                let callback: Callback = Box::new(move |reply: &Reply| {
                    let _ = tx.send((index, reply.clone()));
                });
                state.queue.push_back(PendingRequest::new(request, Some(callback)));
            }
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        let mut replies: Vec<Option<Reply>> = vec![None; count];
        for received in 0..count {
            match rx.recv_deadline(deadline) {
                Ok((index, reply)) => replies[index] = Some(reply),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(QueryError::Timeout(format!(
                        "{} of {} replies after {:?}",
                        received, count, timeout
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(QueryError::Terminated),
            }
        }

        Ok(replies.into_iter().flatten().collect())
    }

    // =========================================================================
    // Dispatch loop side
    // =========================================================================

    /// Encoded head of the queue, if nothing is in flight
    ///
    /// A head with an invalid command token is dropped and `None` returned;
    /// the rest of the queue stays intact.
    pub fn peek_next(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.closed || state.current.is_some() {
            return None;
        }
        let valid = state.queue.front()?.request.has_valid_command();
        if !valid {
            if let Some(dropped) = state.queue.pop_front() {
                tracing::warn!(
                    "Dropping request with invalid command {:?}",
                    dropped.request.command()
                );
            }
            return None;
        }
        state.queue.front().map(|p| encode_request(&p.request))
    }

    /// Promote the queue head to the current request after it was written
    pub fn mark_sent(&self) {
        let mut state = self.state.lock();
        if state.current.is_some() {
            tracing::warn!("mark_sent while a request is already current");
            return;
        }
        state.current = state.queue.pop_front();
    }

    /// Finish the current request with its response
    ///
    /// Runs the callback (panics are logged and swallowed), then clears the
    /// current slot. Returns `None` when no request was outstanding.
    pub fn complete(&self, message: QueryMessage) -> Option<Reply> {
        let (request, callback) = {
            let mut state = self.state.lock();
            let current = state.current.as_mut()?;
            (current.request.clone(), current.callback.take())
        };

        let reply = Reply { request, message };
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&reply))).is_err() {
                tracing::error!(
                    "Callback for '{}' panicked",
                    reply.request.command()
                );
            }
        }

        self.state.lock().current = None;
        Some(reply)
    }

    /// Abandon queued and current requests and reject further submissions
    ///
    /// Callbacks are dropped without being invoked.
    pub fn close(&self) {
        let (queued, current) = {
            let mut state = self.state.lock();
            state.closed = true;
            (std::mem::take(&mut state.queue), state.current.take())
        };
        if !queued.is_empty() || current.is_some() {
            tracing::debug!(
                "Abandoned {} queued request(s), current: {}",
                queued.len(),
                current.is_some()
            );
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn has_current(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn current_command(&self) -> Option<String> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|p| p.request.command().to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Snapshot of the subscription bits
    pub fn subscriptions(&self) -> SubscriptionState {
        self.state.lock().subscriptions
    }

    /// Run `f` on the subscription bits under the queue lock
    pub(crate) fn with_subscriptions<R>(&self, f: impl FnOnce(&mut SubscriptionState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state.subscriptions)
    }
}
