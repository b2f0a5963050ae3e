//! Chat command dispatcher
//!
//! Text messages starting with the command prefix are matched against the
//! registered command names and handed to a fixed worker pool.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::Result;
use crate::network::QueryHandle;
use crate::notification::Notification;

use super::{CommandContext, CommandReceiver};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Routes `!command` text messages to receivers on worker threads
pub struct CommandDispatcher {
    prefix: String,
    commands: Mutex<BTreeMap<String, Arc<dyn CommandReceiver>>>,
    jobs: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    terminated: AtomicBool,
}

impl CommandDispatcher {
    /// Start `pool_size` worker threads
    pub fn new(prefix: impl Into<String>, pool_size: usize) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let rx = rx.clone();
            let worker = thread::Builder::new()
                .name(format!("command-worker-{}", id))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::error!("Command receiver panicked");
                        }
                    }
                })?;
            workers.push(worker);
        }

        Ok(Self {
            prefix: prefix.into(),
            commands: Mutex::new(BTreeMap::new()),
            jobs: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            terminated: AtomicBool::new(false),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register (or replace) the receiver for a command name
    pub fn register<R>(&self, command: impl Into<String>, receiver: R) -> Arc<dyn CommandReceiver>
    where
        R: CommandReceiver + 'static,
    {
        let receiver: Arc<dyn CommandReceiver> = Arc::new(receiver);
        self.commands
            .lock()
            .insert(command.into(), Arc::clone(&receiver));
        receiver
    }

    /// Remove a command; with `Some(receiver)` only if it is the one stored
    pub fn unregister(&self, command: &str, receiver: Option<&Arc<dyn CommandReceiver>>) -> bool {
        let mut commands = self.commands.lock();
        let matches = match (commands.get(command), receiver) {
            (Some(stored), Some(expected)) => Arc::ptr_eq(stored, expected),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            commands.remove(command);
        }
        matches
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().keys().cloned().collect()
    }

    /// Schedule the receivers matching a text message
    ///
    /// Every registered name the message (prefix stripped) starts with is
    /// matched. Returns the number of receivers scheduled.
    pub fn on_text_message(&self, notification: &Notification, handle: &QueryHandle) -> usize {
        if self.is_terminated() {
            return 0;
        }
        let Some(text) = notification.text_message() else {
            return 0;
        };
        let Some(body) = text.message().strip_prefix(self.prefix.as_str()) else {
            return 0;
        };

        let receivers: Vec<(String, Arc<dyn CommandReceiver>)> = self
            .commands
            .lock()
            .iter()
            .filter(|(name, _)| body.starts_with(name.as_str()))
            .map(|(name, r)| (name.clone(), Arc::clone(r)))
            .collect();
        if receivers.is_empty() {
            tracing::debug!("No receiver for command {:?}", body);
            return 0;
        }

        let count = receivers.len();
        let jobs = self.jobs.lock();
        let Some(jobs) = jobs.as_ref() else {
            return 0;
        };
        for (name, receiver) in receivers {
            let ctx = CommandContext::new(name, body, &text, handle.clone());
            let job: Job = Box::new(move || receiver.receive(&ctx));
            if jobs.send(job).is_err() {
                tracing::warn!("Command workers are gone");
                return 0;
            }
        }
        count
    }

    /// Stop accepting work; workers exit once the queue drains
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        self.jobs.lock().take();
        tracing::debug!("Command dispatcher terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Terminate and wait for the workers
    ///
    /// Must not be called from a command receiver.
    pub fn shutdown(&self) {
        self.terminate();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("Command worker exited with a panic");
            }
        }
    }
}
