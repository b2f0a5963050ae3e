//! Query handle
//!
//! The thread-safe surface of a connection. Cloning is cheap; every clone
//! talks to the same dispatch loop.

use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::command::CommandDispatcher;
use crate::config::Config;
use crate::error::{QueryError, Result};
use crate::notification::{NotificationType, SubscriptionTracker, TextKind};
use crate::protocol::{QueryMessage, Request};

use super::dispatcher::{Dispatcher, Reply};
use super::dump::{Direction, NetDump};

struct Shared {
    config: Config,

    /// Request queue shared with the dispatch loop
    dispatcher: Arc<Dispatcher>,

    /// Subscribe/unsubscribe front end over the dispatcher's bits
    subscriptions: SubscriptionTracker,

    /// Chat command registry and worker pool
    commands: CommandDispatcher,

    /// Set once by the first `kill`
    terminated: AtomicBool,

    /// Clone of the socket, kept only to shut it down on kill
    stream: Mutex<Option<TcpStream>>,
    dump: Mutex<Option<NetDump>>,

    /// Last successful `whoami` reply
    whoami: Mutex<Option<QueryMessage>>,

    /// Virtual server selected by `use`
    instance_id: Mutex<Option<u32>>,
}

/// Handle for submitting requests to a connection
#[derive(Clone)]
pub struct QueryHandle {
    shared: Arc<Shared>,
}

impl QueryHandle {
    /// A handle with no socket behind it
    ///
    /// Requests queue up and can be driven through an
    /// [`Engine`](crate::Engine) by hand.
    pub fn detached(config: Config) -> Result<Self> {
        Self::build(config, None, None)
    }

    pub(crate) fn connected(config: Config, stream: TcpStream, dump: Option<NetDump>) -> Result<Self> {
        Self::build(config, Some(stream), dump)
    }

    fn build(config: Config, stream: Option<TcpStream>, dump: Option<NetDump>) -> Result<Self> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new());
        let commands = CommandDispatcher::new(config.command_prefix.clone(), config.command_pool_size)?;
        Ok(Self {
            shared: Arc::new(Shared {
                subscriptions: SubscriptionTracker::new(Arc::clone(&dispatcher)),
                dispatcher,
                commands,
                config,
                terminated: AtomicBool::new(false),
                stream: Mutex::new(stream),
                dump: Mutex::new(dump),
                whoami: Mutex::new(None),
                instance_id: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.shared.dispatcher
    }

    pub fn subscriptions(&self) -> &SubscriptionTracker {
        &self.shared.subscriptions
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.shared.commands
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queue a request without a callback
    pub fn submit(&self, request: Request) -> Result<()> {
        self.shared.dispatcher.submit(request, None)
    }

    /// Queue a request; `on_done` runs on the dispatch loop
    pub fn submit_with<F>(&self, request: Request, on_done: F) -> Result<()>
    where
        F: FnOnce(&Reply) + Send + 'static,
    {
        self.shared.dispatcher.submit_with(request, on_done)
    }

    /// Submit contiguously and wait for all replies (bounded by the config)
    ///
    /// Must not be called from the dispatch loop (callbacks, event sink).
    pub fn blocking_submit(&self, requests: Vec<Request>) -> Result<Vec<Reply>> {
        self.blocking_submit_timeout(requests, self.shared.config.blocking_timeout())
    }

    pub fn blocking_submit_timeout(&self, requests: Vec<Request>, timeout: Duration) -> Result<Vec<Reply>> {
        self.shared.dispatcher.blocking_submit(requests, timeout)
    }

    pub fn subscribe(&self, kind: NotificationType, scope_id: Option<u32>) -> Result<bool> {
        self.shared.subscriptions.subscribe(kind, scope_id)
    }

    pub fn unsubscribe(&self, kind: NotificationType, scope_id: Option<u32>) -> Result<bool> {
        self.shared.subscriptions.unsubscribe(kind, scope_id)
    }

    // =========================================================================
    // Session helpers
    // =========================================================================

    /// `use`, `login` and `whoami` as one contiguous unit
    ///
    /// Returns the whoami message; the first failing command becomes the
    /// error.
    pub fn blocking_login(&self, instance_id: u32, user: &str, password: &str) -> Result<QueryMessage> {
        let select = Request::builder()
            .command("use")
            .add_option(instance_id.to_string())
            .build();
        let login = Request::builder()
            .command("login")
            .add_option(user)
            .add_option(password)
            .build();
        let whoami = Request::new("whoami");

        let replies = self.blocking_submit(vec![select, login, whoami])?;
        let mut failure = None;
        for reply in &replies {
            if !reply.is_ok() {
                tracing::warn!(
                    "Command '{}' failed: {}",
                    reply.request.command(),
                    reply.message.error
                );
                failure.get_or_insert_with(|| reply.clone());
            }
        }

        if replies.first().is_some_and(Reply::is_ok) {
            *self.shared.instance_id.lock() = Some(instance_id);
        }
        if let Some(whoami) = replies.get(2).filter(|r| r.is_ok()) {
            *self.shared.whoami.lock() = Some(whoami.message.clone());
        }

        match failure {
            Some(reply) => reply.into_result(),
            None => replies
                .into_iter()
                .nth(2)
                .map(|r| r.message)
                .ok_or_else(|| QueryError::Protocol("missing whoami reply".to_string())),
        }
    }

    /// Refresh the cached whoami asynchronously
    pub fn load_whoami(&self) -> Result<()> {
        let shared = Arc::downgrade(&self.shared);
        self.submit_with(Request::new("whoami"), move |reply| {
            if let (true, Some(shared)) = (reply.is_ok(), shared.upgrade()) {
                *shared.whoami.lock() = Some(reply.message.clone());
            }
        })
    }

    pub fn whoami(&self) -> Option<QueryMessage> {
        self.shared.whoami.lock().clone()
    }

    /// Virtual server selected by a successful login
    pub fn instance_id(&self) -> Option<u32> {
        *self.shared.instance_id.lock()
    }

    /// Change the bot's nickname; the whoami cache follows on success
    pub fn set_nickname(&self, nickname: &str) -> Result<()> {
        const NICKNAME: &str = "client_nickname";
        let request = Request::builder()
            .command("clientupdate")
            .add_key(NICKNAME, nickname)
            .build();
        let nickname = nickname.to_string();
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.submit_with(request, move |reply| {
            if !reply.is_ok() {
                tracing::warn!("Failed to set nickname: {}", reply.message.error);
                return;
            }
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut whoami = shared.whoami.lock();
            if let Some(object) = whoami.as_mut().and_then(|m| m.objects.first_mut()) {
                object.insert(NICKNAME, nickname);
            }
        })
    }

    /// Send a text message (`target` is ignored by the server for channels)
    pub fn send_text(&self, kind: TextKind, target: u32, message: &str) -> Result<()> {
        let request = Request::builder()
            .command("sendtextmessage")
            .add_key("targetmode", kind.target_mode())
            .add_key("target", target)
            .add_key("msg", message)
            .build();
        self.submit(request)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the connection; idempotent and callable from any thread
    ///
    /// Queued and current requests are abandoned without callbacks.
    pub fn kill(&self) {
        if self.shared.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!("Kill requested");

        self.shared.commands.terminate();
        self.shared.dispatcher.close();

        if let Some(stream) = self.shared.stream.lock().take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                tracing::debug!("Socket shutdown: {}", e);
            }
        }
        if let Some(dump) = self.shared.dump.lock().take() {
            dump.close();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Append a line to the network dump; a failure disables the dump
    pub(crate) fn record(&self, direction: Direction, line: &str) {
        let mut dump = self.shared.dump.lock();
        if let Some(writer) = dump.as_mut() {
            if let Err(e) = writer.write(direction, line) {
                tracing::warn!("Failed to write to network dump - disabling: {}", e);
                *dump = None;
            }
        }
    }
}
