//! Command Module
//!
//! Chat-style commands (`!name args...`) received as text messages.
//!
//! ## Execution
//! - Matching happens on the dispatch loop
//! - Receivers run on a worker pool so they may block (e.g. on
//!   `blocking_submit`) without stalling the connection

mod dispatcher;

pub use dispatcher::CommandDispatcher;

use crate::error::Result;
use crate::network::QueryHandle;
use crate::notification::{TextKind, TextMessage};

/// Something that handles a chat command
pub trait CommandReceiver: Send + Sync {
    fn receive(&self, ctx: &CommandContext);
}

impl<F> CommandReceiver for F
where
    F: Fn(&CommandContext) + Send + Sync,
{
    fn receive(&self, ctx: &CommandContext) {
        self(ctx)
    }
}

/// An invocation of a chat command
#[derive(Clone)]
pub struct CommandContext {
    command: String,
    arguments: Vec<String>,
    kind: TextKind,
    invoker_id: Option<u32>,
    invoker_name: Option<String>,
    invoker_uid: Option<String>,
    handle: QueryHandle,
}

impl CommandContext {
    pub(crate) fn new(command: String, body: &str, text: &TextMessage<'_>, handle: QueryHandle) -> Self {
        let arguments = body[command.len()..]
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            command,
            arguments,
            kind: text.kind(),
            invoker_id: text.invoker_id(),
            invoker_name: text.invoker_name().map(str::to_string),
            invoker_uid: text.invoker_uid().map(str::to_string),
            handle,
        }
    }

    /// Registered name that matched
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whitespace separated words after the command name
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Where the command was typed
    pub fn kind(&self) -> TextKind {
        self.kind
    }

    pub fn invoker_id(&self) -> Option<u32> {
        self.invoker_id
    }

    pub fn invoker_name(&self) -> Option<&str> {
        self.invoker_name.as_deref()
    }

    pub fn invoker_uid(&self) -> Option<&str> {
        self.invoker_uid.as_deref()
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Answer in the same place the command came from
    pub fn reply(&self, message: &str) -> Result<()> {
        let target = match self.kind {
            TextKind::Private => self.invoker_id.unwrap_or_default(),
            TextKind::Channel => 0,
            TextKind::Server => self.handle.instance_id().unwrap_or_default(),
        };
        self.handle.send_text(self.kind, target, message)
    }
}
