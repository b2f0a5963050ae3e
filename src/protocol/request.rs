//! Request definitions
//!
//! Represents commands sent to the server.

use super::Properties;

/// A request: command token, key/value chains and bare option flags
///
/// Immutable once built; use [`Request::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: String,
    chains: Vec<Properties>,
    options: Vec<String>,
}

impl Request {
    /// A request consisting of only a command token
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            chains: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn chains(&self) -> &[Properties] {
        &self.chains
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Command tokens are restricted to `[a-z0-9_]+`
    pub fn is_valid_command(command: &str) -> bool {
        !command.is_empty()
            && command
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    }

    pub fn has_valid_command(&self) -> bool {
        Self::is_valid_command(&self.command)
    }
}

/// Builder for Request
///
/// Keys go into the current chain; [`RequestBuilder::next_chain`] starts a
/// new one for bulk operations.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    command: String,
    chains: Vec<Properties>,
    options: Vec<String>,
}

impl RequestBuilder {
    /// Set the command token
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Add a key/value pair to the current chain
    pub fn add_key(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if self.chains.is_empty() {
            self.chains.push(Properties::new());
        }
        if let Some(chain) = self.chains.last_mut() {
            chain.insert(key, value.to_string());
        }
        self
    }

    /// Start a new chain; later keys go into it
    pub fn next_chain(mut self) -> Self {
        // An empty trailing chain would encode as a dangling separator
        if self.chains.last().map_or(true, |c| !c.is_empty()) {
            self.chains.push(Properties::new());
        }
        self
    }

    /// Append a whole chain
    pub fn add_chain(mut self, chain: Properties) -> Self {
        if self.chains.last().is_some_and(|c| c.is_empty()) {
            self.chains.pop();
        }
        self.chains.push(chain);
        self
    }

    /// Append a bare option token (e.g. `-uid`, or a positional argument)
    ///
    /// Options are escaped on the wire like values, so a positional
    /// argument containing spaces stays one token.
    pub fn add_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn build(mut self) -> Request {
        self.chains.retain(|c| !c.is_empty());
        Request {
            command: self.command,
            chains: self.chains,
            options: self.options,
        }
    }
}
