//! Configuration for sqbot
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{QueryError, Result};

/// Main configuration for a query connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// ServerQuery host name or address
    pub host: String,

    /// ServerQuery TCP port
    pub port: u16,

    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds)
    /// Every expiry is one tick of the dispatch loop.
    pub socket_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Dispatch Configuration
    // -------------------------------------------------------------------------
    /// Idle time before a keepalive is sent (seconds)
    pub keepalive_secs: u64,

    /// Cool-down after each written request (milliseconds)
    pub request_delay_ms: u64,

    /// Upper bound for `blocking_submit` (milliseconds)
    pub blocking_timeout_ms: u64,

    /// Optional side file receiving every transmitted/received line
    pub net_dump: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Chat Command Configuration
    // -------------------------------------------------------------------------
    /// Prefix marking a text message as a command
    pub command_prefix: String,

    /// Worker threads executing command receivers
    pub command_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10011,
            connect_timeout_ms: 8000,
            socket_timeout_ms: 500,
            keepalive_secs: 240,
            request_delay_ms: 125, // 0.25 * socket timeout
            blocking_timeout_ms: 30_000,
            net_dump: None,
            command_prefix: "!".to_string(),
            command_pool_size: 5,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` as used for connecting and logging
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_millis(self.blocking_timeout_ms)
    }

    /// Reject values the dispatch loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(QueryError::Config("host must not be empty".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(QueryError::Config("connect_timeout_ms must be > 0".to_string()));
        }
        if self.socket_timeout_ms == 0 {
            return Err(QueryError::Config("socket_timeout_ms must be > 0".to_string()));
        }
        if self.keepalive_secs == 0 {
            return Err(QueryError::Config("keepalive_secs must be > 0".to_string()));
        }
        if self.command_pool_size == 0 {
            return Err(QueryError::Config("command_pool_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the ServerQuery host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the ServerQuery port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the socket read timeout (in milliseconds)
    pub fn socket_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_timeout_ms = ms;
        self
    }

    /// Set the keepalive threshold (in seconds)
    pub fn keepalive_secs(mut self, secs: u64) -> Self {
        self.config.keepalive_secs = secs;
        self
    }

    /// Set the inter-request cool-down (in milliseconds)
    pub fn request_delay_ms(mut self, ms: u64) -> Self {
        self.config.request_delay_ms = ms;
        self
    }

    /// Set the `blocking_submit` bound (in milliseconds)
    pub fn blocking_timeout_ms(mut self, ms: u64) -> Self {
        self.config.blocking_timeout_ms = ms;
        self
    }

    /// Enable the network dump
    pub fn net_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.net_dump = Some(path.into());
        self
    }

    /// Set the chat command prefix
    pub fn command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.command_prefix = prefix.into();
        self
    }

    /// Set the number of command worker threads
    pub fn command_pool_size(mut self, size: usize) -> Self {
        self.config.command_pool_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
