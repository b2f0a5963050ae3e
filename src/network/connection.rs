//! Connection
//!
//! Owns the socket and runs the read/dispatch loop for the connection's
//! lifetime. Everything else talks to it through a [`QueryHandle`].

use std::io::{BufReader, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::BytesMut;

use crate::config::Config;
use crate::engine::{preview, Engine};
use crate::error::{QueryError, Result};
use crate::event::EventSink;
use crate::protocol::Request;

use super::dump::{Direction, NetDump};
use super::handle::QueryHandle;
use super::monitor::{LinkAction, LinkMonitor};

/// Invoked exactly once when the dispatch loop ends
pub type CloseCallback = Box<dyn FnOnce(&QueryHandle) + Send + 'static>;

/// Outcome of the greeting check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub first_line: String,
    pub second_line: String,
    pub valid: bool,
}

/// A ServerQuery connection
pub struct Connection {
    /// Protocol core fed with every complete line
    engine: Engine,

    /// Socket reader (buffered, read one byte at a time)
    reader: BufReader<TcpStream>,

    /// Socket writer (a clone of the same stream)
    writer: TcpStream,

    /// Keepalive state
    monitor: LinkMonitor,

    /// Remaining cool-down before the next request may be written
    cooldown_ms: u64,

    /// Invoked once after the loop ends
    on_close: Option<CloseCallback>,

    /// Remote address for logging
    peer_addr: String,

    greeting: Greeting,
}

impl Connection {
    /// Tag the first greeting line must end with
    pub const GREETING_TAG: &'static str = "TS3";

    /// Fragment size of the line assembler
    pub const FRAGMENT_SIZE: usize = 128;

    /// Longest inbound line kept; longer lines are dropped up to their LF
    pub const MAX_LINE_SIZE: usize = 1024 * 1024;

    /// Connect and read the two-line greeting
    ///
    /// A wrong greeting tag is logged, not fatal.
    pub fn open(config: Config, sink: Arc<dyn EventSink>, on_close: Option<CloseCallback>) -> Result<Self> {
        config.validate()?;
        let stream = Self::connect(&config)?;

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| config.addr());

        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(config.socket_timeout()))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let greeting = Self::read_greeting(&mut reader, &config)?;
        if !greeting.valid {
            tracing::error!(
                "Connection to {} received an invalid greeting: {:?}",
                peer_addr,
                greeting.first_line
            );
        }

        let dump = config.net_dump.as_deref().and_then(|path| match NetDump::open(path) {
            Ok(dump) => Some(dump),
            Err(e) => {
                tracing::warn!("Unable to open network dump {}: {}", path.display(), e);
                None
            }
        });

        let monitor = LinkMonitor::new(config.socket_timeout(), config.keepalive());
        let writer = stream.try_clone()?;
        let handle = QueryHandle::connected(config, stream, dump)?;

        tracing::info!("Connected to query at {}", peer_addr);

        Ok(Self {
            engine: Engine::new(handle, sink),
            reader,
            writer,
            monitor,
            cooldown_ms: 0,
            on_close,
            peer_addr,
            greeting,
        })
    }

    fn connect(config: &Config) -> Result<TcpStream> {
        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| QueryError::Connect(format!("{}: {}", config.addr(), e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(QueryError::Connect(match last_error {
            Some(e) => format!("{}: {}", config.addr(), e),
            None => format!("{}: no addresses resolved", config.addr()),
        }))
    }

    /// Read two lines; the first must end with [`Self::GREETING_TAG`]
    fn read_greeting(reader: &mut BufReader<TcpStream>, config: &Config) -> Result<Greeting> {
        let deadline = Instant::now() + config.connect_timeout();
        let mut lines: Vec<Vec<u8>> = vec![Vec::new()];
        let mut byte = [0u8; 1];

        while lines.len() <= 2 {
            match reader.read(&mut byte) {
                Ok(0) => {
                    return Err(QueryError::Connect(
                        "connection closed during greeting".to_string(),
                    ))
                }
                Ok(_) => match byte[0] {
                    b'\r' => {}
                    b'\n' => lines.push(Vec::new()),
                    b => {
                        if let Some(line) = lines.last_mut() {
                            line.push(b);
                        }
                    }
                },
                Err(e) if is_timeout(&e) => {
                    if Instant::now() >= deadline {
                        return Err(QueryError::Timeout("waiting for greeting".to_string()));
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let first_line = String::from_utf8_lossy(&lines[0]).into_owned();
        let second_line = String::from_utf8_lossy(&lines[1]).into_owned();
        let valid = first_line.ends_with(Self::GREETING_TAG);
        Ok(Greeting {
            first_line,
            second_line,
            valid,
        })
    }

    pub fn handle(&self) -> QueryHandle {
        self.engine.handle().clone()
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn greeting(&self) -> &Greeting {
        &self.greeting
    }

    /// Run the loop on a dedicated thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("query-{}", self.peer_addr);
        Ok(thread::Builder::new().name(name).spawn(move || self.run())?)
    }

    /// Run the dispatch loop on the calling thread until the link dies
    ///
    /// Ends on EOF, read error, keepalive failure or kill; then invokes the
    /// close callback.
    pub fn run(mut self) {
        let handle = self.handle();
        let mut fragment = [0u8; Self::FRAGMENT_SIZE];
        let mut filled = 0usize;
        let mut line = BytesMut::with_capacity(1024);
        let mut oversized = false;
        let mut byte = [0u8; 1];

        loop {
            if handle.is_terminated() {
                break;
            }
            self.dispatch_next();

            match self.reader.read(&mut byte) {
                Ok(0) => {
                    if !handle.is_terminated() {
                        tracing::error!("Disconnected from {}", self.peer_addr);
                    }
                    break;
                }
                Ok(_) => {
                    self.monitor.on_traffic();
                    let b = byte[0];
                    // The server terminates lines with LF; CR is noise
                    if b == b'\r' {
                        continue;
                    }
                    fragment[filled] = b;
                    filled += 1;

                    let lf = b == b'\n';
                    if lf || filled == Self::FRAGMENT_SIZE {
                        if !oversized && line.len() + filled > Self::MAX_LINE_SIZE {
                            tracing::warn!(
                                "Dropping inbound line longer than {} bytes",
                                Self::MAX_LINE_SIZE
                            );
                            oversized = true;
                            line.clear();
                        }
                        if !oversized {
                            line.extend_from_slice(&fragment[..filled]);
                        }
                        filled = 0;
                        if lf {
                            if !oversized {
                                let text = String::from_utf8_lossy(&line).into_owned();
                                self.engine.process_line(&text);
                            }
                            line.clear();
                            oversized = false;
                        }
                    }
                }
                Err(e) if is_timeout(&e) => {
                    if !self.on_tick() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if !handle.is_terminated() {
                        tracing::error!("Connection lost - error while reading: {}", e);
                    }
                    break;
                }
            }
        }

        handle.kill();
        if let Some(on_close) = self.on_close.take() {
            on_close(&handle);
        }
    }

    /// One read timeout elapsed; returns false if the link is dead
    fn on_tick(&mut self) -> bool {
        let tick_ms = self.engine.handle().config().socket_timeout_ms;
        self.cooldown_ms = self.cooldown_ms.saturating_sub(tick_ms);

        self.dispatch_next();

        match self.monitor.on_timeout() {
            LinkAction::Idle => true,
            LinkAction::SendKeepalive => {
                tracing::trace!("Sending keepalive");
                let pending = self.monitor.keepalive_flag();
                let request = Request::new(LinkMonitor::KEEPALIVE_COMMAND);
                self.engine
                    .handle()
                    .submit_with(request, move |_| pending.store(false, Ordering::SeqCst))
                    .is_ok()
            }
            LinkAction::Dead => {
                tracing::error!("Connection lost - read timed out");
                false
            }
        }
    }

    /// Write the next queued request if nothing is in flight and the
    /// cool-down has elapsed
    fn dispatch_next(&mut self) {
        if self.cooldown_ms > 0 {
            return;
        }
        let handle = self.engine.handle();
        if handle.is_terminated() {
            return;
        }
        let Some(line) = self.engine.next_outbound() else {
            return;
        };

        handle.record(Direction::Sent, &line);
        tracing::trace!("--> {}", preview(line.trim_end()));

        let written = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush());
        if let Err(e) = written {
            tracing::error!("Failed to send request: {}", e);
            handle.kill();
            return;
        }

        self.engine.mark_sent();
        self.cooldown_ms = handle.config().request_delay_ms;
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    // Windows reports TimedOut instead of WouldBlock
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
