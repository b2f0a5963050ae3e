//! A scripted ServerQuery peer on a loopback socket

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use sqbot::config::ConfigBuilder;
use sqbot::Config;

pub const GREETING: &str =
    "TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands.\n\r";

pub const OK: &str = "error id=0 msg=ok";

/// Listener accepting exactly one connection
pub struct FakeServer {
    port: u16,
    accepted: Receiver<ServerSide>,
}

impl FakeServer {
    pub fn start() -> Self {
        Self::with_greeting(GREETING)
    }

    /// Accept on a background thread and greet right away
    pub fn with_greeting(greeting: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = channel::bounded(1);
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let mut side = ServerSide::new(stream);
                side.send_raw(greeting);
                let _ = tx.send(side);
            }
        });
        Self { port, accepted: rx }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Config pointing at this server with short ticks
    pub fn config(&self) -> ConfigBuilder {
        Config::builder()
            .host("127.0.0.1")
            .port(self.port)
            .connect_timeout_ms(2000)
            .socket_timeout_ms(20)
            .request_delay_ms(5)
            .blocking_timeout_ms(5000)
    }

    pub fn accept(&self) -> ServerSide {
        self.accepted
            .recv_timeout(Duration::from_secs(5))
            .expect("client never connected")
    }
}

/// Server end of an accepted connection
pub struct ServerSide {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl ServerSide {
    fn new(stream: TcpStream) -> Self {
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self {
            reader,
            writer: stream,
        }
    }

    pub fn send_raw(&mut self, data: &str) {
        self.writer.write_all(data.as_bytes()).unwrap();
        self.writer.flush().unwrap();
    }

    /// Send lines terminated the way the server does (`\n\r`)
    pub fn send(&mut self, lines: &[&str]) {
        let mut data = String::new();
        for line in lines {
            data.push_str(line);
            data.push_str("\n\r");
        }
        self.send_raw(&data);
    }

    pub fn ok(&mut self) {
        self.send(&[OK]);
    }

    /// Next request line without its terminator; `None` on timeout or EOF
    pub fn read_line(&mut self, timeout: Duration) -> Option<String> {
        self.reader.get_ref().set_read_timeout(Some(timeout)).unwrap();
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => None,
            Err(_) => None,
        }
    }

    pub fn expect_line(&mut self) -> String {
        self.read_line(Duration::from_secs(5))
            .expect("no request arrived")
    }

    /// True if the client closed its end
    pub fn at_eof(&mut self, timeout: Duration) -> bool {
        self.reader.get_ref().set_read_timeout(Some(timeout)).unwrap();
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => true,
            Err(e) => e.kind() == ErrorKind::ConnectionReset,
            Ok(_) => false,
        }
    }
}
