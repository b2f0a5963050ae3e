//! sqbot CLI
//!
//! Runs a single raw ServerQuery command and prints the reply.

use std::sync::Arc;

use clap::Parser;
use sqbot::event::NullSink;
use sqbot::protocol::{decode_request, QueryMessage};
use sqbot::{Config, Connection, QueryError};
use tracing_subscriber::{fmt, EnvFilter};

/// sqbot CLI
#[derive(Parser, Debug)]
#[command(name = "sqbot-cli")]
#[command(about = "Run one ServerQuery command")]
struct Args {
    /// ServerQuery host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// ServerQuery port
    #[arg(short, long, default_value = "10011")]
    port: u16,

    /// Log in before running the command (requires --password)
    #[arg(short, long)]
    user: Option<String>,

    /// Query login password
    #[arg(long, env = "SQBOT_PASSWORD")]
    password: Option<String>,

    /// Virtual server id to select when logging in
    #[arg(short, long, default_value = "1")]
    instance: u32,

    /// Print the reply as JSON
    #[arg(long)]
    json: bool,

    /// The command line, e.g. `clientlist -uid`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    // Library logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(message) => {
            print_message(&message, args.json);
            if !message.is_ok() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> sqbot::Result<QueryMessage> {
    let request = decode_request(&args.command.join(" "))?;

    let config = Config::builder().host(&args.host).port(args.port).build();
    let connection = Connection::open(config, Arc::new(NullSink), None)?;
    let handle = connection.handle();
    let worker = connection.spawn()?;

    let result = (|| -> sqbot::Result<QueryMessage> {
        if let Some(user) = &args.user {
            let password = args
                .password
                .as_deref()
                .ok_or_else(|| QueryError::Config("--password is required with --user".to_string()))?;
            handle.blocking_login(args.instance, user, password)?;
        }
        let mut replies = handle.blocking_submit(vec![request])?;
        replies
            .pop()
            .map(|r| r.message)
            .ok_or_else(|| QueryError::Protocol("no reply".to_string()))
    })();

    handle.kill();
    let _ = worker.join();
    result
}

fn print_message(message: &QueryMessage, json: bool) {
    if json {
        match serde_json::to_string_pretty(message) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {}", e),
        }
        return;
    }

    for object in &message.objects {
        let line: Vec<String> = object.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!("{}", line.join(" "));
    }
    println!("error id={} msg={}", message.error.id, message.error.message);
}
