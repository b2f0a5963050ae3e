//! sqbot Binary
//!
//! Connects to a ServerQuery interface, logs in and serves chat commands
//! until the connection closes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqbot::command::CommandContext;
use sqbot::event::{EventBus, EventKind, QueryEvent};
use sqbot::notification::NotificationType;
use sqbot::{Config, Connection, QueryHandle};
use tracing_subscriber::{fmt, EnvFilter};

/// sqbot
#[derive(Parser, Debug)]
#[command(name = "sqbot")]
#[command(about = "ServerQuery bot")]
#[command(version)]
struct Args {
    /// ServerQuery host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// ServerQuery port
    #[arg(short, long, default_value = "10011")]
    port: u16,

    /// Virtual server id to select
    #[arg(short, long, default_value = "1")]
    instance: u32,

    /// Query login name
    #[arg(short, long, default_value = "serveradmin")]
    user: String,

    /// Query login password
    #[arg(long, env = "SQBOT_PASSWORD")]
    password: String,

    /// Nickname to set after login
    #[arg(short, long)]
    nickname: Option<String>,

    /// Keepalive threshold in seconds
    #[arg(long, default_value = "240")]
    keepalive: u64,

    /// Dump all wire traffic to this file
    #[arg(long)]
    net_dump: Option<PathBuf>,

    /// Chat command prefix
    #[arg(long, default_value = "!")]
    prefix: String,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqbot=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("sqbot v{}", sqbot::VERSION);
    tracing::info!("Query address: {}:{}", args.host, args.port);

    let mut builder = Config::builder()
        .host(&args.host)
        .port(args.port)
        .keepalive_secs(args.keepalive)
        .command_prefix(&args.prefix);
    if let Some(path) = &args.net_dump {
        builder = builder.net_dump(path);
    }
    let config = builder.build();

    let bus = Arc::new(EventBus::new());
    bus.register(EventKind::TextMessage, |event| {
        if let QueryEvent::Notification(n) = event {
            if let Some(text) = n.text_message() {
                tracing::info!(
                    "[{:?}] {}: {}",
                    text.kind(),
                    text.invoker_name().unwrap_or("?"),
                    text.message()
                );
            }
        }
    });
    bus.register(EventKind::Notification(NotificationType::ClientEnter), |event| {
        if let QueryEvent::Notification(n) = event {
            let name = n.first().and_then(|o| o.get("client_nickname")).unwrap_or("?");
            tracing::info!("Client joined: {}", name);
        }
    });
    bus.register(EventKind::Notification(NotificationType::ClientLeave), |event| {
        if let QueryEvent::Notification(n) = event {
            let id = n.first().and_then(|o| o.get("clid")).unwrap_or("?");
            tracing::info!("Client left: {}", id);
        }
    });

    let connection = match Connection::open(
        config,
        bus,
        Some(Box::new(|_: &QueryHandle| {
            tracing::warn!("Query connection closed")
        })),
    ) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let handle = connection.handle();
    let worker = match connection.spawn() {
        Ok(w) => w,
        Err(e) => {
            tracing::error!("Failed to start dispatch loop: {}", e);
            std::process::exit(1);
        }
    };

    match handle.blocking_login(args.instance, &args.user, &args.password) {
        Ok(whoami) => {
            let id = whoami.first().and_then(|o| o.get("client_id")).unwrap_or("?");
            tracing::info!("Logged in as client {}", id);
        }
        Err(e) => {
            tracing::error!("Login failed: {}", e);
            handle.kill();
            let _ = worker.join();
            std::process::exit(1);
        }
    }

    if let Some(nickname) = &args.nickname {
        if let Err(e) = handle.set_nickname(nickname) {
            tracing::warn!("Failed to queue nickname change: {}", e);
        }
    }

    for kind in [
        NotificationType::ClientEnter,
        NotificationType::TextServer,
        NotificationType::TextChannel,
        NotificationType::TextPrivate,
    ] {
        if let Err(e) = handle.subscribe(kind, None) {
            tracing::warn!("Failed to subscribe to {}: {}", kind, e);
        }
    }

    let commands = handle.commands();
    commands.register("ping", |ctx: &CommandContext| {
        if let Err(e) = ctx.reply("pong") {
            tracing::warn!("Failed to answer ping: {}", e);
        }
    });
    commands.register("help", |ctx: &CommandContext| {
        let prefix = ctx.handle().commands().prefix().to_string();
        let names: Vec<String> = ctx
            .handle()
            .commands()
            .commands()
            .into_iter()
            .map(|c| format!("{}{}", prefix, c))
            .collect();
        if let Err(e) = ctx.reply(&names.join(", ")) {
            tracing::warn!("Failed to answer help: {}", e);
        }
    });

    if worker.join().is_err() {
        tracing::error!("Dispatch loop panicked");
        std::process::exit(1);
    }
    handle.commands().shutdown();
    tracing::info!("sqbot stopped");
}
