//! # classlink
//!
//! Joins a live classroom session from the terminal. Inbound events are
//! printed to stdout as JSON lines; each stdin line `<type> [json-payload]`
//! is sent as an event.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use classlink_settings::ClasslinkSettings;
use classlink_transport::{
    ChannelSink, ConnectionTarget, LiveSession, Role, SessionState, TransportConfig,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Live classroom session client.
#[derive(Parser, Debug)]
#[command(name = "classlink", about = "Live classroom session client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join a live session and relay events between it and the terminal.
    Join(JoinArgs),
}

#[derive(Args, Debug)]
struct JoinArgs {
    /// Live session identifier.
    #[arg(long = "session")]
    session_id: String,

    /// Bearer token for the session.
    #[arg(long)]
    token: String,

    /// Participant identity.
    #[arg(long, default_value = "")]
    participant: String,

    /// Participant role.
    #[arg(long, default_value = "student")]
    role: Role,

    /// Display name shown to other participants.
    #[arg(long)]
    name: Option<String>,

    /// Endpoint base (`host[:port][/prefix]`, scheme optional).
    #[arg(long)]
    endpoint: Option<String>,

    /// Settings file (defaults to `~/.classlink/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl JoinArgs {
    fn target(&self) -> ConnectionTarget {
        let mut target = ConnectionTarget::new(&self.session_id, &self.token)
            .with_participant(&self.participant, self.role);
        if let Some(name) = &self.name {
            target = target.with_display_name(name);
        }
        if let Some(endpoint) = &self.endpoint {
            target = target.with_endpoint_base(endpoint);
        }
        target
    }

    fn load_settings(&self) -> Result<ClasslinkSettings> {
        match &self.settings {
            Some(path) => classlink_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display())),
            None => classlink_settings::load_settings().context("Failed to load settings"),
        }
    }
}

/// Why the relay loop stopped.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Interrupted,
    InputClosed,
    SessionClosed,
}

/// Parse one stdin line into an event type and payload.
///
/// Blank lines yield `None`. A missing payload is `null`.
fn parse_input_line(line: &str) -> Result<Option<(String, Value)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (kind, rest) = match line.split_once(char::is_whitespace) {
        Some((kind, rest)) => (kind, rest.trim()),
        None => (line, ""),
    };
    let payload = if rest.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(rest).with_context(|| format!("payload for '{kind}' is not JSON"))?
    };
    Ok(Some((kind.to_string(), payload)))
}

async fn join(args: JoinArgs) -> Result<()> {
    let settings = args.load_settings()?;
    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    classlink_core::logging::init_subscriber(level);

    let target = args.target();
    if !target.is_complete() {
        bail!("--session and --token must both be non-empty");
    }
    let url = target
        .endpoint_url(&settings.transport.origin)
        .context("Invalid endpoint")?;
    tracing::info!(
        session_id = %target.session_id,
        url = %classlink_core::errors::redact_token(&url),
        "joining"
    );

    let config = TransportConfig::from_settings(&settings.transport);
    let auto_connect = config.auto_connect;
    let (sink, mut events) = ChannelSink::new();
    let session = LiveSession::new(target, config, sink);
    if !auto_connect {
        session.connect();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status_poll = tokio::time::interval(Duration::from_millis(250));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let exit = loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!("{}", serde_json::to_string(&event)?);
            }
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => match parse_input_line(&line) {
                    Ok(Some((kind, payload))) => {
                        let seq = session.send_event(kind.as_str(), payload);
                        tracing::info!(seq, kind = %kind, pending = session.pending_count(), "sent");
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "ignoring input line"),
                },
                None => break Exit::InputClosed,
            },
            result = &mut ctrl_c => {
                result.context("Failed to listen for ctrl-c")?;
                break Exit::Interrupted;
            }
            _ = status_poll.tick() => {
                if session.current_status() == SessionState::Closed {
                    break Exit::SessionClosed;
                }
            }
        }
    };

    tracing::info!(?exit, pending = session.pending_count(), "leaving session");
    session.disconnect();
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }

    if exit == Exit::SessionClosed {
        bail!(
            "session closed after {} failed reconnection attempts",
            session.reconnect_attempts()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Join(args) => join(args).await,
    }
}
