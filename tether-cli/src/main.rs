//! CLI for tether, a two-party chat with verified file transfer.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod chat;
mod command;
mod console;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tether::{CHUNK_SIZE, CollisionPolicy, Config, DEFAULT_DEST_DIR, DEFAULT_PORT, Session};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::console::Console;

#[derive(Parser)]
#[command(name = "tether", version, about = "Two-party chat with verified file transfer")]
struct Cli {
    /// Diagnostics filter for stderr. `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "TETHER_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Transcript format on stdout.
    #[arg(long, global = true, env = "TETHER_FORMAT", default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for one peer to connect, then chat.
    Listen {
        /// Address to listen on.
        #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
        bind: SocketAddr,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Connect to a listening peer, then chat.
    Connect {
        /// Peer address (`host` or `host:port`; the port defaults to 12345).
        host: String,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Options shared by `listen` and `connect`.
#[derive(clap::Args)]
struct SessionArgs {
    /// Directory for received files.
    #[arg(long, env = "TETHER_DEST", default_value = DEFAULT_DEST_DIR)]
    dest: PathBuf,

    /// Bytes per read/write when streaming files.
    #[arg(
        long,
        env = "TETHER_CHUNK_SIZE",
        default_value_t = CHUNK_SIZE,
        value_parser = parse_chunk
    )]
    chunk_size: usize,

    /// Seconds to wait for each read once a frame has started.
    #[arg(long, env = "TETHER_READ_TIMEOUT", value_parser = parse_secs)]
    read_timeout: Option<Duration>,

    /// Seconds to wait for the next frame before giving up on the peer.
    #[arg(long, env = "TETHER_IDLE_TIMEOUT", value_parser = parse_secs)]
    idle_timeout: Option<Duration>,

    /// What to do when a received file name already exists.
    #[arg(long, env = "TETHER_ON_COLLISION", default_value = "rename")]
    on_collision: CollisionPolicy,

    /// Delete received files that fail checksum verification.
    #[arg(long, env = "TETHER_DISCARD_CORRUPT")]
    discard_corrupt: bool,
}

/// Output format for the chat transcript.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable transcript with a prompt.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    if let Err(e) = cli.dispatch().await {
        eprintln!("tether: {e:#}");
        std::process::exit(1);
    }
}

/// Installs the stderr subscriber. Stdout is reserved for the transcript.
fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

impl Cli {
    async fn dispatch(self) -> Result<()> {
        let format = self.format;
        match self.command {
            Command::Listen { bind, session } => listen(bind, session.into(), format).await,
            Command::Connect { host, session } => connect(&host, session.into(), format).await,
            Command::Completion { shell } => {
                let mut cmd = Self::command();
                clap_complete::generate(shell, &mut cmd, "tether", &mut std::io::stdout());
                Ok(())
            }
        }
    }
}

async fn listen(bind: SocketAddr, config: Config, format: OutputFormat) -> Result<()> {
    let mut console = Console::new(std::io::stdout(), format, "server", "client");
    let listener = tether::bind(bind)
        .await
        .with_context(|| format!("failed to listen on {bind}"))?;
    console.notice(&format!("waiting for a peer on {}", listener.local_addr()?))?;

    let (stream, _) = tokio::select! {
        accepted = tether::accept_one(listener) => accepted.context("failed to accept a peer")?,
        _ = tokio::signal::ctrl_c() => return Ok(()),
    };
    let session = Session::start(stream, config)?;
    chat::run(session, console).await
}

async fn connect(host: &str, config: Config, format: OutputFormat) -> Result<()> {
    let console = Console::new(std::io::stdout(), format, "client", "server");
    let addr = with_default_port(host);
    let stream = tether::connect(addr.as_str())
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    let session = Session::start(stream, config)?;
    chat::run(session, console).await
}

impl From<SessionArgs> for Config {
    fn from(args: SessionArgs) -> Self {
        let mut config = Self::default();
        config.dest_dir = args.dest;
        config.chunk_size = args.chunk_size;
        config.read_timeout = args.read_timeout;
        config.idle_timeout = args.idle_timeout;
        config.on_collision = args.on_collision;
        config.discard_corrupt = args.discard_corrupt;
        config
    }
}

/// Appends the default port unless `host` already names one.
fn with_default_port(host: &str) -> String {
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_owned();
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => host.to_owned(),
        _ => format!("{host}:{DEFAULT_PORT}"),
    }
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn parse_chunk(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("chunk size must be at least 1".to_owned()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
