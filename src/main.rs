//! Chat Relay Server - Entry Point
//!
//! Loads persisted state, starts the ChatServer actor and accepts
//! connections until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_chat::codec::DEFAULT_MAX_FRAME_SIZE;
use relay_chat::config::DEFAULT_OUTBOUND_QUEUE_CAPACITY;
use relay_chat::{load_acceptor, serve, ChatServer, JsonFileStore, ServerCommand, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "relay_chat", about = "Length-prefixed TCP chat relay")]
struct Args {
    /// IP or hostname to bind
    host: String,

    /// TCP port
    #[arg(short, long, default_value_t = 9000)]
    port: u16,

    /// Where history, known users and block lists are kept
    #[arg(long, default_value = "server_data.json")]
    data_file: PathBuf,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Queued outbound messages allowed before a peer is dropped
    #[arg(
        long,
        default_value_t = DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    outbound_queue: usize,

    /// PEM certificate chain; enables TLS together with --tls-key
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for --tls-cert
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=relay_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relay_chat=info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        max_frame_size: args.max_frame_size,
        outbound_queue_capacity: args.outbound_queue,
        ..ServerConfig::default()
    };
    config.validate()?;

    let tls = match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => {
            info!("TLS enabled with certificate {}", cert.display());
            Some(load_acceptor(cert, key)?)
        }
        _ => None,
    };

    // Unreadable state aborts startup
    let store = JsonFileStore::new(&args.data_file);
    info!("Loading state from {}", store.path().display());
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let server = ChatServer::open(cmd_rx, store)?;
    let server_task = tokio::spawn(server.run());
    info!("ChatServer actor started");

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat relay listening on {}", addr);

    tokio::select! {
        _ = serve(listener, cmd_tx.clone(), config, tls) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutdown requested");
        }
    }

    let _ = cmd_tx.send(ServerCommand::Shutdown).await;
    server_task.await?;

    Ok(())
}
