//! Connection handler
//!
//! Handles individual client connections: frame reassembly, message
//! parsing, and bidirectional communication with the ChatServer. Works on
//! any byte stream, so a TLS stream is handled exactly like a plain
//! `TcpStream`.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::Message;
use crate::server::ServerCommand;
use crate::types::SessionId;

/// Accept connections forever, spawning a handler task for each
///
/// With an acceptor every connection must complete a TLS handshake before
/// it reaches the ChatServer.
pub async fn serve(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: ServerConfig,
    tls: Option<TlsAcceptor>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let tls = tls.clone();

                tokio::spawn(async move {
                    let result = match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => handle_connection(stream, cmd_tx, config).await,
                            Err(e) => {
                                warn!("TLS handshake with {} failed: {}", addr, e);
                                return;
                            }
                        },
                        None => handle_connection(stream, cmd_tx, config).await,
                    };
                    if let Err(e) = result {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle one client connection
///
/// Registers a session with the ChatServer, then runs a read task
/// (socket → frames → commands) and a write task (queued messages →
/// frames → socket) until either ends or the server drops the session.
/// The server is always told about the disconnect, whatever the cause.
///
/// # Errors
/// [`AppError::Config`] if `config` has a zero-sized queue; otherwise the
/// error that ended the read side, if any (for example an oversized frame).
pub async fn handle_connection<S>(
    stream: S,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: ServerConfig,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    config.validate()?;
    let (reader, writer) = tokio::io::split(stream);

    let session_id = SessionId::new();
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(config.outbound_queue_capacity);
    let (hangup_tx, hangup_rx) = oneshot::channel();

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            session_id,
            sender: msg_tx,
            hangup: hangup_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register session {} - server closed", session_id);
        return Err(AppError::ChannelSend);
    }

    let cmd_tx_read = cmd_tx.clone();
    let max_frame_size = config.max_frame_size;
    let mut read_task = tokio::spawn(async move {
        read_frames(reader, session_id, &cmd_tx_read, max_frame_size).await
    });
    let mut write_task = tokio::spawn(async move { write_frames(writer, msg_rx).await });

    let outcome = tokio::select! {
        res = &mut read_task => {
            debug!("Read task completed for {}", session_id);
            res.unwrap_or(Ok(()))
        }
        res = &mut write_task => {
            debug!("Write task completed for {}", session_id);
            res.unwrap_or(Ok(()))
        }
        _ = hangup_rx => {
            debug!("Server dropped session {}", session_id);
            Ok(())
        }
    };

    // Buffered partial frames go with the read task
    read_task.abort();
    write_task.abort();

    let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;

    info!("Session {} disconnected", session_id);
    outcome
}

/// Read task body: decode frames off the socket and forward the messages
/// to the ChatServer
///
/// A stream that ends mid-frame counts as a normal close.
async fn read_frames<R>(
    reader: R,
    session_id: SessionId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    max_frame_size: usize,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, FrameCodec::new(max_frame_size));

    while let Some(frame) = frames.next().await {
        let payload = frame.inspect_err(|e| {
            warn!("Closing session {}: {}", session_id, e);
        })?;

        let Some(cmd) = payload_to_command(session_id, &payload) else {
            continue;
        };
        if cmd_tx.send(cmd).await.is_err() {
            debug!("Server closed, ending read task for {}", session_id);
            return Err(AppError::ChannelSend);
        }
    }

    Ok(())
}

/// Write task body: frame every queued message onto the socket
async fn write_frames<W>(
    writer: W,
    mut msg_rx: mpsc::Receiver<Message>,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedWrite::new(writer, FrameCodec::default());

    while let Some(msg) = msg_rx.recv().await {
        let payload = match msg.to_vec() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                // Continue - don't break on serialization errors
                continue;
            }
        };
        frames.send(payload).await?;
    }

    debug!("Outbound queue closed, shutting down writer");
    frames.close().await?;
    Ok(())
}

/// Convert a frame payload into a ServerCommand
///
/// Malformed payloads and message kinds a client has no business sending
/// are logged and dropped; the connection stays open.
fn payload_to_command(session_id: SessionId, payload: &[u8]) -> Option<ServerCommand> {
    match Message::from_slice(payload) {
        Ok(Message::Register(username)) => Some(ServerCommand::Register {
            session_id,
            username,
        }),
        Ok(Message::Chat(messages)) => Some(ServerCommand::Chat {
            session_id,
            messages,
        }),
        Ok(Message::Unknown(key, value)) => {
            warn!("New message type from {}: {}: {}", session_id, key, value);
            None
        }
        Ok(other) => {
            warn!("Unexpected {} message from {}", other.kind(), session_id);
            None
        }
        Err(e) => {
            warn!("Invalid message from {}: {}", session_id, e);
            None
        }
    }
}
