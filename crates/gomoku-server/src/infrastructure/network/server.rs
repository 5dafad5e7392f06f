//! TCP server: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting connections and registering a [`Session`] for each.
//! 3. Running a reader (this task) and a writer (a spawned task) per
//!    connection.  The reader decodes lines and dispatches them; the writer
//!    drains the session's outbound queue to the socket.
//! 4. Running the departure path when a connection ends for any reason.
//! 5. Stopping when the shared `running` flag is cleared.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gomoku_core::{encode_server_message, ServerMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::application::{handle_line, ChannelSink, Registry, Session};
use crate::domain::ServerConfig;

/// How often blocked loops re-check the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// How long shutdown waits for connection tasks to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves connections until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: ServerConfig,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;
    serve(listener, config, registry, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Split from [`run_server`] so tests can bind port 0 and learn the address
/// before serving.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local = listener
        .local_addr()
        .context("listener has no local address")?;
    info!("gomoku server listening on {local}");

    let config = Arc::new(config);
    let mut connections = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap finished connection tasks so the set does not grow unbounded.
        while connections.try_join_next().is_some() {}

        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("new connection from {peer}");
                let cfg = Arc::clone(&config);
                let reg = Arc::clone(&registry);
                let run = Arc::clone(&running);
                connections.spawn(async move {
                    handle_connection(stream, peer, cfg, reg, run).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {
                // No connection within the poll window; re-check the flag.
            }
        }
    }

    let drained = timeout(DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            remaining = connections.len(),
            "connections still open after shutdown grace period; aborting"
        );
        connections.shutdown().await;
    }
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Owns one connection from accept to departure.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("set_nodelay failed for {peer}: {e}");
    }
    let (read_half, write_half) = stream.into_split();

    let (sink, outbound) = ChannelSink::channel(config.outbound_queue);
    let session = Arc::new(Session::new(
        registry.allocate_session_id(),
        peer,
        Box::new(sink),
    ));
    let session_id = session.id();
    registry.register_session(Arc::clone(&session)).await;

    let writer = tokio::spawn(write_outbound(write_half, outbound, session_id));

    let reason = read_inbound(
        BufReader::new(read_half),
        &session,
        &registry,
        &config,
        &running,
    )
    .await;
    match &reason {
        Ok(why) => info!(session = session_id, "connection {peer} closed: {why}"),
        Err(e) => info!(session = session_id, "connection {peer} lost: {e:#}"),
    }

    // Departure: notify the room first so the survivor hears about it, then
    // stop the outbound queue and let the writer flush what is left.
    registry.depart(&session).await;
    registry.remove_session(session_id).await;
    session.mark_dead();
    if timeout(DRAIN_TIMEOUT, writer).await.is_err() {
        debug!(session = session_id, "writer did not finish flushing in time");
    }
}

/// Why the read side of a connection stopped without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    PeerClosed,
    IdleTimeout,
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CloseReason::PeerClosed => "peer closed the connection",
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::Shutdown => "server shutting down",
        })
    }
}

/// Reads and dispatches lines until EOF, idle timeout, shutdown or an I/O
/// error.
async fn read_inbound<R>(
    mut reader: R,
    session: &Arc<Session>,
    registry: &Registry,
    config: &ServerConfig,
    running: &AtomicBool,
) -> anyhow::Result<CloseReason>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let next = read_line_bounded(&mut reader, config.max_line_length);
        let read = tokio::select! {
            read = with_idle_timeout(config.idle_timeout, next) => read,
            () = wait_for_shutdown(running) => return Ok(CloseReason::Shutdown),
        };

        let line = match read {
            None => return Ok(CloseReason::IdleTimeout),
            Some(result) => result.context("read failed")?,
        };
        match line {
            LineRead::Line(line) => handle_line(session, registry, &line).await,
            LineRead::TooLong => {
                session.touch();
                debug!(
                    session = session.id(),
                    limit = config.max_line_length,
                    "ignoring over-long line"
                );
            }
            LineRead::Eof => return Ok(CloseReason::PeerClosed),
        }
    }
}

async fn with_idle_timeout<F: std::future::Future>(
    idle: Option<Duration>,
    fut: F,
) -> Option<F::Output> {
    match idle {
        Some(limit) => timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

async fn wait_for_shutdown(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        sleep(SHUTDOWN_POLL).await;
    }
}

/// Drains `outbound` to the socket, one line per message, until the queue
/// closes or a write fails.
async fn write_outbound(
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<ServerMessage>,
    session_id: u64,
) {
    let mut writer = BufWriter::new(write_half);
    while let Some(msg) = outbound.recv().await {
        let mut line = encode_server_message(&msg);
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(session = session_id, "write failed: {e}");
            return;
        }
        // Flush once the queue is momentarily empty so bursts share a write.
        if outbound.is_empty() {
            if let Err(e) = writer.flush().await {
                debug!(session = session_id, "flush failed: {e}");
                return;
            }
        }
    }
    let _ = writer.flush().await;
    let _ = writer.shutdown().await;
}

// ── Line reading ──────────────────────────────────────────────────────────────

/// Result of reading one inbound line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineRead {
    /// A complete line without its `\n` terminator.
    Line(String),
    /// A line longer than the limit; its bytes have been discarded.
    TooLong,
    /// The peer closed the stream.
    Eof,
}

/// Reads one `\n`-terminated line of at most `limit` bytes.
///
/// Over-long lines are consumed up to their terminator and reported as
/// [`LineRead::TooLong`] so the connection can carry on.  A final
/// unterminated line before EOF is returned as a normal line.  Invalid UTF-8
/// is replaced rather than rejected; the decoder will refuse the line.
pub(crate) async fn read_line_bounded<R>(
    reader: &mut R,
    limit: usize,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut overflow = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (overflow, buf.is_empty()) {
                (true, _) => LineRead::TooLong,
                (false, true) => LineRead::Eof,
                (false, false) => LineRead::Line(String::from_utf8_lossy(&buf).into_owned()),
            });
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        if !overflow {
            if buf.len() + chunk.len() > limit {
                overflow = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        let used = newline.map_or(available.len(), |i| i + 1);
        reader.consume(used);

        if newline.is_some() {
            return Ok(if overflow {
                LineRead::TooLong
            } else {
                LineRead::Line(String::from_utf8_lossy(&buf).into_owned())
            });
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
