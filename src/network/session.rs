//! Per-connection session task.
//!
//! Each accepted connection runs one task: admission checks, registration
//! with the hub, then a unified event loop multiplexing transport reads,
//! the outbound queue, the idle deadline, the close signal, and process
//! shutdown. Every write is bounded by the write deadline; the close path
//! drains queued farewells before shutting the transport down.

use crate::config::Config;
use crate::handlers::{Dispatch, SessionCtx, dispatch};
use crate::network::codec::{LineCodec, LineCodecError};
use crate::proto::server;
use crate::state::Hub;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Sliding-window keep-alive cutoff for reads.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
/// Deadline for any single network write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Bounded wait for the transport to flush and close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Outbound queue headroom beyond the worst-case join burst.
const QUEUE_HEADROOM: usize = 64;

enum Event {
    Line(String),
    ReadError(LineCodecError),
    Eof,
    Outgoing(String),
    Idle,
    Closed,
    Shutdown,
}

/// Drive one client connection to completion.
pub async fn run_session<S>(
    stream: S,
    ip: String,
    hub: Arc<Hub>,
    cfg: Arc<Config>,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LineCodec);

    // Admission. Rejected connections never enter the registry and never
    // count toward the connection totals.
    if hub.bans.contains(&ip) {
        info!(%ip, "rejected banned address");
        let _ = write_line(&mut framed, server::info("You are banned from this server.")).await;
        return;
    }
    if hub.session_count() >= cfg.max_clients {
        warn!(%ip, "rejected: server full");
        let _ = write_line(&mut framed, server::info("Server is full. Try again later.")).await;
        return;
    }

    // The fixed join burst (one J per peer plus history plus MOTD) must fit
    // without ever blocking the registering session's own event loop.
    let capacity = cfg.max_clients + cfg.history_size + QUEUE_HEADROOM;
    let (tx, mut rx) = mpsc::channel::<String>(capacity);
    let closer = Arc::new(Notify::new());
    let id = hub.register(ip.clone(), tx, closer.clone());
    info!(id, %ip, "client connected");

    let mut ctx = SessionCtx::new(id, cfg.rate, cfg.burst, cfg.strikes);
    let idle = tokio::time::sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    let mut reason = "eof";
    loop {
        let event = tokio::select! {
            read = framed.next() => match read {
                Some(Ok(line)) => Event::Line(line),
                Some(Err(e)) => Event::ReadError(e),
                None => Event::Eof,
            },
            queued = rx.recv() => match queued {
                Some(msg) => Event::Outgoing(msg),
                None => Event::Closed,
            },
            _ = &mut idle => Event::Idle,
            _ = closer.notified() => Event::Closed,
            _ = shutdown.recv() => Event::Shutdown,
        };

        match event {
            Event::Line(line) => {
                idle.as_mut()
                    .reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
                match dispatch(&hub, &mut ctx, &line) {
                    Dispatch::Continue => {}
                    Dispatch::Logout => {
                        reason = "logout";
                        break;
                    }
                    Dispatch::FloodDisconnect => {
                        reason = "flooding";
                        break;
                    }
                }
            }
            Event::ReadError(LineCodecError::LineTooLong) => {
                // Oversize disconnects without a response.
                warn!(id, %ip, "oversized line");
                reason = "oversized line";
                break;
            }
            Event::ReadError(LineCodecError::Io(e)) => {
                debug!(id, error = %e, "read error");
                reason = "read error";
                break;
            }
            Event::Eof => break,
            Event::Outgoing(msg) => {
                if !write_line(&mut framed, msg).await {
                    reason = "write failure";
                    break;
                }
            }
            Event::Idle => {
                info!(id, %ip, "idle timeout");
                reason = "idle timeout";
                break;
            }
            Event::Closed => {
                reason = "closed";
                break;
            }
            Event::Shutdown => {
                reason = "server shutdown";
                break;
            }
        }
    }

    // Flush farewells queued just before the break (flood notice, kick
    // notice), deregister, then close the write side with a bounded wait.
    // Leaving before the close means a client observing EOF can reconnect
    // and find its nickname already released (or reserved).
    while let Ok(msg) = rx.try_recv() {
        if !write_line(&mut framed, msg).await {
            break;
        }
    }
    hub.leave(id);
    let _ = timeout(CLOSE_TIMEOUT, framed.close()).await;
    info!(id, %ip, reason, "client disconnected");
}

async fn write_line<S>(framed: &mut Framed<S, LineCodec>, line: String) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(WRITE_TIMEOUT, framed.send(line)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "write failed");
            false
        }
        Err(_) => {
            warn!("write deadline exceeded");
            false
        }
    }
}
