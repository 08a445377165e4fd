//! WebSocket broadcast of encoded frames.
//!
//! [`BroadcastServer`] runs a single-threaded Tokio runtime on its own OS
//! thread. Every accepted connection is upgraded to a WebSocket, gets a
//! bounded outbound queue, and is recorded in the [`ClientRegistry`].
//! [`send_frame`](BroadcastServer::send_frame) is synchronous: it pushes
//! the same [`Bytes`] into every queue with `try_send`, so a stalled
//! client loses its own frames without slowing anyone else down.
//!
//! The server never interprets inbound messages; they are logged and
//! dropped.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::FramecastError;
use crate::log::{self, SharedLogger};

/// Conventional broadcast port.
pub const DEFAULT_PORT: u16 = 9001;

/// Default per-client outbound queue depth, in frames.
pub const DEFAULT_CLIENT_QUEUE: usize = 8;

/// Default limit on a single frame write before the client is dropped.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a closing connection may spend sending its Close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed `accept` (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ── ClientRegistry ───────────────────────────────────────────────

/// Registry key of a connected client.
pub type ClientId = u64;

/// Sending side of one client's outbound queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub peer: SocketAddr,
    pub connected_at: Instant,
    tx: mpsc::Sender<Bytes>,
}

/// The set of connected clients, shared between the connection tasks and
/// the frame producer.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashMap<ClientId, ClientHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client and return its id.
    pub fn register(&self, peer: SocketAddr, tx: mpsc::Sender<Bytes>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            ClientHandle {
                peer,
                connected_at: Instant::now(),
                tx,
            },
        );
        id
    }

    /// Remove a client; `None` if it was not registered.
    pub fn unregister(&self, id: ClientId) -> Option<ClientHandle> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.lock().values().map(|c| c.peer).collect()
    }

    /// Queue `frame` for every client; returns how many accepted it.
    ///
    /// A full or closed queue only affects its own client.
    pub fn broadcast(&self, frame: Bytes) -> usize {
        self.lock()
            .values()
            .filter(|c| c.tx.try_send(frame.clone()).is_ok())
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entries are only ever inserted or removed whole, so a poisoned map
    /// is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, ClientHandle>> {
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ── FrameSender ──────────────────────────────────────────────────

/// Cloneable send-only handle to a [`BroadcastServer`].
///
/// Stays valid across restarts of the server it came from.
#[derive(Debug, Clone)]
pub struct FrameSender {
    registry: ClientRegistry,
    running: Arc<AtomicBool>,
}

impl FrameSender {
    /// See [`BroadcastServer::send_frame`].
    pub fn send_frame(&self, frame: impl Into<Bytes>) -> usize {
        let frame = frame.into();
        if frame.is_empty() || !self.running.load(Ordering::Acquire) {
            return 0;
        }
        self.registry.broadcast(frame)
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}

// ── BroadcastServer ──────────────────────────────────────────────

/// Pushes every frame to all connected WebSocket clients as one binary
/// message.
pub struct BroadcastServer {
    bind_ip: IpAddr,
    client_queue: usize,
    send_timeout: Duration,
    registry: ClientRegistry,
    running: Arc<AtomicBool>,
    shutdown: Option<CancellationToken>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    logger: SharedLogger,
}

impl Default for BroadcastServer {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastServer {
    /// A stopped server that will listen on all interfaces.
    pub fn new() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            client_queue: DEFAULT_CLIENT_QUEUE,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            registry: ClientRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            thread: None,
            local_addr: None,
            logger: log::null(),
        }
    }

    pub fn with_bind_address(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Outbound queue depth per client (at least 1).
    pub fn with_client_queue(mut self, depth: usize) -> Self {
        self.client_queue = depth.max(1);
        self
    }

    /// A client whose socket accepts no data for this long is disconnected.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// A handle for pushing frames from another thread.
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            registry: self.registry.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Bind `port` and start serving on a dedicated thread.
    ///
    /// Returns once the listener is bound. Port 0 picks a free port; the
    /// chosen address is returned.
    pub fn start(&mut self, port: u16) -> Result<SocketAddr, FramecastError> {
        if self.thread.is_some() {
            return Err(FramecastError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let addr = SocketAddr::new(self.bind_ip, port);
        let shutdown = CancellationToken::new();
        let ctx = Arc::new(ConnectionContext {
            registry: self.registry.clone(),
            shutdown: shutdown.clone(),
            client_queue: self.client_queue,
            send_timeout: self.send_timeout,
            logger: Arc::clone(&self.logger),
        });
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let thread = thread::Builder::new()
            .name("framecast-server".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match TcpListener::bind(addr).await {
                        Ok(listener) => listener,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let bound = listener.local_addr();
                    let ok = bound.is_ok();
                    let _ = ready_tx.send(bound);
                    if ok {
                        accept_loop(listener, ctx).await;
                    }
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(bound)) => {
                self.running.store(true, Ordering::Release);
                self.shutdown = Some(shutdown);
                self.thread = Some(thread);
                self.local_addr = Some(bound);
                self.logger
                    .info(&format!("broadcast server listening on ws://{bound}"));
                Ok(bound)
            }
            Ok(Err(source)) => {
                let _ = thread.join();
                self.logger
                    .critical(&format!("failed to bind {addr}: {source}"));
                Err(FramecastError::Bind { port, source })
            }
            Err(_) => {
                let _ = thread.join();
                Err(FramecastError::ThreadPanicked("server"))
            }
        }
    }

    /// Close the listener and every connection, join the server thread
    /// and clear the registry. No-op when not running.
    pub fn stop(&mut self) -> Result<(), FramecastError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }

        let joined = thread.join();
        self.registry.clear();
        self.local_addr = None;
        match joined {
            Ok(()) => {
                self.logger.info("broadcast server stopped");
                Ok(())
            }
            Err(_) => {
                self.logger.critical("broadcast server thread panicked");
                Err(FramecastError::ThreadPanicked("server"))
            }
        }
    }

    /// Queue `frame` for every connected client.
    ///
    /// Returns the number of clients it was queued to; 0 when the server
    /// is stopped or `frame` is empty.
    pub fn send_frame(&self, frame: impl Into<Bytes>) -> usize {
        self.sender().send_frame(frame)
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ── Connection handling ──────────────────────────────────────────

struct ConnectionContext {
    registry: ClientRegistry,
    shutdown: CancellationToken,
    client_queue: usize,
    send_timeout: Duration,
    logger: SharedLogger,
}

async fn accept_loop(listener: TcpListener, ctx: Arc<ConnectionContext>) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracker.spawn(serve_client(stream, peer, Arc::clone(&ctx)));
                }
                Err(e) => {
                    ctx.logger.warning(&format!("accept failed: {e}"));
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    tracker.close();
    tracker.wait().await;
}

async fn serve_client(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnectionContext>) {
    let _ = stream.set_nodelay(true);

    let ws = tokio::select! {
        _ = ctx.shutdown.cancelled() => return,
        handshake = tokio_tungstenite::accept_async(stream) => match handshake {
            Ok(ws) => ws,
            Err(e) => {
                ctx.logger.debug(&format!("websocket handshake with {peer} failed: {e}"));
                return;
            }
        },
    };

    let (tx, mut rx) = mpsc::channel::<Bytes>(ctx.client_queue);
    let id = ctx.registry.register(peer, tx);
    ctx.logger.info(&format!(
        "client {id} connected from {peer} ({} total)",
        ctx.registry.len()
    ));

    let (mut sink, mut inbound) = ws.split();
    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await;
                break;
            }
            frame = rx.recv() => match frame {
                Some(bytes) => {
                    // A client that stops reading must not hold up shutdown.
                    let sent = tokio::select! {
                        _ = ctx.shutdown.cancelled() => break,
                        sent = tokio::time::timeout(ctx.send_timeout, sink.send(Message::Binary(bytes))) => sent,
                    };
                    match sent {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            ctx.logger.debug(&format!("send to client {id} failed: {e}"));
                            break;
                        }
                        Err(_) => {
                            ctx.logger.warning(&format!(
                                "client {id} ({peer}) stalled for {:?}; disconnecting",
                                ctx.send_timeout
                            ));
                            break;
                        }
                    }
                }
                None => break,
            },
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    ctx.logger.debug(&format!("ignoring {}-byte text message from client {id}", text.len()));
                }
                Some(Ok(Message::Binary(data))) => {
                    ctx.logger.debug(&format!("ignoring {}-byte binary message from client {id}", data.len()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    ctx.logger.debug(&format!("client {id} read error: {e}"));
                    break;
                }
            },
        }
    }

    ctx.registry.unregister(id);
    ctx.logger.info(&format!(
        "client {id} disconnected ({} remaining)",
        ctx.registry.len()
    ));
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    fn local_server() -> BroadcastServer {
        BroadcastServer::new().with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn registry_tracks_membership() {
        let registry = ClientRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        let a = registry.register(peer(1), tx_a);
        let b = registry.register(peer(2), tx_b);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(a).is_some());
        assert!(registry.unregister(a).is_none());
        assert_eq!(registry.peers(), vec![peer(2)]);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_isolates_slow_and_closed_clients() {
        let registry = ClientRegistry::new();
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        let (tx_full, mut rx_full) = mpsc::channel(1);
        let (tx_closed, rx_closed) = mpsc::channel(4);
        registry.register(peer(1), tx_ok);
        registry.register(peer(2), tx_full);
        registry.register(peer(3), tx_closed);
        drop(rx_closed);

        assert_eq!(registry.broadcast(Bytes::from_static(b"one")), 2);
        // The one-slot queue is now full.
        assert_eq!(registry.broadcast(Bytes::from_static(b"two")), 1);

        assert_eq!(rx_ok.try_recv().unwrap(), Bytes::from_static(b"one"));
        assert_eq!(rx_ok.try_recv().unwrap(), Bytes::from_static(b"two"));
        assert_eq!(rx_full.try_recv().unwrap(), Bytes::from_static(b"one"));
        assert!(rx_full.try_recv().is_err());
    }

    #[test]
    fn send_frame_is_a_no_op_when_stopped() {
        let server = local_server();
        let (tx, mut rx) = mpsc::channel(1);
        server.registry().register(peer(1), tx);
        assert_eq!(server.send_frame(vec![1u8, 2, 3]), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sender_follows_server_state() {
        let mut server = local_server();
        let sender = server.sender();
        let (tx, mut rx) = mpsc::channel(2);
        server.registry().register(peer(1), tx);

        assert_eq!(sender.send_frame(Bytes::from_static(b"early")), 0);
        server.start(0).unwrap();
        assert_eq!(sender.send_frame(Bytes::from_static(b"live")), 1);
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"live"));

        server.stop().unwrap();
        assert_eq!(sender.client_count(), 0);
        assert_eq!(sender.send_frame(Bytes::from_static(b"late")), 0);
    }

    #[test]
    fn start_stop_restart() {
        let mut server = local_server();
        let addr = server.start(0).unwrap();
        assert!(server.is_running());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert!(matches!(server.start(0), Err(FramecastError::AlreadyRunning)));
        assert_eq!(server.send_frame(Bytes::new()), 0);

        server.stop().unwrap();
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
        server.stop().unwrap();

        server.start(0).unwrap();
        assert!(server.is_running());
        server.stop().unwrap();
    }

    #[test]
    fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server = local_server();
        match server.start(port) {
            Err(FramecastError::Bind { port: p, .. }) => assert_eq!(p, port),
            other => panic!("expected bind error, got {other:?}"),
        }
        assert!(!server.is_running());
    }
}
