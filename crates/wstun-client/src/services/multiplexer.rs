// ============================================
// File: crates/wstun-client/src/services/multiplexer.rs
// ============================================
//! # Transport Multiplexer
//!
//! ## Creation Reason
//! Runs one WebSocket connection as two logical channels: an ordered
//! command stream (text frames) and an unordered packet stream (binary
//! frames).
//!
//! ## Main Functionality
//! - `Multiplexer::start`: takes ownership of the connection and spawns
//!   the reader and writer tasks
//! - `send_command` / `send_packet`: enqueue onto the single writer path
//! - `bind_interface`: attach the interface's inbound packet queue
//! - `closed` / `begin_close`: one-shot close signal shared by all tasks
//!
//! ## Task Layout
//! ```text
//!                    ┌──────────────────────────────┐
//!   Connection ────► │ reader task                  │
//!    recv()          │   Text   → decode → commands ├──► Session
//!                    │   Binary → interface queue   ├──► device writer
//!                    │   None / Err → begin_close   │
//!                    └──────────────────────────────┘
//!                    ┌──────────────────────────────┐
//!   Session ───────► │                              │
//!   device reader ─► │ writer task (sole sender)    ├──► Connection
//!   ping ticker ───► │                              │     send()
//!                    └──────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the writer task ever calls `Connection::send`/`ping`; anything
//!   else that wants to write goes through the outbound queue
//! - Packets arriving with no interface bound, or while the interface
//!   queue is full, are dropped and counted
//! - `begin_close` is first-writer-wins; later reasons are ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial multiplexer

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use wstun_core::protocol::CommandFrame;
use wstun_transport::error::{Result, TransportError};
use wstun_transport::traits::{Connection, WireMessage};

// ============================================
// Constants
// ============================================

/// Default outbound queue depth shared by commands and packets.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 1024;

/// How long `stop` waits for each task.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// CloseReason
// ============================================

/// Why the connection is going away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the connection failed.
    ReadFailed(String),
    /// Writing to the connection failed.
    WriteFailed(String),
    /// The session hit a fatal error.
    SessionFatal(String),
    /// Local shutdown was requested.
    Shutdown,
}

impl CloseReason {
    /// Returns `true` if the close was caused by a failure on this side
    /// or on the connection.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ReadFailed(_) | Self::WriteFailed(_) | Self::SessionFatal(_)
        )
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::ReadFailed(reason) => write!(f, "read failed: {reason}"),
            Self::WriteFailed(reason) => write!(f, "write failed: {reason}"),
            Self::SessionFatal(reason) => write!(f, "session error: {reason}"),
            Self::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

// ============================================
// Configuration
// ============================================

/// Multiplexer tuning.
#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    /// Outbound queue depth.
    pub outbound_queue: usize,
    /// Keepalive ping interval; `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

// ============================================
// Statistics
// ============================================

/// Point-in-time multiplexer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultiplexerStats {
    /// Command frames dispatched to the session.
    pub commands_in: u64,
    /// Command frames written to the connection.
    pub commands_out: u64,
    /// Packets delivered to the bound interface.
    pub packets_in: u64,
    /// Packets written to the connection.
    pub packets_out: u64,
    /// Inbound packets dropped (nothing bound or queue full).
    pub packets_dropped: u64,
}

#[derive(Default)]
struct Counters {
    commands_in: AtomicU64,
    commands_out: AtomicU64,
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    packets_dropped: AtomicU64,
}

// ============================================
// Multiplexer
// ============================================

/// Owner of the connection and its two logical channels.
///
/// # Thread Safety
/// Shared as `Arc<Multiplexer>` between the session, the packet pumps
/// and its own tasks.
pub struct Multiplexer {
    conn: Arc<dyn Connection>,
    outbound: mpsc::Sender<WireMessage>,
    interface: RwLock<Option<mpsc::Sender<Bytes>>>,
    closed: watch::Sender<Option<CloseReason>>,
    conn_closed: AtomicBool,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    counters: Counters,
}

impl Multiplexer {
    /// Takes ownership of `conn` and starts serving it.
    ///
    /// # Returns
    /// The multiplexer and the receiver of inbound command frames, in
    /// arrival order.
    #[must_use]
    pub fn start(
        conn: Arc<dyn Connection>,
        config: MultiplexerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<CommandFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(None);

        let mux = Arc::new(Self {
            conn,
            outbound: outbound_tx,
            interface: RwLock::new(None),
            closed,
            conn_closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            counters: Counters::default(),
        });

        let writer = tokio::spawn(
            Arc::clone(&mux).write_loop(outbound_rx, config.ping_interval),
        );
        let reader = tokio::spawn(Arc::clone(&mux).read_loop(command_tx));
        mux.tasks.lock().extend([("writer", writer), ("reader", reader)]);

        debug!(
            outbound_queue = config.outbound_queue,
            ping_interval = ?config.ping_interval,
            "Multiplexer started"
        );
        (mux, command_rx)
    }

    // ========================================
    // Outbound
    // ========================================

    /// Queues a command frame for the writer task.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` once the multiplexer is closing.
    pub async fn send_command(&self, frame: &CommandFrame) -> Result<()> {
        self.enqueue(WireMessage::Text(frame.encode())).await
    }

    /// Queues a packet for the writer task. Waits while the queue is full.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` once the multiplexer is closing.
    pub async fn send_packet(&self, packet: Bytes) -> Result<()> {
        self.enqueue(WireMessage::Binary(packet)).await
    }

    async fn enqueue(&self, msg: WireMessage) -> Result<()> {
        if self.is_closing() {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(msg)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    // ========================================
    // Interface binding
    // ========================================

    /// Attaches the interface's inbound packet queue.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if an interface is already bound.
    pub fn bind_interface(&self, queue: mpsc::Sender<Bytes>) -> Result<()> {
        let mut slot = self.interface.write();
        if slot.is_some() {
            return Err(TransportError::invalid_config(
                "interface",
                "an interface is already bound",
            ));
        }
        *slot = Some(queue);
        debug!("Interface bound to multiplexer");
        Ok(())
    }

    /// Detaches the interface. Subsequent inbound packets are dropped.
    pub fn unbind_interface(&self) {
        if self.interface.write().take().is_some() {
            debug!("Interface unbound from multiplexer");
        }
    }

    /// Returns `true` while an interface is bound.
    #[must_use]
    pub fn has_interface(&self) -> bool {
        self.interface.read().is_some()
    }

    fn deliver_packet(&self, packet: Bytes) {
        let slot = self.interface.read();
        let Some(queue) = slot.as_ref() else {
            self.counters.packets_dropped.fetch_add(1, Ordering::Relaxed);
            trace!(len = packet.len(), "Dropping packet, no interface bound");
            return;
        };

        match queue.try_send(packet) {
            Ok(()) => {
                self.counters.packets_in.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(packet)) => {
                self.counters.packets_dropped.fetch_add(1, Ordering::Relaxed);
                trace!(len = packet.len(), "Dropping packet, interface queue full");
            }
            Err(mpsc::error::TrySendError::Closed(packet)) => {
                self.counters.packets_dropped.fetch_add(1, Ordering::Relaxed);
                trace!(len = packet.len(), "Dropping packet, interface queue closed");
            }
        }
    }

    // ========================================
    // Close signal
    // ========================================

    /// Starts the orderly close. Only the first reason is kept.
    ///
    /// # Returns
    /// `true` if this call set the reason.
    pub fn begin_close(&self, reason: CloseReason) -> bool {
        let mut first = false;
        let logged = reason.clone();
        self.closed.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            first = true;
            true
        });

        if first {
            if logged.is_failure() {
                warn!(reason = %logged, "Connection closing");
            } else {
                info!(reason = %logged, "Connection closing");
            }
        }
        first
    }

    /// Waits until the close signal is raised.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.closed.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(CloseReason::Shutdown),
            Err(_) => CloseReason::Shutdown,
        };
        reason
    }

    /// The close reason, if closing has begun.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed.borrow().clone()
    }

    /// Returns `true` once closing has begun.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Closes the underlying connection. Runs at most once.
    pub async fn close_connection(&self) {
        if self.conn_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.conn.close().await {
            debug!("Connection close: {}", e);
        }
    }

    /// Raises the close signal, closes the connection and joins the tasks.
    pub async fn stop(&self) {
        self.begin_close(CloseReason::Shutdown);
        self.close_connection().await;

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for (name, handle) in tasks {
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => error!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out", name),
            }
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> MultiplexerStats {
        MultiplexerStats {
            commands_in: self.counters.commands_in.load(Ordering::Relaxed),
            commands_out: self.counters.commands_out.load(Ordering::Relaxed),
            packets_in: self.counters.packets_in.load(Ordering::Relaxed),
            packets_out: self.counters.packets_out.load(Ordering::Relaxed),
            packets_dropped: self.counters.packets_dropped.load(Ordering::Relaxed),
        }
    }

    // ========================================
    // Tasks
    // ========================================

    async fn write_loop(
        self: Arc<Self>,
        mut outbound: mpsc::Receiver<WireMessage>,
        ping_interval: Option<Duration>,
    ) {
        let mut closed = self.closed.subscribe();
        let mut ticker = ping_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                () = wait_closed(&mut closed) => break,
                msg = outbound.recv() => {
                    let Some(msg) = msg else { break };
                    let is_text = msg.is_text();
                    if let Err(e) = self.conn.send(msg).await {
                        self.begin_close(CloseReason::WriteFailed(e.to_string()));
                        break;
                    }
                    if is_text {
                        self.counters.commands_out.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.counters.packets_out.fetch_add(1, Ordering::Relaxed);
                    }
                }
                () = next_tick(&mut ticker) => {
                    trace!("Sending keepalive ping");
                    if let Err(e) = self.conn.ping().await {
                        self.begin_close(CloseReason::WriteFailed(e.to_string()));
                        break;
                    }
                }
            }
        }
        debug!("Writer task stopped");
    }

    async fn read_loop(self: Arc<Self>, commands: mpsc::UnboundedSender<CommandFrame>) {
        let mut closed = self.closed.subscribe();

        loop {
            let received = tokio::select! {
                () = wait_closed(&mut closed) => break,
                received = self.conn.recv() => received,
            };

            match received {
                Ok(Some(WireMessage::Text(text))) => match CommandFrame::decode(&text) {
                    Ok(frame) => {
                        self.counters.commands_in.fetch_add(1, Ordering::Relaxed);
                        trace!(command = %frame.name(), "Command frame received");
                        if commands.send(frame).is_err() {
                            debug!("Command receiver dropped");
                        }
                    }
                    Err(e) => warn!("Discarding command frame: {}", e),
                },
                Ok(Some(WireMessage::Binary(packet))) => self.deliver_packet(packet),
                Ok(None) => {
                    self.begin_close(CloseReason::PeerClosed);
                    break;
                }
                Err(e) => {
                    self.begin_close(CloseReason::ReadFailed(e.to_string()));
                    break;
                }
            }
        }
        debug!("Reader task stopped");
    }
}

async fn wait_closed(closed: &mut watch::Receiver<Option<CloseReason>>) {
    let _ = closed.wait_for(Option::is_some).await;
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("close_reason", &self.close_reason())
            .field("interface_bound", &self.has_interface())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use wstun_transport::MockConnection;

    fn config() -> MultiplexerConfig {
        MultiplexerConfig {
            outbound_queue: 16,
            ping_interval: None,
        }
    }

    #[tokio::test]
    async fn test_text_frames_become_commands() {
        let conn = Arc::new(MockConnection::new());
        let (mux, mut commands) = Multiplexer::start(conn.clone(), config());

        conn.inject_text("init TUN 10.8.0.0/24 1400");
        conn.inject_text("   ");
        conn.inject_text("addroute 192.168.50.0/24");

        assert_eq!(commands.recv().await.unwrap().name(), "init");
        assert_eq!(commands.recv().await.unwrap().name(), "addroute");
        assert_eq!(mux.stats().commands_in, 2);

        mux.stop().await;
    }

    #[tokio::test]
    async fn test_packets_dropped_without_interface() {
        let conn = Arc::new(MockConnection::new());
        let (mux, mut commands) = Multiplexer::start(conn.clone(), config());

        conn.inject_binary(vec![0x45, 0, 0, 20]);
        conn.inject_text("marker");
        assert_eq!(commands.recv().await.unwrap().name(), "marker");

        assert_eq!(mux.stats().packets_dropped, 1);
        assert!(!mux.is_closing());
        mux.stop().await;
    }

    #[tokio::test]
    async fn test_packets_delivered_to_bound_interface() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), config());

        let (tx, mut rx) = mpsc::channel(4);
        mux.bind_interface(tx).unwrap();
        let (second, _) = mpsc::channel(1);
        assert!(mux.bind_interface(second).is_err());

        conn.inject_binary(vec![1, 2, 3]);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(&[1, 2, 3]));

        mux.unbind_interface();
        assert!(!mux.has_interface());
        mux.stop().await;
    }

    #[tokio::test]
    async fn test_outbound_goes_through_connection() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), config());

        mux.send_command(&CommandFrame::new("hello", ["a", "b"])).await.unwrap();
        mux.send_packet(Bytes::from_static(b"pkt")).await.unwrap();
        conn.wait_for_sent(2).await;

        assert_eq!(conn.sent_text(), vec!["hello a b".to_string()]);
        assert_eq!(conn.sent_binary(), vec![Bytes::from_static(b"pkt")]);
        mux.stop().await;
    }

    #[tokio::test]
    async fn test_peer_disconnect_closes_once() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), config());

        conn.disconnect();
        assert_eq!(mux.closed().await, CloseReason::PeerClosed);
        assert!(!mux.begin_close(CloseReason::Shutdown));
        assert_eq!(mux.close_reason(), Some(CloseReason::PeerClosed));

        mux.stop().await;
        mux.stop().await;
        assert_eq!(conn.close_count(), 1);
        assert!(mux
            .send_packet(Bytes::from_static(b"late"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_write_failure_closes() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), config());

        conn.fail_sends(true);
        mux.send_packet(Bytes::from_static(b"x")).await.unwrap();

        assert!(matches!(mux.closed().await, CloseReason::WriteFailed(_)));
        mux.stop().await;
    }

    #[tokio::test]
    async fn test_keepalive_pings() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(
            conn.clone(),
            MultiplexerConfig {
                outbound_queue: 4,
                ping_interval: Some(Duration::from_millis(20)),
            },
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(conn.ping_count() >= 2);
        mux.stop().await;
    }
}
