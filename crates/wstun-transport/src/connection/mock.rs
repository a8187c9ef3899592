// ============================================
// File: crates/wstun-transport/src/connection/mock.rs
// ============================================
//! # Mock Connection
//!
//! ## Creation Reason
//! In-memory `Connection` for driving the multiplexer and session from
//! tests: the test plays the remote peer.
//!
//! ## Main Functionality
//! - `inject_text` / `inject_binary`: queue inbound messages
//! - `disconnect`: simulate the peer going away (end of stream)
//! - `fail_sends`: simulate a broken write side
//! - `sent` / `wait_for_sent`: inspect outbound messages
//! - `overlapping_sends`: counts sends that overlapped another send
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};

use crate::error::{Result, TransportError};
use crate::traits::{Connection, WireMessage};

// ============================================
// MockConnection
// ============================================

/// In-memory connection; the test acts as the peer.
pub struct MockConnection {
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<WireMessage>>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<WireMessage>>,
    sent: Mutex<Vec<WireMessage>>,
    sent_notify: Notify,
    pings: AtomicUsize,
    closed: watch::Sender<bool>,
    close_count: AtomicUsize,
    fail_sends: AtomicBool,
    in_send: AtomicBool,
    overlapping: AtomicUsize,
}

impl MockConnection {
    /// Creates an open connection.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            pings: AtomicUsize::new(0),
            closed,
            close_count: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            in_send: AtomicBool::new(false),
            overlapping: AtomicUsize::new(0),
        }
    }

    /// Queues an inbound text message.
    pub fn inject_text(&self, text: impl Into<String>) {
        self.inject(WireMessage::Text(text.into()));
    }

    /// Queues an inbound binary message.
    pub fn inject_binary(&self, data: impl Into<Bytes>) {
        self.inject(WireMessage::Binary(data.into()));
    }

    fn inject(&self, msg: WireMessage) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            let _ = tx.send(msg);
        }
    }

    /// Peer goes away: `recv` returns `None` once the queue drains.
    pub fn disconnect(&self) {
        self.inbound_tx.lock().take();
    }

    /// Makes every subsequent `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Release);
    }

    /// All messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<WireMessage> {
        self.sent.lock().clone()
    }

    /// Text messages sent so far.
    #[must_use]
    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                WireMessage::Text(t) => Some(t.clone()),
                WireMessage::Binary(_) => None,
            })
            .collect()
    }

    /// Binary messages sent so far.
    #[must_use]
    pub fn sent_binary(&self) -> Vec<Bytes> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                WireMessage::Binary(b) => Some(b.clone()),
                WireMessage::Text(_) => None,
            })
            .collect()
    }

    /// Waits until at least `count` messages have been sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.sent.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Number of keepalive pings sent.
    #[must_use]
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::Acquire)
    }

    /// Number of effective `close` calls.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }

    /// Number of sends that started while another send was in flight.
    #[must_use]
    pub fn overlapping_sends(&self) -> usize {
        self.overlapping.load(Ordering::Acquire)
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, msg: WireMessage) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(TransportError::SendFailed {
                reason: "simulated failure".into(),
            });
        }

        if self.in_send.swap(true, Ordering::AcqRel) {
            self.overlapping.fetch_add(1, Ordering::AcqRel);
        }
        // Widen the window in which an unserialized second writer would
        // be caught.
        tokio::task::yield_now().await;
        self.sent.lock().push(msg);
        self.in_send.store(false, Ordering::Release);

        self.sent_notify.notify_waiters();
        Ok(())
    }

    async fn recv(&self) -> Result<Option<WireMessage>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(None);
        }
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            msg = rx.recv() => Ok(msg),
            _ = closed.wait_for(|c| *c) => Ok(None),
        }
    }

    async fn ping(&self) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.pings.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.send_replace(true) {
            self.close_count.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("open", &self.is_open())
            .field("sent", &self.sent.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_inject_and_recv() {
        let conn = MockConnection::new();
        conn.inject_text("init TUN 10.8.0.0/24 1400");
        conn.inject_binary(vec![1, 2, 3]);

        assert_eq!(
            conn.recv().await.unwrap(),
            Some(WireMessage::Text("init TUN 10.8.0.0/24 1400".into()))
        );
        assert!(matches!(conn.recv().await.unwrap(), Some(WireMessage::Binary(_))));
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let conn = MockConnection::new();
        conn.inject_text("x");
        conn.disconnect();

        assert!(conn.recv().await.unwrap().is_some());
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_wakes_receiver() {
        let conn = Arc::new(MockConnection::new());
        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };

        tokio::task::yield_now().await;
        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), None);
        assert_eq!(conn.close_count(), 1);
        assert!(conn.send(WireMessage::Text("late".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_send_capture_and_failure() {
        let conn = MockConnection::new();
        conn.send(WireMessage::Text("a".into())).await.unwrap();
        conn.send(WireMessage::Binary(Bytes::from_static(b"b"))).await.unwrap();
        conn.wait_for_sent(2).await;

        assert_eq!(conn.sent_text(), vec!["a".to_string()]);
        assert_eq!(conn.sent_binary().len(), 1);
        assert_eq!(conn.overlapping_sends(), 0);

        conn.fail_sends(true);
        assert!(conn.send(WireMessage::Text("c".into())).await.is_err());
    }
}
