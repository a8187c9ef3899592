// ============================================
// File: crates/wstun-transport/src/connection/websocket.rs
// ============================================
//! # WebSocket Connection
//!
//! ## Creation Reason
//! Implements `Connection` over `tokio-tungstenite`, mapping WebSocket
//! text/binary messages onto the two logical channels.
//!
//! ## Main Functionality
//! - `WebSocketConnection::connect`: dial `ws://` / `wss://` with an
//!   optional `Authorization` header
//! - `WebSocketConnection::from_stream`: wrap an established stream
//! - Split sink/stream so reads and writes never wait on each other
//!
//! ## Message Mapping
//! | WebSocket | `recv()` result |
//! |-----------|-----------------|
//! | Text | `WireMessage::Text` |
//! | Binary | `WireMessage::Binary` |
//! | Ping / Pong / raw Frame | skipped (library answers pings) |
//! | Close / end of stream | `Ok(None)` |
//!
//! ## ⚠️ Important Note for Next Developer
//! - The sink mutex is uncontended in normal operation because the
//!   multiplexer has one writer task; it exists so `close()` is safe
//! - Never log the request URL passed to `connect`; callers pass a
//!   sanitized copy for diagnostics
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{Connection, WireMessage};

// ============================================
// WebSocketConnection
// ============================================

/// `Connection` backed by a WebSocket.
pub struct WebSocketConnection<S = MaybeTlsStream<TcpStream>> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    open: AtomicBool,
}

impl WebSocketConnection {
    /// Dials the endpoint.
    ///
    /// # Arguments
    /// * `url` - `ws://` or `wss://` URL without userinfo
    /// * `authorization` - Full `Authorization` header value, if any
    ///
    /// # Errors
    /// Returns `ConnectFailed` if the request is invalid or the handshake
    /// fails.
    pub async fn connect(url: &str, authorization: Option<&str>) -> Result<Self> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::connect_failed(url, e.to_string()))?;

        if let Some(value) = authorization {
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::connect_failed(url, format!("bad auth header: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::connect_failed(url, e.to_string()))?;

        info!(status = %response.status(), "WebSocket connected");
        Ok(Self::from_stream(ws))
    }
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an already established WebSocket stream.
    #[must_use]
    pub fn from_stream(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            open: AtomicBool::new(true),
        }
    }

    async fn write(&self, msg: Message) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&self, msg: WireMessage) -> Result<()> {
        let msg = match msg {
            WireMessage::Text(text) => Message::Text(text),
            WireMessage::Binary(bytes) => Message::Binary(bytes.to_vec()),
        };
        self.write(msg).await
    }

    async fn recv(&self) -> Result<Option<WireMessage>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(WireMessage::Text(text))),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(WireMessage::Binary(Bytes::from(data))))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Peer sent close frame");
                    self.open.store(false, Ordering::Release);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    trace!(len = other.len(), "Skipping control frame");
                }
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ReceiveFailed {
                        reason: e.to_string(),
                    });
                }
                None => {
                    self.open.store(false, Ordering::Release);
                    return Ok(None);
                }
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.write(Message::Ping(Vec::new())).await
    }

    async fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        debug!("Closing WebSocket");
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Close frame not sent: {}", e);
        }
        if let Err(e) = sink.close().await {
            debug!("WebSocket close: {}", e);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<S> std::fmt::Debug for WebSocketConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("open", &self.open.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (WebSocketConnection<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (WebSocketConnection::from_stream(client), server)
    }

    #[tokio::test]
    async fn test_text_and_binary_mapping() {
        let (conn, mut server) = pair().await;

        server.send(Message::Text("init TUN 10.8.0.0/24 1400".into())).await.unwrap();
        server.send(Message::Binary(vec![0x45, 0, 0, 20])).await.unwrap();

        assert_eq!(
            conn.recv().await.unwrap(),
            Some(WireMessage::Text("init TUN 10.8.0.0/24 1400".into()))
        );
        assert_eq!(
            conn.recv().await.unwrap(),
            Some(WireMessage::Binary(Bytes::from_static(&[0x45, 0, 0, 20])))
        );

        conn.send(WireMessage::Binary(Bytes::from_static(b"pkt"))).await.unwrap();
        assert_eq!(server.next().await.unwrap().unwrap(), Message::Binary(b"pkt".to_vec()));
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (conn, mut server) = pair().await;
        server.close(None).await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, mut server) = pair().await;

        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert!(matches!(server.next().await, Some(Ok(Message::Close(_)))));
        assert!(matches!(
            conn.send(WireMessage::Text("x".into())).await,
            Err(TransportError::ConnectionClosed)
        ));
    }
}
