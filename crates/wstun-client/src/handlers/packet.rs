// ============================================
// File: crates/wstun-client/src/handlers/packet.rs
// ============================================
//! # Packet Pump
//!
//! ## Creation Reason
//! Moves frames between the bound interface and the multiplexer once a
//! session is active.
//!
//! ## Packet Flow
//! ```text
//!   TunDevice::read ──► device_to_peer ──► Multiplexer::send_packet
//!
//!   Multiplexer inbound queue ──► peer_to_device ──► TunDevice::write
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames are forwarded unmodified; nothing here parses them
//! - Each direction is its own task so a stalled device write never
//!   holds up device reads, and vice versa
//! - A closed device ends `device_to_peer` quietly; any other read error
//!   is logged first
//!
//! ## Last Modified
//! v0.1.0 - Initial packet pump

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use wstun_transport::traits::TunDevice;

use crate::services::multiplexer::Multiplexer;

// ============================================
// Constants
// ============================================

/// Read buffer size; large enough for any frame the kernel hands out.
const MAX_FRAME_SIZE: usize = 65536;

/// How long `stop` lets each direction wind down before aborting it.
const PUMP_STOP_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================
// Statistics
// ============================================

/// Point-in-time pump counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Frames read from the device and queued to the peer.
    pub to_peer: u64,
    /// Frames received from the peer and written to the device.
    pub to_device: u64,
    /// Device writes that failed.
    pub write_errors: u64,
}

#[derive(Default)]
struct Counters {
    to_peer: AtomicU64,
    to_device: AtomicU64,
    write_errors: AtomicU64,
}

// ============================================
// PacketPump
// ============================================

/// The two running packet flows of one interface.
pub struct PacketPump {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    counters: Arc<Counters>,
}

impl PacketPump {
    /// Starts both directions.
    ///
    /// # Arguments
    /// * `device` - The bound interface
    /// * `mux` - Destination of frames read from the device
    /// * `inbound` - Frames from the peer, fed by the multiplexer
    #[must_use]
    pub fn spawn(
        device: Arc<dyn TunDevice>,
        mux: Arc<Multiplexer>,
        inbound: mpsc::Receiver<Bytes>,
    ) -> Self {
        let counters = Arc::new(Counters::default());

        let outbound = tokio::spawn(device_to_peer(
            Arc::clone(&device),
            mux,
            Arc::clone(&counters),
        ));
        let inbound = tokio::spawn(peer_to_device(device, inbound, Arc::clone(&counters)));

        Self {
            tasks: vec![("device_to_peer", outbound), ("peer_to_device", inbound)],
            counters,
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PumpStats {
        PumpStats {
            to_peer: self.counters.to_peer.load(Ordering::Relaxed),
            to_device: self.counters.to_device.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Waits for both flows to end, aborting any that do not.
    ///
    /// Call after the device is closed and the inbound queue detached.
    pub async fn stop(self) {
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(PUMP_STOP_TIMEOUT, &mut handle).await {
                Ok(_) => debug!("Pump '{}' stopped", name),
                Err(_) => {
                    handle.abort();
                    debug!("Pump '{}' aborted", name);
                }
            }
        }
    }
}

impl std::fmt::Debug for PacketPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketPump")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn device_to_peer(device: Arc<dyn TunDevice>, mux: Arc<Multiplexer>, counters: Arc<Counters>) {
    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    loop {
        let len = match device.read(&mut buf).await {
            Ok(0) => {
                debug!(iface = %device.name(), "Device reached end of stream");
                break;
            }
            Ok(len) => len,
            Err(e) => {
                if device.is_open() {
                    warn!(iface = %device.name(), "Device read failed: {}", e);
                }
                break;
            }
        };

        trace!(iface = %device.name(), len, "Device → peer");
        if mux.send_packet(Bytes::copy_from_slice(&buf[..len])).await.is_err() {
            debug!("Multiplexer closed, stopping device reader");
            break;
        }
        counters.to_peer.fetch_add(1, Ordering::Relaxed);
    }
}

async fn peer_to_device(
    device: Arc<dyn TunDevice>,
    mut inbound: mpsc::Receiver<Bytes>,
    counters: Arc<Counters>,
) {
    while let Some(packet) = inbound.recv().await {
        trace!(iface = %device.name(), len = packet.len(), "Peer → device");
        match device.write(&packet).await {
            Ok(_) => {
                counters.to_device.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                if !device.is_open() {
                    break;
                }
                warn!(iface = %device.name(), "Device write failed: {}", e);
            }
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::multiplexer::MultiplexerConfig;
    use wstun_common::DeviceKind;
    use wstun_transport::traits::TunConfig;
    use wstun_transport::{MockConnection, MockTun};

    #[tokio::test]
    async fn test_frames_pass_unmodified() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(
            conn.clone(),
            MultiplexerConfig {
                outbound_queue: 8,
                ping_interval: None,
            },
        );
        let tun = Arc::new(MockTun::new(TunConfig::new(DeviceKind::Tun).with_name("tun0")));
        let (tx, rx) = mpsc::channel(8);
        mux.bind_interface(tx).unwrap();
        let pump = PacketPump::spawn(tun.clone(), Arc::clone(&mux), rx);

        let outgoing = vec![0x45, 0x00, 0x00, 0x1c, 0xde, 0xad];
        tun.inject_packet(outgoing.clone());
        conn.wait_for_sent(1).await;
        assert_eq!(conn.sent_binary(), vec![Bytes::from(outgoing)]);

        conn.inject_binary(vec![0x45, 0x00, 0x00, 0x14]);
        while tun.written_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tun.take_written_packets(), vec![vec![0x45, 0x00, 0x00, 0x14]]);
        assert_eq!(pump.stats().to_peer, 1);

        mux.unbind_interface();
        tun.close().await.unwrap();
        pump.stop().await;
        mux.stop().await;
    }

    /// Device whose reads always report end of stream.
    struct EmptyTun {
        reads: AtomicU64,
    }

    #[async_trait::async_trait]
    impl TunDevice for EmptyTun {
        async fn read(&self, _buf: &mut [u8]) -> wstun_transport::Result<usize> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            Ok(0)
        }

        async fn write(&self, buf: &[u8]) -> wstun_transport::Result<usize> {
            Ok(buf.len())
        }

        fn name(&self) -> &str {
            "tun0"
        }

        fn kind(&self) -> DeviceKind {
            DeviceKind::Tun
        }

        fn mtu(&self) -> u16 {
            1500
        }

        async fn configure(&self, _address: Option<ipnet::Ipv4Net>) -> wstun_transport::Result<()> {
            Ok(())
        }

        async fn close(&self) -> wstun_transport::Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_end_of_stream_stops_reader() {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), MultiplexerConfig::default());
        let tun = Arc::new(EmptyTun {
            reads: AtomicU64::new(0),
        });
        let (_tx, rx) = mpsc::channel(8);
        let pump = PacketPump::spawn(tun.clone(), Arc::clone(&mux), rx);

        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tun.reads.load(Ordering::Relaxed), 1);
        assert!(conn.sent_binary().is_empty());

        pump.stop().await;
        mux.stop().await;
    }
}
