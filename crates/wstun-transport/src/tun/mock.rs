// ============================================
// File: crates/wstun-transport/src/tun/mock.rs
// ============================================
//! # Mock TUN Device Implementation
//!
//! ## Creation Reason
//! Provides a mock device and device provider for testing without
//! creating kernel interfaces or needing root.
//!
//! ## Main Functionality
//! - In-memory packet queues
//! - Records configuration and close calls for assertions
//! - `MockDeviceProvider` hands out `MockTun`s and can simulate failures
//!
//! ## Usage in Tests
//! ```
//! use wstun_common::DeviceKind;
//! use wstun_transport::tun::MockTun;
//! use wstun_transport::traits::{TunConfig, TunDevice};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tun = MockTun::new(TunConfig::new(DeviceKind::Tun).with_name("mock0"));
//! tun.inject_packet(b"test packet".to_vec());
//!
//! let mut buf = [0u8; 1500];
//! let len = tun.read(&mut buf).await.unwrap();
//! assert_eq!(&buf[..len], b"test packet");
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Packet queues are bounded to prevent memory issues
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use parking_lot::Mutex;
use tokio::sync::Notify;

use wstun_common::DeviceKind;

use crate::error::{Result, TransportError};
use crate::traits::{DeviceProvider, TunConfig, TunDevice};

// ============================================
// Constants
// ============================================

/// Maximum number of packets to queue.
const MAX_QUEUE_SIZE: usize = 1000;

// ============================================
// MockTun
// ============================================

/// Mock device for testing.
pub struct MockTun {
    /// Device configuration
    config: TunConfig,
    /// Packets waiting to be read (injected for testing)
    read_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Packets that have been written (captured for verification)
    write_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Address passed to each `configure` call
    configured: Mutex<Vec<Option<Ipv4Net>>>,
    /// Whether the device is still open
    open: AtomicBool,
    /// Number of effective `close` calls
    close_count: AtomicUsize,
    /// Wakes readers on inject and close
    read_notify: Notify,
}

impl MockTun {
    /// Creates a new mock device.
    #[must_use]
    pub fn new(config: TunConfig) -> Self {
        Self {
            config,
            read_queue: Mutex::new(VecDeque::with_capacity(100)),
            write_queue: Mutex::new(VecDeque::with_capacity(100)),
            configured: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            close_count: AtomicUsize::new(0),
            read_notify: Notify::new(),
        }
    }

    /// Injects a packet to be returned by a later `read()` call.
    ///
    /// # Panics
    /// Panics if the queue is full (> `MAX_QUEUE_SIZE` packets).
    pub fn inject_packet(&self, packet: Vec<u8>) {
        let mut queue = self.read_queue.lock();
        assert!(queue.len() < MAX_QUEUE_SIZE, "Mock TUN read queue overflow");
        queue.push_back(packet);
        drop(queue);
        self.read_notify.notify_waiters();
    }

    /// Takes all packets that have been written to the device.
    #[must_use]
    pub fn take_written_packets(&self) -> Vec<Vec<u8>> {
        self.write_queue.lock().drain(..).collect()
    }

    /// Returns the number of packets waiting to be read.
    #[must_use]
    pub fn pending_read_count(&self) -> usize {
        self.read_queue.lock().len()
    }

    /// Returns the number of packets that have been written.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.write_queue.lock().len()
    }

    /// Returns the address argument of every `configure` call.
    #[must_use]
    pub fn configure_calls(&self) -> Vec<Option<Ipv4Net>> {
        self.configured.lock().clone()
    }

    /// Returns how many times the device was actually closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> TransportError {
        TransportError::DeviceClosed {
            name: self.config.name.clone(),
        }
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let notified = self.read_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(packet) = self.read_queue.lock().pop_front() {
                let len = packet.len().min(buf.len());
                buf[..len].copy_from_slice(&packet[..len]);
                return Ok(len);
            }

            if !self.is_open() {
                return Err(self.closed_error());
            }

            notified.await;
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        let mut queue = self.write_queue.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            return Err(TransportError::DeviceWriteFailed {
                reason: "Write queue full".into(),
            });
        }
        queue.push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> DeviceKind {
        self.config.kind
    }

    fn mtu(&self) -> u16 {
        self.config.mtu
    }

    async fn configure(&self, address: Option<Ipv4Net>) -> Result<()> {
        self.configured.lock().push(address);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::AcqRel) {
            self.close_count.fetch_add(1, Ordering::AcqRel);
            self.read_notify.notify_waiters();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for MockTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTun")
            .field("name", &self.config.name)
            .field("kind", &self.config.kind)
            .field("mtu", &self.config.mtu)
            .field("open", &self.is_open())
            .field("pending_reads", &self.pending_read_count())
            .field("written_packets", &self.written_count())
            .finish()
    }
}

// ============================================
// MockDeviceProvider
// ============================================

/// Device provider handing out `MockTun`s.
///
/// Template names (`tun%d`) are expanded with a running index, the way
/// the kernel would.
#[derive(Debug, Default)]
pub struct MockDeviceProvider {
    devices: Mutex<Vec<Arc<MockTun>>>,
    fail_create: AtomicBool,
}

impl MockDeviceProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::Release);
    }

    /// Every device created so far.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<MockTun>> {
        self.devices.lock().clone()
    }

    /// The most recently created device.
    #[must_use]
    pub fn last_device(&self) -> Option<Arc<MockTun>> {
        self.devices.lock().last().cloned()
    }
}

#[async_trait]
impl DeviceProvider for MockDeviceProvider {
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>> {
        config.validate()?;
        if self.fail_create.load(Ordering::Acquire) {
            return Err(TransportError::device_create_failed(
                &config.name,
                "simulated failure",
            ));
        }

        let mut devices = self.devices.lock();
        let name = config.name.replace("%d", &devices.len().to_string());
        let tun = Arc::new(MockTun::new(config.with_name(name)));
        devices.push(Arc::clone(&tun));
        Ok(tun)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockTun {
        MockTun::new(TunConfig::new(DeviceKind::Tun).with_name("mock0").with_mtu(1400))
    }

    #[tokio::test]
    async fn test_mock_tun_basic() {
        let tun = mock();
        assert_eq!(tun.name(), "mock0");
        assert_eq!(tun.mtu(), 1400);
        assert!(tun.is_open());
    }

    #[tokio::test]
    async fn test_mock_tun_inject_read() {
        let tun = mock();
        tun.inject_packet(b"test packet".to_vec());
        assert_eq!(tun.pending_read_count(), 1);

        let mut buf = [0u8; 100];
        let len = tun.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"test packet");
        assert_eq!(tun.pending_read_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_tun_read_waits_for_inject() {
        let tun = Arc::new(mock());
        let reader = {
            let tun = Arc::clone(&tun);
            tokio::spawn(async move {
                let mut buf = [0u8; 100];
                let len = tun.read(&mut buf).await.unwrap();
                buf[..len].to_vec()
            })
        };

        tokio::task::yield_now().await;
        tun.inject_packet(b"late".to_vec());
        assert_eq!(reader.await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn test_mock_tun_write_capture() {
        let tun = mock();
        tun.write(b"packet 1").await.unwrap();
        tun.write(b"packet 2").await.unwrap();
        assert_eq!(tun.written_count(), 2);

        let captured = tun.take_written_packets();
        assert_eq!(captured, vec![b"packet 1".to_vec(), b"packet 2".to_vec()]);
        assert_eq!(tun.written_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_tun_close_wakes_reader() {
        let tun = Arc::new(mock());
        let reader = {
            let tun = Arc::clone(&tun);
            tokio::spawn(async move {
                let mut buf = [0u8; 100];
                tun.read(&mut buf).await
            })
        };

        tokio::task::yield_now().await;
        tun.close().await.unwrap();
        tun.close().await.unwrap();

        assert!(matches!(
            reader.await.unwrap(),
            Err(TransportError::DeviceClosed { .. })
        ));
        assert_eq!(tun.close_count(), 1);
        assert!(tun.write(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_provider_names_and_failure() {
        let provider = MockDeviceProvider::new();
        let first = provider.create(TunConfig::new(DeviceKind::Tun)).await.unwrap();
        let second = provider.create(TunConfig::new(DeviceKind::Tap)).await.unwrap();
        assert_eq!(first.name(), "tun0");
        assert_eq!(second.name(), "tap1");
        assert_eq!(second.kind(), DeviceKind::Tap);
        assert_eq!(provider.devices().len(), 2);

        provider.fail_create(true);
        let Err(err) = provider.create(TunConfig::new(DeviceKind::Tun)).await else {
            panic!("create should fail");
        };
        assert!(matches!(err, TransportError::DeviceCreateFailed { .. }));
    }
}
