// ============================================
// File: crates/wstun-transport/src/tun/linux.rs
// ============================================
//! # Linux TUN/TAP Device Implementation
//!
//! ## Creation Reason
//! Provides the Linux device backend using the `/dev/net/tun` clone
//! device.
//!
//! ## Main Functionality
//! - TUN or TAP device creation via ioctl
//! - MTU, address and link configuration via `ip`
//! - Async read/write via Tokio `AsyncFd`
//! - `LinuxDeviceProvider` for the session layer
//!
//! ## Linux TUN Interface
//! 1. Open `/dev/net/tun`
//! 2. `TUNSETIFF` with `IFF_TUN|IFF_NO_PI` or `IFF_TAP|IFF_NO_PI`
//! 3. The kernel fills in the name from the `tun%d`/`tap%d` template
//! 4. `ip link set mtu`, `ip addr add`, `ip link set up`
//! 5. Read/write frames
//!
//! ## Required Capabilities
//! - `CAP_NET_ADMIN`, or run as root
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always set IFF_NO_PI; the peer expects bare frames
//! - `close()` wakes pending reads and writes; they return `DeviceClosed`
//!
//! ## Last Modified
//! v0.1.0 - Initial Linux implementation

#![cfg(target_os = "linux")]

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use nix::libc;
use parking_lot::RwLock;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use wstun_common::DeviceKind;

use crate::error::{Result, TransportError};
use crate::ip;
use crate::traits::{DeviceProvider, TunConfig, TunDevice};

// ============================================
// Constants
// ============================================

/// Path to the TUN device clone device.
const TUN_DEVICE_PATH: &str = "/dev/net/tun";

/// IFF_TUN flag - TUN device (no Ethernet headers).
const IFF_TUN: libc::c_short = 0x0001;

/// IFF_TAP flag - TAP device (Ethernet frames).
const IFF_TAP: libc::c_short = 0x0002;

/// IFF_NO_PI flag - Do not provide packet information.
const IFF_NO_PI: libc::c_short = 0x1000;

/// TUNSETIFF ioctl number.
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

// ============================================
// ifreq Structure
// ============================================

/// Interface request structure for ioctl calls.
#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_flags: libc::c_short,
    _padding: [u8; 22],
}

impl IfReq {
    #[allow(clippy::cast_possible_wrap)]
    fn new(name: &str) -> Self {
        let mut ifr = Self {
            ifr_name: [0; libc::IFNAMSIZ],
            ifr_flags: 0,
            _padding: [0; 22],
        };

        let name_bytes = name.as_bytes();
        let copy_len = name_bytes.len().min(libc::IFNAMSIZ - 1);
        for (slot, &byte) in ifr.ifr_name.iter_mut().zip(&name_bytes[..copy_len]) {
            *slot = byte as libc::c_char;
        }

        ifr
    }

    fn with_flags(mut self, flags: libc::c_short) -> Self {
        self.ifr_flags = flags;
        self
    }

    fn name(&self) -> String {
        #[allow(clippy::cast_sign_loss)]
        let bytes: Vec<u8> = self
            .ifr_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

const fn flags_for(kind: DeviceKind) -> libc::c_short {
    match kind {
        DeviceKind::Tun => IFF_TUN | IFF_NO_PI,
        DeviceKind::Tap => IFF_TAP | IFF_NO_PI,
    }
}

// ============================================
// LinuxTun
// ============================================

/// Linux TUN/TAP device.
///
/// # Example
/// ```ignore
/// use wstun_common::DeviceKind;
/// use wstun_transport::tun::LinuxTun;
/// use wstun_transport::traits::TunConfig;
///
/// let tun = LinuxTun::create(TunConfig::new(DeviceKind::Tun).with_mtu(1400))?;
/// tun.configure(Some("10.8.0.2/24".parse()?)).await?;
/// ```
pub struct LinuxTun {
    /// Async file descriptor; `None` once closed
    fd: RwLock<Option<Arc<AsyncFd<File>>>>,
    /// Device configuration, name replaced by the kernel-assigned one
    config: TunConfig,
    /// Whether the device is still open
    open: AtomicBool,
    /// Wakes pending reads and writes on close
    shutdown: Notify,
}

impl LinuxTun {
    /// Creates a new device with the given configuration.
    ///
    /// # Errors
    /// - `DeviceCreateFailed`: If device creation fails
    /// - `PermissionDenied`: If lacking `CAP_NET_ADMIN`
    pub fn create(config: TunConfig) -> Result<Self> {
        config.validate()?;

        info!("Creating {} device from template {}", config.kind, config.name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TUN_DEVICE_PATH)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    TransportError::PermissionDenied {
                        operation: format!("open {TUN_DEVICE_PATH}"),
                    }
                } else {
                    TransportError::device_create_failed(&config.name, e.to_string())
                }
            })?;

        let fd = file.as_raw_fd();
        let mut ifr = IfReq::new(&config.name).with_flags(flags_for(config.kind));

        // SAFETY: fd is an open /dev/net/tun descriptor and ifr is a valid,
        // properly sized ifreq for TUNSETIFF.
        let result = unsafe { libc::ioctl(fd, TUNSETIFF, &mut ifr) };
        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                return Err(TransportError::PermissionDenied {
                    operation: format!("TUNSETIFF {}", config.name),
                });
            }
            return Err(TransportError::device_create_failed(
                &config.name,
                format!("TUNSETIFF failed: {err}"),
            ));
        }

        let actual_name = ifr.name();
        debug!("Device created: {}", actual_name);

        // SAFETY: fd is valid for the lifetime of `file`.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(TransportError::device_create_failed(
                &actual_name,
                "Failed to get file flags",
            ));
        }

        // SAFETY: as above.
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(TransportError::device_create_failed(
                &actual_name,
                "Failed to set non-blocking mode",
            ));
        }

        let async_fd = AsyncFd::with_interest(file, Interest::READABLE | Interest::WRITABLE)
            .map_err(|e| {
                TransportError::device_create_failed(
                    &actual_name,
                    format!("AsyncFd creation failed: {e}"),
                )
            })?;

        Ok(Self {
            fd: RwLock::new(Some(Arc::new(async_fd))),
            config: config.with_name(actual_name),
            open: AtomicBool::new(true),
            shutdown: Notify::new(),
        })
    }

    fn closed_error(&self) -> TransportError {
        TransportError::DeviceClosed {
            name: self.config.name.clone(),
        }
    }

    fn current_fd(&self) -> Result<Arc<AsyncFd<File>>> {
        self.fd.read().clone().ok_or_else(|| self.closed_error())
    }

    async fn ip(&self, args: &[&str]) -> Result<()> {
        ip::run(args)
            .await
            .map_err(|reason| TransportError::device_config_failed(&self.config.name, reason))
    }
}

#[async_trait]
#[allow(clippy::cast_sign_loss)]
impl TunDevice for LinuxTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let async_fd = self.current_fd()?;
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();
        if !self.is_open() {
            return Err(self.closed_error());
        }

        loop {
            let mut guard = tokio::select! {
                ready = async_fd.ready(Interest::READABLE) => {
                    ready.map_err(|e| TransportError::DeviceReadFailed {
                        reason: e.to_string(),
                    })?
                }
                () = shutdown.as_mut() => return Err(self.closed_error()),
            };

            match guard.try_io(|inner| {
                let fd = inner.get_ref().as_raw_fd();
                // SAFETY: buf is a valid writable slice of buf.len() bytes.
                let result = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
                if result < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(result as usize)
                }
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => {
                    return Err(TransportError::DeviceReadFailed {
                        reason: e.to_string(),
                    })
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let async_fd = self.current_fd()?;
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();
        if !self.is_open() {
            return Err(self.closed_error());
        }

        loop {
            let mut guard = tokio::select! {
                ready = async_fd.ready(Interest::WRITABLE) => {
                    ready.map_err(|e| TransportError::DeviceWriteFailed {
                        reason: e.to_string(),
                    })?
                }
                () = shutdown.as_mut() => return Err(self.closed_error()),
            };

            match guard.try_io(|inner| {
                let fd = inner.get_ref().as_raw_fd();
                // SAFETY: buf is a valid readable slice of buf.len() bytes.
                let result = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
                if result < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(result as usize)
                }
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => {
                    return Err(TransportError::DeviceWriteFailed {
                        reason: e.to_string(),
                    })
                }
                Err(_would_block) => continue,
            }
        }
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
        let name = self.config.name.as_str();
        let mtu = self.config.mtu.to_string();

        debug!("Setting MTU to {} on {}", mtu, name);
        self.ip(&["link", "set", "dev", name, "mtu", &mtu]).await?;

        if let Some(address) = address {
            let address = address.to_string();
            debug!("Assigning {} to {}", address, name);
            self.ip(&["addr", "add", &address, "dev", name]).await?;
        }

        self.ip(&["link", "set", "dev", name, "up"]).await?;
        info!(iface = %name, "Device is up");

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        info!("Closing device: {}", self.config.name);
        self.shutdown.notify_waiters();

        if let Err(reason) = ip::run(&["link", "set", "dev", &self.config.name, "down"]).await {
            warn!("ip link set down failed: {}", reason);
        }

        // Woken readers and writers drop their clones as they return, so
        // this releases the last reference and the kernel removes the device.
        self.fd.write().take();

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LinuxTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxTun")
            .field("name", &self.config.name)
            .field("kind", &self.config.kind)
            .field("mtu", &self.config.mtu)
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================
// LinuxDeviceProvider
// ============================================

/// Creates `LinuxTun` devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxDeviceProvider;

#[async_trait]
impl DeviceProvider for LinuxDeviceProvider {
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>> {
        let tun = LinuxTun::create(config)?;
        Ok(Arc::new(tun))
    }
}

// ============================================
// Tests
// ============================================
