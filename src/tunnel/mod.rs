//! Packet filter engine: the virtual-interface read/classify/write loop.
//!
//! The engine is fail-open by design — availability over total blocking.
//! Everything that is not a confirmed-blocked DNS query is forwarded
//! unchanged, and per-packet errors resolve to pass-through rather than
//! killing the loop. Only interface acquisition is fatal, and that happens
//! before the engine starts: the platform establishes the interface and
//! hands the core a [`TunDevice`].

pub mod dns;
#[cfg(unix)]
pub mod fd_device;
pub mod packet;

#[cfg(unix)]
pub use fd_device::FdTunDevice;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config;
use crate::core::blocklist::BlocklistStore;
use crate::core::lock::{epoch_millis, LockManager, LockStatus};

/// Outcome of one device read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketRead {
    /// A datagram of the given length is in the buffer.
    Packet(usize),
    /// No data arrived within the poll timeout.
    TimedOut,
    /// The interface handle was closed from the platform side.
    Closed,
}

/// Raw access to the established virtual interface.
///
/// The platform performs establishment (consent, addressing, routes,
/// resolver configuration — see [`config::UPSTREAM_DNS_SERVERS`]) and hands
/// the engine a device; the engine only reads and writes datagrams.
/// `read_packet` must suspend up to `timeout` while no data is pending
/// rather than busy-loop.
pub trait TunDevice: Send {
    fn read_packet(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<PacketRead>;
    fn write_packet(&mut self, packet: &[u8]) -> std::io::Result<()>;
}

/// What to do with one inbound datagram.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    /// Relay the original bytes unchanged.
    Forward,
    /// Write a synthesized response instead of relaying.
    Respond(Vec<u8>),
    /// Swallow the datagram.
    Drop,
}

/// Manages the background filter thread.
/// Implements Drop to raise the stop flag on panic/exit.
pub struct TunnelEngine {
    shutdown: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl TunnelEngine {
    /// Start the filter loop on a dedicated worker thread.
    ///
    /// Spawn failure is fatal to the engine instance; restarting is the
    /// caller's decision, the engine never retries on its own.
    pub fn start(
        device: Box<dyn TunDevice>,
        blocklist: Arc<BlocklistStore>,
        lock: Arc<LockManager>,
    ) -> Result<Self> {
        Self::start_with_interval(
            device,
            blocklist,
            lock,
            Duration::from_secs(config::FOCUS_CHECK_INTERVAL_SECS),
        )
    }

    pub(crate) fn start_with_interval(
        device: Box<dyn TunDevice>,
        blocklist: Arc<BlocklistStore>,
        lock: Arc<LockManager>,
        check_interval: Duration,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let worker = std::thread::Builder::new()
            .name("tunnel-filter".into())
            .spawn(move || {
                if let Err(e) =
                    run_filter_loop(device, blocklist, lock, shutdown_clone, check_interval)
                {
                    tracing::error!("Tunnel filter loop exited: {e:#}");
                }
            })?;

        tracing::info!("TunnelEngine started");
        Ok(Self {
            shutdown,
            worker: Some(worker),
        })
    }

    /// Cooperative stop: raise the flag and wait for the worker to release
    /// the device. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Tunnel worker panicked during shutdown");
            }
            tracing::info!("TunnelEngine stopped");
        }
    }

    /// True once the worker has exited (stopped, self-terminated, or device
    /// closed).
    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| worker.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for TunnelEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Blocking read/classify/write loop. Owns the device and releases it on
/// every exit path. Re-checks the lock on a fixed interval and
/// self-terminates when enforcement is no longer mandatory — the engine's
/// own safety net, independent of the coordinator.
fn run_filter_loop(
    mut device: Box<dyn TunDevice>,
    blocklist: Arc<BlocklistStore>,
    lock: Arc<LockManager>,
    shutdown: Arc<AtomicBool>,
    check_interval: Duration,
) -> Result<()> {
    let poll_timeout = Duration::from_millis(config::DEVICE_POLL_TIMEOUT_MS);
    let mut buf = vec![0u8; config::MAX_PACKET_SIZE];
    let mut domains = blocklist.domains();
    let mut last_check = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        if last_check.elapsed() >= check_interval {
            last_check = Instant::now();
            if lock.evaluate(epoch_millis()) == LockStatus::Inactive {
                tracing::info!("Enforcement no longer mandatory, tunnel self-terminating");
                break;
            }
            domains = blocklist.domains();
        }

        match device.read_packet(&mut buf, poll_timeout) {
            Ok(PacketRead::Packet(len)) => {
                let data = &buf[..len];
                match classify_packet(data, &domains) {
                    Verdict::Forward => {
                        if let Err(e) = device.write_packet(data) {
                            tracing::warn!("Failed to forward packet: {e}");
                        }
                    }
                    Verdict::Respond(response) => {
                        if let Err(e) = device.write_packet(&response) {
                            tracing::warn!("Failed to write DNS response: {e}");
                        }
                    }
                    Verdict::Drop => {}
                }
            }
            Ok(PacketRead::TimedOut) => {}
            Ok(PacketRead::Closed) => {
                tracing::info!("Virtual interface closed, tunnel loop ending");
                break;
            }
            Err(e) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                tracing::error!("Device read error: {e}");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    Ok(())
}

/// Decide what to do with one datagram. Anything unparseable is forwarded
/// unchanged; a confirmed-blocked DNS query is answered in place, or
/// dropped when synthesis fails — never forwarded to a real resolver.
fn classify_packet(data: &[u8], domains: &HashSet<String>) -> Verdict {
    let Some(view) = packet::parse_packet(data) else {
        return Verdict::Forward;
    };
    if !view.is_dns_candidate() {
        return Verdict::Forward;
    }
    let Some(payload_offset) = view.udp_payload_offset else {
        return Verdict::Forward;
    };
    let Some(name) = data.get(payload_offset..).and_then(dns::parse_query_name) else {
        return Verdict::Forward;
    };
    if !dns::name_is_blocked(&name, domains) {
        return Verdict::Forward;
    }

    tracing::debug!("Blocking DNS query for {name}");
    match dns::nxdomain_response(data, &view) {
        Some(response) => Verdict::Respond(response),
        None => Verdict::Drop,
    }
}

/// Scripted in-memory device shared by the tunnel and coordinator tests.
#[cfg(test)]
pub(crate) mod testdev {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{PacketRead, TunDevice};

    /// Replays a fixed sequence of inbound datagrams, then reports the
    /// configured terminal state; records everything written back.
    pub(crate) struct MockDevice {
        inbound: VecDeque<Vec<u8>>,
        after_drain: PacketRead,
        pub(crate) written: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MockDevice {
        pub(crate) fn new(inbound: Vec<Vec<u8>>, after_drain: PacketRead) -> Self {
            Self {
                inbound: inbound.into(),
                after_drain,
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn idle() -> Self {
            Self::new(Vec::new(), PacketRead::TimedOut)
        }
    }

    impl TunDevice for MockDevice {
        fn read_packet(
            &mut self,
            buf: &mut [u8],
            timeout: Duration,
        ) -> std::io::Result<PacketRead> {
            match self.inbound.pop_front() {
                Some(pkt) => {
                    buf[..pkt.len()].copy_from_slice(&pkt);
                    Ok(PacketRead::Packet(pkt.len()))
                }
                None => {
                    if self.after_drain == PacketRead::TimedOut {
                        // Keep the scripted pace close to a quiet interface.
                        std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    }
                    Ok(self.after_drain)
                }
            }
        }

        fn write_packet(&mut self, packet: &[u8]) -> std::io::Result<()> {
            self.written.lock().unwrap().push(packet.to_vec());
            Ok(())
        }
    }
}
