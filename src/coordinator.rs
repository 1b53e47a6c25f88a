//! Thin orchestration over the stores and engines.
//!
//! Wires platform lifecycle to the core: starts and stops the packet
//! filter, forwards lock transitions, and runs a watchdog that stops
//! filtering once the enforcement window ends. No enforcement logic of its
//! own.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config;
use crate::core::blocklist::BlocklistStore;
use crate::core::lock::{epoch_millis, DurationUnit, LockManager, LockStatus};
use crate::error::EnforcementError;
use crate::tunnel::{TunDevice, TunnelEngine};

/// Snapshot of the enforcement state for an embedding layer.
#[derive(Debug, Clone, Serialize)]
pub struct EnforcementStatus {
    pub lock: LockStatus,
    pub remaining_millis: i64,
    pub filtering: bool,
}

pub struct EnforcementCoordinator {
    blocklist: Arc<BlocklistStore>,
    lock: Arc<LockManager>,
    tunnel: Mutex<Option<TunnelEngine>>,
}

impl EnforcementCoordinator {
    pub fn new(blocklist: Arc<BlocklistStore>, lock: Arc<LockManager>) -> Self {
        Self {
            blocklist,
            lock,
            tunnel: Mutex::new(None),
        }
    }

    pub fn blocklist(&self) -> &Arc<BlocklistStore> {
        &self.blocklist
    }

    pub fn lock(&self) -> &Arc<LockManager> {
        &self.lock
    }

    /// Begin an enforcement window.
    pub fn activate(&self, count: u32, unit: DurationUnit) -> Result<(), EnforcementError> {
        self.lock.activate(count, unit, epoch_millis())
    }

    pub fn request_early_unlock(&self) {
        self.lock.request_early_unlock(epoch_millis());
    }

    /// Immediate deactivation, bypassing the cooldown. Reachable only
    /// through the gated settings surface; also stops the packet filter.
    pub fn deactivate(&self) {
        self.lock.deactivate();
        self.stop_filtering();
    }

    /// Start the packet filter on an established device. Idempotent: a
    /// second call while the engine is running is a no-op (the new device
    /// is dropped, releasing its handle).
    pub fn start_filtering(&self, device: Box<dyn TunDevice>) -> Result<(), EnforcementError> {
        let mut guard = self.tunnel.lock().unwrap();
        if let Some(engine) = guard.as_ref() {
            if !engine.is_finished() {
                tracing::debug!("Packet filter already running");
                return Ok(());
            }
        }

        let engine =
            TunnelEngine::start(device, Arc::clone(&self.blocklist), Arc::clone(&self.lock))
                .map_err(|e| EnforcementError::Tunnel(e.to_string()))?;
        *guard = Some(engine);
        Ok(())
    }

    /// Cooperative stop of the packet filter. Idempotent.
    pub fn stop_filtering(&self) {
        let mut guard = self.tunnel.lock().unwrap();
        if let Some(mut engine) = guard.take() {
            engine.stop();
        }
    }

    pub fn is_filtering(&self) -> bool {
        self.tunnel
            .lock()
            .unwrap()
            .as_ref()
            .map(|engine| !engine.is_finished())
            .unwrap_or(false)
    }

    pub fn status(&self, now: i64) -> EnforcementStatus {
        EnforcementStatus {
            lock: self.lock.evaluate(now),
            remaining_millis: self.lock.remaining(now),
            filtering: self.is_filtering(),
        }
    }

    /// Spawn a background task that polls the lock and stops filtering when
    /// the enforcement window ends — the coordinator-side complement of the
    /// tunnel's own self-check.
    pub fn start_watchdog(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                config::WATCHDOG_INTERVAL_SECS,
            ));
            loop {
                ticker.tick().await;
                if coordinator.lock.evaluate(epoch_millis()) == LockStatus::Inactive
                    && coordinator.is_filtering()
                {
                    tracing::info!("Enforcement window ended, stopping packet filter");
                    coordinator.stop_filtering();
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, Namespace};
    use crate::tunnel::testdev::MockDevice;

    fn coordinator() -> Arc<EnforcementCoordinator> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let blocklist = Arc::new(BlocklistStore::new(Namespace::new(
            Arc::clone(&store),
            "blocklist",
        )));
        let lock = Arc::new(LockManager::new(Namespace::new(store, "lock")));
        Arc::new(EnforcementCoordinator::new(blocklist, lock))
    }

    #[test]
    fn test_start_and_stop_filtering_are_idempotent() {
        let coordinator = coordinator();
        coordinator.activate(1, DurationUnit::Hours).unwrap();

        coordinator
            .start_filtering(Box::new(MockDevice::idle()))
            .unwrap();
        assert!(coordinator.is_filtering());

        // Second start is a no-op.
        coordinator
            .start_filtering(Box::new(MockDevice::idle()))
            .unwrap();
        assert!(coordinator.is_filtering());

        coordinator.stop_filtering();
        assert!(!coordinator.is_filtering());
        coordinator.stop_filtering();
    }

    #[test]
    fn test_deactivate_stops_filtering() {
        let coordinator = coordinator();
        coordinator.activate(1, DurationUnit::Hours).unwrap();
        coordinator
            .start_filtering(Box::new(MockDevice::idle()))
            .unwrap();

        coordinator.deactivate();

        assert!(!coordinator.is_filtering());
        assert_eq!(
            coordinator.status(epoch_millis()).lock,
            LockStatus::Inactive
        );
    }

    #[test]
    fn test_status_reflects_lock_and_remaining() {
        let coordinator = coordinator();
        let now = epoch_millis();
        coordinator.activate(2, DurationUnit::Hours).unwrap();

        let status = coordinator.status(now);
        assert_eq!(status.lock, LockStatus::Active);
        assert!(status.remaining_millis > 0);
        assert!(!status.filtering);
    }

    #[tokio::test]
    async fn test_watchdog_stops_filtering_after_expiry() {
        let coordinator = coordinator();
        coordinator.activate(1, DurationUnit::Hours).unwrap();
        coordinator
            .start_filtering(Box::new(MockDevice::idle()))
            .unwrap();

        // Expire the window out from under the running filter.
        coordinator.lock().deactivate();
        assert!(coordinator.is_filtering());

        let watchdog = coordinator.start_watchdog();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert!(!coordinator.is_filtering());
        watchdog.abort();
    }
}
