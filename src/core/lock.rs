//! Enforcement-window time lock.
//!
//! Poll-based: "inactive" is encoded as a stored deadline in the past, so
//! there is no background timer to lose across a process restart. Every
//! consumer calls [`LockManager::evaluate`] with the current time; while an
//! early unlock is pending, the 24-hour cooldown deadline governs instead of
//! the lock deadline.

use serde::Serialize;

use crate::config;
use crate::error::EnforcementError;
use crate::store::Namespace;

const KEY_LOCK_END_TIME: &str = "lock_end_time";
const KEY_EARLY_UNLOCK_REQUEST_TIME: &str = "early_unlock_request_time";

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Observable lock state. `Active` and `CooldownPending` both mean
/// enforcement is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockStatus {
    Inactive,
    Active,
    CooldownPending,
}

/// Unit for the user-supplied activation duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    pub fn to_millis(self, count: u32) -> i64 {
        let per_unit: i64 = match self {
            DurationUnit::Minutes => 60 * 1000,
            DurationUnit::Hours => 60 * 60 * 1000,
            DurationUnit::Days => 24 * 60 * 60 * 1000,
        };
        i64::from(count) * per_unit
    }
}

/// The authoritative record of whether enforcement is currently mandatory.
pub struct LockManager {
    prefs: Namespace,
}

impl LockManager {
    pub fn new(prefs: Namespace) -> Self {
        Self { prefs }
    }

    /// Begin an enforcement window of `count` units from `now`.
    ///
    /// Valid only while inactive; re-activating a running lock is rejected
    /// rather than silently moving the committed deadline.
    pub fn activate(
        &self,
        count: u32,
        unit: DurationUnit,
        now: i64,
    ) -> Result<(), EnforcementError> {
        if count == 0 {
            return Err(EnforcementError::InvalidInput(
                "duration must be positive".into(),
            ));
        }
        if self.evaluate(now) != LockStatus::Inactive {
            return Err(EnforcementError::InvalidInput(
                "lock is already active".into(),
            ));
        }

        let end = now + unit.to_millis(count);
        self.prefs.put_i64(KEY_LOCK_END_TIME, end);
        self.prefs.remove(KEY_EARLY_UNLOCK_REQUEST_TIME);
        tracing::info!("Lock activated, deadline {end}");
        Ok(())
    }

    /// Request early deactivation. Takes effect only after the cooldown
    /// elapses; the first request wins and repeats are no-ops, as is a
    /// request while the lock is not active.
    pub fn request_early_unlock(&self, now: i64) {
        if self.evaluate(now) != LockStatus::Active {
            return;
        }
        self.prefs.put_i64(KEY_EARLY_UNLOCK_REQUEST_TIME, now);
        tracing::info!(
            "Early unlock requested, takes effect at {}",
            now + cooldown_millis()
        );
    }

    /// Current state at `now`.
    ///
    /// Completing the cooldown clears both timestamps. A deadline in the
    /// past reads as `Inactive` without clearing the fields; they are only
    /// physically removed by `deactivate` or the cooldown-completion path.
    pub fn evaluate(&self, now: i64) -> LockStatus {
        let Some(end) = self.prefs.get_i64(KEY_LOCK_END_TIME) else {
            return LockStatus::Inactive;
        };

        let requested = self.prefs.get_i64(KEY_EARLY_UNLOCK_REQUEST_TIME);
        if let Some(requested) = requested {
            if now >= requested + cooldown_millis() {
                self.clear();
                tracing::info!("Early unlock cooldown complete, lock released");
                return LockStatus::Inactive;
            }
        }

        if now >= end {
            return LockStatus::Inactive;
        }
        if requested.is_some() {
            LockStatus::CooldownPending
        } else {
            LockStatus::Active
        }
    }

    /// Unconditional deactivation. Reachable only through the gated settings
    /// surface; the gate itself lives outside this machine.
    pub fn deactivate(&self) {
        self.clear();
        tracing::info!("Lock deactivated");
    }

    /// Milliseconds until enforcement ends: the cooldown deadline while an
    /// early unlock is pending, the lock deadline otherwise. Zero when
    /// inactive.
    pub fn remaining(&self, now: i64) -> i64 {
        if let Some(requested) = self.prefs.get_i64(KEY_EARLY_UNLOCK_REQUEST_TIME) {
            let until_unlock = requested + cooldown_millis() - now;
            if until_unlock > 0 {
                return until_unlock;
            }
        }
        let end = self.prefs.get_i64(KEY_LOCK_END_TIME).unwrap_or(0);
        (end - now).max(0)
    }

    /// Remaining time rendered as `"D days HH:MM:SS"` / `"HH:MM:SS"`, with
    /// an explanatory suffix while an early unlock is pending.
    pub fn remaining_formatted(&self, now: i64) -> String {
        if let Some(requested) = self.prefs.get_i64(KEY_EARLY_UNLOCK_REQUEST_TIME) {
            let until_unlock = requested + cooldown_millis() - now;
            if until_unlock > 0 {
                return format!("{} until early unlock", format_millis(until_unlock));
            }
        }
        let end = self.prefs.get_i64(KEY_LOCK_END_TIME).unwrap_or(0);
        format_millis((end - now).max(0))
    }

    fn clear(&self) {
        self.prefs.remove(KEY_LOCK_END_TIME);
        self.prefs.remove(KEY_EARLY_UNLOCK_REQUEST_TIME);
    }
}

fn cooldown_millis() -> i64 {
    config::EARLY_UNLOCK_DELAY_HOURS * 60 * 60 * 1000
}

fn format_millis(millis: i64) -> String {
    let seconds = (millis / 1000) % 60;
    let minutes = (millis / (1000 * 60)) % 60;
    let hours = (millis / (1000 * 60 * 60)) % 24;
    let days = millis / (1000 * 60 * 60 * 24);

    if days > 0 {
        format!("{days} days {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn manager() -> (LockManager, Namespace) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ns = Namespace::new(store, "lock");
        (LockManager::new(ns.clone()), ns)
    }

    #[test]
    fn test_inactive_by_default() {
        let (lock, _) = manager();
        assert_eq!(lock.evaluate(1_000), LockStatus::Inactive);
        assert_eq!(lock.remaining(1_000), 0);
    }

    #[test]
    fn test_activate_then_expire() {
        let (lock, _) = manager();
        let now = 1_000_000;
        lock.activate(7, DurationUnit::Days, now).unwrap();

        assert_eq!(lock.evaluate(now), LockStatus::Active);
        assert_eq!(lock.evaluate(now + 7 * DAY_MS - 1), LockStatus::Active);
        assert_eq!(lock.evaluate(now + 7 * DAY_MS + 1), LockStatus::Inactive);
    }

    #[test]
    fn test_expired_lock_keeps_fields_until_deactivate() {
        let (lock, ns) = manager();
        let now = 1_000_000;
        lock.activate(1, DurationUnit::Hours, now).unwrap();

        assert_eq!(lock.evaluate(now + DAY_MS), LockStatus::Inactive);
        assert!(ns.contains("lock_end_time"));

        lock.deactivate();
        assert!(!ns.contains("lock_end_time"));
    }

    #[test]
    fn test_activate_rejected_while_active() {
        let (lock, _) = manager();
        let now = 1_000_000;
        lock.activate(1, DurationUnit::Days, now).unwrap();

        let err = lock.activate(2, DurationUnit::Days, now + 1).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");

        // Once the deadline passes the lock can be re-armed.
        lock.activate(2, DurationUnit::Days, now + 2 * DAY_MS).unwrap();
        assert_eq!(lock.evaluate(now + 2 * DAY_MS), LockStatus::Active);
    }

    #[test]
    fn test_activate_rejects_zero_duration() {
        let (lock, _) = manager();
        let err = lock.activate(0, DurationUnit::Minutes, 1_000).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert_eq!(lock.evaluate(1_000), LockStatus::Inactive);
    }

    #[test]
    fn test_early_unlock_first_request_wins() {
        let (lock, ns) = manager();
        let now = 1_000_000;
        lock.activate(7, DurationUnit::Days, now).unwrap();

        lock.request_early_unlock(now + 1_000);
        assert_eq!(lock.evaluate(now + 2_000), LockStatus::CooldownPending);

        // Second request while pending is a no-op.
        lock.request_early_unlock(now + 5_000);
        assert_eq!(ns.get_i64("early_unlock_request_time"), Some(now + 1_000));
    }

    #[test]
    fn test_early_unlock_cooldown_boundaries() {
        let (lock, ns) = manager();
        let now = 1_000_000;
        lock.activate(7, DurationUnit::Days, now).unwrap();
        lock.request_early_unlock(now);

        assert_eq!(lock.evaluate(now + DAY_MS - 1), LockStatus::CooldownPending);
        assert_eq!(lock.evaluate(now + DAY_MS + 1), LockStatus::Inactive);

        // Cooldown completion clears both fields.
        assert!(!ns.contains("lock_end_time"));
        assert!(!ns.contains("early_unlock_request_time"));
    }

    #[test]
    fn test_early_unlock_ignored_while_inactive() {
        let (lock, ns) = manager();
        lock.request_early_unlock(1_000);
        assert!(!ns.contains("early_unlock_request_time"));
    }

    #[test]
    fn test_remaining_prefers_cooldown_deadline() {
        let (lock, _) = manager();
        let now = 1_000_000;
        lock.activate(7, DurationUnit::Days, now).unwrap();
        assert_eq!(lock.remaining(now), 7 * DAY_MS);

        lock.request_early_unlock(now);
        assert_eq!(lock.remaining(now + 1_000), DAY_MS - 1_000);
    }

    #[test]
    fn test_remaining_formatted() {
        let (lock, _) = manager();
        let now = 0;
        lock.activate(2, DurationUnit::Days, now).unwrap();
        assert_eq!(lock.remaining_formatted(now), "2 days 00:00:00");

        lock.deactivate();
        lock.activate(90, DurationUnit::Minutes, now).unwrap();
        assert_eq!(lock.remaining_formatted(now), "01:30:00");

        lock.request_early_unlock(now);
        assert_eq!(
            lock.remaining_formatted(now),
            "1 days 00:00:00 until early unlock"
        );
    }

    #[test]
    fn test_duration_unit_to_millis() {
        assert_eq!(DurationUnit::Minutes.to_millis(5), 300_000);
        assert_eq!(DurationUnit::Hours.to_millis(2), 7_200_000);
        assert_eq!(DurationUnit::Days.to_millis(1), DAY_MS);
    }
}
