//! Device-level content-restriction core.
//!
//! Three engines do the enforcement work:
//! - [`tunnel`] — owns the virtual-interface packet loop, parses IP/UDP/DNS
//!   framing, and blocks resolution of listed domains
//! - [`heuristics`] — classifies foreground UI snapshots and interrupts
//!   blocked surfaces (short-video feeds, prohibited browser states)
//! - [`core::lock`] — the persisted time-lock state machine with the
//!   24-hour early-unlock cooldown
//!
//! Platform plumbing (interface establishment, accessibility events,
//! notifications, permission flows) stays outside the crate. The boundaries
//! are [`tunnel::TunDevice`] for raw datagrams,
//! [`heuristics::UiHeuristicEngine::on_foreground_snapshot`] for UI events,
//! and [`coordinator::EnforcementCoordinator`] for lifecycle.

pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod heuristics;
pub mod settings_gate;
pub mod store;
pub mod tunnel;

pub use coordinator::{EnforcementCoordinator, EnforcementStatus};
pub use core::blocklist::{BlocklistStore, Feature};
pub use core::lock::{DurationUnit, LockManager, LockStatus};
pub use error::EnforcementError;
pub use heuristics::{Intervention, UiAction, UiHeuristicEngine, UiNode};
pub use settings_gate::SettingsGate;
pub use store::{KeyValueStore, MemoryStore, Namespace, SqliteStore};
pub use tunnel::{PacketRead, TunDevice, TunnelEngine};

/// Initialize tracing with an env-filter override (`RUST_LOG`), defaulting
/// to `focusguard=info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focusguard=info".into()),
        )
        .init();
}
