//! Centralized runtime constants for focusguard.
//!
//! All tunable intervals, protocol numbers, and buffer sizes are collected
//! here so they can be found and adjusted in a single place rather than
//! scattered across modules.

/// Read buffer size for the virtual interface (bytes). Upper bound for a
/// single tun datagram.
pub const MAX_PACKET_SIZE: usize = 32767;

/// IP protocol number for TCP.
pub const IP_PROTOCOL_TCP: u8 = 6;

/// IP protocol number for UDP.
pub const IP_PROTOCOL_UDP: u8 = 17;

/// Destination port that marks a UDP datagram as a DNS candidate.
pub const DNS_PORT: u16 = 53;

/// Interval at which the tunnel loop re-evaluates the lock and refreshes its
/// merged-blocklist snapshot (seconds).
pub const FOCUS_CHECK_INTERVAL_SECS: u64 = 60;

/// Device read poll timeout (milliseconds). Bounds how far a stop request or
/// a due self-check can slip while no traffic arrives.
pub const DEVICE_POLL_TIMEOUT_MS: u64 = 1000;

/// Interval at which the coordinator watchdog polls the lock (seconds).
pub const WATCHDOG_INTERVAL_SECS: u64 = 30;

/// Delay between requesting an early unlock and it taking effect (hours).
pub const EARLY_UNLOCK_DELAY_HOURS: i64 = 24;

/// Minimum spacing between consecutive corrective back actions (seconds).
pub const BACK_ACTION_COOLDOWN_SECS: u64 = 2;

/// Upstream resolvers for the tunnel, in fallback order: Cloudflare Family,
/// Quad9, Google. The platform layer configures these on the interface; the
/// engine itself does no resolver selection.
pub const UPSTREAM_DNS_SERVERS: &[&str] = &[
    "1.1.1.3",
    "1.0.0.3",
    "9.9.9.9",
    "149.112.112.112",
    "8.8.8.8",
    "8.8.4.4",
];
