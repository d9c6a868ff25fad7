//! Core types and logic for harvesting Lightning addresses from Nostr profiles.
//!
//! This crate has no networking. It provides:
//! - Relay list parsing ([`parse_relay_list`])
//! - lud16 validation ([`LightningAddress`]) and kind-0 parsing ([`ProfileMetadata`])
//! - The per-run state machine ([`HarvestSession`]) and its snapshots
//! - Metric names and Prometheus recorder setup
//! - Shared error types

mod address;
mod endpoint;
mod error;
mod metadata;
pub mod metrics;
mod session;

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Stop after this many distinct addresses.
pub const DEFAULT_MAX_ADDRESSES: usize = 21;

/// Stop after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(45_000);

/// Stored kind-0 events requested per relay.
pub const DEFAULT_BACKFILL_LIMIT: usize = 500;

/// Remaining-time refresh interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Endpoints are assumed connected this long after subscribing.
pub const DEFAULT_CONNECT_GRACE: Duration = Duration::from_secs(2);

/// Nostr event kind for profile metadata.
pub const PROFILE_METADATA_KIND: u16 = 0;

/// Relays used when the user supplies none.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
    "wss://purplepag.es",
    "wss://relay.nostr.band",
    "wss://relay.snort.social",
];

pub use address::LightningAddress;
pub use endpoint::{
    EndpointState, EndpointStatus, RelayEndpoint, SECURE_WEBSOCKET_PREFIX, default_relay_text,
    parse_relay_list,
};
pub use error::{Error, Result};
pub use metadata::{ProfileMetadata, extract_lightning_address};
pub use session::{
    HarvestLimits, HarvestSession, Offer, SessionSnapshot, SessionStatus, StopReason,
};
