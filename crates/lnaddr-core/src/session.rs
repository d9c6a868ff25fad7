//! Harvest session state machine.
//!
//! A [`HarvestSession`] is the mutable context of one harvesting run. It has no
//! I/O of its own: the async driver feeds it event payloads, clock readings and
//! stop decisions, and publishes [`SessionSnapshot`]s to whoever is watching.
//!
//! # Lifecycle
//!
//! ```text
//!          begin()                 offer() hits max   ┐
//!  idle ────────────► running ──── timeout            ├──► stopped
//!   ▲                              user stop          │      │
//!   │                              subscribe failure  ┘      │
//!   └──────────────────────── begin() again ◄────────────────┘
//! ```
//!
//! # Invariants
//!
//! - `addresses` and `seen` always hold the same elements
//! - the address count never decreases while running and never exceeds
//!   `max_addresses`
//! - reaching `max_addresses` stops the session inside the same `offer()` call,
//!   so no later payload can add another address

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use crate::address::LightningAddress;
use crate::endpoint::{EndpointState, EndpointStatus, RelayEndpoint};
use crate::error::{Error, Result};
use crate::metadata::extract_lightning_address;
use crate::{
    DEFAULT_BACKFILL_LIMIT, DEFAULT_CONNECT_GRACE, DEFAULT_MAX_ADDRESSES, DEFAULT_TICK_INTERVAL,
    DEFAULT_TIMEOUT,
};

/// Tunable limits for a harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestLimits {
    /// Stop once this many distinct addresses have been found.
    pub max_addresses: usize,

    /// Stop after this long regardless of progress.
    pub timeout: Duration,

    /// Maximum number of stored events each relay should replay.
    pub backfill_limit: usize,

    /// How often remaining time is recomputed and published.
    pub tick_interval: Duration,

    /// Delay after subscribing before endpoints are assumed connected.
    pub connect_grace: Duration,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            max_addresses: DEFAULT_MAX_ADDRESSES,
            timeout: DEFAULT_TIMEOUT,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            connect_grace: DEFAULT_CONNECT_GRACE,
        }
    }
}

impl HarvestLimits {
    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_addresses == 0 {
            return Err(Error::InvalidLimit {
                field: "max_addresses",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidLimit {
                field: "timeout",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(Error::InvalidLimit {
                field: "tick_interval",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The address target was reached.
    GoalReached,
    /// The run timeout elapsed first.
    TimedOut,
    /// Stopped on request (user action or owner teardown).
    UserStopped,
    /// The subscription could not be opened.
    SubscriptionFailed { message: String },
}

impl StopReason {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GoalReached => "goal_reached",
            Self::TimedOut => "timed_out",
            Self::UserStopped => "user_stopped",
            Self::SubscriptionFailed { .. } => "subscription_failed",
        }
    }
}

/// Session status, rendered into the status message shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    /// The relay configuration yielded nothing to connect to.
    NoEndpoints,
    Connecting { relays: usize },
    Listening { relays: usize },
    Stopped { reason: StopReason, found: usize },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Ready"),
            Self::NoEndpoints => {
                f.write_str("No valid relay endpoints. Enter wss:// URLs, one per line or comma-separated.")
            }
            Self::Connecting { relays } => write!(f, "Connecting to {relays} relays..."),
            Self::Listening { relays } => {
                write!(f, "Listening for profiles on {relays} relays...")
            }
            Self::Stopped { reason, found } => match reason {
                StopReason::GoalReached => {
                    write!(f, "Done: found {found} lightning addresses")
                }
                StopReason::TimedOut => {
                    write!(f, "Timed out: found {found} lightning addresses")
                }
                StopReason::UserStopped => {
                    write!(f, "Stopped: found {found} lightning addresses")
                }
                StopReason::SubscriptionFailed { message } => {
                    write!(f, "Subscription failed: {message}")
                }
            },
        }
    }
}

/// Outcome of offering one event payload to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    /// New address recorded; the session keeps running.
    Added(LightningAddress),
    /// New address recorded and the target was reached; the session is now stopped.
    GoalReached(LightningAddress),
    /// Valid address that was already recorded.
    Duplicate,
    /// Unparseable payload or missing/invalid `lud16`.
    Rejected,
    /// The session is not running.
    Ignored,
}

/// Immutable copy of the observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    /// Discovered addresses in discovery order.
    pub addresses: Vec<LightningAddress>,
    pub running: bool,
    pub status: SessionStatus,
    /// Rendered status message.
    pub status_message: String,
    /// Whole seconds left, rounded up. `None` when not running.
    pub remaining_secs: Option<u64>,
    pub endpoints: Vec<EndpointState>,
}

/// The mutable context of one harvesting run.
#[derive(Debug)]
pub struct HarvestSession {
    limits: HarvestLimits,
    addresses: Vec<LightningAddress>,
    seen: HashSet<LightningAddress>,
    running: bool,
    started_at: Option<Instant>,
    remaining: Option<Duration>,
    status: SessionStatus,
    endpoints: Vec<EndpointState>,
}

impl HarvestSession {
    /// Create an idle session.
    pub fn new(limits: HarvestLimits) -> Self {
        Self {
            limits,
            addresses: Vec::new(),
            seen: HashSet::new(),
            running: false,
            started_at: None,
            remaining: None,
            status: SessionStatus::Idle,
            endpoints: Vec::new(),
        }
    }

    pub fn limits(&self) -> &HarvestLimits {
        &self.limits
    }

    /// Start a run against `endpoints`.
    ///
    /// Clears whatever a previous run left behind. With no endpoints the
    /// session records the configuration error and stays stopped.
    pub fn begin(&mut self, endpoints: &[RelayEndpoint], now: Instant) -> Result<()> {
        self.limits.validate()?;

        self.addresses.clear();
        self.seen.clear();
        self.remaining = None;
        self.started_at = None;
        self.endpoints.clear();

        if endpoints.is_empty() {
            self.running = false;
            self.status = SessionStatus::NoEndpoints;
            return Err(Error::NoValidEndpoints);
        }

        self.endpoints = endpoints
            .iter()
            .cloned()
            .map(EndpointState::connecting)
            .collect();
        self.running = true;
        self.started_at = Some(now);
        self.remaining = Some(self.limits.timeout);
        self.status = SessionStatus::Connecting {
            relays: endpoints.len(),
        };
        Ok(())
    }

    /// Offer one event payload (kind-0 content) to the session.
    pub fn offer(&mut self, content: &str) -> Offer {
        if !self.running {
            return Offer::Ignored;
        }

        let Some(address) = extract_lightning_address(content) else {
            return Offer::Rejected;
        };

        if self.seen.contains(&address) {
            return Offer::Duplicate;
        }

        self.seen.insert(address.clone());
        self.addresses.push(address.clone());

        if self.seen.len() >= self.limits.max_addresses {
            self.finish(StopReason::GoalReached);
            Offer::GoalReached(address)
        } else {
            Offer::Added(address)
        }
    }

    /// Recompute remaining time. No-op when not running.
    pub fn tick(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at {
            let elapsed = now.saturating_duration_since(started_at);
            self.remaining = Some(self.limits.timeout.saturating_sub(elapsed));
        }
    }

    /// Assume every endpoint still connecting is now connected.
    ///
    /// The client gives no per-relay acknowledgement, so this runs once after
    /// the grace period. Endpoints already marked as failed keep their error.
    pub fn mark_connected(&mut self) {
        if !self.running {
            return;
        }
        for endpoint in &mut self.endpoints {
            if endpoint.status == EndpointStatus::Connecting {
                endpoint.status = EndpointStatus::Connected;
            }
        }
        self.status = SessionStatus::Listening {
            relays: self.endpoints.len(),
        };
    }

    /// Mark every endpoint matching `relay_url` as failed.
    ///
    /// Returns the number of endpoints updated.
    pub fn mark_endpoint_error(&mut self, relay_url: &str, detail: Option<String>) -> usize {
        let mut updated = 0;
        for endpoint in &mut self.endpoints {
            if endpoint.url.matches(relay_url) {
                endpoint.status = EndpointStatus::Error {
                    detail: detail.clone(),
                };
                updated += 1;
            }
        }
        updated
    }

    /// Stop the run with `reason`.
    ///
    /// Idempotent: returns `false` and changes nothing if the session is not
    /// running, so the first stop's status wins.
    pub fn finish(&mut self, reason: StopReason) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.started_at = None;
        self.remaining = None;
        self.status = SessionStatus::Stopped {
            reason,
            found: self.addresses.len(),
        };
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    pub fn addresses(&self) -> &[LightningAddress] {
        &self.addresses
    }

    pub fn contains(&self, address: &LightningAddress) -> bool {
        self.seen.contains(address)
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn endpoints(&self) -> &[EndpointState] {
        &self.endpoints
    }

    /// Copy the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            addresses: self.addresses.clone(),
            running: self.running,
            status: self.status.clone(),
            status_message: self.status.to_string(),
            remaining_secs: self.remaining.map(ceil_secs),
            endpoints: self.endpoints.clone(),
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
