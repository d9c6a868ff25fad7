//! Prometheus metrics helpers for the harvester.
//!
//! Metrics are recorded through the `metrics` facade everywhere. Nothing is
//! collected unless a recorder is installed, which the CLI only does when
//! asked to print metrics at exit.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lnaddr_core::metrics::try_init_metrics;
//!
//! let handle = try_init_metrics().expect("recorder already installed");
//! // ... run a harvest ...
//! eprintln!("{}", handle.render());
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `harvest_`
//! - Suffix: `_total` for counters
//! - Labels: `outcome` on runs, `reason` on discards

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Counter: finished runs, labelled by `outcome`.
pub const RUNS_TOTAL: &str = "harvest_runs_total";
/// Counter: profile events delivered by relays.
pub const EVENTS_TOTAL: &str = "harvest_events_total";
/// Counter: events that added nothing, labelled by `reason` (`invalid`, `duplicate`).
pub const EVENTS_DISCARDED_TOTAL: &str = "harvest_events_discarded_total";
/// Counter: distinct addresses recorded.
pub const ADDRESSES_FOUND_TOTAL: &str = "harvest_addresses_found_total";
/// Counter: relay-side subscription closures.
pub const RELAY_CLOSED_TOTAL: &str = "harvest_relay_closed_total";
/// Counter: notifications dropped because the receiver lagged.
pub const NOTIFICATIONS_LAGGED_TOTAL: &str = "harvest_notifications_lagged_total";

/// Install the Prometheus recorder and register metric descriptions.
///
/// Returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_harvest_metrics();
    Some(handle)
}

fn register_harvest_metrics() {
    describe_counter!(RUNS_TOTAL, "Harvest runs finished, by outcome");
    describe_counter!(EVENTS_TOTAL, "Profile metadata events received from relays");
    describe_counter!(
        EVENTS_DISCARDED_TOTAL,
        "Events that added no address (label: reason)"
    );
    describe_counter!(ADDRESSES_FOUND_TOTAL, "Distinct lightning addresses found");
    describe_counter!(
        RELAY_CLOSED_TOTAL,
        "Subscriptions closed by a relay or refused by the client"
    );
    describe_counter!(
        NOTIFICATIONS_LAGGED_TOTAL,
        "Relay pool notifications dropped due to receiver lag"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    fn handle() -> Option<&'static PrometheusHandle> {
        HANDLE.get_or_init(try_init_metrics).as_ref()
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let _ = handle();
        assert!(try_init_metrics().is_none());
    }

    #[test]
    fn test_register_does_not_panic() {
        let _ = handle();
        register_harvest_metrics();
        register_harvest_metrics();
    }

    #[test]
    fn test_counters_render() {
        let Some(handle) = handle() else {
            return;
        };
        metrics::counter!(EVENTS_DISCARDED_TOTAL, "reason" => "duplicate").increment(2);
        let rendered = handle.render();
        assert!(rendered.contains(EVENTS_DISCARDED_TOTAL));
        assert!(rendered.contains("duplicate"));
    }
}
