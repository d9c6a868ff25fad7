//! Harvest session controller.
//!
//! Drives one [`HarvestSession`] at a time against a [`ProfileSource`].
//!
//! # Architecture
//!
//! ```text
//!   start(endpoints) ──► open subscription ──► spawn run task
//!                                                   │
//!        ┌──────────────── tokio::select! ──────────┤
//!        │  stop command / controller dropped       │
//!        │  one-shot timeout                        │
//!        │  connect grace (once)                    │
//!        │  remaining-time tick                     │
//!        │  subscription item                       │
//!        └──────────────────────────────────────────┘
//!                         │ loop exits
//!                         ▼
//!          finish(reason) ──► close subscription ──► final snapshot
//! ```
//!
//! The run task exclusively owns the session, so events, ticks and stop
//! requests never race. Observers read [`SessionSnapshot`]s from a watch
//! channel.

use std::sync::Arc;

use lnaddr_core::metrics::{ADDRESSES_FOUND_TOTAL, EVENTS_DISCARDED_TOTAL, EVENTS_TOTAL, RUNS_TOTAL};
use lnaddr_core::{
    HarvestLimits, HarvestSession, Offer, RelayEndpoint, SessionSnapshot, StopReason,
    parse_relay_list,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::source::{ProfileFilter, ProfileSource, StreamItem, Subscription};
use crate::{Error, Result};

/// A run in flight.
struct ActiveRun {
    stop: mpsc::UnboundedSender<()>,
    task: JoinHandle<SessionSnapshot>,
}

/// Owns the profile source and at most one running harvest.
pub struct HarvestController<S: ProfileSource + 'static> {
    source: Arc<S>,
    limits: HarvestLimits,
    snapshots: watch::Sender<SessionSnapshot>,
    active: Option<ActiveRun>,
}

impl<S: ProfileSource + 'static> HarvestController<S> {
    pub fn new(source: Arc<S>, limits: HarvestLimits) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            source,
            limits,
            snapshots,
            active: None,
        }
    }

    /// Watch the observable session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    /// Parse `raw` as a relay list and start a run on it.
    pub async fn start_from_text(&mut self, raw: &str) -> Result<()> {
        self.start(parse_relay_list(raw)).await
    }

    /// Start a harvest against `endpoints`.
    ///
    /// Returns once the subscription has been requested. Fails without
    /// opening anything when `endpoints` is empty, and rejects a second start
    /// while a run is in progress. A failed subscription leaves the session
    /// stopped with the failure as its status.
    pub async fn start(&mut self, endpoints: Vec<RelayEndpoint>) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.active = None;

        // Timeout and grace count from here, not from when the open returns.
        let started_at = Instant::now();
        let mut session = HarvestSession::new(self.limits.clone());
        if let Err(e) = session.begin(&endpoints, started_at.into_std()) {
            self.snapshots.send_replace(session.snapshot());
            return Err(e.into());
        }
        self.snapshots.send_replace(session.snapshot());

        tracing::info!(
            "Starting harvest on {} relays via {} (max {} addresses, timeout {:?})",
            endpoints.len(),
            self.source.name(),
            self.limits.max_addresses,
            self.limits.timeout
        );

        let filter = ProfileFilter::metadata(self.limits.backfill_limit);
        let subscription = match self.source.open(&endpoints, &filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!("Failed to open subscription: {}", e);
                let reason = StopReason::SubscriptionFailed {
                    message: e.to_string(),
                };
                metrics::counter!(RUNS_TOTAL, "outcome" => reason.label()).increment(1);
                session.finish(reason);
                self.snapshots.send_replace(session.snapshot());
                return Err(e);
            }
        };

        let (stop, stop_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            Arc::clone(&self.source),
            session,
            subscription,
            endpoints,
            started_at,
            stop_rx,
            self.snapshots.clone(),
        ));
        self.active = Some(ActiveRun { stop, task });

        Ok(())
    }

    /// Ask the current run to stop. No-op when nothing is running.
    pub fn stop(&self) {
        if let Some(run) = &self.active {
            let _ = run.stop.send(());
        }
    }

    /// Wait for the current run to finish and return its final snapshot.
    ///
    /// Returns the latest snapshot immediately when nothing is running.
    pub async fn wait(&mut self) -> Result<SessionSnapshot> {
        match self.active.take() {
            Some(ActiveRun { stop, task }) => {
                // A dropped stop sender reads as a stop request.
                let snapshot = task.await?;
                drop(stop);
                Ok(snapshot)
            }
            None => Ok(self.snapshot()),
        }
    }
}

impl<S: ProfileSource + 'static> Drop for HarvestController<S> {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            let _ = run.stop.send(());
        }
    }
}

/// Body of the run task. Owns the session until the run ends.
async fn run_session<S: ProfileSource>(
    source: Arc<S>,
    mut session: HarvestSession,
    mut subscription: Subscription,
    endpoints: Vec<RelayEndpoint>,
    started_at: Instant,
    mut stop_rx: mpsc::UnboundedReceiver<()>,
    snapshots: watch::Sender<SessionSnapshot>,
) -> SessionSnapshot {
    let limits = session.limits().clone();

    let timeout = time::sleep_until(started_at + limits.timeout);
    tokio::pin!(timeout);
    let grace = time::sleep_until(started_at + limits.connect_grace);
    tokio::pin!(grace);
    let mut ticker = time::interval(limits.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut grace_pending = true;
    let mut stream_open = true;

    let reason = loop {
        tokio::select! {
            biased;

            // An explicit stop and a dropped controller end the run the same way.
            _ = stop_rx.recv() => break StopReason::UserStopped,

            () = &mut timeout => break StopReason::TimedOut,

            () = &mut grace, if grace_pending => {
                grace_pending = false;
                session.mark_connected();
                snapshots.send_replace(session.snapshot());
            }

            _ = ticker.tick() => {
                session.tick(Instant::now().into_std());
                snapshots.send_replace(session.snapshot());
            }

            item = subscription.next(), if stream_open => match item {
                Some(StreamItem::Event { relay_url, content }) => {
                    metrics::counter!(EVENTS_TOTAL).increment(1);
                    match session.offer(&content) {
                        Offer::Added(address) => {
                            metrics::counter!(ADDRESSES_FOUND_TOTAL).increment(1);
                            tracing::info!(
                                "Found {} ({}/{}) via {}",
                                address,
                                session.addresses().len(),
                                limits.max_addresses,
                                relay_url
                            );
                            snapshots.send_replace(session.snapshot());
                        }
                        Offer::GoalReached(address) => {
                            metrics::counter!(ADDRESSES_FOUND_TOTAL).increment(1);
                            tracing::info!("Found {} via {}, target reached", address, relay_url);
                            break StopReason::GoalReached;
                        }
                        Offer::Duplicate => {
                            metrics::counter!(EVENTS_DISCARDED_TOTAL, "reason" => "duplicate")
                                .increment(1);
                        }
                        Offer::Rejected => {
                            metrics::counter!(EVENTS_DISCARDED_TOTAL, "reason" => "invalid")
                                .increment(1);
                        }
                        Offer::Ignored => {}
                    }
                }
                Some(StreamItem::EndOfStoredEvents { relay_url }) => {
                    tracing::debug!("End of stored events from {}", relay_url);
                }
                Some(StreamItem::Closed { relay_url, message }) => {
                    session.mark_endpoint_error(&relay_url, Some(message));
                    snapshots.send_replace(session.snapshot());
                }
                None => {
                    tracing::debug!("Subscription stream ended, waiting for timeout or stop");
                    stream_open = false;
                }
            },
        }
    };

    // Goal-reached runs are already stopped inside `offer`.
    session.finish(reason.clone());
    snapshots.send_replace(session.snapshot());
    source.close(subscription, &endpoints).await;

    let snapshot = session.snapshot();
    metrics::counter!(RUNS_TOTAL, "outcome" => reason.label()).increment(1);
    tracing::info!(
        "Harvest ended ({}): {}",
        reason.label(),
        snapshot.status_message
    );
    snapshots.send_replace(snapshot.clone());
    snapshot
}
