//! Profile event sources.
//!
//! A [`ProfileSource`] is the boundary to whatever actually talks to relays.
//! The controller only needs two things from it: open one subscription for a
//! set of endpoints, and close it again against the same set.
//!
//! # Available Sources
//!
//! - [`RelaySource`] - Live Nostr relays via nostr-sdk

mod relay;

pub use relay::{RelaySource, RelaySourceConfig};

use async_trait::async_trait;
use lnaddr_core::{PROFILE_METADATA_KIND, RelayEndpoint};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;

/// What to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFilter {
    /// Event kind (always profile metadata).
    pub kind: u16,

    /// Maximum number of stored events each relay should replay.
    pub limit: usize,
}

impl ProfileFilter {
    /// Profile metadata events with a bounded backfill.
    pub fn metadata(limit: usize) -> Self {
        Self {
            kind: PROFILE_METADATA_KIND,
            limit,
        }
    }
}

/// One item delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A matching event. `content` is the raw kind-0 JSON string.
    Event { relay_url: String, content: String },

    /// The relay finished replaying stored events.
    EndOfStoredEvents { relay_url: String },

    /// The relay closed the subscription, or the client could not use it.
    Closed { relay_url: String, message: String },
}

/// An open subscription.
///
/// Items arrive in whatever order relays deliver them. The stream ends once
/// the source drops its sender. Dropping the subscription aborts the
/// forwarding task, if any.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    events: mpsc::Receiver<StreamItem>,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, events: mpsc::Receiver<StreamItem>) -> Self {
        Self {
            id: id.into(),
            events,
            forwarder: None,
        }
    }

    /// Attach the task that feeds this subscription.
    pub fn with_forwarder(mut self, forwarder: JoinHandle<()>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next item, or `None` once the source is done.
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// A source of profile metadata events.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Open one subscription covering all `endpoints`.
    ///
    /// Returns once the request has been issued; results arrive through the
    /// returned [`Subscription`].
    async fn open(&self, endpoints: &[RelayEndpoint], filter: &ProfileFilter)
    -> Result<Subscription>;

    /// Close `subscription` against the same endpoints it was opened with.
    async fn close(&self, subscription: Subscription, endpoints: &[RelayEndpoint]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_filter() {
        let filter = ProfileFilter::metadata(500);
        assert_eq!(filter.kind, 0);
        assert_eq!(filter.limit, 500);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new("sub-1", rx);
        tx.send(StreamItem::EndOfStoredEvents {
            relay_url: "wss://a.example".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(sub.id(), "sub-1");
        assert!(matches!(
            sub.next().await,
            Some(StreamItem::EndOfStoredEvents { .. })
        ));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_forwarder() {
        let (_tx, rx) = mpsc::channel(1);
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let forwarder = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        let sub = Subscription::new("sub-2", rx).with_forwarder(forwarder);

        drop(sub);
        // The sender is dropped only when the aborted task is torn down.
        assert!(alive_rx.await.is_err());
    }
}
