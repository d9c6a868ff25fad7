//! Live relay profile source.
//!
//! Subscribes to kind-0 events on a set of Nostr relays using nostr-sdk.
//!
//! # Architecture
//!
//! The source owns one nostr-sdk `Client`. Opening a subscription adds the
//! configured relays to the client's pool, connects, and subscribes exactly
//! those relays. A forwarding task then reads the pool's broadcast
//! notifications, keeps the ones belonging to our subscription, and pushes
//! them into the [`Subscription`] channel.
//!
//! Closing unsubscribes and removes the same relays from the pool, so the
//! next run starts from an empty pool.

use super::{ProfileFilter, ProfileSource, StreamItem, Subscription};
use crate::{Error, Result};

use async_trait::async_trait;
use lnaddr_core::RelayEndpoint;
use lnaddr_core::metrics::{NOTIFICATIONS_LAGGED_TOTAL, RELAY_CLOSED_TOTAL};
use nostr_sdk::prelude::*;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

/// Configuration for the relay source.
#[derive(Debug, Clone)]
pub struct RelaySourceConfig {
    /// Size of the relay pool's notification broadcast buffer.
    ///
    /// Default: 16384 (4x the nostr-sdk default of 4096). Backfill from many
    /// relays arrives in bursts.
    pub notification_channel_size: usize,

    /// Capacity of the channel between the forwarding task and the controller.
    pub stream_buffer: usize,

    /// Minimum time between notification-lag warnings.
    pub lag_warning_interval: Duration,
}

impl Default for RelaySourceConfig {
    fn default() -> Self {
        Self {
            notification_channel_size: 16_384,
            stream_buffer: 1_024,
            lag_warning_interval: Duration::from_secs(10),
        }
    }
}

/// Profile source backed by live Nostr relays.
pub struct RelaySource {
    config: RelaySourceConfig,
    client: Client,
}

impl RelaySource {
    /// Create a new relay source with the given configuration.
    pub fn new(config: RelaySourceConfig) -> Self {
        let pool_opts =
            RelayPoolOptions::default().notification_channel_size(config.notification_channel_size);
        let client = Client::builder()
            .opts(ClientOptions::new().pool(pool_opts))
            .build();

        Self { config, client }
    }

    /// Add each endpoint to the pool once.
    ///
    /// Returns the relays to subscribe and a `Closed` item for every
    /// endpoint the client refused.
    async fn add_targets(
        &self,
        endpoints: &[RelayEndpoint],
    ) -> (Vec<RelayUrl>, Vec<StreamItem>) {
        let mut targets: Vec<RelayUrl> = Vec::with_capacity(endpoints.len());
        let mut refused: Vec<StreamItem> = Vec::new();

        for endpoint in endpoints {
            let url = match RelayUrl::parse(endpoint.as_str()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping relay {}: {}", endpoint, e);
                    refused.push(StreamItem::Closed {
                        relay_url: endpoint.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            // Duplicated endpoints share one pool entry.
            if targets.contains(&url) {
                continue;
            }

            match self.client.add_relay(endpoint.as_str()).await {
                Ok(_) => {
                    tracing::debug!("Added relay: {}", url);
                    targets.push(url);
                }
                Err(e) => {
                    tracing::warn!("Failed to add relay {}: {}", endpoint, e);
                    refused.push(StreamItem::Closed {
                        relay_url: endpoint.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        (targets, refused)
    }

    async fn remove_relays(&self, urls: &[RelayUrl]) {
        for url in urls {
            if let Err(e) = self.client.remove_relay(url.as_str()).await {
                tracing::debug!("Failed to remove relay {}: {}", url, e);
            }
        }
    }
}

impl Default for RelaySource {
    fn default() -> Self {
        Self::new(RelaySourceConfig::default())
    }
}

#[async_trait]
impl ProfileSource for RelaySource {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn open(
        &self,
        endpoints: &[RelayEndpoint],
        filter: &ProfileFilter,
    ) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer);
        let (targets, mut refused) = self.add_targets(endpoints).await;

        if targets.is_empty() {
            return Err(Error::Subscription(format!(
                "none of the {} configured relays could be added",
                endpoints.len()
            )));
        }

        self.client.connect().await;

        let kind = Kind::from(filter.kind);
        let nostr_filter = Filter::new().kind(kind).limit(filter.limit);

        // Take the receiver before subscribing so early backfill isn't missed.
        let notifications = self.client.notifications();

        let output = match self
            .client
            .subscribe_to(targets.clone(), nostr_filter, None)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                self.remove_relays(&targets).await;
                return Err(e.into());
            }
        };
        refused.extend(rejected_items(&output.failed));
        let subscription_id = output.val;
        tracing::info!(
            "Subscribed to kind {} on {} relays with ID: {}",
            filter.kind,
            output.success.len(),
            subscription_id
        );

        for item in refused {
            metrics::counter!(RELAY_CLOSED_TOTAL).increment(1);
            if tx.try_send(item).is_err() {
                break;
            }
        }

        let forwarder = tokio::spawn(forward_notifications(
            notifications,
            subscription_id.clone(),
            kind,
            tx,
            self.config.lag_warning_interval,
        ));

        Ok(Subscription::new(subscription_id.to_string(), rx).with_forwarder(forwarder))
    }

    async fn close(&self, subscription: Subscription, endpoints: &[RelayEndpoint]) {
        let subscription_id = SubscriptionId::new(subscription.id());
        self.client.unsubscribe(&subscription_id).await;
        drop(subscription);

        let mut urls: Vec<RelayUrl> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if let Ok(url) = RelayUrl::parse(endpoint.as_str())
                && !urls.contains(&url)
            {
                urls.push(url);
            }
        }
        self.remove_relays(&urls).await;

        tracing::info!(
            "Closed subscription {} on {} relays",
            subscription_id,
            urls.len()
        );
    }
}

/// `Closed` items for relays that refused the subscription request.
fn rejected_items<'a, R>(
    failed: impl IntoIterator<Item = (&'a RelayUrl, &'a R)>,
) -> Vec<StreamItem>
where
    R: std::fmt::Display + 'a,
{
    failed
        .into_iter()
        .map(|(url, reason)| {
            tracing::warn!("Relay {} rejected subscription: {}", url, reason);
            StreamItem::Closed {
                relay_url: url.to_string(),
                message: reason.to_string(),
            }
        })
        .collect()
}

fn is_ours(received: &SubscriptionId, ours: &SubscriptionId) -> bool {
    received == ours
}

/// Forward pool notifications for one subscription into its channel.
///
/// Ends when the pool shuts down, the broadcast channel closes, or the
/// subscription's receiver is dropped.
async fn forward_notifications(
    mut notifications: broadcast::Receiver<RelayPoolNotification>,
    subscription_id: SubscriptionId,
    kind: Kind,
    tx: mpsc::Sender<StreamItem>,
    lag_warning_interval: Duration,
) {
    // Rate-limited lag warning (avoid log spam during bursts)
    let mut last_lag_warning = Instant::now();
    let mut lag_count_since_warning = 0u64;
    let mut lag_messages_since_warning = 0u64;

    loop {
        let notification = match notifications.recv().await {
            Ok(n) => n,
            Err(RecvError::Closed) => {
                tracing::debug!("Notification channel closed");
                break;
            }
            Err(RecvError::Lagged(count)) => {
                metrics::counter!(NOTIFICATIONS_LAGGED_TOTAL).increment(count);
                lag_count_since_warning += 1;
                lag_messages_since_warning += count;

                if last_lag_warning.elapsed() >= lag_warning_interval {
                    tracing::warn!(
                        "Notification receiver lagged {} times, dropped {} messages in last {:?}",
                        lag_count_since_warning,
                        lag_messages_since_warning,
                        last_lag_warning.elapsed()
                    );
                    last_lag_warning = Instant::now();
                    lag_count_since_warning = 0;
                    lag_messages_since_warning = 0;
                }
                continue;
            }
        };

        let item = match notification {
            RelayPoolNotification::Event {
                relay_url,
                subscription_id: received,
                event,
                ..
            } => {
                if !is_ours(&received, &subscription_id) || event.kind != kind {
                    continue;
                }
                StreamItem::Event {
                    relay_url: relay_url.to_string(),
                    content: event.content.clone(),
                }
            }

            RelayPoolNotification::Message { relay_url, message } => match message {
                RelayMessage::EndOfStoredEvents(received)
                    if is_ours(&received, &subscription_id) =>
                {
                    tracing::debug!("Relay {} finished backfill", relay_url);
                    StreamItem::EndOfStoredEvents {
                        relay_url: relay_url.to_string(),
                    }
                }
                RelayMessage::Closed {
                    subscription_id: received,
                    message,
                } if is_ours(&received, &subscription_id) => {
                    tracing::warn!("Relay {} closed subscription: {}", relay_url, message);
                    metrics::counter!(RELAY_CLOSED_TOTAL).increment(1);
                    StreamItem::Closed {
                        relay_url: relay_url.to_string(),
                        message: message.to_string(),
                    }
                }
                RelayMessage::Notice(notice) => {
                    tracing::debug!("Relay {} notice: {}", relay_url, notice);
                    continue;
                }
                _ => continue,
            },

            RelayPoolNotification::Shutdown => {
                tracing::info!("Relay pool shutdown notification received");
                break;
            }
        };

        if tx.send(item).await.is_err() {
            break;
        }
    }
}
