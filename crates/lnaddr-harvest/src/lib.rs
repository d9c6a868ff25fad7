//! Lightning address harvesting runtime.
//!
//! Connects the pure session logic in `lnaddr-core` to live Nostr relays.
//!
//! # Modules
//!
//! - [`controller`] - Runs one harvest at a time and publishes snapshots
//! - [`source`] - Profile event sources (live relays via nostr-sdk)
//! - [`config`] - Relay list resolution (inline, file, defaults)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Relay list     │  inline text, file, or built-in defaults
//! └────────┬────────┘
//!          │ parse_relay_list
//!          ▼
//! ┌─────────────────┐
//! │HarvestController│  one task per run, owns the HarvestSession
//! └────────┬────────┘
//!          │ open / close
//!          ▼
//! ┌─────────────────┐
//! │  ProfileSource  │  kind-0 subscription across all endpoints
//! └─────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod source;

pub use config::{RelayTextOrigin, resolve_relay_text};
pub use controller::HarvestController;
pub use error::{Error, Result};
pub use source::{
    ProfileFilter, ProfileSource, RelaySource, RelaySourceConfig, StreamItem, Subscription,
};
