//! Relay list parsing and per-endpoint connection status.
//!
//! The parser is a permissive, best-effort filter rather than a validator:
//! free-form text goes in, the `wss://` entries come out, and anything else
//! is dropped without complaint.
//!
//! # Parsing Rules
//!
//! - Split on newlines and commas
//! - Trim whitespace around each token, drop empty tokens
//! - Keep tokens that start with `wss://` and have something after it
//! - Preserve input order, keep duplicates

use serde::Serialize;
use std::fmt;

use crate::DEFAULT_RELAYS;

/// Required scheme prefix for relay endpoints.
pub const SECURE_WEBSOCKET_PREFIX: &str = "wss://";

/// A relay connection string that passed the parser's filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RelayEndpoint(String);

impl RelayEndpoint {
    /// Accept a single token as an endpoint.
    ///
    /// The token is trimmed first. Returns `None` unless it starts with
    /// `wss://` followed by a non-empty remainder.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        match token.strip_prefix(SECURE_WEBSOCKET_PREFIX) {
            Some(rest) if !rest.is_empty() => Some(Self(token.to_string())),
            _ => None,
        }
    }

    /// The endpoint URL as given by the user.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `url` names this endpoint, ignoring trailing slashes and ASCII case.
    ///
    /// Used to map relay URLs reported by the client (which normalizes them)
    /// back onto the configured entries.
    pub fn matches(&self, url: &str) -> bool {
        self.0
            .trim_end_matches('/')
            .eq_ignore_ascii_case(url.trim().trim_end_matches('/'))
    }
}

impl fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelayEndpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse free-form relay configuration text into endpoints.
///
/// # Examples
///
/// ```
/// use lnaddr_core::parse_relay_list;
///
/// let relays = parse_relay_list("wss://a.example\nwss://b.example, https://nope");
/// assert_eq!(relays.len(), 2);
/// assert_eq!(relays[1].as_str(), "wss://b.example");
/// ```
pub fn parse_relay_list(raw: &str) -> Vec<RelayEndpoint> {
    raw.split(['\n', ','])
        .filter_map(RelayEndpoint::parse)
        .collect()
}

/// The built-in relay list rendered as parser input (one relay per line).
pub fn default_relay_text() -> String {
    DEFAULT_RELAYS.join("\n")
}

/// Connection status of one configured endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndpointStatus {
    /// Subscription requested, no confirmation yet.
    Connecting,
    /// Assumed connected after the grace period.
    Connected,
    /// The client or the relay reported a failure.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Error { detail: None } => f.write_str("error"),
            Self::Error {
                detail: Some(detail),
            } => write!(f, "error: {detail}"),
        }
    }
}

/// An endpoint paired with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointState {
    pub url: RelayEndpoint,
    #[serde(flatten)]
    pub status: EndpointStatus,
}

impl EndpointState {
    /// A freshly configured endpoint, waiting on its connection.
    pub fn connecting(url: RelayEndpoint) -> Self {
        Self {
            url,
            status: EndpointStatus::Connecting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(endpoints: &[RelayEndpoint]) -> Vec<&str> {
        endpoints.iter().map(RelayEndpoint::as_str).collect()
    }

    #[test]
    fn test_parse_mixed_separators() {
        let relays = parse_relay_list("wss://a.example\nwss://b.example,wss://c.example");
        assert_eq!(
            urls(&relays),
            vec!["wss://a.example", "wss://b.example", "wss://c.example"]
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_relay_list("").is_empty());
        assert!(parse_relay_list("  \n , \n").is_empty());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let relays = parse_relay_list("  wss://a.example  ,\twss://b.example\r\n");
        assert_eq!(urls(&relays), vec!["wss://a.example", "wss://b.example"]);
    }

    #[test]
    fn test_parse_drops_other_schemes() {
        let relays = parse_relay_list(
            "ws://plain.example\nhttps://web.example\nrelay.example\nwss://ok.example",
        );
        assert_eq!(urls(&relays), vec!["wss://ok.example"]);
    }

    #[test]
    fn test_parse_drops_bare_scheme() {
        assert!(parse_relay_list("wss://\n wss:// ,://x").is_empty());
    }

    #[test]
    fn test_parse_scheme_is_case_sensitive() {
        assert!(parse_relay_list("WSS://shouty.example").is_empty());
    }

    #[test]
    fn test_parse_keeps_duplicates_in_order() {
        let relays = parse_relay_list("wss://b.example,wss://a.example,wss://b.example");
        assert_eq!(
            urls(&relays),
            vec!["wss://b.example", "wss://a.example", "wss://b.example"]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = "wss://a.example, junk\n\nwss://b.example/path";
        let first = parse_relay_list(raw);
        let rendered = urls(&first).join("\n");
        assert_eq!(parse_relay_list(&rendered), first);
    }

    #[test]
    fn test_parsed_endpoints_have_prefix_and_no_padding() {
        let inputs = [
            "",
            "wss://a.example",
            " wss://a.example ",
            "foo,bar,\nwss://x.y\n\t wss://z ",
            "wss://a,wss://,ws://b,https://c,WSS://d",
            ",,,\n\n\r\n",
        ];
        for raw in inputs {
            for endpoint in parse_relay_list(raw) {
                let s = endpoint.as_str();
                assert!(s.starts_with(SECURE_WEBSOCKET_PREFIX), "{s:?}");
                assert_eq!(s, s.trim(), "{s:?}");
                assert!(s.len() > SECURE_WEBSOCKET_PREFIX.len(), "{s:?}");
            }
        }
    }

    #[test]
    fn test_default_relay_text_round_trips() {
        let relays = parse_relay_list(&default_relay_text());
        assert_eq!(relays.len(), DEFAULT_RELAYS.len());
        assert_eq!(urls(&relays), DEFAULT_RELAYS.to_vec());
    }

    #[test]
    fn test_endpoint_matches_normalized_forms() {
        let endpoint = RelayEndpoint::parse("wss://Relay.Example.com").unwrap();
        assert!(endpoint.matches("wss://relay.example.com"));
        assert!(endpoint.matches("wss://relay.example.com/"));
        assert!(!endpoint.matches("wss://other.example.com"));
    }

    #[test]
    fn test_endpoint_status_display() {
        assert_eq!(EndpointStatus::Connecting.to_string(), "connecting");
        assert_eq!(EndpointStatus::Connected.to_string(), "connected");
        assert_eq!(EndpointStatus::Error { detail: None }.to_string(), "error");
        assert_eq!(
            EndpointStatus::Error {
                detail: Some("auth-required".to_string())
            }
            .to_string(),
            "error: auth-required"
        );
    }

    #[test]
    fn test_endpoint_state_serializes_flat() {
        let state = EndpointState {
            url: RelayEndpoint::parse("wss://a.example").unwrap(),
            status: EndpointStatus::Error {
                detail: Some("blocked".to_string()),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["url"], "wss://a.example");
        assert_eq!(json["status"], "error");
        assert_eq!(json["detail"], "blocked");
    }
}
