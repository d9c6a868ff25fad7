//! Kind-0 profile metadata, reduced to the fields the harvester reads.

use serde::Deserialize;

use crate::address::LightningAddress;

/// Parsed profile metadata (kind 0 content).
///
/// Unknown fields are ignored. Only `lud16` is of interest here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileMetadata {
    /// Lightning address for zaps.
    #[serde(default)]
    pub lud16: Option<String>,
}

impl ProfileMetadata {
    /// Parse from kind 0 JSON content string.
    ///
    /// Returns `None` for anything that isn't a JSON object of the expected
    /// shape, including a `lud16` that isn't a string.
    pub fn from_json(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }

    /// The `lud16` field, if present and well-formed.
    pub fn lightning_address(&self) -> Option<LightningAddress> {
        self.lud16.as_deref().and_then(LightningAddress::parse)
    }
}

/// Extract a valid Lightning address from raw kind-0 content.
pub fn extract_lightning_address(content: &str) -> Option<LightningAddress> {
    ProfileMetadata::from_json(content)?.lightning_address()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_metadata_from_valid_json() {
        let meta = ProfileMetadata::from_json(r#"{"lud16":"alice@example.com"}"#).unwrap();
        assert_eq!(meta.lud16.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn profile_metadata_with_extra_fields() {
        let json = r#"{"name":"carol","unknown_field":[1,2],"lud16":"carol@tips.com","website":"https://carol.dev"}"#;
        let meta = ProfileMetadata::from_json(json).unwrap();
        assert_eq!(meta.lud16.as_deref(), Some("carol@tips.com"));
    }

    #[test]
    fn profile_metadata_from_invalid_json() {
        assert!(ProfileMetadata::from_json("not json at all").is_none());
        assert!(ProfileMetadata::from_json("").is_none());
        assert!(ProfileMetadata::from_json("[1,2,3]").is_none());
    }

    #[test]
    fn profile_metadata_without_lud16() {
        let meta = ProfileMetadata::from_json(r#"{"name":"bob"}"#).unwrap();
        assert_eq!(meta.lud16, None);
        assert_eq!(meta.lightning_address(), None);
    }

    #[test]
    fn profile_metadata_null_lud16() {
        let meta = ProfileMetadata::from_json(r#"{"lud16":null}"#).unwrap();
        assert_eq!(meta.lud16, None);
    }

    #[test]
    fn profile_metadata_non_string_lud16() {
        assert!(ProfileMetadata::from_json(r#"{"lud16":42}"#).is_none());
    }

    #[test]
    fn extract_valid_address() {
        let addr = extract_lightning_address(r#"{"lud16":"alice@example.com"}"#).unwrap();
        assert_eq!(addr.as_str(), "alice@example.com");
    }

    #[test]
    fn extract_rejects_malformed_address() {
        assert_eq!(
            extract_lightning_address(r#"{"lud16":"not-an-address"}"#),
            None
        );
        assert_eq!(
            extract_lightning_address(r#"{"lud16":" alice@example.com"}"#),
            None
        );
    }

    #[test]
    fn extract_rejects_malformed_payload() {
        assert_eq!(extract_lightning_address("{lud16: alice@example.com}"), None);
    }
}
