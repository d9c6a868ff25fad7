//! Lightning address (lud16) validation.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// `local@domain.tld`: exactly one `@`, no whitespace, and a dot inside the
/// domain with at least one character on each side.
static LUD16_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("lud16 regex should compile")
});

/// A well-formed Lightning address such as `alice@example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LightningAddress(String);

impl LightningAddress {
    /// Validate a raw `lud16` value.
    ///
    /// The value is taken as-is: surrounding whitespace makes it invalid
    /// rather than being trimmed away.
    pub fn parse(raw: &str) -> Option<Self> {
        LUD16_REGEX.is_match(raw).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LightningAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
