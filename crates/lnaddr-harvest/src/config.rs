//! Relay list configuration.
//!
//! The relay list is the only user-facing setting. It comes from, in order:
//! - Inline text (`--relays` / `LNADDR_RELAYS`)
//! - A file (`--relays-file` / `LNADDR_RELAYS_FILE`)
//! - The built-in default list
//!
//! Supplied text is returned verbatim. Filtering is the parser's job, so a
//! blank or junk-only value still reaches it and produces the "no valid
//! endpoints" status instead of silently falling back to the defaults.

use std::path::Path;

use lnaddr_core::default_relay_text;

use crate::{Error, Result};

/// Where the relay list text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTextOrigin {
    Inline,
    File,
    Default,
}

impl RelayTextOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::File => "file",
            Self::Default => "default",
        }
    }
}

/// Resolve the raw relay list text.
pub fn resolve_relay_text(
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<(String, RelayTextOrigin)> {
    if let Some(text) = inline {
        return Ok((text.to_string(), RelayTextOrigin::Inline));
    }

    if let Some(path) = file {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read relay list {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((text, RelayTextOrigin::File));
    }

    Ok((default_relay_text(), RelayTextOrigin::Default))
}
