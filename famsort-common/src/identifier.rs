//! Identifier registry
//!
//! Mints the opaque tokens that stand in for respondent names and free text.
//! Two flavors exist:
//! - name identifiers: a bare hyphenated UUIDv4, one per normalized name
//! - manual identifiers: `manual-<uuid>`, one per unmatched or vaulted text
//!
//! Both flavors are recognizable from their shape alone, which is what lets
//! later stages skip cells that were already pseudonymized.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix that marks a manually minted identifier
pub const MANUAL_PREFIX: &str = "manual-";

/// Reversible identifier token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Recognize an existing token as an identifier of either flavor
    ///
    /// Returns `None` for anything that is not a canonical identifier, so a
    /// name like `manual-labor` is never mistaken for a manual token.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if is_name_identifier(token) || is_manual_identifier(token) {
            Some(Identifier(token.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `manual-` prefixed identifiers
    pub fn is_manual(&self) -> bool {
        self.0.starts_with(MANUAL_PREFIX)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mint a new name identifier (UUIDv4, OS randomness)
pub fn mint() -> Identifier {
    Identifier(Uuid::new_v4().to_string())
}

/// Mint a new manual identifier
pub fn mint_manual() -> Identifier {
    Identifier(format!("{}{}", MANUAL_PREFIX, Uuid::new_v4()))
}

/// Check whether `token` is a bare UUID
pub fn is_name_identifier(token: &str) -> bool {
    Uuid::parse_str(token).is_ok()
}

/// Check whether `token` is `manual-` followed by a UUID
pub fn is_manual_identifier(token: &str) -> bool {
    token
        .strip_prefix(MANUAL_PREFIX)
        .map(is_name_identifier)
        .unwrap_or(false)
}

/// Check whether `token` is an identifier of either flavor
pub fn is_identifier(token: &str) -> bool {
    Identifier::parse(token).is_some()
}
