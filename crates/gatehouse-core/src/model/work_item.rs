//! Validated work item identifier.
//!
//! A `WorkItemId` is an opaque, caller-supplied key. It doubles as a TSJSON
//! field and as the stem of the per-item ledger filename, so the grammar
//! excludes whitespace, tabs, and path separators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GateError;

/// Maximum accepted ID length.
pub const MAX_LEN: usize = 64;

/// Minimum accepted ID length.
pub const MIN_LEN: usize = 2;

/// An opaque, globally unique, immutable work item key.
///
/// Grammar: 2-64 characters of `[A-Za-z0-9._-]`, not starting with `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkItemId(String);

impl WorkItemId {
    /// Parse and validate a raw string as a work item ID.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidWorkItemId`] when the grammar is violated.
    pub fn parse(raw: &str) -> Result<Self, GateError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(GateError::InvalidWorkItemId {
                raw: raw.to_string(),
            })
        }
    }

    /// Construct without validation. Test helper and trusted-path escape
    /// hatch; prefer [`WorkItemId::parse`].
    #[must_use]
    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// Whether `raw` satisfies the ID grammar.
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        raw.len() >= MIN_LEN
            && raw.len() <= MAX_LEN
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }

    /// The raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkItemId {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for WorkItemId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
