//! Gate type enum covering the 7 TSJSON gate event types.
//!
//! Each gate type corresponds to one checkpoint in the review sequence. The
//! string representation uses the `gate.<verb>` dotted format used in the
//! TSJSON gate ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The 7 gate types in the gatehouse catalog, in required order.
///
/// String representation follows the `gate.<verb>` convention used in the
/// TSJSON ledger format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GateType {
    /// Technical refinement of the proposed change.
    Refine,
    /// Human sign-off with a one-time token.
    Sign,
    /// Implementation preparation.
    Prepare,
    /// Implementation appended to the work item.
    Append,
    /// Evidence report presented for review.
    Report,
    /// Report acknowledged by a reviewer.
    Acknowledge,
    /// Change committed.
    Commit,
}

/// Error returned when parsing an unknown gate type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGateType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownGateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown gate type '{}': expected one of gate.refine, gate.sign, \
             gate.prepare, gate.append, gate.report, gate.acknowledge, \
             gate.commit",
            self.raw
        )
    }
}

impl std::error::Error for UnknownGateType {}

impl GateType {
    /// All known gate types in required order.
    pub const ALL: [Self; 7] = [
        Self::Refine,
        Self::Sign,
        Self::Prepare,
        Self::Append,
        Self::Report,
        Self::Acknowledge,
        Self::Commit,
    ];

    /// Return the canonical `gate.<verb>` string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refine => "gate.refine",
            Self::Sign => "gate.sign",
            Self::Prepare => "gate.prepare",
            Self::Append => "gate.append",
            Self::Report => "gate.report",
            Self::Acknowledge => "gate.acknowledge",
            Self::Commit => "gate.commit",
        }
    }

    /// The gate that must immediately precede this one, if any.
    ///
    /// `Refine` opens the sequence and has no prerequisite.
    #[must_use]
    pub const fn required_predecessor(self) -> Option<Self> {
        match self {
            Self::Refine => None,
            Self::Sign => Some(Self::Refine),
            Self::Prepare => Some(Self::Sign),
            Self::Append => Some(Self::Prepare),
            Self::Report => Some(Self::Append),
            Self::Acknowledge => Some(Self::Report),
            Self::Commit => Some(Self::Acknowledge),
        }
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateType {
    type Err = UnknownGateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gate.refine" => Ok(Self::Refine),
            "gate.sign" => Ok(Self::Sign),
            "gate.prepare" => Ok(Self::Prepare),
            "gate.append" => Ok(Self::Append),
            "gate.report" => Ok(Self::Report),
            "gate.acknowledge" => Ok(Self::Acknowledge),
            "gate.commit" => Ok(Self::Commit),
            _ => Err(UnknownGateType { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the `gate.<verb>` string.
impl Serialize for GateType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GateType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
