//! Work item phase lifecycle.
//!
//! Phases advance strictly in order as gates are recorded:
//! `new -> refined -> signed -> prepared -> appended -> reported ->
//! acknowledged -> committed`, with an explicit reset side-transition back
//! to `new` that archives rather than deletes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::event::GateType;

/// The phase a work item occupies between gate events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No gates recorded (or freshly reset).
    New,
    Refined,
    Signed,
    Prepared,
    Appended,
    Reported,
    Acknowledged,
    Committed,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::New,
        Self::Refined,
        Self::Signed,
        Self::Prepared,
        Self::Appended,
        Self::Reported,
        Self::Acknowledged,
        Self::Committed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Refined => "refined",
            Self::Signed => "signed",
            Self::Prepared => "prepared",
            Self::Appended => "appended",
            Self::Reported => "reported",
            Self::Acknowledged => "acknowledged",
            Self::Committed => "committed",
        }
    }

    /// The phase a work item enters once the given gate is recorded.
    #[must_use]
    pub const fn after(gate: GateType) -> Self {
        match gate {
            GateType::Refine => Self::Refined,
            GateType::Sign => Self::Signed,
            GateType::Prepare => Self::Prepared,
            GateType::Append => Self::Appended,
            GateType::Report => Self::Reported,
            GateType::Acknowledge => Self::Acknowledged,
            GateType::Commit => Self::Committed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}
