//! Typed payload data structs for each gate type.
//!
//! Each gate type has a corresponding data struct that defines the JSON
//! payload schema. Unknown fields are preserved via `#[serde(flatten)]`
//! for forward compatibility.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::types::GateType;

// ---------------------------------------------------------------------------
// Coverage verdict
// ---------------------------------------------------------------------------

/// The refinement artifact's coverage verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    Pass,
    Fail,
}

impl Coverage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Coverage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            _ => Err(format!("unknown coverage verdict '{s}': expected PASS or FAIL")),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-gate payload structs
// ---------------------------------------------------------------------------

/// Payload for `gate.refine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineData {
    /// Path of the refinement artifact this gate validated.
    pub artifact_ref: String,
    /// Coverage verdict extracted from the artifact.
    pub coverage: Coverage,
    /// Whether the artifact declared enrichment as still needed.
    pub enrichment_needed: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Payload for `gate.sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignData {
    /// The consumed one-time signature token.
    pub token: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Payload shared by the post-signature step gates
/// (`gate.prepare`, `gate.append`, `gate.report`, `gate.acknowledge`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepData {
    /// True when the step was machine-inferred rather than explicitly
    /// confirmed. Machine-inferred steps bypass the momentum interval and
    /// are rendered distinctly downstream.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub machine_inferred: bool,
    /// Optional free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StepData {
    /// An explicitly-confirmed step with no note.
    #[must_use]
    pub const fn explicit() -> Self {
        Self {
            machine_inferred: false,
            note: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Payload for `gate.commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub machine_inferred: bool,
    /// Resolved revision the commit gate verified against, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// GateData — the unified payload enum
// ---------------------------------------------------------------------------

/// Typed payload for a gate event. The discriminant comes from [`GateType`],
/// not from the JSON itself (it is an external tag in TSJSON).
///
/// **Serde note:** `GateData` implements `Serialize` manually (dispatching
/// to the inner struct) but does **not** implement `Deserialize` directly.
/// Use [`GateData::deserialize_for`] with the known [`GateType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateData {
    Refine(RefineData),
    Sign(SignData),
    Prepare(StepData),
    Append(StepData),
    Report(StepData),
    Acknowledge(StepData),
    Commit(CommitData),
}

impl GateData {
    /// Deserialize a JSON string into the correct `GateData` variant based
    /// on the gate type.
    ///
    /// # Errors
    ///
    /// Returns a [`DataParseError`] if the JSON is malformed or does not
    /// match the expected schema for the given gate type.
    pub fn deserialize_for(gate_type: GateType, json: &str) -> Result<Self, DataParseError> {
        let result = match gate_type {
            GateType::Refine => serde_json::from_str::<RefineData>(json).map(GateData::Refine),
            GateType::Sign => serde_json::from_str::<SignData>(json).map(GateData::Sign),
            GateType::Prepare => serde_json::from_str::<StepData>(json).map(GateData::Prepare),
            GateType::Append => serde_json::from_str::<StepData>(json).map(GateData::Append),
            GateType::Report => serde_json::from_str::<StepData>(json).map(GateData::Report),
            GateType::Acknowledge => {
                serde_json::from_str::<StepData>(json).map(GateData::Acknowledge)
            }
            GateType::Commit => serde_json::from_str::<CommitData>(json).map(GateData::Commit),
        };

        result.map_err(|source| DataParseError { gate_type, source })
    }

    /// Serialize the payload to a [`serde_json::Value`].
    ///
    /// # Errors
    ///
    /// Returns an error if the inner struct fails to serialize (should not
    /// happen with well-formed data).
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Refine(d) => serde_json::to_value(d),
            Self::Sign(d) => serde_json::to_value(d),
            Self::Prepare(d) | Self::Append(d) | Self::Report(d) | Self::Acknowledge(d) => {
                serde_json::to_value(d)
            }
            Self::Commit(d) => serde_json::to_value(d),
        }
    }

    /// The gate type this payload belongs to.
    #[must_use]
    pub const fn gate_type(&self) -> GateType {
        match self {
            Self::Refine(_) => GateType::Refine,
            Self::Sign(_) => GateType::Sign,
            Self::Prepare(_) => GateType::Prepare,
            Self::Append(_) => GateType::Append,
            Self::Report(_) => GateType::Report,
            Self::Acknowledge(_) => GateType::Acknowledge,
            Self::Commit(_) => GateType::Commit,
        }
    }

    /// Whether this payload marks the step as machine-inferred.
    #[must_use]
    pub const fn machine_inferred(&self) -> bool {
        match self {
            Self::Refine(_) | Self::Sign(_) => false,
            Self::Prepare(d) | Self::Append(d) | Self::Report(d) | Self::Acknowledge(d) => {
                d.machine_inferred
            }
            Self::Commit(d) => d.machine_inferred,
        }
    }
}

impl Serialize for GateData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Refine(d) => d.serialize(serializer),
            Self::Sign(d) => d.serialize(serializer),
            Self::Prepare(d) | Self::Append(d) | Self::Report(d) | Self::Acknowledge(d) => {
                d.serialize(serializer)
            }
            Self::Commit(d) => d.serialize(serializer),
        }
    }
}

// ---------------------------------------------------------------------------
// DataParseError
// ---------------------------------------------------------------------------

/// Error returned when deserializing a gate event's JSON payload fails.
#[derive(Debug)]
pub struct DataParseError {
    /// The gate type that was being deserialized.
    pub gate_type: GateType,
    /// The underlying JSON parse error.
    pub source: serde_json::Error,
}

impl fmt::Display for DataParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} data payload: {}", self.gate_type, self.source)
    }
}

impl std::error::Error for DataParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
