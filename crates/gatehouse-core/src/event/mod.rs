//! Gate event data model for the gatehouse ledger.
//!
//! This module defines the core `GateEvent` struct, the `GateType` enum
//! covering all 7 gate types, typed payload data structs, and the canonical
//! JSON serialization helper needed for deterministic event hashing.
//!
//! # TSJSON Format
//!
//! Events are stored in TSJSON (tab-separated fields with JSON payload):
//!
//! ```text
//! wall_ts_us \t actor \t type \t work_item_id \t data \t event_hash
//! ```
//!
//! The `GateEvent` struct maps 1:1 to a TSJSON line. Parsing and writing
//! TSJSON lines is handled by the parser/writer modules.

pub mod canonical;
pub mod data;
pub mod parser;
pub mod types;
pub mod writer;

pub use canonical::{canonicalize_json, canonicalize_json_str};
pub use data::{
    CommitData, Coverage, DataParseError, GateData, RefineData, SignData, StepData,
};
pub use types::{GateType, UnknownGateType};

use crate::model::WorkItemId;
use serde::{Deserialize, Serialize};

/// A single event in the gatehouse gate ledger.
///
/// Each event records one accepted gate transition for one work item.
/// Events are append-only and content-addressed: the `event_hash` pins the
/// exact bytes that were accepted, so later tampering is detectable on
/// re-parse.
///
/// # Fields (TSJSON column order)
///
/// 1. `wall_ts_us` — wall-clock microseconds since Unix epoch
/// 2. `actor` — identifier of the agent/human that drove the gate
/// 3. `gate_type` — one of the 7 gate types
/// 4. `work_item_id` — the work item this gate belongs to
/// 5. `data` — typed payload (JSON in TSJSON, deserialized here)
/// 6. `event_hash` — BLAKE3 hash of fields 1–5
///
/// # Serde
///
/// Custom `Deserialize` uses `gate_type` to drive typed deserialization of
/// the `data` field, because the type discriminant is external to the JSON
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateEvent {
    /// Wall-clock timestamp in microseconds since Unix epoch.
    pub wall_ts_us: i64,

    /// Identifier of the agent or human that drove this gate.
    pub actor: String,

    /// The gate this event records.
    pub gate_type: GateType,

    /// The work item being gated.
    pub work_item_id: WorkItemId,

    /// Typed payload data specific to the gate type.
    pub data: GateData,

    /// BLAKE3 content hash of fields 1–5, `blake3:<hex>`.
    pub event_hash: String,
}

impl<'de> Deserialize<'de> for GateEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        /// Two-pass deserialization: first get the `gate_type`, then use it
        /// to deserialize the data payload.
        #[derive(Deserialize)]
        struct GateEventRaw {
            wall_ts_us: i64,
            actor: String,
            gate_type: GateType,
            work_item_id: WorkItemId,
            data: serde_json::Value,
            event_hash: String,
        }

        let raw = GateEventRaw::deserialize(deserializer)?;
        let data_json = raw.data.to_string();
        let data = GateData::deserialize_for(raw.gate_type, &data_json)
            .map_err(serde::de::Error::custom)?;

        Ok(Self {
            wall_ts_us: raw.wall_ts_us,
            actor: raw.actor,
            gate_type: raw.gate_type,
            work_item_id: raw.work_item_id,
            data,
            event_hash: raw.event_hash,
        })
    }
}

impl std::fmt::Display for GateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.wall_ts_us,
            self.actor,
            self.gate_type,
            self.work_item_id,
            match &self.data {
                GateData::Refine(d) => format!("refine: {} ({})", d.artifact_ref, d.coverage),
                GateData::Sign(d) => format!("sign: {}", d.token),
                GateData::Prepare(d)
                | GateData::Append(d)
                | GateData::Report(d)
                | GateData::Acknowledge(d) =>
                    if d.machine_inferred {
                        "step (machine-inferred)".to_string()
                    } else {
                        "step".to_string()
                    },
                GateData::Commit(d) => d
                    .revision
                    .as_deref()
                    .map_or_else(|| "commit".to_string(), |rev| format!("commit: {rev}")),
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
