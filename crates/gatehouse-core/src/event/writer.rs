//! TSJSON gate event writer/serializer.
//!
//! Serializes [`GateEvent`] structs to TSJSON lines. Guarantees:
//!
//! - Canonical JSON payload (keys sorted, compact, no whitespace).
//! - One-line invariant: no literal `\n` in the serialized JSON.
//! - Deterministic: same event always produces the same output bytes.
//! - Event hash is BLAKE3 of fields 1–5 joined by tabs, newline-terminated.

use super::GateEvent;
use super::canonical::canonicalize_json;
use super::parser::{FIELD_COMMENT, LEDGER_HEADER, compute_line_hash};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during event writing.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The serialized JSON payload contained a literal newline.
    #[error("JSON payload contains literal newline — one-line invariant violated")]
    NewlineInPayload,

    /// Failed to serialize the event data payload to JSON.
    #[error("failed to serialize event data: {0}")]
    SerializeData(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Return the header block (header + field comment) for a new ledger file.
///
/// Includes the trailing newline on each line.
#[must_use]
pub fn ledger_header() -> String {
    format!("{LEDGER_HEADER}\n{FIELD_COMMENT}\n")
}

/// Serialize a [`GateEvent`] to a single TSJSON line (without trailing
/// newline). The `event_hash` field on the event is included as-is.
///
/// # Errors
///
/// Returns [`WriteError::NewlineInPayload`] if the canonical JSON contains
/// a literal newline, or [`WriteError::SerializeData`] if the payload fails
/// to serialize.
pub fn to_tsjson_line(event: &GateEvent) -> Result<String, WriteError> {
    let data_json = canonical_data_json(event)?;

    if data_json.contains('\n') {
        return Err(WriteError::NewlineInPayload);
    }

    Ok(format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        event.wall_ts_us,
        event.actor,
        event.gate_type,
        event.work_item_id,
        data_json,
        event.event_hash,
    ))
}

/// Compute the BLAKE3 event hash from fields 1–5 of an event.
///
/// # Errors
///
/// Returns [`WriteError::SerializeData`] if the payload fails to serialize.
pub fn compute_event_hash(event: &GateEvent) -> Result<String, WriteError> {
    let data_json = canonical_data_json(event)?;
    Ok(compute_line_hash(&[
        &event.wall_ts_us.to_string(),
        &event.actor,
        event.gate_type.as_str(),
        event.work_item_id.as_str(),
        &data_json,
    ]))
}

/// Compute the event hash, set it on the event, and serialize the full line
/// with trailing newline. This is the primary write path.
///
/// # Errors
///
/// Same as [`to_tsjson_line`].
pub fn write_event(event: &mut GateEvent) -> Result<String, WriteError> {
    event.event_hash = compute_event_hash(event)?;
    let mut line = to_tsjson_line(event)?;
    line.push('\n');
    Ok(line)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn canonical_data_json(event: &GateEvent) -> Result<String, WriteError> {
    let value = event.data.to_json_value()?;
    Ok(canonicalize_json(&value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
