//! TSJSON ledger line parser.
//!
//! Parses TSJSON (tab-separated fields with JSON payload) gate event lines
//! into [`GateEvent`] structs with full validation: field counts, actor and
//! work-item grammar, typed payload dispatch, and event-hash recomputation.
//!
//! # TSJSON Format (v1, 6-field)
//!
//! ```text
//! wall_ts_us \t actor \t type \t work_item_id \t data \t event_hash
//! ```
//!
//! - Comment lines start with `#` and are skipped.
//! - Blank/whitespace-only lines are skipped.
//! - Data lines are split on exactly 5 tab characters (yielding 6 fields).
//!
//! Unknown gate types are skipped with a warning (forward-compatibility:
//! new gate types may be added without a format version bump).

use std::fmt;

use tracing::warn;

use crate::event::GateEvent;
use crate::event::canonical::canonicalize_json;
use crate::event::data::GateData;
use crate::event::types::GateType;
use crate::model::WorkItemId;

// ---------------------------------------------------------------------------
// Ledger header constants
// ---------------------------------------------------------------------------

/// The header line written at the top of every `.events` ledger file.
pub const LEDGER_HEADER: &str = "# gatehouse gate ledger v1";

/// The field comment line that follows the ledger header.
pub const FIELD_COMMENT: &str =
    "# fields: wall_ts_us \\t actor \\t type \\t work_item_id \\t data \\t event_hash";

/// The current ledger format version understood by this build.
pub const CURRENT_VERSION: u32 = 1;

/// The header prefix for detecting format version.
const HEADER_PREFIX: &str = "# gatehouse gate ledger v";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing a TSJSON ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line has the wrong number of tab-separated fields.
    FieldCount { found: usize, expected: usize },
    /// The `wall_ts_us` field is not a valid i64.
    InvalidTimestamp(String),
    /// The `actor` field is empty or contains control characters.
    InvalidActor(String),
    /// The gate type string is not a known `gate.<verb>`.
    InvalidGateType(String),
    /// The work item ID violates the ID grammar.
    InvalidWorkItemId(String),
    /// The data field is not valid JSON.
    InvalidDataJson(String),
    /// The data JSON does not match the expected schema for the gate type.
    DataSchemaMismatch { gate_type: String, details: String },
    /// The `event_hash` field has an invalid format.
    InvalidEventHash(String),
    /// The computed hash does not match `event_hash`.
    HashMismatch { expected: String, computed: String },
    /// The ledger was written by a newer version of gatehouse.
    ///
    /// The inner string is a human-readable upgrade message.
    VersionMismatch(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { found, expected } => {
                write!(f, "expected {expected} tab-separated fields, found {found}")
            }
            Self::InvalidTimestamp(raw) => write!(f, "invalid wall_ts_us (not i64): '{raw}'"),
            Self::InvalidActor(raw) => write!(f, "invalid actor field: '{raw}'"),
            Self::InvalidGateType(raw) => write!(f, "unknown gate type: '{raw}'"),
            Self::InvalidWorkItemId(raw) => write!(f, "invalid work item ID: '{raw}'"),
            Self::InvalidDataJson(details) => write!(f, "invalid data JSON: {details}"),
            Self::DataSchemaMismatch { gate_type, details } => {
                write!(f, "data schema mismatch for {gate_type}: {details}")
            }
            Self::InvalidEventHash(raw) => write!(f, "invalid event_hash format: '{raw}'"),
            Self::HashMismatch { expected, computed } => {
                write!(
                    f,
                    "event_hash mismatch: line has '{expected}', computed '{computed}'"
                )
            }
            Self::VersionMismatch(msg) => write!(f, "ledger version mismatch: {msg}"),
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Version detection
// ---------------------------------------------------------------------------

/// Detect the ledger format version from the first line of a ledger file.
///
/// The expected header format is `# gatehouse gate ledger v<N>` where `N`
/// is a positive integer.
///
/// # Errors
///
/// Returns an actionable message if the version is newer than this build,
/// the header is malformed, or the version number cannot be parsed. All
/// prior format versions are guaranteed readable.
pub fn detect_version(first_line: &str) -> Result<u32, String> {
    let line = first_line.trim();
    if !line.starts_with(HEADER_PREFIX) {
        return Err(format!(
            "Invalid ledger header: expected '{HEADER_PREFIX}N', got '{line}'.\n\
             This file may not be a gatehouse ledger, or it may predate \
             format versioning."
        ));
    }
    let version_str = &line[HEADER_PREFIX.len()..];
    let version: u32 = version_str.parse().map_err(|_| {
        format!(
            "Invalid version number '{version_str}' in ledger header.\n\
             Expected a positive integer after '{HEADER_PREFIX}'."
        )
    })?;
    if version > CURRENT_VERSION {
        return Err(format!(
            "Ledger version {version} is newer than this version of gatehouse \
             (supports up to v{CURRENT_VERSION}).\n\
             Please upgrade: cargo install gatehouse-cli"
        ));
    }
    Ok(version)
}

// ---------------------------------------------------------------------------
// Parsed output type
// ---------------------------------------------------------------------------

/// The result of parsing a single line from a TSJSON ledger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A comment line (starts with `#`). The text includes the `#` prefix.
    Comment(String),
    /// A blank or whitespace-only line.
    Blank,
    /// A successfully parsed event (boxed to reduce enum size).
    Event(Box<GateEvent>),
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate that a string looks like a `blake3:<hex>` hash.
#[must_use]
pub fn is_valid_hash(s: &str) -> bool {
    s.strip_prefix("blake3:")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Compute the BLAKE3 event hash from the first 5 fields joined by tabs.
///
/// Hash input: `{f1}\t{f2}\t{f3}\t{f4}\t{f5}\n`
#[must_use]
pub fn compute_line_hash(fields: &[&str; 5]) -> String {
    let mut input = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            input.push('\t');
        }
        input.push_str(field);
    }
    input.push('\n');
    let hash = blake3::hash(input.as_bytes());
    format!("blake3:{}", hash.to_hex())
}

// ---------------------------------------------------------------------------
// Full parse
// ---------------------------------------------------------------------------

/// Fully parse and validate a TSJSON line into a [`ParsedLine`].
///
/// Validations:
/// - Field count (exactly 6 tab-separated fields)
/// - `wall_ts_us` is a valid i64
/// - `actor` is non-empty and contains no control characters
/// - `type` is a known `gate.<verb>`
/// - `work_item_id` satisfies the ID grammar
/// - `data` is valid JSON matching the gate type schema
/// - `event_hash` is `blake3:<hex>` and matches the recomputed hash
///
/// # Errors
///
/// Returns [`ParseError`] with a specific variant for each validation
/// failure.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');

    if trimmed.starts_with('#') {
        return Ok(ParsedLine::Comment(trimmed.to_string()));
    }
    if trimmed.trim().is_empty() {
        return Ok(ParsedLine::Blank);
    }

    let fields: Vec<&str> = trimmed.split('\t').collect();
    if fields.len() != 6 {
        return Err(ParseError::FieldCount {
            found: fields.len(),
            expected: 6,
        });
    }

    // --- Field 1: wall_ts_us ---
    let wall_ts_us: i64 = fields[0]
        .parse()
        .map_err(|_| ParseError::InvalidTimestamp(fields[0].to_string()))?;

    // --- Field 2: actor ---
    let actor = fields[1];
    if actor.is_empty() || actor.chars().any(char::is_control) {
        return Err(ParseError::InvalidActor(actor.to_string()));
    }

    // --- Field 3: gate type ---
    let gate_type: GateType = fields[2]
        .parse()
        .map_err(|_| ParseError::InvalidGateType(fields[2].to_string()))?;

    // --- Field 4: work_item_id ---
    let work_item_id = WorkItemId::parse(fields[3])
        .map_err(|_| ParseError::InvalidWorkItemId(fields[3].to_string()))?;

    // --- Field 5: data (JSON) ---
    let data_json = fields[4];
    let data_value: serde_json::Value =
        serde_json::from_str(data_json).map_err(|e| ParseError::InvalidDataJson(e.to_string()))?;
    let data = GateData::deserialize_for(gate_type, data_json).map_err(|e| {
        ParseError::DataSchemaMismatch {
            gate_type: gate_type.to_string(),
            details: e.to_string(),
        }
    })?;

    // --- Field 6: event_hash ---
    let event_hash = fields[5];
    if !is_valid_hash(event_hash) {
        return Err(ParseError::InvalidEventHash(event_hash.to_string()));
    }

    // Verify hash matches recomputed value over the canonical data JSON.
    let canonical_data = canonicalize_json(&data_value);
    let computed = compute_line_hash(&[
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        &canonical_data,
    ]);
    if computed != event_hash {
        return Err(ParseError::HashMismatch {
            expected: event_hash.to_string(),
            computed,
        });
    }

    Ok(ParsedLine::Event(Box::new(GateEvent {
        wall_ts_us,
        actor: actor.to_string(),
        gate_type,
        work_item_id,
        data,
        event_hash: event_hash.to_string(),
    })))
}

/// Parse a full ledger document, skipping comments and blanks.
///
/// If the first matching comment line looks like a ledger header, the
/// version is checked via [`detect_version`] and an error is returned
/// immediately for files written by a newer gatehouse.
///
/// Unknown gate types are skipped with a [`tracing`] warning rather than
/// failing the parse (forward-compatibility policy).
///
/// # Errors
///
/// Returns `(line_number, ParseError)` on the first malformed data line
/// (excluding unknown gate types). Line numbers are 1-indexed.
pub fn parse_ledger(input: &str) -> Result<Vec<GateEvent>, (usize, ParseError)> {
    let mut events = Vec::new();
    let mut version_checked = false;

    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;

        if !version_checked && line.trim_start().starts_with(HEADER_PREFIX) {
            version_checked = true;
            if let Err(msg) = detect_version(line) {
                return Err((line_no, ParseError::VersionMismatch(msg)));
            }
            continue;
        }

        match parse_line(line) {
            Ok(ParsedLine::Event(event)) => events.push(*event),
            Ok(ParsedLine::Comment(_) | ParsedLine::Blank) => {}
            Err(ParseError::InvalidGateType(raw)) => {
                warn!(
                    line = line_no,
                    gate_type = %raw,
                    "skipping line with unknown gate type (forward-compatibility)"
                );
            }
            Err(e) => return Err((line_no, e)),
        }
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
