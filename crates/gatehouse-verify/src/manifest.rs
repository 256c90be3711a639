//! Edit manifest model and parsing.
//!
//! A work item's descriptive document embeds one manifest block per touched
//! file as labeled fields:
//!
//! ```text
//! Target: src/foo.txt
//! Window: 1-5
//! Pre-Hash: blake3:aaaa...
//! Post-Hash: blake3:bbbb...
//! Line-Delta: +2
//! Gate-Window-Matches-Plan: yes
//! Gate-Pre-Image-Captured: yes
//! Gate-Tests-Executed: yes
//! Gate-Diff-Reviewed: yes
//!
//! Waiver: docs/CHANGELOG.md -- regenerated by tooling
//! ```
//!
//! Blocks start at each `Target:` field. `Waiver:` fields live outside the
//! blocks and downgrade out-of-scope changes to warnings during
//! verification. Free prose around the fields is ignored.

use std::collections::BTreeMap;
use std::fmt;

use gatehouse_core::event::parser::is_valid_hash;
use gatehouse_core::fields::FieldDoc;

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

/// How a checklist item may be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Mechanically re-derivable; may be auto-inferred as passed (with a
    /// distinct warning) when left unchecked.
    Mechanical,
    /// Requires human/agent judgment; must be explicitly marked.
    Judgment,
}

/// The caller-declared state of one checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Confirmed,
    Declined,
    Unchecked,
}

/// One item of the fixed gate checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Kebab-case name; the document label is `Gate-<Name>`.
    pub name: &'static str,
    pub kind: CheckKind,
}

/// The fixed named checklist every manifest entry carries.
pub const CHECKLIST: [ChecklistItem; 4] = [
    ChecklistItem {
        name: "window-matches-plan",
        kind: CheckKind::Mechanical,
    },
    ChecklistItem {
        name: "pre-image-captured",
        kind: CheckKind::Mechanical,
    },
    ChecklistItem {
        name: "tests-executed",
        kind: CheckKind::Judgment,
    },
    ChecklistItem {
        name: "diff-reviewed",
        kind: CheckKind::Judgment,
    },
];

// ---------------------------------------------------------------------------
// Entry / document
// ---------------------------------------------------------------------------

/// A declared per-file edit window, 1-indexed and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindow {
    pub start: u32,
    pub end: u32,
}

impl EditWindow {
    /// Whether the inclusive line range `[from, to]` sits fully inside the
    /// window.
    #[must_use]
    pub const fn contains_span(self, from: u32, to: u32) -> bool {
        from >= self.start && to <= self.end
    }
}

impl fmt::Display for EditWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One file's declared edit scope and content transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub target_path: String,
    pub window: EditWindow,
    pub pre_hash: String,
    pub post_hash: String,
    pub line_delta: i64,
    /// Checklist state keyed by item name.
    pub checks: BTreeMap<&'static str, CheckState>,
}

/// An auditable out-of-scope waiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiver {
    pub path: String,
    pub reason: String,
}

/// All manifest blocks and waivers from one work item document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDoc {
    pub entries: Vec<ManifestEntry>,
    pub waivers: Vec<Waiver>,
}

impl ManifestDoc {
    /// The entry for a repo-relative path, if declared.
    #[must_use]
    pub fn entry_for(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.target_path == path)
    }

    /// The waiver covering a path, if any.
    #[must_use]
    pub fn waiver_for(&self, path: &str) -> Option<&Waiver> {
        self.waivers.iter().find(|w| w.path == path)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Structural problems in a manifest document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest declares no Target blocks")]
    NoEntries,

    #[error("block for '{target}': missing field '{field}'")]
    MissingField { target: String, field: String },

    #[error("block for '{target}': invalid window '{raw}' (want START-END, 1-indexed, START <= END)")]
    BadWindow { target: String, raw: String },

    #[error("block for '{target}': invalid {field} '{raw}' (want blake3:<hex>)")]
    BadHash {
        target: String,
        field: String,
        raw: String,
    },

    #[error("block for '{target}': invalid line delta '{raw}'")]
    BadDelta { target: String, raw: String },

    #[error("block for '{target}': invalid checklist value '{raw}' for {item} (want yes or no)")]
    BadCheckValue {
        target: String,
        item: String,
        raw: String,
    },

    #[error("duplicate Target '{target}'")]
    DuplicateTarget { target: String },

    #[error("waiver '{raw}' must be PATH -- REASON")]
    BadWaiver { raw: String },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse every manifest block and waiver out of a document.
///
/// # Errors
///
/// Returns the first structural [`ManifestError`]; a manifest must be fully
/// well-formed before verification runs.
pub fn parse_manifest(text: &str) -> Result<ManifestDoc, ManifestError> {
    let doc = FieldDoc::parse(text);

    let mut waivers = Vec::new();
    for raw in doc.all("Waiver") {
        let Some((path, reason)) = raw.split_once("--") else {
            return Err(ManifestError::BadWaiver {
                raw: raw.to_string(),
            });
        };
        let (path, reason) = (path.trim(), reason.trim());
        if path.is_empty() || reason.is_empty() {
            return Err(ManifestError::BadWaiver {
                raw: raw.to_string(),
            });
        }
        waivers.push(Waiver {
            path: path.to_string(),
            reason: reason.to_string(),
        });
    }

    let blocks = doc.blocks("Target");
    if blocks.is_empty() {
        return Err(ManifestError::NoEntries);
    }

    let mut entries: Vec<ManifestEntry> = Vec::with_capacity(blocks.len());
    for block in blocks {
        let target = block
            .require("Target")
            .map_err(|_| ManifestError::MissingField {
                target: "<unnamed>".into(),
                field: "Target".into(),
            })?
            .to_string();
        if entries.iter().any(|e| e.target_path == target) {
            return Err(ManifestError::DuplicateTarget { target });
        }

        let require = |field: &str| {
            block
                .require(field)
                .map_err(|e| ManifestError::MissingField {
                    target: target.clone(),
                    field: e.label,
                })
        };

        let window_raw = require("Window")?;
        let window = parse_window(window_raw).ok_or_else(|| ManifestError::BadWindow {
            target: target.clone(),
            raw: window_raw.to_string(),
        })?;

        let pre_hash = require("Pre-Hash")?.to_string();
        let post_hash = require("Post-Hash")?.to_string();
        for (field, value) in [("Pre-Hash", &pre_hash), ("Post-Hash", &post_hash)] {
            if !is_valid_hash(value) {
                return Err(ManifestError::BadHash {
                    target: target.clone(),
                    field: field.to_string(),
                    raw: value.clone(),
                });
            }
        }

        let delta_raw = require("Line-Delta")?;
        let line_delta = parse_delta(delta_raw).ok_or_else(|| ManifestError::BadDelta {
            target: target.clone(),
            raw: delta_raw.to_string(),
        })?;

        let mut checks = BTreeMap::new();
        for item in CHECKLIST {
            let label = format!("Gate-{}", item.name);
            let state = match block.first(&label) {
                None => CheckState::Unchecked,
                Some(raw) => match raw.to_ascii_lowercase().as_str() {
                    "yes" => CheckState::Confirmed,
                    "no" => CheckState::Declined,
                    "" => CheckState::Unchecked,
                    other => {
                        return Err(ManifestError::BadCheckValue {
                            target: target.clone(),
                            item: item.name.to_string(),
                            raw: other.to_string(),
                        });
                    }
                },
            };
            checks.insert(item.name, state);
        }

        entries.push(ManifestEntry {
            target_path: target,
            window,
            pre_hash,
            post_hash,
            line_delta,
            checks,
        });
    }

    Ok(ManifestDoc { entries, waivers })
}

fn parse_window(raw: &str) -> Option<EditWindow> {
    let (start, end) = match raw.split_once('-') {
        Some((s, e)) => (s.trim().parse().ok()?, e.trim().parse().ok()?),
        None => {
            let line = raw.trim().parse().ok()?;
            (line, line)
        }
    };
    (start >= 1 && start <= end).then_some(EditWindow { start, end })
}

fn parse_delta(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.strip_prefix('+').unwrap_or(raw).parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
