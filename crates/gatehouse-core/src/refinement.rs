//! Refinement records and refinement artifact validation.
//!
//! A refinement record binds a work item to its validated refinement
//! artifact. It is created pending at the refine gate, mutated exactly once
//! (approved + token) at the sign gate, and frozen afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GateError;
use crate::event::Coverage;
use crate::fields::FieldDoc;
use crate::model::WorkItemId;
use crate::paths::GatehousePaths;

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Labels the refinement artifact must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "Work-Item",
    "Summary",
    "Approach",
    "Risks",
    "Coverage",
    "Enrichment-Needed",
];

/// A validated refinement artifact.
///
/// Extracted from a labeled-field document; free prose is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementArtifact {
    pub work_item_id: WorkItemId,
    pub summary: String,
    pub coverage: Coverage,
    pub enrichment_needed: bool,
}

impl RefinementArtifact {
    /// Parse and validate an artifact document.
    ///
    /// Checks completeness (every required labeled field present and
    /// non-empty) and logical consistency: a `PASS` coverage verdict
    /// implies no enrichment needed, and vice versa.
    ///
    /// # Errors
    ///
    /// [`GateError::ArtifactIncomplete`] for a missing field,
    /// [`GateError::ArtifactInconsistent`] for a verdict/flag contradiction
    /// or an unparseable enum value.
    pub fn parse(text: &str) -> Result<Self, GateError> {
        let doc = FieldDoc::parse(text);

        for field in REQUIRED_FIELDS {
            doc.require(field)
                .map_err(|e| GateError::ArtifactIncomplete { field: e.label })?;
        }

        let work_item_raw = doc.require("Work-Item").expect("checked above");
        let work_item_id = WorkItemId::parse(work_item_raw)?;

        let coverage = Coverage::from_str(doc.require("Coverage").expect("checked above"))
            .map_err(|details| GateError::ArtifactInconsistent { details })?;

        let enrichment_needed =
            parse_yes_no(doc.require("Enrichment-Needed").expect("checked above")).map_err(
                |details| GateError::ArtifactInconsistent {
                    details: format!("Enrichment-Needed: {details}"),
                },
            )?;

        // PASS coverage and "enrichment needed" contradict each other, in
        // both directions.
        match (coverage, enrichment_needed) {
            (Coverage::Pass, true) => {
                return Err(GateError::ArtifactInconsistent {
                    details: "Coverage PASS but Enrichment-Needed: yes".into(),
                });
            }
            (Coverage::Fail, false) => {
                return Err(GateError::ArtifactInconsistent {
                    details: "Coverage FAIL but Enrichment-Needed: no".into(),
                });
            }
            _ => {}
        }

        Ok(Self {
            work_item_id,
            summary: doc.require("Summary").expect("checked above").to_string(),
            coverage,
            enrichment_needed,
        })
    }
}

fn parse_yes_no(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(format!("expected yes or no, got '{other}'")),
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Review status of a refinement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
}

/// The persisted refinement record for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub work_item_id: WorkItemId,
    pub artifact_ref: String,
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at_us: Option<i64>,
}

impl RefinementRecord {
    /// A fresh pending record.
    #[must_use]
    pub const fn pending(work_item_id: WorkItemId, artifact_ref: String) -> Self {
        Self {
            work_item_id,
            artifact_ref,
            status: ReviewStatus::Pending,
            token: None,
            signed_at_us: None,
        }
    }

    /// Apply the one allowed mutation: approve with a token. The record is
    /// frozen afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::RefinementFrozen`] when already approved.
    pub fn approve(&mut self, token: &str, signed_at_us: i64) -> Result<(), GateError> {
        if self.status == ReviewStatus::Approved {
            return Err(GateError::RefinementFrozen {
                work_item: self.work_item_id.to_string(),
            });
        }
        self.status = ReviewStatus::Approved;
        self.token = Some(token.to_string());
        self.signed_at_us = Some(signed_at_us);
        Ok(())
    }
}

/// Load the refinement record for a work item, if one exists.
///
/// # Errors
///
/// Returns an error when the record exists but cannot be read or parsed.
pub fn load_record(paths: &GatehousePaths, id: &WorkItemId) -> Result<Option<RefinementRecord>> {
    let path = paths.refinement_file(id);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(record))
}

/// Persist a refinement record (whole-file rewrite).
///
/// # Errors
///
/// Returns an error on serialization or I/O failure.
pub fn store_record(paths: &GatehousePaths, record: &RefinementRecord) -> Result<()> {
    let path = paths.refinement_file(&record.work_item_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(record).context("Failed to serialize record")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ARTIFACT: &str = "\
Work-Item: WP-42
Summary: Harden the retry loop
Approach: Bound the retry budget and add jitter
Risks: Latency regression under sustained failure
Coverage: PASS
Enrichment-Needed: no
";

    #[test]
    fn valid_artifact_parses() {
        let artifact = RefinementArtifact::parse(VALID_ARTIFACT).expect("valid");
        assert_eq!(artifact.work_item_id.as_str(), "WP-42");
        assert_eq!(artifact.coverage, Coverage::Pass);
        assert!(!artifact.enrichment_needed);
    }

    #[test]
    fn failing_coverage_with_enrichment_parses() {
        let text = VALID_ARTIFACT
            .replace("Coverage: PASS", "Coverage: FAIL")
            .replace("Enrichment-Needed: no", "Enrichment-Needed: yes");
        let artifact = RefinementArtifact::parse(&text).expect("valid");
        assert_eq!(artifact.coverage, Coverage::Fail);
        assert!(artifact.enrichment_needed);
    }

    #[test]
    fn missing_field_is_incomplete() {
        let text = VALID_ARTIFACT.replace("Risks: Latency regression under sustained failure\n", "");
        let err = RefinementArtifact::parse(&text).unwrap_err();
        match err {
            GateError::ArtifactIncomplete { field } => assert_eq!(field, "Risks"),
            other => panic!("expected ArtifactIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn pass_with_enrichment_is_inconsistent() {
        let text = VALID_ARTIFACT.replace("Enrichment-Needed: no", "Enrichment-Needed: yes");
        assert!(matches!(
            RefinementArtifact::parse(&text).unwrap_err(),
            GateError::ArtifactInconsistent { .. }
        ));
    }

    #[test]
    fn fail_without_enrichment_is_inconsistent() {
        let text = VALID_ARTIFACT.replace("Coverage: PASS", "Coverage: FAIL");
        assert!(matches!(
            RefinementArtifact::parse(&text).unwrap_err(),
            GateError::ArtifactInconsistent { .. }
        ));
    }

    #[test]
    fn garbage_enum_values_rejected() {
        let bad_coverage = VALID_ARTIFACT.replace("Coverage: PASS", "Coverage: MOSTLY");
        assert!(RefinementArtifact::parse(&bad_coverage).is_err());

        let bad_flag = VALID_ARTIFACT.replace("Enrichment-Needed: no", "Enrichment-Needed: maybe");
        assert!(RefinementArtifact::parse(&bad_flag).is_err());
    }

    #[test]
    fn prose_between_fields_is_ignored() {
        let text = format!("Free prose preamble.\n\n{VALID_ARTIFACT}\nTrailing discussion.\n");
        assert!(RefinementArtifact::parse(&text).is_ok());
    }

    #[test]
    fn record_approve_freezes() {
        let mut record = RefinementRecord::pending(
            WorkItemId::new_unchecked("WP-42"),
            "notes/WP-42.md".into(),
        );
        assert_eq!(record.status, ReviewStatus::Pending);

        record.approve("rik080820251015", 1_000).expect("first approval");
        assert_eq!(record.status, ReviewStatus::Approved);
        assert_eq!(record.token.as_deref(), Some("rik080820251015"));

        let err = record.approve("ana080820251016", 2_000).unwrap_err();
        assert!(matches!(err, GateError::RefinementFrozen { .. }));
        // The frozen record keeps the first token.
        assert_eq!(record.token.as_deref(), Some("rik080820251015"));
    }

    #[test]
    fn record_store_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = GatehousePaths::new(dir.path());
        let id = WorkItemId::new_unchecked("WP-42");

        assert!(load_record(&paths, &id).expect("load").is_none());

        let mut record = RefinementRecord::pending(id.clone(), "notes/WP-42.md".into());
        record.approve("rik080820251015", 5).expect("approve");
        store_record(&paths, &record).expect("store");

        let loaded = load_record(&paths, &id).expect("load").expect("present");
        assert_eq!(loaded, record);
    }
}
