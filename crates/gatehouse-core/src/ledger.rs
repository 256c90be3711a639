//! Per-work-item gate ledger store.
//!
//! One append-only `.events` file per work item under
//! `.gatehouse/ledger/`, keyed by work item id. A legacy consolidated
//! multi-item ledger (`.gatehouse/ledger.events`) is supported read-only as
//! a fallback source for items that have no per-item file yet.
//!
//! Appending is always the final statement of a gate operation: all checks
//! run first, then exactly one line is appended. Reset never deletes —
//! the active file moves into `.gatehouse/archive/`.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::GateError;
use crate::event::writer::write_event;
use crate::event::{GateEvent, parser};
use crate::model::WorkItemId;
use crate::paths::GatehousePaths;

/// Store handle for ledger reads and appends.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    paths: GatehousePaths,
}

impl LedgerStore {
    /// A store over the given project paths.
    #[must_use]
    pub const fn new(paths: GatehousePaths) -> Self {
        Self { paths }
    }

    /// Load the full event history for one work item, oldest first.
    ///
    /// Reads the per-item ledger file when present; otherwise falls back to
    /// the legacy consolidated ledger, filtered to this item. Events are
    /// returned in file order (the append order).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LedgerCorrupt`] when a ledger line fails
    /// validation (including event-hash mismatches).
    pub fn load(&self, id: &WorkItemId) -> Result<Vec<GateEvent>, GateError> {
        let per_item = self.paths.ledger_file(id);
        if per_item.exists() {
            return self.parse_file(&per_item).map(|events| {
                // A per-item file should only carry its own item; foreign
                // lines are tolerated but dropped with a warning.
                events
                    .into_iter()
                    .filter(|e| {
                        let ours = &e.work_item_id == id;
                        if !ours {
                            warn!(
                                file = %per_item.display(),
                                found = %e.work_item_id,
                                "dropping foreign work item line from per-item ledger"
                            );
                        }
                        ours
                    })
                    .collect()
            });
        }

        let legacy = self.paths.legacy_ledger();
        if legacy.exists() {
            debug!(file = %legacy.display(), item = %id, "reading legacy consolidated ledger");
            let events = self.parse_file(&legacy)?;
            return Ok(events
                .into_iter()
                .filter(|e| &e.work_item_id == id)
                .collect());
        }

        Ok(Vec::new())
    }

    /// Every work item id with an active per-item ledger file, sorted.
    ///
    /// Items only present in the legacy consolidated ledger are included
    /// too.
    ///
    /// # Errors
    ///
    /// Propagates directory-read and legacy-parse failures.
    pub fn work_item_ids(&self) -> Result<Vec<WorkItemId>, GateError> {
        let mut ids = std::collections::BTreeSet::new();

        let dir = self.paths.ledger_dir();
        if dir.exists() {
            let entries = std::fs::read_dir(&dir).map_err(|e| GateError::LedgerCorrupt {
                path: dir.display().to_string(),
                line: 0,
                details: e.to_string(),
            })?;
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(stem) = name.to_string_lossy().strip_suffix(".events").map(String::from)
                else {
                    continue;
                };
                match WorkItemId::parse(&stem) {
                    Ok(id) => {
                        ids.insert(id);
                    }
                    Err(_) => warn!(file = %name.to_string_lossy(), "skipping non-item ledger file"),
                }
            }
        }

        let legacy = self.paths.legacy_ledger();
        if legacy.exists() {
            for event in self.parse_file(&legacy)? {
                ids.insert(event.work_item_id);
            }
        }

        Ok(ids.into_iter().collect())
    }

    /// Append one event to the item's ledger. Computes and sets the event
    /// hash; creates the file (with header) on first append.
    ///
    /// This must be the final statement of every gate operation.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LedgerWriteFailed`]-coded errors on I/O
    /// failure; serialization failures surface as
    /// [`GateError::LedgerCorrupt`].
    pub fn append(&self, event: &mut GateEvent) -> Result<(), GateError> {
        let path = self.paths.ledger_file(&event.work_item_id);
        let to_write_err = |source: std::io::Error| GateError::LedgerWrite {
            path: path.display().to_string(),
            source,
        };

        let line = write_event(event).map_err(|e| GateError::LedgerCorrupt {
            path: path.display().to_string(),
            line: 0,
            details: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(to_write_err)?;
        }

        let mut content = String::new();
        if !path.exists() {
            content.push_str(&crate::event::writer::ledger_header());
        }
        content.push_str(&line);

        use std::io::Write as _;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(to_write_err)?;
        file.write_all(content.as_bytes()).map_err(to_write_err)?;

        debug!(item = %event.work_item_id, gate = %event.gate_type, "appended gate event");
        Ok(())
    }

    /// Archive the item's active ledger file, clearing its history without
    /// deleting anything. Returns the archive path, or `None` when the item
    /// had no active file.
    ///
    /// # Errors
    ///
    /// Returns write-coded errors on I/O failure.
    pub fn archive(&self, id: &WorkItemId, wall_ts_us: i64) -> Result<Option<PathBuf>, GateError> {
        let active = self.paths.ledger_file(id);
        if !active.exists() {
            return Ok(None);
        }

        let archive_dir = self.paths.archive_dir();
        let dest = archive_dir.join(format!("{id}-{wall_ts_us}.events"));
        let to_write_err = |source: std::io::Error| GateError::LedgerWrite {
            path: dest.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&archive_dir).map_err(to_write_err)?;
        std::fs::rename(&active, &dest).map_err(to_write_err)?;
        debug!(item = %id, archive = %dest.display(), "archived ledger");
        Ok(Some(dest))
    }

    fn parse_file(&self, path: &std::path::Path) -> Result<Vec<GateEvent>, GateError> {
        let content = std::fs::read_to_string(path).map_err(|e| GateError::LedgerCorrupt {
            path: path.display().to_string(),
            line: 0,
            details: e.to_string(),
        })?;
        parser::parse_ledger(&content).map_err(|(line, e)| GateError::LedgerCorrupt {
            path: path.display().to_string(),
            line,
            details: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Coverage, GateData, GateType, RefineData, SignData, StepData};
    use std::collections::BTreeMap;

    fn store_in_tempdir() -> (tempfile::TempDir, LedgerStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LedgerStore::new(GatehousePaths::new(dir.path()));
        (dir, store)
    }

    fn refine_event(id: &str, ts: i64) -> GateEvent {
        GateEvent {
            wall_ts_us: ts,
            actor: "claude-gh1".into(),
            gate_type: GateType::Refine,
            work_item_id: WorkItemId::new_unchecked(id),
            data: GateData::Refine(RefineData {
                artifact_ref: format!(".gatehouse/items/{id}.md"),
                coverage: Coverage::Pass,
                enrichment_needed: false,
                extra: BTreeMap::new(),
            }),
            event_hash: String::new(),
        }
    }

    fn sign_event(id: &str, ts: i64, token: &str) -> GateEvent {
        GateEvent {
            wall_ts_us: ts,
            actor: "rik".into(),
            gate_type: GateType::Sign,
            work_item_id: WorkItemId::new_unchecked(id),
            data: GateData::Sign(SignData {
                token: token.into(),
                extra: BTreeMap::new(),
            }),
            event_hash: String::new(),
        }
    }

    #[test]
    fn load_missing_item_is_empty() {
        let (_dir, store) = store_in_tempdir();
        let events = store.load(&WorkItemId::new_unchecked("WP-42")).expect("load");
        assert!(events.is_empty());
    }

    #[test]
    fn append_then_load_roundtrip() {
        let (_dir, store) = store_in_tempdir();
        let id = WorkItemId::new_unchecked("WP-42");

        let mut e1 = refine_event("WP-42", 1_000);
        let mut e2 = sign_event("WP-42", 11_000_000 + 1_000, "rik080820251015");
        store.append(&mut e1).expect("append refine");
        store.append(&mut e2).expect("append sign");

        let events = store.load(&id).expect("load");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], e1);
        assert_eq!(events[1], e2);
        assert!(events[0].event_hash.starts_with("blake3:"));
    }

    #[test]
    fn ledger_file_starts_with_header() {
        let (dir, store) = store_in_tempdir();
        let mut e = refine_event("WP-42", 1_000);
        store.append(&mut e).expect("append");

        let path = dir.path().join(".gatehouse/ledger/WP-42.events");
        let content = std::fs::read_to_string(path).expect("read");
        assert!(content.starts_with("# gatehouse gate ledger v1\n"));
    }

    #[test]
    fn items_are_isolated() {
        let (_dir, store) = store_in_tempdir();
        let mut a = refine_event("WP-A", 1_000);
        let mut b = refine_event("WP-B", 2_000);
        store.append(&mut a).expect("append");
        store.append(&mut b).expect("append");

        let events = store.load(&WorkItemId::new_unchecked("WP-A")).expect("load");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].work_item_id.as_str(), "WP-A");
    }

    #[test]
    fn tampered_line_is_ledger_corrupt() {
        let (dir, store) = store_in_tempdir();
        let mut e = refine_event("WP-42", 1_000);
        store.append(&mut e).expect("append");

        let path = dir.path().join(".gatehouse/ledger/WP-42.events");
        let tampered = std::fs::read_to_string(&path)
            .expect("read")
            .replace("claude-gh1", "mallory-gh1");
        std::fs::write(&path, tampered).expect("write");

        let err = store
            .load(&WorkItemId::new_unchecked("WP-42"))
            .expect_err("should fail");
        assert!(matches!(err, GateError::LedgerCorrupt { .. }));
    }

    #[test]
    fn legacy_consolidated_ledger_fallback() {
        let (dir, store) = store_in_tempdir();

        // Write a legacy multi-item ledger by hand.
        let mut a = refine_event("WP-A", 1_000);
        let mut b = refine_event("WP-B", 2_000);
        let line_a = crate::event::writer::write_event(&mut a).expect("serialize");
        let line_b = crate::event::writer::write_event(&mut b).expect("serialize");
        let state = dir.path().join(".gatehouse");
        std::fs::create_dir_all(&state).expect("state dir");
        std::fs::write(
            state.join("ledger.events"),
            format!("{}{line_a}{line_b}", crate::event::writer::ledger_header()),
        )
        .expect("write legacy");

        let events = store.load(&WorkItemId::new_unchecked("WP-A")).expect("load");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].work_item_id.as_str(), "WP-A");

        // Once a per-item file exists it wins over the legacy source.
        let mut newer = sign_event("WP-A", 20_000_000, "rik080820251015");
        store.append(&mut newer).expect("append");
        let events = store.load(&WorkItemId::new_unchecked("WP-A")).expect("load");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].gate_type, GateType::Sign);
    }

    #[test]
    fn work_item_ids_merges_sources() {
        let (dir, store) = store_in_tempdir();
        let mut a = refine_event("WP-A", 1_000);
        store.append(&mut a).expect("append");

        let mut b = refine_event("WP-B", 2_000);
        let line_b = crate::event::writer::write_event(&mut b).expect("serialize");
        std::fs::write(
            dir.path().join(".gatehouse/ledger.events"),
            format!("{}{line_b}", crate::event::writer::ledger_header()),
        )
        .expect("write legacy");

        let ids = store.work_item_ids().expect("ids");
        let names: Vec<&str> = ids.iter().map(WorkItemId::as_str).collect();
        assert_eq!(names, vec!["WP-A", "WP-B"]);
    }

    #[test]
    fn archive_moves_active_file() {
        let (dir, store) = store_in_tempdir();
        let id = WorkItemId::new_unchecked("WP-42");
        let mut e = refine_event("WP-42", 1_000);
        store.append(&mut e).expect("append");

        let dest = store.archive(&id, 99_000).expect("archive").expect("some");
        assert!(dest.ends_with("WP-42-99000.events"));
        assert!(dest.exists());
        assert!(!dir.path().join(".gatehouse/ledger/WP-42.events").exists());

        // History is now empty; a second archive is a no-op.
        assert!(store.load(&id).expect("load").is_empty());
        assert!(store.archive(&id, 100_000).expect("archive").is_none());
    }

    #[test]
    fn step_events_roundtrip() {
        let (_dir, store) = store_in_tempdir();
        let id = WorkItemId::new_unchecked("WP-42");
        let mut e = GateEvent {
            wall_ts_us: 5_000,
            actor: "claude-gh1".into(),
            gate_type: GateType::Prepare,
            work_item_id: id.clone(),
            data: GateData::Prepare(StepData {
                machine_inferred: true,
                note: Some("bootstrap".into()),
                extra: BTreeMap::new(),
            }),
            event_hash: String::new(),
        };
        store.append(&mut e).expect("append");

        let events = store.load(&id).expect("load");
        assert!(events[0].data.machine_inferred());
    }
}
