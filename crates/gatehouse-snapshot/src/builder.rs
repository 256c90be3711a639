//! Deterministic snapshot assembly.
//!
//! Consumes the resolved whitelist, extracts typed sub-documents with small
//! structural parsers, derives summaries, and serializes one canonical-JSON
//! document with exactly one trailing line terminator.
//!
//! Determinism is a hard contract: every collection is sorted by an
//! explicit key (never insertion or iteration order), no wall-clock field
//! exists unless explicitly opted in, and the builder assembles the
//! document twice from the same cached inputs and byte-compares the
//! results before returning.

use std::collections::BTreeMap;
use std::path::Path;

use gatehouse_core::event::canonical::canonicalize_json;
use gatehouse_core::event::{GateEvent, parser};
use gatehouse_core::machine::compute_phase;
use gatehouse_core::paths::GatehousePaths;
use gatehouse_verify::registry::RegistryDoc;
use serde_json::{Value, json};
use tracing::debug;

use crate::whitelist::{InputReader, SnapshotError, SnapshotInputs};

/// Snapshot document schema version. Consumers must reject unknown
/// versions outright rather than attempt best-effort compatibility.
pub const SCHEMA_VERSION: u32 = 1;

/// Builder options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    /// Opt in to a `generated_at_us` wall-clock field. Off by default:
    /// unchanged inputs must yield byte-identical output.
    pub include_timestamp: bool,
}

/// Build the snapshot document for a project.
///
/// Returns the serialized document (canonical JSON + one trailing newline).
/// The caller decides where to write it; the conventional location is
/// [`GatehousePaths::snapshot_output`].
///
/// # Errors
///
/// Any [`SnapshotError`]: whitelist resolution failures, structural parse
/// failures, or the double-build determinism self-check.
pub fn build_snapshot(
    paths: &GatehousePaths,
    opts: SnapshotOptions,
) -> Result<String, SnapshotError> {
    let inputs = SnapshotInputs::resolve(paths)?;
    let reader = InputReader::new(&inputs);

    // Capture the opt-in timestamp once so the self-check compares
    // assembly determinism, not clock drift.
    let generated_at_us = opts
        .include_timestamp
        .then(gatehouse_core::machine::now_us);

    let first = assemble(paths, &inputs, &reader, generated_at_us)?;
    let second = assemble(paths, &inputs, &reader, generated_at_us)?;
    if first != second {
        return Err(SnapshotError::Nondeterministic);
    }
    debug!(bytes = first.len(), reads = reader.reads(), "snapshot built");
    Ok(first)
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn assemble(
    paths: &GatehousePaths,
    inputs: &SnapshotInputs,
    reader: &InputReader,
    generated_at_us: Option<i64>,
) -> Result<String, SnapshotError> {
    // Input digests, sorted by path.
    let mut input_rows = Vec::new();
    for path in inputs.allowed_paths() {
        let content = reader.read(&path)?;
        input_rows.push(json!({
            "path": relative_to(paths, &path),
            "digest": digest(content.as_bytes()),
        }));
    }

    // Gate event tables: per-item ledgers win over the legacy source.
    let mut events_by_item: BTreeMap<String, Vec<GateEvent>> = BTreeMap::new();
    for ledger in &inputs.ledger_files {
        let content = reader.read(ledger)?;
        let events = parse_sub_ledger(ledger, &content)?;
        for event in events {
            events_by_item
                .entry(event.work_item_id.to_string())
                .or_default()
                .push(event);
        }
    }
    if let Some(legacy) = &inputs.legacy_ledger {
        let content = reader.read(legacy)?;
        for event in parse_sub_ledger(legacy, &content)? {
            let key = event.work_item_id.to_string();
            let file_name = format!("{key}.events");
            let known = inputs
                .ledger_files
                .iter()
                .any(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == file_name.as_str()));
            if !known {
                events_by_item.entry(key).or_default().push(event);
            }
        }
    }

    // Work item summaries, sorted by id (BTreeMap iteration).
    let mut work_items = Vec::new();
    for (id, events) in &events_by_item {
        let (phase, _) = compute_phase(events);

        let mut latest: BTreeMap<String, Value> = BTreeMap::new();
        for event in events {
            latest.insert(
                event.gate_type.to_string(),
                json!({
                    "wall_ts_us": event.wall_ts_us,
                    "actor": event.actor,
                    "event_hash": event.event_hash,
                    "machine_inferred": event.data.machine_inferred(),
                }),
            );
        }

        // Deduplicated, sorted gate-pass list: BTreeMap keys are both.
        let gates_passed: Vec<&String> = latest.keys().collect();

        work_items.push(json!({
            "id": id,
            "phase": phase.as_str(),
            "gates_passed": gates_passed,
            "latest": latest,
        }));
    }

    // Signature table, sorted by token.
    let tokens_content = reader.read(&inputs.tokens_log)?;
    let mut token_rows = parse_token_table(&inputs.tokens_log, &tokens_content)?;
    token_rows.sort_by(|a, b| a.0.cmp(&b.0));
    let tokens: Vec<Value> = token_rows
        .into_iter()
        .map(|(token, consumed_at_us, work_item)| {
            json!({
                "token": token,
                "consumed_at_us": consumed_at_us,
                "work_item": work_item,
            })
        })
        .collect();

    // Registry mapping table, sorted by contract id.
    let registry_content = reader.read(&inputs.registry)?;
    let registry = RegistryDoc::parse(&registry_content).map_err(|e| {
        SnapshotError::MalformedSubDocument {
            path: relative_to(paths, &inputs.registry),
            details: e.to_string(),
        }
    })?;
    let mut capability_ids: Vec<&str> =
        registry.capabilities.iter().map(|c| c.id.as_str()).collect();
    capability_ids.sort_unstable();
    capability_ids.dedup();
    let mut contract_rows: Vec<Value> = registry
        .contracts
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "schema_digest": c.schema_digest(),
            })
        })
        .collect();
    contract_rows.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));

    // The pointed policy document contributes its digest.
    let policy_content = reader.read(&inputs.policy_doc)?;

    let mut doc = json!({
        "schema_version": SCHEMA_VERSION,
        "inputs": input_rows,
        "work_items": work_items,
        "tokens": tokens,
        "registry": {
            "capabilities": capability_ids,
            "contracts": contract_rows,
        },
        "policy": {
            "path": relative_to(paths, &inputs.policy_doc),
            "digest": digest(policy_content.as_bytes()),
        },
    });
    if let Some(ts) = generated_at_us {
        doc["generated_at_us"] = json!(ts);
    }

    let mut out = canonicalize_json(&doc);
    out.push('\n');
    Ok(out)
}

// ---------------------------------------------------------------------------
// Structural sub-parsers
// ---------------------------------------------------------------------------

fn parse_sub_ledger(path: &Path, content: &str) -> Result<Vec<GateEvent>, SnapshotError> {
    parser::parse_ledger(content).map_err(|(line, e)| SnapshotError::MalformedSubDocument {
        path: path.display().to_string(),
        details: format!("line {line}: {e}"),
    })
}

/// Strict signature-table parser: `token \t wall_ts_us \t work_item_id`.
///
/// Stricter than the operational audit reader: the snapshot is an audit
/// artifact, so malformed rows are structural failures here.
fn parse_token_table(
    path: &Path,
    content: &str,
) -> Result<Vec<(String, i64, String)>, SnapshotError> {
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let malformed = |details: String| SnapshotError::MalformedSubDocument {
            path: path.display().to_string(),
            details: format!("line {}: {details}", i + 1),
        };
        let fields: Vec<&str> = line.split('\t').collect();
        let [token, ts, work_item] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 3 tab-separated fields, found {}",
                fields.len()
            )));
        };
        let consumed_at_us: i64 = ts
            .parse()
            .map_err(|_| malformed(format!("invalid timestamp '{ts}'")))?;
        rows.push(((*token).to_string(), consumed_at_us, (*work_item).to_string()));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn digest(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes).to_hex())
}

fn relative_to(paths: &GatehousePaths, path: &Path) -> String {
    path.strip_prefix(paths.project_root())
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::config::ProjectConfig;
    use gatehouse_core::machine::Gatekeeper;
    use gatehouse_core::model::WorkItemId;

    fn scaffold() -> (tempfile::TempDir, GatehousePaths) {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = GatehousePaths::new(dir.path());
        std::fs::create_dir_all(paths.ledger_dir()).expect("ledger dir");
        std::fs::write(
            paths.tokens_log(),
            "# gatehouse consumed tokens v1\n",
        )
        .expect("tokens");
        std::fs::write(
            paths.registry(),
            "schema_version = 1\n\n[[capability]]\nid = \"C1\"\n\n[[contract]]\nid = \"ROLE:C1:X:1\"\n",
        )
        .expect("registry");
        std::fs::write(paths.state_dir().join("POLICY.md"), "# policy\n").expect("policy");
        std::fs::write(paths.policy_pointer(), ".gatehouse/POLICY.md\n").expect("pointer");
        (dir, paths)
    }

    /// Drive a work item through refine + sign so the ledger and token
    /// table have real content.
    fn populate(paths: &GatehousePaths, id: &str, token: &str) {
        let mut config = ProjectConfig::default();
        config.gates.min_interval_secs = 0;
        config.gates.corpus_scan = false;
        let keeper = Gatekeeper::new(paths.clone(), config);
        let artifact = format!("artifact-{id}.md");
        std::fs::write(
            paths.project_root().join(&artifact),
            format!(
                "Work-Item: {id}\nSummary: s\nApproach: a\nRisks: r\n\
                 Coverage: PASS\nEnrichment-Needed: no\n"
            ),
        )
        .expect("artifact");
        let wid = WorkItemId::new_unchecked(id);
        keeper
            .record_refinement(&wid, &artifact, "claude-gh1")
            .expect("refine");
        keeper.record_signature(&wid, token, "rik").expect("sign");
    }

    #[test]
    fn empty_project_builds() {
        let (_dir, paths) = scaffold();
        let doc = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        assert!(doc.ends_with('\n'));
        assert_eq!(doc.matches('\n').count(), 1, "single-line canonical JSON");

        let value: Value = serde_json::from_str(&doc).expect("valid JSON");
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["work_items"], json!([]));
        assert_eq!(value["registry"]["capabilities"], json!(["C1"]));
    }

    #[test]
    fn rebuilding_unchanged_inputs_is_byte_identical() {
        let (_dir, paths) = scaffold();
        populate(&paths, "WP-42", "rik080820251015");

        let first = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        let second = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        assert_eq!(first, second);
    }

    #[test]
    fn no_wall_clock_field_without_opt_in() {
        let (_dir, paths) = scaffold();
        let doc = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        assert!(!doc.contains("generated_at_us"));

        let stamped = build_snapshot(
            &paths,
            SnapshotOptions {
                include_timestamp: true,
            },
        )
        .expect("build");
        assert!(stamped.contains("generated_at_us"));
    }

    #[test]
    fn summaries_cover_items_and_tokens() {
        let (_dir, paths) = scaffold();
        populate(&paths, "WP-B", "rik080820251015");
        populate(&paths, "WP-A", "ana080820251016");

        let doc = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        let value: Value = serde_json::from_str(&doc).expect("valid JSON");

        // Work items sorted by id.
        let items = value["work_items"].as_array().expect("array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "WP-A");
        assert_eq!(items[1]["id"], "WP-B");
        assert_eq!(items[0]["phase"], "signed");
        assert_eq!(
            items[0]["gates_passed"],
            json!(["gate.refine", "gate.sign"])
        );
        assert_eq!(items[0]["latest"]["gate.sign"]["actor"], "rik");

        // Token table sorted by token.
        let tokens = value["tokens"].as_array().expect("array");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0]["token"], "ana080820251016");
        assert_eq!(tokens[1]["token"], "rik080820251015");
        assert_eq!(tokens[1]["work_item"], "WP-B");

        // Registry mapping present with digests.
        assert!(
            value["registry"]["contracts"][0]["schema_digest"]
                .as_str()
                .expect("digest")
                .starts_with("blake3:")
        );
    }

    #[test]
    fn malformed_ledger_is_structural_failure() {
        let (_dir, paths) = scaffold();
        std::fs::write(
            paths.ledger_dir().join("WP-9.events"),
            "# gatehouse gate ledger v1\nnot a tsjson line\n",
        )
        .expect("write");

        let err = build_snapshot(&paths, SnapshotOptions::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::MalformedSubDocument { .. }), "{err}");
    }

    #[test]
    fn malformed_token_row_is_structural_failure() {
        let (_dir, paths) = scaffold();
        std::fs::write(paths.tokens_log(), "rik080820251015\tnot_a_number\tWP-1\n")
            .expect("write");
        let err = build_snapshot(&paths, SnapshotOptions::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::MalformedSubDocument { .. }));
    }

    #[test]
    fn malformed_registry_is_structural_failure() {
        let (_dir, paths) = scaffold();
        std::fs::write(paths.registry(), "[[capability]\nbroken").expect("write");
        let err = build_snapshot(&paths, SnapshotOptions::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::MalformedSubDocument { .. }));
    }

    #[test]
    fn collections_sort_by_key_not_insertion() {
        // Tokens written out of order must come back sorted.
        let (_dir, paths) = scaffold();
        std::fs::write(
            paths.tokens_log(),
            "zed080820251015\t2\tWP-2\nana080820251016\t1\tWP-1\n",
        )
        .expect("write");

        let doc = build_snapshot(&paths, SnapshotOptions::default()).expect("build");
        let value: Value = serde_json::from_str(&doc).expect("valid JSON");
        let tokens = value["tokens"].as_array().expect("array");
        assert_eq!(tokens[0]["token"], "ana080820251016");
        assert_eq!(tokens[1]["token"], "zed080820251015");
    }
}
