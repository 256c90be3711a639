//! The phase state machine.
//!
//! Drives a work item through the required gate order
//! (`refine -> sign -> prepare -> append -> report -> acknowledge ->
//! commit`) against the per-item ledger. Every operation either fully
//! applies — appending exactly one gate event as its final statement — or
//! fails with nothing appended.
//!
//! Phase validity is computed by locating, per gate type, the *latest*
//! event for the work item. A missing dependency event is a harder failure
//! (`MissingGate`) than merely having an out-of-order timestamp, which only
//! yields a status warning.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::error::GateError;
use crate::event::{
    CommitData, GateData, GateEvent, GateType, RefineData, SignData, StepData,
};
use crate::ledger::LedgerStore;
use crate::model::{Phase, WorkItemId};
use crate::paths::GatehousePaths;
use crate::refinement::{self, RefinementArtifact, RefinementRecord, ReviewStatus};
use crate::token::{SignatureToken, TokenAudit, corpus_contains_token};

/// Wall-clock now in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Pure-read view of one work item's gate state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatusReport {
    pub work_item_id: WorkItemId,
    pub phase: Phase,
    /// Full event history, oldest first.
    pub events: Vec<GateEvent>,
    /// Gates whose latest event predates its prerequisite's latest event.
    /// Suspicious but softer than a missing gate.
    pub out_of_order: Vec<GateType>,
}

/// Outcome of a confirmed reset.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResetReport {
    pub work_item_id: WorkItemId,
    /// Archive destination of the ledger file, when one existed.
    pub archived_ledger: Option<String>,
    /// Archive destination of the refinement record, when one existed.
    pub archived_refinement: Option<String>,
}

// ---------------------------------------------------------------------------
// Options for step gates
// ---------------------------------------------------------------------------

/// Caller options for the post-signature step gates.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    /// Mark the step machine-inferred: bypasses the momentum interval and
    /// is logged and recorded distinctly.
    pub machine_inferred: bool,
    /// Optional free-form note stored in the payload.
    pub note: Option<String>,
    /// For the commit gate: the revision the commit verified against.
    pub revision: Option<String>,
}

// ---------------------------------------------------------------------------
// Gatekeeper
// ---------------------------------------------------------------------------

/// The gate state machine over one project's ledger.
#[derive(Debug)]
pub struct Gatekeeper {
    paths: GatehousePaths,
    config: ProjectConfig,
    store: LedgerStore,
}

impl Gatekeeper {
    #[must_use]
    pub fn new(paths: GatehousePaths, config: ProjectConfig) -> Self {
        let store = LedgerStore::new(paths.clone());
        Self {
            paths,
            config,
            store,
        }
    }

    /// The underlying ledger store.
    #[must_use]
    pub const fn store(&self) -> &LedgerStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // refine
    // -----------------------------------------------------------------------

    /// Record the refinement gate.
    ///
    /// Reads and validates the artifact (completeness and the
    /// coverage/enrichment consistency rule), creates or refreshes the
    /// pending refinement record, then appends `gate.refine`.
    ///
    /// # Errors
    ///
    /// `ArtifactUnreadable`, `ArtifactIncomplete`, `ArtifactInconsistent`,
    /// `RefinementFrozen` (already signed), or ledger failures.
    pub fn record_refinement(
        &self,
        id: &WorkItemId,
        artifact_ref: &str,
        actor: &str,
    ) -> Result<GateEvent, GateError> {
        let artifact_path = self.paths.project_root().join(artifact_ref);
        let text =
            std::fs::read_to_string(&artifact_path).map_err(|source| GateError::ArtifactUnreadable {
                path: artifact_path.display().to_string(),
                source,
            })?;
        let artifact = RefinementArtifact::parse(&text)?;
        if &artifact.work_item_id != id {
            return Err(GateError::ArtifactInconsistent {
                details: format!(
                    "artifact Work-Item is '{}', expected '{id}'",
                    artifact.work_item_id
                ),
            });
        }

        // A signed refinement is frozen; re-refining requires a reset.
        if let Some(record) = refinement::load_record(&self.paths, id)
            .map_err(|e| ledger_corrupt(&self.paths, e))?
        {
            if record.status == ReviewStatus::Approved {
                return Err(GateError::RefinementFrozen {
                    work_item: id.to_string(),
                });
            }
        }

        let record = RefinementRecord::pending(id.clone(), artifact_ref.to_string());
        refinement::store_record(&self.paths, &record)
            .map_err(|e| ledger_corrupt(&self.paths, e))?;

        let mut event = GateEvent {
            wall_ts_us: now_us(),
            actor: actor.to_string(),
            gate_type: GateType::Refine,
            work_item_id: id.clone(),
            data: GateData::Refine(RefineData {
                artifact_ref: artifact_ref.to_string(),
                coverage: artifact.coverage,
                enrichment_needed: artifact.enrichment_needed,
                extra: BTreeMap::new(),
            }),
            event_hash: String::new(),
        };
        self.store.append(&mut event)?;
        info!(item = %id, artifact = artifact_ref, "refinement recorded");
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // sign
    // -----------------------------------------------------------------------

    /// Record the signature gate, consuming a one-time token.
    ///
    /// # Errors
    ///
    /// `MissingRefinement` (no refine event), `DuplicateSignature`
    /// (re-signing, or token already consumed), `MomentumViolation`
    /// (signed too soon after refinement), `TokenGrammar`, or ledger
    /// failures.
    pub fn record_signature(
        &self,
        id: &WorkItemId,
        token_raw: &str,
        actor: &str,
    ) -> Result<GateEvent, GateError> {
        let events = self.store.load(id)?;

        let refine_idx = latest_index(&events, GateType::Refine).ok_or_else(|| {
            GateError::MissingRefinement {
                work_item: id.to_string(),
            }
        })?;

        // Non-re-signable: any signature after the latest refinement means
        // this refinement is already signed.
        if events[refine_idx..]
            .iter()
            .any(|e| e.gate_type == GateType::Sign)
        {
            return Err(GateError::DuplicateSignature {
                token: token_raw.to_string(),
            });
        }

        let now = now_us();
        self.check_momentum(events[refine_idx].wall_ts_us, now)?;

        let token = SignatureToken::parse(token_raw)?;

        // The audit ledger is the authoritative one-time-use record.
        let audit = TokenAudit::new(self.paths.tokens_log());
        if audit.is_consumed(token.as_str())? {
            return Err(GateError::DuplicateSignature {
                token: token_raw.to_string(),
            });
        }

        // Advisory backstop only: a corpus hit warns but never blocks.
        if self.config.gates.corpus_scan
            && corpus_contains_token(self.paths.project_root(), token.as_str())
        {
            warn!(
                token = token.as_str(),
                "token already appears in the tracked corpus (advisory); \
                 audit ledger remains the source of truth"
            );
        }

        // Approve and freeze the refinement record.
        let mut record = refinement::load_record(&self.paths, id)
            .map_err(|e| ledger_corrupt(&self.paths, e))?
            .unwrap_or_else(|| {
                // Older projects may predate persisted records; rebuild the
                // binding from the refine event.
                let artifact_ref = match &events[refine_idx].data {
                    GateData::Refine(d) => d.artifact_ref.clone(),
                    _ => String::new(),
                };
                RefinementRecord::pending(id.clone(), artifact_ref)
            });
        record.approve(token.as_str(), now)?;
        refinement::store_record(&self.paths, &record)
            .map_err(|e| ledger_corrupt(&self.paths, e))?;

        // One-time-use ledger append precedes the gate event so a crash
        // between the two can only over-consume, never under-consume.
        audit.record(&token, now, id)?;

        let mut event = GateEvent {
            wall_ts_us: now,
            actor: actor.to_string(),
            gate_type: GateType::Sign,
            work_item_id: id.clone(),
            data: GateData::Sign(SignData {
                token: token.as_str().to_string(),
                extra: BTreeMap::new(),
            }),
            event_hash: String::new(),
        };
        self.store.append(&mut event)?;
        info!(item = %id, signer = token.actor(), "signature recorded");
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // step gates
    // -----------------------------------------------------------------------

    /// Record one of the post-signature step gates
    /// (`prepare`, `append`, `report`, `acknowledge`, `commit`).
    ///
    /// Requires the immediately preceding gate's latest event to exist and
    /// applies the momentum interval against the item's latest event of any
    /// type — unless the step is explicitly machine-inferred, which is
    /// logged and recorded distinctly.
    ///
    /// # Errors
    ///
    /// `MissingGate`, `MomentumViolation`, or ledger failures. Calling this
    /// with `Refine` or `Sign` is a programming error and fails with
    /// `MissingGate` against the gate's own prerequisite.
    pub fn record_step(
        &self,
        id: &WorkItemId,
        gate_type: GateType,
        actor: &str,
        opts: &StepOptions,
    ) -> Result<GateEvent, GateError> {
        let Some(required) = gate_type.required_predecessor() else {
            // Refine has its own entry point.
            return Err(GateError::MissingGate {
                attempted: gate_type,
                required: GateType::Refine,
            });
        };

        let events = self.store.load(id)?;
        if latest_index(&events, required).is_none() {
            return Err(GateError::MissingGate {
                attempted: gate_type,
                required,
            });
        }

        let now = now_us();
        if opts.machine_inferred {
            debug!(item = %id, gate = %gate_type, "momentum check skipped (machine-inferred)");
        } else if let Some(last) = events.iter().map(|e| e.wall_ts_us).max() {
            self.check_momentum(last, now)?;
        }

        let data = match gate_type {
            GateType::Commit => GateData::Commit(CommitData {
                machine_inferred: opts.machine_inferred,
                revision: opts.revision.clone(),
                extra: BTreeMap::new(),
            }),
            GateType::Prepare | GateType::Append | GateType::Report | GateType::Acknowledge => {
                let step = StepData {
                    machine_inferred: opts.machine_inferred,
                    note: opts.note.clone(),
                    extra: BTreeMap::new(),
                };
                match gate_type {
                    GateType::Prepare => GateData::Prepare(step),
                    GateType::Append => GateData::Append(step),
                    GateType::Report => GateData::Report(step),
                    _ => GateData::Acknowledge(step),
                }
            }
            GateType::Refine | GateType::Sign => unreachable!("handled above"),
        };

        let mut event = GateEvent {
            wall_ts_us: now,
            actor: actor.to_string(),
            gate_type,
            work_item_id: id.clone(),
            data,
            event_hash: String::new(),
        };
        self.store.append(&mut event)?;
        info!(
            item = %id,
            gate = %gate_type,
            machine_inferred = opts.machine_inferred,
            "gate recorded"
        );
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // status / reset
    // -----------------------------------------------------------------------

    /// Pure read: current phase plus full event history.
    ///
    /// # Errors
    ///
    /// Ledger read/parse failures only.
    pub fn status(&self, id: &WorkItemId) -> Result<StatusReport, GateError> {
        let events = self.store.load(id)?;
        let (phase, out_of_order) = compute_phase(&events);
        Ok(StatusReport {
            work_item_id: id.clone(),
            phase,
            events,
            out_of_order,
        })
    }

    /// Archive the item's ledger and refinement record, returning it to
    /// `new`. Nothing is deleted.
    ///
    /// # Errors
    ///
    /// `ConfirmationRequired` without `confirm`; otherwise I/O failures.
    pub fn reset(&self, id: &WorkItemId, confirm: bool) -> Result<ResetReport, GateError> {
        if !confirm {
            return Err(GateError::ConfirmationRequired);
        }
        let ts = now_us();
        let archived_ledger = self
            .store
            .archive(id, ts)?
            .map(|p| p.display().to_string());

        let refinement_file = self.paths.refinement_file(id);
        let archived_refinement = if refinement_file.exists() {
            let dest = self.paths.archive_dir().join(format!("{id}-{ts}.toml"));
            std::fs::create_dir_all(self.paths.archive_dir()).map_err(|source| {
                GateError::LedgerWrite {
                    path: dest.display().to_string(),
                    source,
                }
            })?;
            std::fs::rename(&refinement_file, &dest).map_err(|source| GateError::LedgerWrite {
                path: dest.display().to_string(),
                source,
            })?;
            Some(dest.display().to_string())
        } else {
            None
        };

        info!(item = %id, "work item reset (archived, not deleted)");
        Ok(ResetReport {
            work_item_id: id.clone(),
            archived_ledger,
            archived_refinement,
        })
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn check_momentum(&self, prev_us: i64, now_us: i64) -> Result<(), GateError> {
        check_interval(prev_us, now_us, self.config.gates.min_interval_secs)
    }
}

/// The momentum check: at least `min_interval_secs` must elapse between
/// consecutive gate events. Deliberate anti-automation-momentum policy,
/// not a security boundary.
///
/// # Errors
///
/// Returns [`GateError::MomentumViolation`] when the elapsed time falls
/// short. A non-positive interval disables the check.
pub fn check_interval(prev_us: i64, now_us: i64, min_interval_secs: i64) -> Result<(), GateError> {
    if min_interval_secs <= 0 {
        return Ok(());
    }
    let elapsed_secs = (now_us.saturating_sub(prev_us)) / 1_000_000;
    if elapsed_secs < min_interval_secs {
        return Err(GateError::MomentumViolation {
            elapsed_secs,
            required_secs: min_interval_secs,
        });
    }
    Ok(())
}

/// Index of the latest event of `gate_type`, by file (append) order.
fn latest_index(events: &[GateEvent], gate_type: GateType) -> Option<usize> {
    events.iter().rposition(|e| e.gate_type == gate_type)
}

/// Compute the current phase from the latest event per gate type.
///
/// The phase is the furthest gate in required order for which this gate
/// and every prerequisite have at least one event. Gates whose latest
/// event carries a timestamp earlier than their prerequisite's latest
/// event are reported as out-of-order — a warning, deliberately softer
/// than a missing gate.
#[must_use]
pub fn compute_phase(events: &[GateEvent]) -> (Phase, Vec<GateType>) {
    let mut latest_ts: BTreeMap<GateType, i64> = BTreeMap::new();
    for event in events {
        latest_ts.insert(event.gate_type, event.wall_ts_us);
    }

    let mut phase = Phase::New;
    let mut out_of_order = Vec::new();
    for gate in GateType::ALL {
        let Some(&ts) = latest_ts.get(&gate) else {
            break;
        };
        if let Some(prev) = gate.required_predecessor() {
            if let Some(&prev_ts) = latest_ts.get(&prev) {
                if prev_ts > ts {
                    out_of_order.push(gate);
                }
            }
        }
        phase = Phase::after(gate);
    }
    (phase, out_of_order)
}

fn ledger_corrupt(paths: &GatehousePaths, err: anyhow::Error) -> GateError {
    GateError::LedgerCorrupt {
        path: paths.state_dir().display().to_string(),
        line: 0,
        details: format!("{err:#}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Fixture {
        _dir: tempfile::TempDir,
        keeper: Gatekeeper,
        paths: GatehousePaths,
    }

    /// A project with the momentum interval disabled (tests that need the
    /// interval construct their own config).
    fn fixture() -> Fixture {
        fixture_with_interval(0)
    }

    fn fixture_with_interval(min_interval_secs: i64) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = GatehousePaths::new(dir.path());
        std::fs::create_dir_all(paths.state_dir()).expect("state dir");
        let mut config = ProjectConfig::default();
        config.gates.min_interval_secs = min_interval_secs;
        config.gates.corpus_scan = false;
        Fixture {
            keeper: Gatekeeper::new(paths.clone(), config),
            _dir: dir,
            paths,
        }
    }

    fn write_artifact(f: &Fixture, id: &str) -> String {
        let rel = format!("artifact-{id}.md");
        let text = format!(
            "Work-Item: {id}\n\
             Summary: Harden the retry loop\n\
             Approach: Bound the retry budget\n\
             Risks: Latency under sustained failure\n\
             Coverage: PASS\n\
             Enrichment-Needed: no\n"
        );
        std::fs::write(f.paths.project_root().join(&rel), text).expect("write artifact");
        rel
    }

    fn wp(id: &str) -> WorkItemId {
        WorkItemId::new_unchecked(id)
    }

    /// Drive a work item through refine + sign.
    fn refine_and_sign(f: &Fixture, id: &WorkItemId, token: &str) {
        let artifact = write_artifact(f, id.as_str());
        f.keeper
            .record_refinement(id, &artifact, "claude-gh1")
            .expect("refine");
        f.keeper
            .record_signature(id, token, "rik")
            .expect("sign");
    }

    // -----------------------------------------------------------------------
    // refine
    // -----------------------------------------------------------------------

    #[test]
    fn refine_appends_event_and_pending_record() {
        let f = fixture();
        let id = wp("WP-42");
        let artifact = write_artifact(&f, "WP-42");

        let event = f
            .keeper
            .record_refinement(&id, &artifact, "claude-gh1")
            .expect("refine");
        assert_eq!(event.gate_type, GateType::Refine);

        let record = refinement::load_record(&f.paths, &id)
            .expect("load")
            .expect("present");
        assert_eq!(record.status, ReviewStatus::Pending);

        let status = f.keeper.status(&id).expect("status");
        assert_eq!(status.phase, Phase::Refined);
        assert_eq!(status.events.len(), 1);
    }

    #[test]
    fn refine_rejects_inconsistent_artifact() {
        let f = fixture();
        let id = wp("WP-42");
        let rel = "bad.md";
        std::fs::write(
            f.paths.project_root().join(rel),
            "Work-Item: WP-42\nSummary: s\nApproach: a\nRisks: r\n\
             Coverage: PASS\nEnrichment-Needed: yes\n",
        )
        .expect("write");

        let err = f
            .keeper
            .record_refinement(&id, rel, "claude-gh1")
            .unwrap_err();
        assert!(matches!(err, GateError::ArtifactInconsistent { .. }));
        // Nothing appended.
        assert!(f.keeper.status(&id).expect("status").events.is_empty());
    }

    #[test]
    fn refine_rejects_mismatched_work_item() {
        let f = fixture();
        let artifact = write_artifact(&f, "WP-OTHER");
        let err = f
            .keeper
            .record_refinement(&wp("WP-42"), &artifact, "claude-gh1")
            .unwrap_err();
        assert!(matches!(err, GateError::ArtifactInconsistent { .. }));
    }

    #[test]
    fn refine_missing_artifact_is_unreadable() {
        let f = fixture();
        let err = f
            .keeper
            .record_refinement(&wp("WP-42"), "nope.md", "claude-gh1")
            .unwrap_err();
        assert!(matches!(err, GateError::ArtifactUnreadable { .. }));
    }

    #[test]
    fn refine_after_sign_is_frozen() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        let artifact = write_artifact(&f, "WP-42");
        let err = f
            .keeper
            .record_refinement(&id, &artifact, "claude-gh1")
            .unwrap_err();
        assert!(matches!(err, GateError::RefinementFrozen { .. }));
    }

    // -----------------------------------------------------------------------
    // sign
    // -----------------------------------------------------------------------

    #[test]
    fn sign_before_refine_is_missing_refinement() {
        let f = fixture();
        let err = f
            .keeper
            .record_signature(&wp("WP-42"), "rik080820251015", "rik")
            .unwrap_err();
        assert!(matches!(err, GateError::MissingRefinement { .. }));
    }

    #[test]
    fn sign_approves_record_and_consumes_token() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        let record = refinement::load_record(&f.paths, &id)
            .expect("load")
            .expect("present");
        assert_eq!(record.status, ReviewStatus::Approved);
        assert_eq!(record.token.as_deref(), Some("rik080820251015"));

        let audit = TokenAudit::new(f.paths.tokens_log());
        assert!(audit.is_consumed("rik080820251015").expect("check"));

        assert_eq!(f.keeper.status(&id).expect("status").phase, Phase::Signed);
    }

    #[test]
    fn resigning_fails_with_duplicate_signature() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        let err = f
            .keeper
            .record_signature(&id, "ana080820251016", "ana")
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateSignature { .. }));
    }

    #[test]
    fn token_reuse_across_items_fails() {
        let f = fixture();
        refine_and_sign(&f, &wp("WP-A"), "rik080820251015");

        let id_b = wp("WP-B");
        let artifact = write_artifact(&f, "WP-B");
        f.keeper
            .record_refinement(&id_b, &artifact, "claude-gh1")
            .expect("refine");
        let err = f
            .keeper
            .record_signature(&id_b, "rik080820251015", "rik")
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateSignature { .. }));
    }

    #[test]
    fn sign_rejects_grammar_violations() {
        let f = fixture();
        let id = wp("WP-42");
        let artifact = write_artifact(&f, "WP-42");
        f.keeper
            .record_refinement(&id, &artifact, "claude-gh1")
            .expect("refine");

        let err = f
            .keeper
            .record_signature(&id, "Rik-not-a-token", "rik")
            .unwrap_err();
        assert!(matches!(err, GateError::TokenGrammar { .. }));
    }

    #[test]
    fn sign_too_soon_is_momentum_violation() {
        let f = fixture_with_interval(10);
        let id = wp("WP-42");
        let artifact = write_artifact(&f, "WP-42");
        f.keeper
            .record_refinement(&id, &artifact, "claude-gh1")
            .expect("refine");

        // Immediately after refinement: well under the 10s default.
        let err = f
            .keeper
            .record_signature(&id, "rik080820251015", "rik")
            .unwrap_err();
        assert!(matches!(err, GateError::MomentumViolation { .. }));
    }

    // -----------------------------------------------------------------------
    // step gates
    // -----------------------------------------------------------------------

    #[test]
    fn full_sequence_reaches_committed() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        for gate in [
            GateType::Prepare,
            GateType::Append,
            GateType::Report,
            GateType::Acknowledge,
            GateType::Commit,
        ] {
            f.keeper
                .record_step(&id, gate, "claude-gh1", &StepOptions::default())
                .unwrap_or_else(|e| panic!("step {gate} failed: {e}"));
        }

        let status = f.keeper.status(&id).expect("status");
        assert_eq!(status.phase, Phase::Committed);
        assert_eq!(status.events.len(), 7);
        assert!(status.out_of_order.is_empty());
    }

    #[test]
    fn skipping_a_gate_is_sequence_error() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        // Straight to append without prepare.
        let err = f
            .keeper
            .record_step(&id, GateType::Append, "claude-gh1", &StepOptions::default())
            .unwrap_err();
        match err {
            GateError::MissingGate {
                attempted,
                required,
            } => {
                assert_eq!(attempted, GateType::Append);
                assert_eq!(required, GateType::Prepare);
            }
            other => panic!("expected MissingGate, got {other:?}"),
        }
    }

    #[test]
    fn machine_inferred_step_bypasses_momentum() {
        let f = fixture_with_interval(10);
        let id = wp("WP-42");
        // Drive refine+sign under a zero-interval keeper sharing the same
        // directory layout, so only the step below faces the interval.
        let zero = Gatekeeper::new(f.paths.clone(), {
            let mut c = ProjectConfig::default();
            c.gates.min_interval_secs = 0;
            c.gates.corpus_scan = false;
            c
        });
        let artifact = write_artifact(&f, "WP-42");
        zero.record_refinement(&id, &artifact, "claude-gh1")
            .expect("refine");
        zero.record_signature(&id, "rik080820251015", "rik")
            .expect("sign");

        // Explicit step trips the interval...
        let err = f
            .keeper
            .record_step(&id, GateType::Prepare, "claude-gh1", &StepOptions::default())
            .unwrap_err();
        assert!(matches!(err, GateError::MomentumViolation { .. }));

        // ...while a machine-inferred one passes and is tagged.
        let event = f
            .keeper
            .record_step(
                &id,
                GateType::Prepare,
                "claude-gh1",
                &StepOptions {
                    machine_inferred: true,
                    ..StepOptions::default()
                },
            )
            .expect("machine-inferred step");
        assert!(event.data.machine_inferred());
    }

    #[test]
    fn commit_records_revision() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");
        for gate in [
            GateType::Prepare,
            GateType::Append,
            GateType::Report,
            GateType::Acknowledge,
        ] {
            f.keeper
                .record_step(&id, gate, "claude-gh1", &StepOptions::default())
                .expect("step");
        }

        let event = f
            .keeper
            .record_step(
                &id,
                GateType::Commit,
                "claude-gh1",
                &StepOptions {
                    revision: Some("deadbeef".into()),
                    ..StepOptions::default()
                },
            )
            .expect("commit");
        match &event.data {
            GateData::Commit(d) => assert_eq!(d.revision.as_deref(), Some("deadbeef")),
            other => panic!("expected Commit data, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // check_interval / compute_phase
    // -----------------------------------------------------------------------

    #[test]
    fn interval_boundaries() {
        // 3 seconds elapsed vs 10 required: violation.
        let err = check_interval(0, 3_000_000, 10).unwrap_err();
        match err {
            GateError::MomentumViolation {
                elapsed_secs,
                required_secs,
            } => {
                assert_eq!(elapsed_secs, 3);
                assert_eq!(required_secs, 10);
            }
            other => panic!("expected MomentumViolation, got {other:?}"),
        }
        // 15 seconds elapsed vs 10 required: fine.
        assert!(check_interval(0, 15_000_000, 10).is_ok());
        // Exactly 10 seconds: fine.
        assert!(check_interval(0, 10_000_000, 10).is_ok());
        // Disabled interval never fails, even for clock skew.
        assert!(check_interval(5_000_000, 0, 0).is_ok());
    }

    #[test]
    fn compute_phase_stops_at_first_gap() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");
        let events = f.keeper.store().load(&id).expect("load");

        let (phase, out_of_order) = compute_phase(&events);
        assert_eq!(phase, Phase::Signed);
        assert!(out_of_order.is_empty());
        assert_eq!(compute_phase(&[]).0, Phase::New);
    }

    #[test]
    fn out_of_order_timestamps_warn_but_count() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");
        let mut events = f.keeper.store().load(&id).expect("load");
        // Forge the sign timestamp to predate the refinement.
        events[1].wall_ts_us = events[0].wall_ts_us - 1;

        let (phase, out_of_order) = compute_phase(&events);
        assert_eq!(phase, Phase::Signed, "out-of-order is softer than missing");
        assert_eq!(out_of_order, vec![GateType::Sign]);
    }

    // -----------------------------------------------------------------------
    // reset
    // -----------------------------------------------------------------------

    #[test]
    fn reset_requires_confirmation() {
        let f = fixture();
        let err = f.keeper.reset(&wp("WP-42"), false).unwrap_err();
        assert!(matches!(err, GateError::ConfirmationRequired));
    }

    #[test]
    fn reset_archives_and_returns_to_new() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");

        let report = f.keeper.reset(&id, true).expect("reset");
        assert!(report.archived_ledger.is_some());
        assert!(report.archived_refinement.is_some());

        let status = f.keeper.status(&id).expect("status");
        assert_eq!(status.phase, Phase::New);
        assert!(status.events.is_empty());

        // The archive keeps the history on disk.
        let archive_entries: Vec<_> = std::fs::read_dir(f.paths.archive_dir())
            .expect("read archive")
            .collect();
        assert_eq!(archive_entries.len(), 2);
    }

    #[test]
    fn fresh_item_can_restart_after_reset() {
        let f = fixture();
        let id = wp("WP-42");
        refine_and_sign(&f, &id, "rik080820251015");
        f.keeper.reset(&id, true).expect("reset");

        // Re-refine works (the frozen record was archived)...
        let artifact = write_artifact(&f, "WP-42");
        f.keeper
            .record_refinement(&id, &artifact, "claude-gh1")
            .expect("refine again");
        // ...but the consumed token never revives.
        let err = f
            .keeper
            .record_signature(&id, "rik080820251015", "rik")
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateSignature { .. }));
    }
}
