//! The edit manifest verifier.
//!
//! Mechanically confirms that a work item's declared per-file edit windows
//! match real repository diffs and content hashes. The verifier never
//! mutates repository state; its output is pass/fail plus a structured,
//! deduplicated finding list.
//!
//! Per entry, all steps must pass:
//! 1. the target exists in the "after" state;
//! 2. `Pre-Hash` equals the digest of the "before" content, computed over
//!    line-ending-normalized bytes (LF canonical; CRLF warns, not fails);
//! 3. `Post-Hash` likewise for the "after" content;
//! 4. every diff hunk sits fully inside the declared window on both sides
//!    — a stray hunk is a hard rails violation regardless of hashes;
//! 5. the net line delta from the hunks equals the declared delta;
//! 6. the fixed checklist is satisfied: unchecked mechanical items are
//!    auto-inferred as passed (distinctly tagged), unchecked or declined
//!    judgment items fail.
//!
//! Scope guard: every file touched in the range needs a manifest entry;
//! out-of-scope changes fail unless an explicit waiver downgrades them.

use gatehouse_core::error::{ErrorCode, GateError};
use tracing::debug;

use crate::findings::Findings;
use crate::git::{CompareRange, GitRepo, Hunk, Side};
use crate::manifest::{CheckKind, CheckState, CHECKLIST, ManifestDoc, ManifestEntry};

// ---------------------------------------------------------------------------
// Normalization and digests
// ---------------------------------------------------------------------------

/// Normalize CRLF to LF. Returns the canonical bytes and whether any CRLF
/// was seen (cross-platform checkouts warn instead of failing).
#[must_use]
pub fn normalize_line_endings(bytes: &[u8]) -> (Vec<u8>, bool) {
    if !bytes.windows(2).any(|w| w == b"\r\n") {
        return (bytes.to_vec(), false);
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    (out, true)
}

/// The fixed content-digest primitive: BLAKE3 over normalized bytes,
/// rendered `blake3:<hex>`.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes).to_hex())
}

// ---------------------------------------------------------------------------
// Options / entry checks
// ---------------------------------------------------------------------------

/// Verifier policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// Whether `Waiver:` fields downgrade out-of-scope changes.
    pub allow_waivers: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            allow_waivers: true,
        }
    }
}

/// Step 4: every hunk fully inside the declared window, on both sides.
pub fn check_hunks(entry: &ManifestEntry, hunks: &[Hunk], findings: &mut Findings) {
    for hunk in hunks {
        let old_ok = hunk.old_count == 0
            || entry
                .window
                .contains_span(hunk.old_start, hunk.old_start + hunk.old_count - 1);
        let new_ok = hunk.new_count == 0
            || entry
                .window
                .contains_span(hunk.new_start, hunk.new_start + hunk.new_count - 1);
        if !(old_ok && new_ok) {
            findings.error(
                ErrorCode::RailsViolation,
                Some(&entry.target_path),
                format!("hunk {hunk} outside declared window {}", entry.window),
            );
        }
    }
}

/// Step 5: net insertions minus deletions must equal the declaration.
pub fn check_delta(entry: &ManifestEntry, hunks: &[Hunk], findings: &mut Findings) {
    let actual: i64 = hunks.iter().map(|h| h.delta()).sum();
    if actual != entry.line_delta {
        findings.error(
            ErrorCode::LineDeltaMismatch,
            Some(&entry.target_path),
            format!("declared {:+}, diff shows {actual:+}", entry.line_delta),
        );
    }
}

/// Step 6: the fixed checklist. Auto-inferred mechanical items are tagged
/// distinctly from explicitly-confirmed ones so downstream audits can tell
/// them apart.
pub fn check_checklist(entry: &ManifestEntry, findings: &mut Findings) {
    for item in CHECKLIST {
        let state = entry
            .checks
            .get(item.name)
            .copied()
            .unwrap_or(CheckState::Unchecked);
        match (item.kind, state) {
            (_, CheckState::Confirmed) => {}
            (_, CheckState::Declined) => {
                findings.error(
                    ErrorCode::ChecklistIncomplete,
                    Some(&entry.target_path),
                    format!("checklist item '{}' explicitly declined", item.name),
                );
            }
            (CheckKind::Mechanical, CheckState::Unchecked) => {
                findings.warning(
                    ErrorCode::ChecklistAutoInferred,
                    Some(&entry.target_path),
                    format!("mechanical item '{}' auto-inferred as passed", item.name),
                );
            }
            (CheckKind::Judgment, CheckState::Unchecked) => {
                findings.error(
                    ErrorCode::ChecklistIncomplete,
                    Some(&entry.target_path),
                    format!("judgment item '{}' must be explicitly marked", item.name),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Full verification
// ---------------------------------------------------------------------------

/// Verify a manifest against the repository comparison range.
///
/// # Errors
///
/// Returns [`GateError::GitUnavailable`] when a required git query fails;
/// all evidence mismatches surface as findings, not errors.
pub fn verify_manifest(
    repo: &GitRepo,
    range: &CompareRange,
    doc: &ManifestDoc,
    opts: VerifyOptions,
) -> Result<Findings, GateError> {
    let mut findings = Findings::new();
    debug!(%range, entries = doc.entries.len(), "verifying manifest");

    for entry in &doc.entries {
        verify_entry(repo, range, entry, &mut findings)?;
    }

    // Scope guard: every touched file needs a manifest entry. Gatehouse's
    // own state directory is exempt — gate bookkeeping (ledgers, consumed
    // tokens) moves alongside the change and is not part of its scope.
    for path in repo.changed_files(range)? {
        if path.starts_with(".gatehouse/") {
            debug!(path, "scope guard: skipping gatehouse state file");
            continue;
        }
        if doc.entry_for(&path).is_some() {
            continue;
        }
        match doc.waiver_for(&path) {
            Some(waiver) if opts.allow_waivers => {
                findings.warning(
                    ErrorCode::UndeclaredChange,
                    Some(&path),
                    format!("changed without a manifest entry; waived: {}", waiver.reason),
                );
            }
            _ => {
                findings.error(
                    ErrorCode::MissingCoverage,
                    Some(&path),
                    "changed in range but has no manifest entry",
                );
            }
        }
    }

    Ok(findings)
}

fn verify_entry(
    repo: &GitRepo,
    range: &CompareRange,
    entry: &ManifestEntry,
    findings: &mut Findings,
) -> Result<(), GateError> {
    let path = entry.target_path.as_str();

    // Step 1: the target must exist in the "after" state.
    let Some(after_raw) = repo.read_side(range, Side::After, path)? else {
        findings.error(
            ErrorCode::TargetMissing,
            Some(path),
            "target absent in the after state",
        );
        return Ok(());
    };

    // Steps 2-3: pre/post image digests over normalized bytes. An absent
    // before state (file added in this range) hashes as empty content.
    let before_raw = repo.read_side(range, Side::Before, path)?.unwrap_or_default();
    for (label, raw, declared, code) in [
        ("pre", &before_raw, &entry.pre_hash, ErrorCode::PreImageMismatch),
        ("post", &after_raw, &entry.post_hash, ErrorCode::PostImageMismatch),
    ] {
        let (normalized, had_crlf) = normalize_line_endings(raw);
        if had_crlf {
            findings.warning(
                ErrorCode::CrlfNormalized,
                Some(path),
                format!("{label}-image had CRLF line endings; hashed LF-normalized"),
            );
        }
        let actual = content_digest(&normalized);
        if &actual != declared {
            findings.error(
                code,
                Some(path),
                format!("declared {declared}, actual {actual}"),
            );
        }
    }

    // Steps 4-5: window containment and net delta from structural hunks.
    let hunks = repo.diff_hunks(range, path)?;
    check_hunks(entry, &hunks, findings);
    check_delta(entry, &hunks, findings);

    // Step 6: checklist.
    check_checklist(entry, findings);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{EditWindow, parse_manifest};
    use std::collections::BTreeMap;
    use std::process::Command;

    // -----------------------------------------------------------------------
    // Normalization / digest
    // -----------------------------------------------------------------------

    #[test]
    fn lf_input_is_untouched() {
        let (out, had_crlf) = normalize_line_endings(b"one\ntwo\n");
        assert_eq!(out, b"one\ntwo\n");
        assert!(!had_crlf);
    }

    #[test]
    fn crlf_input_is_normalized_and_flagged() {
        let (out, had_crlf) = normalize_line_endings(b"one\r\ntwo\r\n");
        assert_eq!(out, b"one\ntwo\n");
        assert!(had_crlf);
    }

    #[test]
    fn lone_carriage_returns_survive() {
        let (out, had_crlf) = normalize_line_endings(b"one\rtwo\r\n");
        assert_eq!(out, b"one\rtwo\n");
        assert!(had_crlf);
    }

    #[test]
    fn crlf_and_lf_variants_digest_identically() {
        let (lf, _) = normalize_line_endings(b"a\nb\n");
        let (crlf, _) = normalize_line_endings(b"a\r\nb\r\n");
        assert_eq!(content_digest(&lf), content_digest(&crlf));
    }

    #[test]
    fn digest_format() {
        let digest = content_digest(b"hello\n");
        assert!(digest.starts_with("blake3:"));
        assert_eq!(digest.len(), "blake3:".len() + 64);
    }

    // -----------------------------------------------------------------------
    // Entry checks (no repository required)
    // -----------------------------------------------------------------------

    fn entry(window: EditWindow, delta: i64) -> ManifestEntry {
        let mut checks = BTreeMap::new();
        for item in CHECKLIST {
            checks.insert(item.name, CheckState::Confirmed);
        }
        ManifestEntry {
            target_path: "src/foo.txt".into(),
            window,
            pre_hash: content_digest(b""),
            post_hash: content_digest(b""),
            line_delta: delta,
            checks,
        }
    }

    #[test]
    fn hunk_inside_window_passes() {
        let mut findings = Findings::new();
        let hunks = [Hunk {
            old_start: 2,
            old_count: 1,
            new_start: 2,
            new_count: 3,
        }];
        check_hunks(&entry(EditWindow { start: 1, end: 5 }, 2), &hunks, &mut findings);
        assert!(findings.passed(), "{findings:?}");
    }

    #[test]
    fn hunk_outside_window_is_rails_violation() {
        // Window [10,20]; a hunk touching line 25 must fail regardless of
        // matching hashes.
        let mut findings = Findings::new();
        let hunks = [Hunk {
            old_start: 25,
            old_count: 1,
            new_start: 25,
            new_count: 1,
        }];
        check_hunks(&entry(EditWindow { start: 10, end: 20 }, 0), &hunks, &mut findings);
        assert!(!findings.passed());
        assert_eq!(findings.errors()[0].code, ErrorCode::RailsViolation);
    }

    #[test]
    fn hunk_straddling_window_edge_fails() {
        let mut findings = Findings::new();
        let hunks = [Hunk {
            old_start: 18,
            old_count: 5,
            new_start: 18,
            new_count: 5,
        }];
        check_hunks(&entry(EditWindow { start: 10, end: 20 }, 0), &hunks, &mut findings);
        assert!(!findings.passed());
    }

    #[test]
    fn pure_insertion_checks_new_side_only() {
        // Insertion after line 4: old side is empty at offset 4, new side
        // occupies 5-6.
        let hunks = [Hunk {
            old_start: 4,
            old_count: 0,
            new_start: 5,
            new_count: 2,
        }];
        let mut ok = Findings::new();
        check_hunks(&entry(EditWindow { start: 1, end: 6 }, 2), &hunks, &mut ok);
        assert!(ok.passed());

        let mut bad = Findings::new();
        check_hunks(&entry(EditWindow { start: 1, end: 4 }, 2), &hunks, &mut bad);
        assert!(!bad.passed());
    }

    #[test]
    fn delta_mismatch_is_flagged() {
        let hunks = [Hunk {
            old_start: 1,
            old_count: 1,
            new_start: 1,
            new_count: 3,
        }];
        let mut findings = Findings::new();
        check_delta(&entry(EditWindow { start: 1, end: 5 }, 0), &hunks, &mut findings);
        assert_eq!(findings.errors()[0].code, ErrorCode::LineDeltaMismatch);
        assert!(findings.errors()[0].detail.contains("+2"));
    }

    #[test]
    fn checklist_auto_inference_and_failures() {
        let mut e = entry(EditWindow { start: 1, end: 5 }, 0);
        e.checks.insert("window-matches-plan", CheckState::Unchecked);
        e.checks.insert("tests-executed", CheckState::Unchecked);

        let mut findings = Findings::new();
        check_checklist(&e, &mut findings);

        // Mechanical unchecked: distinct warning. Judgment unchecked: error.
        assert!(!findings.passed());
        assert!(findings
            .warnings()
            .iter()
            .any(|f| f.code == ErrorCode::ChecklistAutoInferred));
        assert!(findings
            .errors()
            .iter()
            .any(|f| f.code == ErrorCode::ChecklistIncomplete));
    }

    #[test]
    fn declined_item_always_fails() {
        let mut e = entry(EditWindow { start: 1, end: 5 }, 0);
        e.checks.insert("pre-image-captured", CheckState::Declined);
        let mut findings = Findings::new();
        check_checklist(&e, &mut findings);
        assert!(!findings.passed());
    }

    // -----------------------------------------------------------------------
    // End-to-end against a real repository (skipped without git)
    // -----------------------------------------------------------------------

    struct RepoFixture {
        dir: tempfile::TempDir,
        repo: GitRepo,
    }

    fn init_repo(initial: &str) -> Option<RepoFixture> {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = |args: &[&str]| {
            Command::new("git")
                .current_dir(dir.path())
                .args(args)
                .output()
                .ok()
                .filter(|o| o.status.success())
        };
        run(&["init", "-q"])?;
        run(&["config", "user.email", "t@example.com"])?;
        run(&["config", "user.name", "T"])?;
        std::fs::create_dir_all(dir.path().join("src")).ok()?;
        std::fs::write(dir.path().join("src/foo.txt"), initial).ok()?;
        run(&["add", "."])?;
        run(&["commit", "-q", "-m", "initial"])?;
        let repo = GitRepo::open(dir.path()).ok()?;
        Some(RepoFixture { dir, repo })
    }

    fn manifest_text(pre: &str, post: &str, window: &str, delta: &str) -> String {
        format!(
            "Target: src/foo.txt\n\
             Window: {window}\n\
             Pre-Hash: {pre}\n\
             Post-Hash: {post}\n\
             Line-Delta: {delta}\n\
             Gate-Window-Matches-Plan: yes\n\
             Gate-Pre-Image-Captured: yes\n\
             Gate-Tests-Executed: yes\n\
             Gate-Diff-Reviewed: yes\n"
        )
    }

    #[test]
    fn in_window_change_with_matching_evidence_passes() {
        let before = "one\ntwo\nthree\n";
        let after = "one\ntwo\n2.5\n2.75\nthree\n";
        let Some(f) = init_repo(before) else {
            eprintln!("git unavailable; skipping");
            return;
        };
        std::fs::write(f.dir.path().join("src/foo.txt"), after).expect("write");

        let doc = parse_manifest(&manifest_text(
            &content_digest(before.as_bytes()),
            &content_digest(after.as_bytes()),
            "1-5",
            "+2",
        ))
        .expect("parse");

        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions::default(),
        )
        .expect("verify");
        assert!(findings.passed(), "{findings:?}");
        assert!(findings.is_empty(), "no warnings expected: {findings:?}");
    }

    #[test]
    fn mutated_post_hash_fails_post_image() {
        let before = "one\ntwo\nthree\n";
        let after = "one\ntwo\n2.5\n2.75\nthree\n";
        let Some(f) = init_repo(before) else {
            eprintln!("git unavailable; skipping");
            return;
        };
        std::fs::write(f.dir.path().join("src/foo.txt"), after).expect("write");

        let doc = parse_manifest(&manifest_text(
            &content_digest(before.as_bytes()),
            &content_digest(b"unrelated content"),
            "1-5",
            "+2",
        ))
        .expect("parse");

        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions::default(),
        )
        .expect("verify");
        assert!(!findings.passed());
        assert!(findings
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::PostImageMismatch));
        // Hashes aside, the edit itself stayed on the rails.
        assert!(!findings
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::RailsViolation));
    }

    #[test]
    fn undeclared_change_needs_waiver() {
        let Some(f) = init_repo("one\n") else {
            eprintln!("git unavailable; skipping");
            return;
        };
        // Touch a second, undeclared file.
        std::fs::write(f.dir.path().join("src/foo.txt"), "one!\n").expect("write");
        std::fs::write(f.dir.path().join("src/stray.txt"), "oops\n").expect("write");
        Command::new("git")
            .current_dir(f.dir.path())
            .args(["add", "src/stray.txt"])
            .output()
            .expect("git add");
        // Commit the stray file as tracked, then modify both in the tree.
        Command::new("git")
            .current_dir(f.dir.path())
            .args(["commit", "-q", "-m", "stray"])
            .output()
            .expect("git commit");
        std::fs::write(f.dir.path().join("src/stray.txt"), "changed\n").expect("write");

        let after = std::fs::read(f.dir.path().join("src/foo.txt")).expect("read");
        let doc_text = manifest_text(
            &content_digest(b"one\n"),
            &content_digest(&after),
            "1-1",
            "0",
        );

        // Without a waiver: MissingCoverage error.
        let doc = parse_manifest(&doc_text).expect("parse");
        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions::default(),
        )
        .expect("verify");
        assert!(findings
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::MissingCoverage));

        // With a waiver: downgraded to a warning.
        let waived = format!("Waiver: src/stray.txt -- scratch file\n{doc_text}");
        let doc = parse_manifest(&waived).expect("parse");
        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions::default(),
        )
        .expect("verify");
        assert!(findings.passed(), "{findings:?}");
        assert!(findings
            .warnings()
            .iter()
            .any(|w| w.code == ErrorCode::UndeclaredChange));

        // Unless waivers are disabled by policy.
        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions {
                allow_waivers: false,
            },
        )
        .expect("verify");
        assert!(!findings.passed());
    }

    #[test]
    fn missing_target_is_flagged() {
        let Some(f) = init_repo("one\n") else {
            eprintln!("git unavailable; skipping");
            return;
        };
        let text = manifest_text(&content_digest(b""), &content_digest(b""), "1-1", "0")
            .replace("src/foo.txt", "src/ghost.txt");
        let doc = parse_manifest(&text).expect("parse");
        let findings = verify_manifest(
            &f.repo,
            &CompareRange::WorkTree,
            &doc,
            VerifyOptions::default(),
        )
        .expect("verify");
        assert!(findings
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::TargetMissing));
    }
}
