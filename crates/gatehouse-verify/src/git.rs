//! Synchronous git plumbing.
//!
//! All version-control queries go through the `git` binary via
//! `std::process::Command` — blocking, run-to-completion, no library
//! bindings. A failed call is an [`GateError::GitUnavailable`] when the
//! data is required for a hard gate; advisory callers degrade with a log
//! line instead.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gatehouse_core::error::GateError;
use tracing::debug;

// ---------------------------------------------------------------------------
// Compare range
// ---------------------------------------------------------------------------

/// The repository comparison range a verification runs against.
///
/// Resolution precedence: explicit range > explicit single revision >
/// staged changes > working-tree changes > implicit "since last commit".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareRange {
    /// Two resolved commits: `base..head`.
    Commits { base: String, head: String },
    /// `HEAD` vs the index.
    Staged,
    /// `HEAD` vs the working tree.
    WorkTree,
}

impl std::fmt::Display for CompareRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commits { base, head } => write!(f, "{base}..{head}"),
            Self::Staged => write!(f, "staged"),
            Self::WorkTree => write!(f, "worktree"),
        }
    }
}

/// Which side of the comparison to read a blob from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

// ---------------------------------------------------------------------------
// Diff hunks
// ---------------------------------------------------------------------------

/// One structural diff hunk, from a `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

impl Hunk {
    /// Net line delta contributed by this hunk.
    #[must_use]
    pub fn delta(self) -> i64 {
        i64::from(self.new_count) - i64::from(self.old_count)
    }
}

impl std::fmt::Display for Hunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "-{},{} +{},{}",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Parse a unified diff hunk header (`@@ -a[,b] +c[,d] @@ ...`).
#[must_use]
pub fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let rest = line.strip_prefix("@@ -")?;
    let (old_part, rest) = rest.split_once(" +")?;
    let (new_part, _) = rest.split_once(" @@")?;

    let parse_pair = |part: &str| -> Option<(u32, u32)> {
        match part.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((part.parse().ok()?, 1)),
        }
    };

    let (old_start, old_count) = parse_pair(old_part)?;
    let (new_start, new_count) = parse_pair(new_part)?;
    Some(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

// ---------------------------------------------------------------------------
// Repository handle
// ---------------------------------------------------------------------------

/// A handle on one git work tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    workdir: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `dir`.
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] when git is missing or `dir` is not
    /// inside a work tree.
    pub fn open(dir: &Path) -> Result<Self, GateError> {
        let repo = Self {
            workdir: dir.to_path_buf(),
        };
        let toplevel = repo.run_ok(&["rev-parse", "--show-toplevel"])?;
        Ok(Self {
            workdir: PathBuf::from(toplevel.trim()),
        })
    }

    /// The repository's top-level directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolve a revision expression to a full object id.
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] when the revision does not resolve.
    pub fn rev_parse(&self, rev: &str) -> Result<String, GateError> {
        Ok(self.run_ok(&["rev-parse", "--verify", rev])?.trim().to_string())
    }

    /// Whether the index differs from `HEAD`.
    #[must_use]
    pub fn has_staged_changes(&self) -> bool {
        self.quiet_diff(&["diff", "--cached", "--quiet"])
    }

    /// Whether the working tree differs from `HEAD` (tracked files only).
    #[must_use]
    pub fn has_worktree_changes(&self) -> bool {
        self.quiet_diff(&["diff", "--quiet", "HEAD"])
    }

    /// Resolve the comparison range from explicit selectors, falling back
    /// through the documented precedence chain.
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] when an explicit revision fails to
    /// resolve, or when the implicit fallback needs `HEAD^` and history is
    /// too shallow.
    pub fn resolve_range(
        &self,
        explicit_range: Option<&str>,
        explicit_rev: Option<&str>,
        staged: bool,
        worktree: bool,
    ) -> Result<CompareRange, GateError> {
        if let Some(range) = explicit_range {
            let (base, head) = range.split_once("..").ok_or_else(|| GateError::GitUnavailable {
                details: format!("range '{range}' must be BASE..HEAD"),
            })?;
            return Ok(CompareRange::Commits {
                base: self.rev_parse(base)?,
                head: self.rev_parse(head)?,
            });
        }
        if let Some(rev) = explicit_rev {
            let head = self.rev_parse(rev)?;
            let base = self.rev_parse(&format!("{head}^"))?;
            return Ok(CompareRange::Commits { base, head });
        }
        if staged {
            return Ok(CompareRange::Staged);
        }
        if worktree {
            return Ok(CompareRange::WorkTree);
        }
        // Implicit: prefer pending changes, else "since last commit".
        if self.has_staged_changes() {
            debug!("resolve_range: staged changes present");
            return Ok(CompareRange::Staged);
        }
        if self.has_worktree_changes() {
            debug!("resolve_range: working tree dirty");
            return Ok(CompareRange::WorkTree);
        }
        Ok(CompareRange::Commits {
            base: self.rev_parse("HEAD^")?,
            head: self.rev_parse("HEAD")?,
        })
    }

    /// Files touched in the range, as repo-relative paths.
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] on git failure.
    pub fn changed_files(&self, range: &CompareRange) -> Result<Vec<String>, GateError> {
        let output = match range {
            CompareRange::Commits { base, head } => {
                self.run_ok(&["diff", "--name-only", base, head])?
            }
            CompareRange::Staged => self.run_ok(&["diff", "--name-only", "--cached"])?,
            CompareRange::WorkTree => self.run_ok(&["diff", "--name-only", "HEAD"])?,
        };
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Structural diff hunks for one file in the range (zero context).
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] on git failure.
    pub fn diff_hunks(&self, range: &CompareRange, path: &str) -> Result<Vec<Hunk>, GateError> {
        let output = match range {
            CompareRange::Commits { base, head } => {
                self.run_ok(&["diff", "-U0", "--no-color", base, head, "--", path])?
            }
            CompareRange::Staged => {
                self.run_ok(&["diff", "-U0", "--no-color", "--cached", "--", path])?
            }
            CompareRange::WorkTree => {
                self.run_ok(&["diff", "-U0", "--no-color", "HEAD", "--", path])?
            }
        };
        Ok(output.lines().filter_map(parse_hunk_header).collect())
    }

    /// Read one side of a file in the range. `Ok(None)` means the file is
    /// absent on that side.
    ///
    /// # Errors
    ///
    /// [`GateError::GitUnavailable`] only for working-tree reads that fail
    /// for reasons other than absence; object reads treat any git failure
    /// as absence (the object either exists or it does not).
    pub fn read_side(
        &self,
        range: &CompareRange,
        side: Side,
        path: &str,
    ) -> Result<Option<Vec<u8>>, GateError> {
        match (range, side) {
            (CompareRange::Commits { base, .. }, Side::Before) => self.show(&format!("{base}:{path}")),
            (CompareRange::Commits { head, .. }, Side::After) => self.show(&format!("{head}:{path}")),
            (CompareRange::Staged | CompareRange::WorkTree, Side::Before) => {
                self.show(&format!("HEAD:{path}"))
            }
            (CompareRange::Staged, Side::After) => self.show(&format!(":0:{path}")),
            (CompareRange::WorkTree, Side::After) => {
                match std::fs::read(self.workdir.join(path)) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(GateError::GitUnavailable {
                        details: format!("cannot read {path}: {e}"),
                    }),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn show(&self, spec: &str) -> Result<Option<Vec<u8>>, GateError> {
        let out = self.run(&["show", spec])?;
        if out.status.success() {
            Ok(Some(out.stdout))
        } else {
            debug!(spec, "git show reported absence");
            Ok(None)
        }
    }

    fn quiet_diff(&self, args: &[&str]) -> bool {
        // `--quiet` exits 1 when differences exist; any other failure reads
        // as "no data" for these advisory probes.
        self.run(args)
            .map(|out| out.status.code() == Some(1))
            .unwrap_or(false)
    }

    fn run(&self, args: &[&str]) -> Result<Output, GateError> {
        Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .map_err(|e| GateError::GitUnavailable {
                details: format!("git {}: {e}", args.join(" ")),
            })
    }

    fn run_ok(&self, args: &[&str]) -> Result<String, GateError> {
        let out = self.run(args)?;
        if !out.status.success() {
            return Err(GateError::GitUnavailable {
                details: format!(
                    "git {} failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }
        String::from_utf8(out.stdout).map_err(|e| GateError::GitUnavailable {
            details: format!("git {} produced non-UTF8 output: {e}", args.join(" ")),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Hunk header parsing (no repository required)
    // -----------------------------------------------------------------------

    #[test]
    fn parses_full_hunk_header() {
        let hunk = parse_hunk_header("@@ -10,3 +10,5 @@ fn main() {").expect("parse");
        assert_eq!(hunk.old_start, 10);
        assert_eq!(hunk.old_count, 3);
        assert_eq!(hunk.new_start, 10);
        assert_eq!(hunk.new_count, 5);
        assert_eq!(hunk.delta(), 2);
    }

    #[test]
    fn parses_singleton_counts() {
        // Omitted count means 1.
        let hunk = parse_hunk_header("@@ -7 +7 @@").expect("parse");
        assert_eq!(hunk.old_count, 1);
        assert_eq!(hunk.new_count, 1);
        assert_eq!(hunk.delta(), 0);
    }

    #[test]
    fn parses_pure_insertion_and_deletion() {
        let insertion = parse_hunk_header("@@ -5,0 +6,2 @@").expect("parse");
        assert_eq!(insertion.old_count, 0);
        assert_eq!(insertion.delta(), 2);

        let deletion = parse_hunk_header("@@ -6,2 +5,0 @@").expect("parse");
        assert_eq!(deletion.new_count, 0);
        assert_eq!(deletion.delta(), -2);
    }

    #[test]
    fn rejects_non_hunk_lines() {
        for line in [
            "diff --git a/x b/x",
            "+++ b/x",
            "--- a/x",
            "+added line",
            "@@ malformed @@",
            "",
        ] {
            assert!(parse_hunk_header(line).is_none(), "accepted: {line}");
        }
    }

    #[test]
    fn hunk_display_is_compact() {
        let hunk = Hunk {
            old_start: 1,
            old_count: 2,
            new_start: 1,
            new_count: 4,
        };
        assert_eq!(hunk.to_string(), "-1,2 +1,4");
    }

    // -----------------------------------------------------------------------
    // Repository-backed tests (skipped when git is unavailable)
    // -----------------------------------------------------------------------

    fn init_repo() -> Option<(tempfile::TempDir, GitRepo)> {
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
        run(&["config", "user.email", "test@example.com"])?;
        run(&["config", "user.name", "Test"])?;
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").ok()?;
        run(&["add", "."])?;
        run(&["commit", "-q", "-m", "initial"])?;
        let repo = GitRepo::open(dir.path()).ok()?;
        Some((dir, repo))
    }

    #[test]
    fn worktree_change_is_detected_and_diffed() {
        let Some((dir, repo)) = init_repo() else {
            eprintln!("git unavailable; skipping");
            return;
        };
        std::fs::write(dir.path().join("a.txt"), "one\ntwo!\nthree\n").expect("write");

        assert!(repo.has_worktree_changes());
        let range = repo
            .resolve_range(None, None, false, false)
            .expect("resolve");
        assert_eq!(range, CompareRange::WorkTree);

        let files = repo.changed_files(&range).expect("changed files");
        assert_eq!(files, vec!["a.txt"]);

        let hunks = repo.diff_hunks(&range, "a.txt").expect("hunks");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start, 2);
        assert_eq!(hunks[0].delta(), 0);

        let before = repo
            .read_side(&range, Side::Before, "a.txt")
            .expect("before")
            .expect("present");
        assert_eq!(before, b"one\ntwo\nthree\n");
        let after = repo
            .read_side(&range, Side::After, "a.txt")
            .expect("after")
            .expect("present");
        assert_eq!(after, b"one\ntwo!\nthree\n");
    }

    #[test]
    fn absent_file_reads_as_none() {
        let Some((_dir, repo)) = init_repo() else {
            eprintln!("git unavailable; skipping");
            return;
        };
        let range = CompareRange::WorkTree;
        assert!(repo
            .read_side(&range, Side::After, "missing.txt")
            .expect("read")
            .is_none());
        assert!(repo
            .read_side(&range, Side::Before, "missing.txt")
            .expect("read")
            .is_none());
    }

    #[test]
    fn explicit_range_resolution_rejects_bad_syntax() {
        let Some((_dir, repo)) = init_repo() else {
            eprintln!("git unavailable; skipping");
            return;
        };
        let err = repo
            .resolve_range(Some("HEAD"), None, false, false)
            .unwrap_err();
        assert!(err.to_string().contains("BASE..HEAD"));
    }

    #[test]
    fn staged_takes_precedence_over_worktree() {
        let Some((dir, repo)) = init_repo() else {
            eprintln!("git unavailable; skipping");
            return;
        };
        std::fs::write(dir.path().join("a.txt"), "staged\n").expect("write");
        Command::new("git")
            .current_dir(dir.path())
            .args(["add", "a.txt"])
            .output()
            .expect("git add");
        // Dirty the tree on top of the staged change.
        std::fs::write(dir.path().join("a.txt"), "tree\n").expect("write");

        let range = repo
            .resolve_range(None, None, false, false)
            .expect("resolve");
        assert_eq!(range, CompareRange::Staged);

        let after = repo
            .read_side(&range, Side::After, "a.txt")
            .expect("after")
            .expect("present");
        assert_eq!(after, b"staged\n", "staged side reads the index, not the tree");
    }
}
