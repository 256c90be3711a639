//! One-time signature tokens.
//!
//! A signature token is `{actor}{DDMMYYYYHHMM}` — a human actor handle
//! followed by a minute-resolution timestamp. Tokens are globally
//! one-time-use: once consumed they are recorded in the append-only audit
//! ledger (`.gatehouse/tokens.log`) and never accepted again, for any work
//! item.
//!
//! The audit ledger is the authoritative consumed-token set. A corpus-wide
//! text search (`git grep`) runs as an advisory backstop only; it warns,
//! never blocks, and its unavailability is non-fatal.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::model::WorkItemId;

/// Length of the `DDMMYYYYHHMM` stamp suffix.
const STAMP_LEN: usize = 12;

/// Maximum actor handle length.
const MAX_ACTOR_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Token grammar
// ---------------------------------------------------------------------------

/// A parsed, grammar-valid signature token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureToken {
    raw: String,
    actor: String,
}

impl SignatureToken {
    /// Parse and validate `{actor}{DDMMYYYYHHMM}`.
    ///
    /// The actor is 2-32 chars of `[a-z][a-z0-9-]*`; the stamp must be a
    /// calendar-valid day/month/year and a valid hour/minute.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::TokenGrammar`] describing the first violation.
    pub fn parse(raw: &str) -> Result<Self, GateError> {
        let grammar_err = |details: &str| GateError::TokenGrammar {
            raw: raw.to_string(),
            details: details.to_string(),
        };

        if raw.len() <= STAMP_LEN {
            return Err(grammar_err("too short for an actor plus a 12-digit stamp"));
        }
        let (actor, stamp) = raw.split_at(raw.len() - STAMP_LEN);

        if actor.len() < 2 || actor.len() > MAX_ACTOR_LEN {
            return Err(grammar_err("actor must be 2-32 characters"));
        }
        let mut chars = actor.chars();
        let leading_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        if !leading_ok
            || !actor
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(grammar_err("actor must match [a-z][a-z0-9-]*"));
        }

        if !stamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(grammar_err("stamp must be 12 digits (DDMMYYYYHHMM)"));
        }
        let day: u32 = stamp[0..2].parse().map_err(|_| grammar_err("bad day"))?;
        let month: u32 = stamp[2..4].parse().map_err(|_| grammar_err("bad month"))?;
        let year: i32 = stamp[4..8].parse().map_err(|_| grammar_err("bad year"))?;
        let hour: u32 = stamp[8..10].parse().map_err(|_| grammar_err("bad hour"))?;
        let minute: u32 = stamp[10..12].parse().map_err(|_| grammar_err("bad minute"))?;

        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(grammar_err("stamp is not a valid calendar date"));
        }
        if hour > 23 || minute > 59 {
            return Err(grammar_err("stamp hour/minute out of range"));
        }

        Ok(Self {
            raw: raw.to_string(),
            actor: actor.to_string(),
        })
    }

    /// The full token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The actor handle prefix.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }
}

// ---------------------------------------------------------------------------
// Audit ledger
// ---------------------------------------------------------------------------

/// One consumed-token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub consumed_at_us: i64,
    pub work_item_id: String,
}

/// The append-only consumed-token audit ledger.
///
/// Line format: `token \t wall_ts_us \t work_item_id`. Lines starting with
/// `#` are comments. Malformed tails are tolerated: the leading token field
/// still counts as consumed (conservative reading).
#[derive(Debug, Clone)]
pub struct TokenAudit {
    path: PathBuf,
}

impl TokenAudit {
    /// An audit ledger at the given path. The file need not exist yet.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load every record. A missing file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LedgerWrite`]-adjacent I/O failures via
    /// [`GateError::LedgerCorrupt`] only for unreadable files; malformed
    /// lines degrade to partial records with a warning.
    pub fn load(&self) -> Result<Vec<TokenRecord>, GateError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| GateError::LedgerCorrupt {
                path: self.path.display().to_string(),
                line: 0,
                details: e.to_string(),
            })?;

        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split('\t');
            let Some(token) = parts.next().filter(|t| !t.is_empty()) else {
                continue;
            };
            let consumed_at_us = parts.next().and_then(|t| t.parse().ok()).unwrap_or_else(|| {
                warn!(line = i + 1, "token audit line missing timestamp");
                0
            });
            let work_item_id = parts.next().unwrap_or("").to_string();
            records.push(TokenRecord {
                token: token.to_string(),
                consumed_at_us,
                work_item_id,
            });
        }
        Ok(records)
    }

    /// Whether `token` appears in the audit ledger.
    ///
    /// # Errors
    ///
    /// Propagates unreadable-ledger failures; a missing ledger reads as
    /// "not consumed".
    pub fn is_consumed(&self, token: &str) -> Result<bool, GateError> {
        Ok(self.load()?.iter().any(|r| r.token == token))
    }

    /// Append a consumed-token record. Creates the file (with a comment
    /// header) on first use.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LedgerWrite`] on I/O failure.
    pub fn record(
        &self,
        token: &SignatureToken,
        consumed_at_us: i64,
        work_item_id: &WorkItemId,
    ) -> Result<(), GateError> {
        let to_write_err = |source: std::io::Error| GateError::LedgerWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(to_write_err)?;
        }
        let mut content = if self.path.exists() {
            String::new()
        } else {
            "# gatehouse consumed tokens v1\n# fields: token \\t wall_ts_us \\t work_item_id\n"
                .to_string()
        };
        content.push_str(&format!(
            "{}\t{}\t{}\n",
            token.as_str(),
            consumed_at_us,
            work_item_id
        ));

        use std::io::Write as _;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_write_err)?;
        file.write_all(content.as_bytes()).map_err(to_write_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Advisory corpus scan
// ---------------------------------------------------------------------------

/// Search the tracked corpus for a token with `git grep` (advisory).
///
/// Returns `Ok(true)` when the token appears in tracked content outside the
/// audit ledger itself. Any git failure degrades to `Ok(false)` with a
/// warning: this check never blocks and never substitutes for the audit
/// ledger.
#[must_use]
pub fn corpus_contains_token(project_root: &Path, token: &str) -> bool {
    let output = Command::new("git")
        .current_dir(project_root)
        .args([
            "grep",
            "-F",
            "-l",
            token,
            "--",
            ".",
            ":(exclude).gatehouse/tokens.log",
        ])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let hits = String::from_utf8_lossy(&out.stdout);
            let found = !hits.trim().is_empty();
            if found {
                debug!(files = %hits.trim(), "advisory corpus scan found token");
            }
            found
        }
        // Exit code 1 is git grep's "no match".
        Ok(out) if out.status.code() == Some(1) => false,
        Ok(out) => {
            warn!(
                status = %out.status,
                "advisory corpus scan failed; continuing without it"
            );
            false
        }
        Err(e) => {
            warn!(error = %e, "git unavailable for advisory corpus scan");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
