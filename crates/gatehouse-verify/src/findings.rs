//! Structured, deduplicated verification findings.
//!
//! Every verifier produces a flat list of findings instead of failing on
//! the first problem: callers get the whole picture in one run. Findings
//! carry the stable [`ErrorCode`] so agents can branch on them.

use gatehouse_core::error::{ErrorCode, ErrorKind};
use serde::Serialize;
use std::fmt;

/// Finding severity. Errors fail the verification; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One verification finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Finding {
    pub severity: Severity,
    pub code: ErrorCode,
    /// The file, contract, or other subject the finding is about.
    pub target: Option<String>,
    pub detail: String,
}

impl Serialize for Finding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Finding", 5)?;
        s.serialize_field("severity", &self.severity)?;
        s.serialize_field("code", self.code.code())?;
        s.serialize_field("kind", self.code.kind().as_str())?;
        s.serialize_field("target", &self.target)?;
        s.serialize_field("detail", &self.detail)?;
        s.end()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.target {
            Some(target) => write!(f, "{sev}[{}] {target}: {}", self.code, self.detail),
            None => write!(f, "{sev}[{}] {}", self.code, self.detail),
        }
    }
}

/// An accumulating, deduplicating finding list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Findings {
    items: Vec<Finding>,
}

impl Findings {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record an error finding.
    pub fn error(&mut self, code: ErrorCode, target: Option<&str>, detail: impl Into<String>) {
        self.push(Finding {
            severity: Severity::Error,
            code,
            target: target.map(ToString::to_string),
            detail: detail.into(),
        });
    }

    /// Record a warning finding.
    pub fn warning(&mut self, code: ErrorCode, target: Option<&str>, detail: impl Into<String>) {
        self.push(Finding {
            severity: Severity::Warning,
            code,
            target: target.map(ToString::to_string),
            detail: detail.into(),
        });
    }

    /// Push a finding, dropping exact duplicates.
    pub fn push(&mut self, finding: Finding) {
        if !self.items.contains(&finding) {
            self.items.push(finding);
        }
    }

    /// Absorb another finding list (still deduplicating).
    pub fn extend(&mut self, other: Self) {
        for finding in other.items {
            self.push(finding);
        }
    }

    /// True when no error-severity finding was recorded.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.items.iter().any(|f| f.severity == Severity::Error)
    }

    #[must_use]
    pub fn errors(&self) -> Vec<&Finding> {
        self.items
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .collect()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<&Finding> {
        self.items
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .collect()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_findings_pass() {
        let findings = Findings::new();
        assert!(findings.passed());
        assert!(findings.is_empty());
    }

    #[test]
    fn warnings_do_not_fail() {
        let mut findings = Findings::new();
        findings.warning(ErrorCode::CrlfNormalized, Some("src/a.rs"), "CRLF input");
        assert!(findings.passed());
        assert_eq!(findings.warnings().len(), 1);
        assert!(findings.errors().is_empty());
    }

    #[test]
    fn errors_fail() {
        let mut findings = Findings::new();
        findings.error(ErrorCode::RailsViolation, Some("src/a.rs"), "hunk at 25");
        assert!(!findings.passed());
        assert_eq!(findings.errors().len(), 1);
    }

    #[test]
    fn exact_duplicates_collapse() {
        let mut findings = Findings::new();
        for _ in 0..3 {
            findings.error(ErrorCode::MissingCoverage, Some("src/b.rs"), "no entry");
        }
        assert_eq!(findings.len(), 1);

        // A different detail is a different finding.
        findings.error(ErrorCode::MissingCoverage, Some("src/b.rs"), "other detail");
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn display_includes_code_and_target() {
        let mut findings = Findings::new();
        findings.error(ErrorCode::RailsViolation, Some("src/a.rs"), "hunk at 25");
        let text = findings.iter().next().expect("one").to_string();
        assert!(text.contains("E3104"));
        assert!(text.contains("src/a.rs"));
    }

    #[test]
    fn serialize_carries_kind() {
        let mut findings = Findings::new();
        findings.error(ErrorCode::PreImageMismatch, Some("f"), "d");
        let json = serde_json::to_value(&findings).expect("serialize");
        assert_eq!(json[0]["code"], "E3102");
        assert_eq!(json[0]["kind"], "integrity");
        assert_eq!(json[0]["severity"], "error");
    }
}
