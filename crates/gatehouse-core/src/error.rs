use std::fmt;

/// The four failure families every gatehouse error belongs to.
///
/// - `Validation`: malformed/incomplete/inconsistent input artifact; the
///   caller fixes the artifact and retries.
/// - `Sequence`: a required prior gate is missing or a timing constraint is
///   violated; recoverable only by performing the missing gate or waiting.
/// - `Integrity`: repository state disagrees with declared evidence; must
///   halt, never auto-corrected.
/// - `Environment`: version-control tool or filesystem unavailable;
///   retryable by the caller, never auto-retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Sequence,
    Integrity,
    Environment,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Sequence => "sequence",
            Self::Integrity => "integrity",
            Self::Environment => "environment",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ArtifactIncomplete,
    ArtifactInconsistent,
    InvalidWorkItemId,
    TokenGrammarError,
    ConfirmationRequired,
    MissingGate,
    MomentumViolation,
    DuplicateSignature,
    MissingRefinement,
    RefinementFrozen,
    LedgerCorrupt,
    TargetMissing,
    PreImageMismatch,
    PostImageMismatch,
    RailsViolation,
    LineDeltaMismatch,
    MissingCoverage,
    UndeclaredChange,
    ChecklistIncomplete,
    ChecklistAutoInferred,
    CrlfNormalized,
    CapabilityRemoved,
    ContractRemoved,
    SchemaDigestChanged,
    DuplicateRegistryId,
    ContractGrammarError,
    SnapshotNondeterministic,
    WhitelistViolation,
    InputMissing,
    UnparseablePointer,
    MalformedSubDocument,
    GitUnavailable,
    LedgerWriteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ArtifactIncomplete => "E1101",
            Self::ArtifactInconsistent => "E1102",
            Self::InvalidWorkItemId => "E1103",
            Self::TokenGrammarError => "E1104",
            Self::ConfirmationRequired => "E1105",
            Self::MissingGate => "E2001",
            Self::MomentumViolation => "E2002",
            Self::DuplicateSignature => "E2003",
            Self::MissingRefinement => "E2004",
            Self::RefinementFrozen => "E2005",
            Self::LedgerCorrupt => "E3001",
            Self::TargetMissing => "E3101",
            Self::PreImageMismatch => "E3102",
            Self::PostImageMismatch => "E3103",
            Self::RailsViolation => "E3104",
            Self::LineDeltaMismatch => "E3105",
            Self::MissingCoverage => "E3106",
            Self::UndeclaredChange => "E3107",
            Self::ChecklistIncomplete => "E3108",
            Self::ChecklistAutoInferred => "E3109",
            Self::CrlfNormalized => "E3110",
            Self::CapabilityRemoved => "E3201",
            Self::ContractRemoved => "E3202",
            Self::SchemaDigestChanged => "E3203",
            Self::DuplicateRegistryId => "E3204",
            Self::ContractGrammarError => "E3205",
            Self::SnapshotNondeterministic => "E3301",
            Self::WhitelistViolation => "E4001",
            Self::InputMissing => "E4002",
            Self::UnparseablePointer => "E4003",
            Self::MalformedSubDocument => "E4004",
            Self::GitUnavailable => "E5001",
            Self::LedgerWriteFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// The failure family this code belongs to.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::NotInitialized
            | Self::ConfigParseError
            | Self::ArtifactIncomplete
            | Self::ArtifactInconsistent
            | Self::InvalidWorkItemId
            | Self::TokenGrammarError
            | Self::ConfirmationRequired
            | Self::ChecklistIncomplete
            | Self::ChecklistAutoInferred
            | Self::DuplicateRegistryId
            | Self::ContractGrammarError
            | Self::WhitelistViolation
            | Self::UnparseablePointer
            | Self::MalformedSubDocument => ErrorKind::Validation,
            Self::MissingGate
            | Self::MomentumViolation
            | Self::DuplicateSignature
            | Self::MissingRefinement
            | Self::RefinementFrozen => ErrorKind::Sequence,
            Self::LedgerCorrupt
            | Self::TargetMissing
            | Self::PreImageMismatch
            | Self::PostImageMismatch
            | Self::RailsViolation
            | Self::LineDeltaMismatch
            | Self::MissingCoverage
            | Self::UndeclaredChange
            | Self::CrlfNormalized
            | Self::CapabilityRemoved
            | Self::ContractRemoved
            | Self::SchemaDigestChanged
            | Self::SnapshotNondeterministic => ErrorKind::Integrity,
            Self::InputMissing
            | Self::GitUnavailable
            | Self::LedgerWriteFailed
            | Self::InternalUnexpected => ErrorKind::Environment,
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ArtifactIncomplete => "Refinement artifact incomplete",
            Self::ArtifactInconsistent => "Refinement artifact inconsistent",
            Self::InvalidWorkItemId => "Invalid work item ID",
            Self::TokenGrammarError => "Signature token grammar error",
            Self::ConfirmationRequired => "Confirmation required",
            Self::MissingGate => "Required prior gate missing",
            Self::MomentumViolation => "Gate recorded too soon after previous gate",
            Self::DuplicateSignature => "Signature token already consumed",
            Self::MissingRefinement => "No refinement on record",
            Self::RefinementFrozen => "Refinement already signed and frozen",
            Self::LedgerCorrupt => "Gate ledger corrupt",
            Self::TargetMissing => "Manifest target absent in after state",
            Self::PreImageMismatch => "Pre-image hash mismatch",
            Self::PostImageMismatch => "Post-image hash mismatch",
            Self::RailsViolation => "Diff hunk outside declared window",
            Self::LineDeltaMismatch => "Net line delta mismatch",
            Self::MissingCoverage => "Changed file has no manifest entry",
            Self::UndeclaredChange => "File changed outside declared scope",
            Self::ChecklistIncomplete => "Judgment checklist item unchecked",
            Self::ChecklistAutoInferred => "Mechanical checklist item auto-inferred",
            Self::CrlfNormalized => "CRLF line endings normalized before hashing",
            Self::CapabilityRemoved => "Published capability removed",
            Self::ContractRemoved => "Published contract removed",
            Self::SchemaDigestChanged => "Published contract schema digest changed",
            Self::DuplicateRegistryId => "Duplicate registry identifier",
            Self::ContractGrammarError => "Contract ID grammar error",
            Self::SnapshotNondeterministic => "Snapshot rebuild differed byte-for-byte",
            Self::WhitelistViolation => "Read outside snapshot whitelist",
            Self::InputMissing => "Whitelisted snapshot input absent",
            Self::UnparseablePointer => "Dynamic pointer does not resolve",
            Self::MalformedSubDocument => "Sub-document failed structural parsing",
            Self::GitUnavailable => "Version-control tool unavailable",
            Self::LedgerWriteFailed => "Ledger file write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `gate init` to initialize this repository."),
            Self::ConfigParseError => Some("Fix syntax in .gatehouse/config.toml and retry."),
            Self::ArtifactIncomplete => {
                Some("Add the missing labeled fields to the refinement artifact.")
            }
            Self::ArtifactInconsistent => {
                Some("Coverage PASS requires Enrichment-Needed: no, and vice versa.")
            }
            Self::InvalidWorkItemId => Some("Use 2-64 chars of [A-Za-z0-9._-]."),
            Self::TokenGrammarError => {
                Some("Tokens are {actor}{DDMMYYYYHHMM} with a calendar-valid stamp.")
            }
            Self::ConfirmationRequired => Some("Re-run with --confirm to archive and reset."),
            Self::MissingGate => Some("Perform the missing prior gate first."),
            Self::MomentumViolation => Some("Wait out the minimum interval and retry."),
            Self::DuplicateSignature => Some("Issue a fresh token; consumed tokens never revive."),
            Self::MissingRefinement => Some("Run `gate refine` before `gate sign`."),
            Self::RefinementFrozen => Some("Reset the work item to start a new refinement."),
            Self::LedgerCorrupt => Some("Inspect the .events file; restore from VCS history."),
            Self::TargetMissing | Self::PreImageMismatch | Self::PostImageMismatch => {
                Some("Re-derive the manifest from the actual repository states.")
            }
            Self::RailsViolation => Some("Widen the declared window or revert the stray hunk."),
            Self::LineDeltaMismatch => Some("Recount insertions minus deletions for the file."),
            Self::MissingCoverage => Some("Add a manifest block for every changed file."),
            Self::UndeclaredChange => Some("Add a manifest block or an explicit waiver."),
            Self::ChecklistIncomplete => {
                Some("Judgment items must be marked explicitly; they are never inferred.")
            }
            Self::ChecklistAutoInferred | Self::CrlfNormalized => None,
            Self::CapabilityRemoved | Self::ContractRemoved => {
                Some("Published registry entries are append-only; restore the entry.")
            }
            Self::SchemaDigestChanged => {
                Some("Publish a new contract version instead of mutating the schema.")
            }
            Self::DuplicateRegistryId => Some("Registry IDs must be unique within the document."),
            Self::ContractGrammarError => Some("Use KIND:CAPABILITY:NAME:VERSION."),
            Self::SnapshotNondeterministic => {
                Some("Report a bug: snapshot serialization must be deterministic.")
            }
            Self::WhitelistViolation => None,
            Self::InputMissing => Some("Create the missing input or run `gate init`."),
            Self::UnparseablePointer => {
                Some("Point .gatehouse/policy at exactly one readable document.")
            }
            Self::MalformedSubDocument => None,
            Self::GitUnavailable => Some("Install git and run inside a repository."),
            Self::LedgerWriteFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed error for gate operations.
///
/// Every variant maps to one [`ErrorCode`] (and through it to one
/// [`ErrorKind`]); `anyhow` wraps these at the application boundary.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("project not initialized (no .gatehouse directory found)")]
    NotInitialized,

    #[error("refinement artifact incomplete: missing field '{field}'")]
    ArtifactIncomplete { field: String },

    #[error("refinement artifact inconsistent: {details}")]
    ArtifactInconsistent { details: String },

    #[error("invalid work item ID '{raw}'")]
    InvalidWorkItemId { raw: String },

    #[error("cannot read artifact {path}: {source}")]
    ArtifactUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signature token '{raw}': {details}")]
    TokenGrammar { raw: String, details: String },

    #[error("reset requires explicit confirmation")]
    ConfirmationRequired,

    #[error("cannot record {attempted}: required prior gate {required} missing")]
    MissingGate {
        attempted: crate::event::GateType,
        required: crate::event::GateType,
    },

    #[error("momentum violation: {elapsed_secs}s elapsed, {required_secs}s required")]
    MomentumViolation {
        elapsed_secs: i64,
        required_secs: i64,
    },

    #[error("signature token already consumed: '{token}'")]
    DuplicateSignature { token: String },

    #[error("no refinement on record for work item '{work_item}'")]
    MissingRefinement { work_item: String },

    #[error("refinement for '{work_item}' is signed and frozen")]
    RefinementFrozen { work_item: String },

    #[error("gate ledger corrupt at {path}:{line}: {details}")]
    LedgerCorrupt {
        path: String,
        line: usize,
        details: String,
    },

    #[error("version-control tool unavailable: {details}")]
    GitUnavailable { details: String },

    #[error("ledger write failed for {path}: {source}")]
    LedgerWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GateError {
    /// The stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::ArtifactIncomplete { .. } => ErrorCode::ArtifactIncomplete,
            Self::ArtifactInconsistent { .. } => ErrorCode::ArtifactInconsistent,
            Self::InvalidWorkItemId { .. } => ErrorCode::InvalidWorkItemId,
            Self::ArtifactUnreadable { .. } => ErrorCode::InputMissing,
            Self::TokenGrammar { .. } => ErrorCode::TokenGrammarError,
            Self::ConfirmationRequired => ErrorCode::ConfirmationRequired,
            Self::MissingGate { .. } => ErrorCode::MissingGate,
            Self::MomentumViolation { .. } => ErrorCode::MomentumViolation,
            Self::DuplicateSignature { .. } => ErrorCode::DuplicateSignature,
            Self::MissingRefinement { .. } => ErrorCode::MissingRefinement,
            Self::RefinementFrozen { .. } => ErrorCode::RefinementFrozen,
            Self::LedgerCorrupt { .. } => ErrorCode::LedgerCorrupt,
            Self::GitUnavailable { .. } => ErrorCode::GitUnavailable,
            Self::LedgerWrite { .. } => ErrorCode::LedgerWriteFailed,
        }
    }

    /// The failure family, derived from the code.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}
