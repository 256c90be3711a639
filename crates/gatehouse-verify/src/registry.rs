//! The capability/contract registry drift guard.
//!
//! The registry (`.gatehouse/registry.toml`) publishes capabilities and the
//! contracts they own. Published entries are append-only: no capability or
//! contract is ever removed, and a contract's schema digest is immutable
//! once published. The digest is computed over a canonicalized structural
//! form, so cosmetic TOML formatting never false-positives.
//!
//! The baseline comes from a reference revision; an absent baseline is
//! treated as empty (everything in the current document is newly
//! published).

use std::collections::BTreeMap;

use gatehouse_core::error::{ErrorCode, GateError};
use gatehouse_core::event::canonical::canonicalize_json;
use serde::Deserialize;
use tracing::debug;

use crate::findings::Findings;
use crate::git::GitRepo;

/// Accepted contract kind discriminators.
pub const CONTRACT_KINDS: [&str; 4] = ["ROLE", "EVENT", "CMD", "QUERY"];

// ---------------------------------------------------------------------------
// Contract id grammar
// ---------------------------------------------------------------------------

/// A parsed contract id: `KIND:CAPABILITY:NAME:VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractId {
    pub kind: String,
    pub capability: String,
    pub name: String,
    pub version: u32,
}

impl ContractId {
    /// Parse and validate the fixed contract-id grammar.
    ///
    /// - `KIND`: one of [`CONTRACT_KINDS`]
    /// - `CAPABILITY`: a capability id (`[A-Za-z][A-Za-z0-9_-]*`)
    /// - `NAME`: `[A-Z][A-Z0-9_]*`
    /// - `VERSION`: a positive integer
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violation.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let parts: Vec<&str> = raw.split(':').collect();
        let [kind, capability, name, version] = parts.as_slice() else {
            return Err(format!(
                "'{raw}' must have 4 segments KIND:CAPABILITY:NAME:VERSION"
            ));
        };

        if !CONTRACT_KINDS.contains(kind) {
            return Err(format!(
                "unknown kind '{kind}': expected one of {}",
                CONTRACT_KINDS.join(", ")
            ));
        }
        if !is_capability_id(capability) {
            return Err(format!("invalid owning capability '{capability}'"));
        }
        let mut chars = name.chars();
        let name_ok = chars.next().is_some_and(|c| c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !name_ok {
            return Err(format!("invalid name '{name}': want [A-Z][A-Z0-9_]*"));
        }
        let version: u32 = version
            .parse()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| format!("invalid version '{version}': want a positive integer"))?;

        Ok(Self {
            kind: (*kind).to_string(),
            capability: (*capability).to_string(),
            name: (*name).to_string(),
            version,
        })
    }
}

/// Capability id grammar shared by declarations and contract ids.
#[must_use]
pub fn is_capability_id(raw: &str) -> bool {
    let mut chars = raw.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// One declared capability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapabilityDecl {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One declared contract. The owning capability is encoded in the id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContractDecl {
    pub id: String,
    /// Structural schema; the digest is computed over its canonical form.
    #[serde(default)]
    pub schema: Option<toml::Value>,
}

impl ContractDecl {
    /// Canonical-form content digest of the contract schema.
    ///
    /// The TOML structure is converted to JSON, canonicalized (sorted keys,
    /// compact), and hashed — so reformatting the TOML, reordering keys, or
    /// changing comments never changes the digest.
    #[must_use]
    pub fn schema_digest(&self) -> String {
        let value = self
            .schema
            .as_ref()
            .and_then(|schema| serde_json::to_value(schema).ok())
            .unwrap_or(serde_json::Value::Null);
        let canonical = canonicalize_json(&value);
        format!("blake3:{}", blake3::hash(canonical.as_bytes()).to_hex())
    }
}

/// A parsed registry document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistryDoc {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<CapabilityDecl>,
    #[serde(default, rename = "contract")]
    pub contracts: Vec<ContractDecl>,
}

/// Registry load/parse failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry document parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Git(#[from] GateError),
}

impl RegistryDoc {
    /// Parse a registry document from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for malformed TOML.
    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        Ok(toml::from_str(text)?)
    }

    /// Contract digests keyed by contract id.
    #[must_use]
    pub fn digests(&self) -> BTreeMap<&str, String> {
        self.contracts
            .iter()
            .map(|c| (c.id.as_str(), c.schema_digest()))
            .collect()
    }
}

/// Load the baseline registry from a reference revision.
///
/// Returns `Ok(None)` when the reference has no registry document (the
/// baseline is then treated as empty).
///
/// # Errors
///
/// [`RegistryError::Parse`] when the baseline exists but is malformed —
/// a malformed baseline must halt the check, not silently pass it.
pub fn load_baseline(repo: &GitRepo, reference: &str) -> Result<Option<RegistryDoc>, RegistryError> {
    let spec = format!(
        "{reference}:{}",
        gatehouse_core::paths::GatehousePaths::registry_relative()
    );
    let out = std::process::Command::new("git")
        .current_dir(repo.workdir())
        .args(["show", &spec])
        .output()
        .map_err(|e| {
            RegistryError::Git(GateError::GitUnavailable {
                details: format!("git show {spec}: {e}"),
            })
        })?;
    if !out.status.success() {
        debug!(%spec, "no baseline registry at reference; treating as empty");
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&out.stdout);
    Ok(Some(RegistryDoc::parse(&text)?))
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Validate the current document in isolation: id uniqueness, contract-id
/// grammar, and that every contract's owning capability is declared.
#[must_use]
pub fn check_document(current: &RegistryDoc) -> Findings {
    let mut findings = Findings::new();

    let mut seen_caps = BTreeMap::new();
    for cap in &current.capabilities {
        if !is_capability_id(&cap.id) {
            findings.error(
                ErrorCode::ContractGrammarError,
                Some(&cap.id),
                "invalid capability id",
            );
        }
        if seen_caps.insert(cap.id.as_str(), ()).is_some() {
            findings.error(
                ErrorCode::DuplicateRegistryId,
                Some(&cap.id),
                "capability declared more than once",
            );
        }
    }

    let mut seen_contracts = BTreeMap::new();
    for contract in &current.contracts {
        if seen_contracts.insert(contract.id.as_str(), ()).is_some() {
            findings.error(
                ErrorCode::DuplicateRegistryId,
                Some(&contract.id),
                "contract declared more than once",
            );
        }
        match ContractId::parse(&contract.id) {
            Err(details) => {
                findings.error(ErrorCode::ContractGrammarError, Some(&contract.id), details);
            }
            Ok(id) => {
                if !seen_caps.contains_key(id.capability.as_str()) {
                    findings.error(
                        ErrorCode::ContractGrammarError,
                        Some(&contract.id),
                        format!("owning capability '{}' is not declared", id.capability),
                    );
                }
            }
        }
    }

    findings
}

/// Enforce append-only evolution from `baseline` to `current`.
#[must_use]
pub fn check_drift(baseline: &RegistryDoc, current: &RegistryDoc) -> Findings {
    let mut findings = Findings::new();

    for cap in &baseline.capabilities {
        if !current.capabilities.iter().any(|c| c.id == cap.id) {
            findings.error(
                ErrorCode::CapabilityRemoved,
                Some(&cap.id),
                "published capability missing from current registry",
            );
        }
    }

    let current_digests = current.digests();
    for contract in &baseline.contracts {
        match current_digests.get(contract.id.as_str()) {
            None => {
                findings.error(
                    ErrorCode::ContractRemoved,
                    Some(&contract.id),
                    "published contract missing from current registry",
                );
            }
            Some(current_digest) => {
                let baseline_digest = contract.schema_digest();
                if *current_digest != baseline_digest {
                    findings.error(
                        ErrorCode::SchemaDigestChanged,
                        Some(&contract.id),
                        format!("published {baseline_digest}, current {current_digest}"),
                    );
                }
            }
        }
    }

    findings
}

/// The full registry gate: document validity plus drift from the baseline.
#[must_use]
pub fn check_registry(baseline: Option<&RegistryDoc>, current: &RegistryDoc) -> Findings {
    let mut findings = check_document(current);
    let empty = RegistryDoc::default();
    findings.extend(check_drift(baseline.unwrap_or(&empty), current));
    findings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
