//! On-disk layout of the `.gatehouse` directory.
//!
//! All gatehouse state lives under a single `.gatehouse` directory at the
//! project root. State is re-derived from these files on every invocation;
//! nothing is cached between runs.

use std::path::{Path, PathBuf};

use crate::error::GateError;
use crate::model::WorkItemId;

/// Name of the state directory at the project root.
pub const GATEHOUSE_DIR: &str = ".gatehouse";

/// Resolved paths for one project's gatehouse state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatehousePaths {
    root: PathBuf,
}

impl GatehousePaths {
    /// Paths rooted at `project_root` (the directory containing
    /// `.gatehouse`). Does not touch the filesystem.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.to_path_buf(),
        }
    }

    /// Walk upward from `start` to find a directory containing
    /// `.gatehouse`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotInitialized`] when no ancestor carries the
    /// state directory.
    pub fn discover(start: &Path) -> Result<Self, GateError> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            if current.join(GATEHOUSE_DIR).is_dir() {
                return Ok(Self::new(current));
            }
            dir = current.parent();
        }
        Err(GateError::NotInitialized)
    }

    /// The project root directory.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.root
    }

    /// The `.gatehouse` state directory.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(GATEHOUSE_DIR)
    }

    /// Directory holding one `.events` ledger file per work item.
    #[must_use]
    pub fn ledger_dir(&self) -> PathBuf {
        self.state_dir().join("ledger")
    }

    /// Per-item ledger file.
    #[must_use]
    pub fn ledger_file(&self, id: &WorkItemId) -> PathBuf {
        self.ledger_dir().join(format!("{id}.events"))
    }

    /// Legacy consolidated multi-item ledger (read-only fallback).
    #[must_use]
    pub fn legacy_ledger(&self) -> PathBuf {
        self.state_dir().join("ledger.events")
    }

    /// Archive directory for reset work items.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.state_dir().join("archive")
    }

    /// Directory holding one refinement record per work item.
    #[must_use]
    pub fn refinements_dir(&self) -> PathBuf {
        self.state_dir().join("refinements")
    }

    /// Per-item refinement record.
    #[must_use]
    pub fn refinement_file(&self, id: &WorkItemId) -> PathBuf {
        self.refinements_dir().join(format!("{id}.toml"))
    }

    /// Append-only consumed-token audit ledger.
    #[must_use]
    pub fn tokens_log(&self) -> PathBuf {
        self.state_dir().join("tokens.log")
    }

    /// Directory of work item descriptive documents (manifest blocks).
    #[must_use]
    pub fn items_dir(&self) -> PathBuf {
        self.state_dir().join("items")
    }

    /// Default descriptive document for a work item.
    #[must_use]
    pub fn item_doc(&self, id: &WorkItemId) -> PathBuf {
        self.items_dir().join(format!("{id}.md"))
    }

    /// The capability/contract registry document.
    #[must_use]
    pub fn registry(&self) -> PathBuf {
        self.state_dir().join("registry.toml")
    }

    /// Registry path relative to the project root, as git sees it.
    #[must_use]
    pub fn registry_relative() -> &'static str {
        ".gatehouse/registry.toml"
    }

    /// The dynamic pointer naming one additional snapshot input.
    #[must_use]
    pub fn policy_pointer(&self) -> PathBuf {
        self.state_dir().join("policy")
    }

    /// Fixed snapshot output path.
    #[must_use]
    pub fn snapshot_output(&self) -> PathBuf {
        self.state_dir().join("snapshot.json")
    }

    /// Project config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }
}
