//! Whitelist-bounded snapshot input reading.
//!
//! The snapshot builder may only read a fixed set of source paths plus
//! exactly one dynamically-resolved pointer (a single file naming one
//! additional document). Every read goes through [`InputReader`], which
//! enforces the whitelist and caches so each file is read exactly once.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use gatehouse_core::paths::GatehousePaths;
use tracing::debug;

/// Snapshot construction failures.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("read outside snapshot whitelist: {path}")]
    WhitelistViolation { path: String },

    #[error("whitelisted input absent: {path}")]
    InputMissing { path: String },

    #[error("dynamic pointer does not resolve: {details}")]
    UnparseablePointer { details: String },

    #[error("sub-document {path} failed structural parsing: {details}")]
    MalformedSubDocument { path: String, details: String },

    #[error("snapshot rebuild differed byte-for-byte (serialization is nondeterministic)")]
    Nondeterministic,

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The resolved, fixed input set for one snapshot build.
#[derive(Debug, Clone)]
pub struct SnapshotInputs {
    /// Per-item ledger files under `.gatehouse/ledger/`, sorted by path.
    pub ledger_files: Vec<PathBuf>,
    /// Legacy consolidated ledger, when present.
    pub legacy_ledger: Option<PathBuf>,
    /// The consumed-token audit ledger.
    pub tokens_log: PathBuf,
    /// The capability/contract registry.
    pub registry: PathBuf,
    /// The document named by the dynamic pointer.
    pub policy_doc: PathBuf,
}

impl SnapshotInputs {
    /// Resolve the whitelist from the project layout.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::InputMissing`] when a fixed whitelisted path is
    ///   absent (`tokens.log`, `registry.toml`, the pointer file);
    /// - [`SnapshotError::UnparseablePointer`] when the pointer file does
    ///   not name exactly one existing document.
    pub fn resolve(paths: &GatehousePaths) -> Result<Self, SnapshotError> {
        let mut ledger_files = Vec::new();
        let ledger_dir = paths.ledger_dir();
        if ledger_dir.is_dir() {
            let entries = std::fs::read_dir(&ledger_dir).map_err(|source| SnapshotError::Io {
                path: ledger_dir.display().to_string(),
                source,
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "events") {
                    ledger_files.push(path);
                }
            }
            ledger_files.sort();
        }

        let legacy = paths.legacy_ledger();
        let legacy_ledger = legacy.exists().then_some(legacy);

        for required in [paths.tokens_log(), paths.registry(), paths.policy_pointer()] {
            if !required.exists() {
                return Err(SnapshotError::InputMissing {
                    path: required.display().to_string(),
                });
            }
        }

        // The pointer file names exactly one additional document,
        // project-root-relative.
        let pointer_path = paths.policy_pointer();
        let pointer_text =
            std::fs::read_to_string(&pointer_path).map_err(|source| SnapshotError::Io {
                path: pointer_path.display().to_string(),
                source,
            })?;
        let mut names = pointer_text.lines().map(str::trim).filter(|l| {
            !l.is_empty() && !l.starts_with('#')
        });
        let Some(name) = names.next() else {
            return Err(SnapshotError::UnparseablePointer {
                details: format!("{} names no document", pointer_path.display()),
            });
        };
        if names.next().is_some() {
            return Err(SnapshotError::UnparseablePointer {
                details: format!("{} names more than one document", pointer_path.display()),
            });
        }
        let policy_doc = paths.project_root().join(name);
        if !policy_doc.exists() {
            return Err(SnapshotError::UnparseablePointer {
                details: format!("pointed document {name} does not exist"),
            });
        }

        debug!(
            ledgers = ledger_files.len(),
            legacy = legacy_ledger.is_some(),
            policy = name,
            "snapshot whitelist resolved"
        );
        Ok(Self {
            ledger_files,
            legacy_ledger,
            tokens_log: paths.tokens_log(),
            registry: paths.registry(),
            policy_doc,
        })
    }

    /// Every path the builder is allowed to read.
    #[must_use]
    pub fn allowed_paths(&self) -> BTreeSet<PathBuf> {
        let mut allowed: BTreeSet<PathBuf> = self.ledger_files.iter().cloned().collect();
        if let Some(legacy) = &self.legacy_ledger {
            allowed.insert(legacy.clone());
        }
        allowed.insert(self.tokens_log.clone());
        allowed.insert(self.registry.clone());
        allowed.insert(self.policy_doc.clone());
        allowed
    }
}

/// Caching reader that refuses any path outside the resolved whitelist.
///
/// Contents are interned behind `Rc` so the double-build self-check reads
/// every file exactly once while both builds see identical bytes.
#[derive(Debug)]
pub struct InputReader {
    allowed: BTreeSet<PathBuf>,
    cache: RefCell<BTreeMap<PathBuf, Rc<String>>>,
}

impl InputReader {
    #[must_use]
    pub fn new(inputs: &SnapshotInputs) -> Self {
        Self {
            allowed: inputs.allowed_paths(),
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Read a whitelisted file, from cache after the first call.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::WhitelistViolation`] for any path outside the
    /// whitelist; [`SnapshotError::InputMissing`] when the file vanished
    /// after resolution; I/O failures otherwise.
    pub fn read(&self, path: &Path) -> Result<Rc<String>, SnapshotError> {
        if !self.allowed.contains(path) {
            return Err(SnapshotError::WhitelistViolation {
                path: path.display().to_string(),
            });
        }
        if let Some(cached) = self.cache.borrow().get(path) {
            return Ok(Rc::clone(cached));
        }
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::InputMissing {
                    path: path.display().to_string(),
                }
            } else {
                SnapshotError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;
        let content = Rc::new(content);
        self.cache
            .borrow_mut()
            .insert(path.to_path_buf(), Rc::clone(&content));
        Ok(content)
    }

    /// Number of distinct files read so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.cache.borrow().len()
    }
}
