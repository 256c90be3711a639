//! gatehouse-core: gate ledger, phase state machine, and signature audit.
//!
//! The source of truth for a work item's review progress is its append-only
//! TSJSON gate ledger. Everything here is synchronous, run-to-completion,
//! and re-derived from disk on every invocation.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::GateError`] in the library; `anyhow::Result`
//!   at application boundaries.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Hashing**: BLAKE3 rendered as `blake3:<hex>`.

pub mod config;
pub mod error;
pub mod event;
pub mod fields;
pub mod ledger;
pub mod machine;
pub mod model;
pub mod paths;
pub mod refinement;
pub mod token;

pub use error::{ErrorCode, ErrorKind, GateError};
pub use event::{GateData, GateEvent, GateType};
pub use machine::{Gatekeeper, StatusReport, StepOptions};
pub use model::{Phase, WorkItemId};
pub use paths::GatehousePaths;
