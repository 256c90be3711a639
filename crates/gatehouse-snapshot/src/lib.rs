//! gatehouse-snapshot: deterministic, whitelist-derived audit snapshots.
//!
//! The snapshot is ephemeral and fully re-derivable from a fixed input
//! whitelist plus one dynamically-resolved pointer. Regenerating twice
//! from unchanged inputs yields byte-identical output — enforced by an
//! automated double-build self-check, not just promised.

pub mod builder;
pub mod whitelist;

pub use builder::{SCHEMA_VERSION, SnapshotOptions, build_snapshot};
pub use whitelist::{InputReader, SnapshotError, SnapshotInputs};
