//! Core domain model: work item identity and phase lifecycle.

pub mod phase;
pub mod work_item;

pub use phase::Phase;
pub use work_item::WorkItemId;
