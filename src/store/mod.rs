//! Persistence for normalized records and refresh outcomes.
//!
//! ## Backends
//!
//! - [`MemoryStore`] - in-process maps, for tests and demos
//! - [`FilesystemStore`] - one JSON document per record and outcome

mod filesystem;
mod memory;
mod traits;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use traits::{ArcStore, OutcomeFilter, RecordStore};
