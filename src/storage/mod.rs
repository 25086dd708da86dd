//! Persistence of generated passages and their audio.

pub mod local;
pub mod record;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use local::LocalStore;
pub use record::{PassageRecord, PassageSummary};
pub use store::{parse_id, AlignmentStore, StorageError};
