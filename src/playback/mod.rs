//! Playback synchronizer: maps a live playback time to highlighted indices.
//!
//! ```text
//! audio time t ──current_source_index──▶ Option<source index>
//!                                              │
//!                       target_highlights ◀────┘──▶ BTreeSet<target index>
//! ```
//!
//! Everything here is synchronous, allocation-light and infallible.

pub mod cursor;
pub mod sync;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cursor::{Highlight, PlaybackCursor};
pub use sync::{current_source_index, seek_target, source_indices_for_target, target_highlights};
