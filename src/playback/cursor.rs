//! `PlaybackCursor`: change notifications for a UI tick loop.

use std::collections::BTreeSet;

use crate::analysis::BilingualAlignment;
use crate::playback::sync::{current_source_index, target_highlights};

/// What should be highlighted at a playback position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// `None` before the first word starts.
    pub source_index: Option<usize>,
    pub target_indices: BTreeSet<usize>,
}

/// Remembers the last resolved word and reports a [`Highlight`] only when
/// it changes.
///
/// Every tick resolves `t` from scratch with [`current_source_index`], so
/// answers always match the pure functions, including after a seek.
///
/// ```
/// use aligned_reader::analysis::BilingualAlignment;
/// use aligned_reader::playback::PlaybackCursor;
///
/// let mut cursor = PlaybackCursor::new(BilingualAlignment::empty());
/// assert_eq!(cursor.update(1.0), None);
/// ```
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    alignment: BilingualAlignment,
    current: Option<usize>,
}

impl PlaybackCursor {
    pub fn new(alignment: BilingualAlignment) -> Self {
        Self {
            alignment,
            current: None,
        }
    }

    pub fn alignment(&self) -> &BilingualAlignment {
        &self.alignment
    }

    /// The word highlighted after the last update.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Resolve `t`; `Some` only if the highlighted word changed.
    pub fn update(&mut self, t: f64) -> Option<Highlight> {
        let index = current_source_index(self.alignment.word_timings(), t);
        if index == self.current {
            return None;
        }
        self.current = index;
        Some(Highlight {
            source_index: index,
            target_indices: target_highlights(&self.alignment, index),
        })
    }

    /// Forget the current word, e.g. when playback restarts.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
