//! Pure time → highlight lookups.
//!
//! These run on every UI tick, so none of them fail: anything out of range
//! degrades to "nothing highlighted".

use std::collections::BTreeSet;

use crate::analysis::BilingualAlignment;
use crate::timing::WordTiming;

/// Index of the most recently started word at time `t`.
///
/// Returns the largest `i` with `word_timings[i].start <= t`; a word stays
/// current through the gap before the next one starts.  `None` when the
/// sequence is empty, `t` precedes the first start, or `t` is NaN.
///
/// Starts are non-decreasing, so this is a binary search and any seek,
/// forwards or backwards, needs no extra state.
pub fn current_source_index(word_timings: &[WordTiming], t: f64) -> Option<usize> {
    if t.is_nan() {
        return None;
    }
    word_timings
        .partition_point(|w| w.start <= t)
        .checked_sub(1)
}

/// Target token indices aligned with `source_index`.
///
/// `None`, or an index with no alignment entry, gives the empty set.
pub fn target_highlights(
    alignment: &BilingualAlignment,
    source_index: Option<usize>,
) -> BTreeSet<usize> {
    source_index
        .and_then(|i| alignment.targets_for(i))
        .map(|targets| targets.iter().copied().collect())
        .unwrap_or_default()
}

/// Source word indices whose alignment includes `target_index`, for
/// highlighting the passage while hovering a translation token.
pub fn source_indices_for_target(
    alignment: &BilingualAlignment,
    target_index: usize,
) -> BTreeSet<usize> {
    alignment
        .alignment_source_to_target()
        .iter()
        .filter(|(_, targets)| targets.contains(&target_index))
        .map(|(&source, _)| source)
        .collect()
}

/// Playback position after skipping `delta` seconds from `current`,
/// clamped to `[0, duration]`.
///
/// A NaN position restarts from 0; a NaN or negative duration is treated
/// as 0.
pub fn seek_target(current: f64, delta: f64, duration: f64) -> f64 {
    let duration = if duration.is_nan() { 0.0 } else { duration.max(0.0) };
    let current = if current.is_nan() { 0.0 } else { current };
    let target = current + if delta.is_nan() { 0.0 } else { delta };
    target.clamp(0.0, duration)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::IndexedSpanishWordDetail;
    use std::collections::BTreeMap;

    fn timing(word: &str, start: f64, end: f64) -> WordTiming {
        WordTiming {
            word: word.into(),
            start,
            end,
            confidence: 1.0,
        }
    }

    fn three_words() -> Vec<WordTiming> {
        vec![timing("a", 0.0, 1.0), timing("b", 1.0, 2.0), timing("c", 2.0, 3.0)]
    }

    /// Two words: 0 → tokens {0, 1}, 1 → nothing.
    fn alignment() -> BilingualAlignment {
        let detail = |text: &str| IndexedSpanishWordDetail {
            text: text.into(),
            vocabulary_id: None,
        };
        BilingualAlignment::new(
            vec![timing("Che", 0.0, 0.4), timing("vos", 0.5, 0.9)],
            BTreeMap::from([(0, detail("Che")), (1, detail("vos"))]),
            vec!["Hey".into(), ",".into(), "you".into()],
            BTreeMap::from([(0, vec![0, 1]), (1, vec![])]),
        )
        .unwrap()
    }

    #[test]
    fn boundary_table() {
        let words = three_words();
        let cases = [
            (-0.5, None),
            (0.0, Some(0)),
            (0.5, Some(0)),
            (1.0, Some(1)),
            (2.9, Some(2)),
            (10.0, Some(2)),
        ];
        for (t, expected) in cases {
            assert_eq!(current_source_index(&words, t), expected, "t = {t}");
        }
    }

    #[test]
    fn gap_between_words_keeps_previous() {
        let words = vec![timing("hola", 0.0, 0.4), timing("che", 1.0, 1.3)];
        assert_eq!(current_source_index(&words, 0.7), Some(0));
    }

    #[test]
    fn equal_starts_pick_the_last() {
        let words = vec![timing("a", 0.0, 0.0), timing("b", 0.0, 0.5)];
        assert_eq!(current_source_index(&words, 0.0), Some(1));
    }

    #[test]
    fn empty_or_nan_is_none() {
        assert_eq!(current_source_index(&[], 1.0), None);
        assert_eq!(current_source_index(&three_words(), f64::NAN), None);
    }

    #[test]
    fn seeking_backwards_is_consistent() {
        let words = three_words();
        let seen: Vec<_> = [2.5, 0.2, 1.5]
            .iter()
            .map(|&t| current_source_index(&words, t))
            .collect();
        assert_eq!(seen, vec![Some(2), Some(0), Some(1)]);
    }

    #[test]
    fn highlight_table() {
        let alignment = alignment();
        assert_eq!(target_highlights(&alignment, Some(0)), BTreeSet::from([0, 1]));
        assert_eq!(target_highlights(&alignment, Some(1)), BTreeSet::new());
        assert_eq!(target_highlights(&alignment, None), BTreeSet::new());
    }

    #[test]
    fn out_of_range_source_highlights_nothing() {
        assert!(target_highlights(&alignment(), Some(99)).is_empty());
    }

    #[test]
    fn reverse_lookup() {
        let alignment = alignment();
        assert_eq!(source_indices_for_target(&alignment, 1), BTreeSet::from([0]));
        assert!(source_indices_for_target(&alignment, 2).is_empty());
        assert!(source_indices_for_target(&alignment, 42).is_empty());
    }

    #[test]
    fn seek_is_clamped() {
        assert_eq!(seek_target(3.0, 5.0, 10.0), 8.0);
        assert_eq!(seek_target(8.0, 5.0, 10.0), 10.0);
        assert_eq!(seek_target(2.0, -5.0, 10.0), 0.0);
        assert_eq!(seek_target(f64::NAN, 5.0, 10.0), 5.0);
        assert_eq!(seek_target(3.0, 5.0, f64::NAN), 0.0);
        assert_eq!(seek_target(3.0, f64::NAN, 10.0), 3.0);
    }
}
