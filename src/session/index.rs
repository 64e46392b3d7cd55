//! Interval index over session windows
//!
//! Windows are sorted by start time. Alongside them the index keeps the
//! running maximum of end times, so a query can stop scanning backwards as
//! soon as no earlier window can still reach the queried range.
//!
//! Lookups cost `O(log n + k)` for `k` candidates scanned.

use super::types::Session;
use crate::types::TimeRange;

#[derive(Debug, Clone, Copy)]
struct Entry {
    window: TimeRange,
    /// Position of the session in the caller's slice
    position: usize,
}

/// Sorted interval index with prefix-maximum end times
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    entries: Vec<Entry>,
    prefix_max_end: Vec<i64>,
}

impl SessionIndex {
    /// Build an index over arbitrary windows
    pub fn new(windows: impl IntoIterator<Item = TimeRange>) -> Self {
        let mut entries: Vec<Entry> = windows
            .into_iter()
            .enumerate()
            .map(|(position, window)| Entry { window, position })
            .collect();
        entries.sort_by_key(|e| (e.window.start_ms, e.window.end_ms, e.position));

        let mut prefix_max_end = Vec::with_capacity(entries.len());
        let mut running = i64::MIN;
        for entry in &entries {
            running = running.max(entry.window.end_ms);
            prefix_max_end.push(running);
        }

        Self {
            entries,
            prefix_max_end,
        }
    }

    /// Build an index over the windows of a session list
    pub fn from_sessions(sessions: &[Session]) -> Self {
        Self::new(sessions.iter().map(Session::window))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions of every window overlapping `range`, in ascending order
    pub fn overlapping(&self, range: TimeRange) -> Vec<usize> {
        // windows starting after the range ends cannot overlap
        let upper = self
            .entries
            .partition_point(|e| e.window.start_ms <= range.end_ms);

        let mut hits = Vec::new();
        for i in (0..upper).rev() {
            if self.prefix_max_end[i] < range.start_ms {
                break;
            }
            if self.entries[i].window.end_ms >= range.start_ms {
                hits.push(self.entries[i].position);
            }
        }
        hits.sort_unstable();
        hits
    }

    /// Position of the only window overlapping `range`
    pub fn unique_overlap(&self, range: TimeRange) -> Lookup {
        let mut hits = self.overlapping(range);
        match hits.len() {
            0 => Lookup::None,
            1 => Lookup::Unique(hits.remove(0)),
            _ => Lookup::Ambiguous(hits),
        }
    }
}

/// Result of a unique-window lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    None,
    Unique(usize),
    Ambiguous(Vec<usize>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index(windows: &[(i64, i64)]) -> SessionIndex {
        SessionIndex::new(windows.iter().map(|&(s, e)| TimeRange::new(s, e)))
    }

    #[test]
    fn test_unique_and_missing() {
        let idx = index(&[(1000, 5000), (10_000, 20_000)]);
        assert_eq!(idx.unique_overlap(TimeRange::new(1200, 4800)), Lookup::Unique(0));
        assert_eq!(idx.unique_overlap(TimeRange::new(6000, 7000)), Lookup::None);
        assert_eq!(idx.unique_overlap(TimeRange::new(19_000, 25_000)), Lookup::Unique(1));
    }

    #[test]
    fn test_ambiguous_lists_positions_in_order() {
        let idx = index(&[(10_000, 20_000), (1000, 5000), (4000, 12_000)]);
        assert_eq!(
            idx.unique_overlap(TimeRange::new(4500, 11_000)),
            Lookup::Ambiguous(vec![0, 1, 2])
        );
    }

    #[test]
    fn test_long_window_found_past_short_ones() {
        // the long first window must be reached through the prefix maximum
        let idx = index(&[(0, 100_000), (10, 20), (30, 40), (50, 60)]);
        assert_eq!(idx.overlapping(TimeRange::new(70_000, 80_000)), vec![0]);
    }

    #[test]
    fn test_touching_bounds_overlap() {
        let idx = index(&[(1000, 5000)]);
        assert_eq!(idx.overlapping(TimeRange::new(5000, 6000)), vec![0]);
        assert_eq!(idx.overlapping(TimeRange::new(0, 1000)), vec![0]);
        assert!(idx.overlapping(TimeRange::new(5001, 6000)).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let idx = SessionIndex::default();
        assert!(idx.is_empty());
        assert_eq!(idx.unique_overlap(TimeRange::new(0, 1)), Lookup::None);
    }

    proptest! {
        #[test]
        fn prop_matches_linear_scan(
            windows in prop::collection::vec((0i64..10_000, 0i64..2_000), 0..40),
            query in (0i64..12_000, 0i64..2_000),
        ) {
            let ranges: Vec<TimeRange> = windows
                .iter()
                .map(|&(s, len)| TimeRange::new(s, s + len))
                .collect();
            let query = TimeRange::new(query.0, query.0 + query.1);

            let expected: Vec<usize> = ranges
                .iter()
                .enumerate()
                .filter(|(_, w)| w.overlaps(&query))
                .map(|(i, _)| i)
                .collect();

            let idx = SessionIndex::new(ranges.iter().copied());
            prop_assert_eq!(idx.overlapping(query), expected);
        }
    }
}
