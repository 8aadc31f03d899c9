//! Window computation over an ascending sequence of sort keys.
//!
//! Adapters that hold their data in process (the in-memory backend) use
//! [`compute_window`] directly. The relational backend reaches the same
//! result with over-fetch queries and [`Window::from_overfetch`].
//!
//! [`Window::from_overfetch`]: super::Window::from_overfetch

use std::ops::Range;

use crate::models::SortKey;

use super::pagination::{BatchInfo, Window};

/// Index range and page flags selected from a key sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBounds {
    /// Half-open index range into the input sequence.
    pub range: Range<usize>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl WindowBounds {
    /// Cut the window out of the sequence the bounds were computed on.
    ///
    /// The window's total count is the length of that sequence.
    pub fn take<T>(&self, mut items: Vec<T>) -> Window<T> {
        let total_count = items.len() as i64;
        items.truncate(self.range.end);
        items.drain(..self.range.start.min(items.len()));
        Window {
            items,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
            total_count,
        }
    }
}

/// Compute the window selected by `batch` over `keys`.
///
/// `keys` must be sorted ascending. Boundaries are exclusive: items whose
/// key equals `after` or `before` are never part of the window.
pub fn compute_window(keys: &[SortKey], batch: &BatchInfo) -> WindowBounds {
    let count = batch.count as isize;
    let mut has_next_page = !batch.before.is_unset();
    let mut has_previous_page = !batch.after.is_unset();

    let mut after_index: isize = 0;
    let mut before_index: isize = keys.len() as isize - 1;

    if !batch.after.is_unset() {
        after_index = keys.partition_point(|k| *k <= batch.after) as isize;
    }
    if !batch.before.is_unset() {
        before_index = keys.partition_point(|k| *k < batch.before) as isize - 1;
    }

    if batch.tail {
        let floor = before_index - count + 1;
        if floor > after_index {
            after_index = floor;
            has_previous_page = true;
        }
    } else {
        let ceil = after_index + count - 1;
        if ceil < before_index {
            before_index = ceil;
            has_next_page = true;
        }
    }

    let range = if before_index < after_index {
        0..0
    } else {
        after_index as usize..(before_index + 1) as usize
    };

    WindowBounds {
        range,
        has_next_page,
        has_previous_page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: u64) -> Vec<SortKey> {
        (1..=n).map(SortKey).collect()
    }

    fn batch(count: usize, tail: bool, after: u64, before: u64) -> BatchInfo {
        BatchInfo {
            count,
            tail,
            after: SortKey(after),
            before: SortKey(before),
        }
    }

    fn window(n: u64, b: BatchInfo) -> (Vec<u64>, bool, bool) {
        let keys = keys(n);
        let bounds = compute_window(&keys, &b);
        let items = bounds.take(keys).items.into_iter().map(|k| k.0).collect();
        (items, bounds.has_next_page, bounds.has_previous_page)
    }

    #[test]
    fn first_page() {
        assert_eq!(window(15, batch(5, false, 0, 0)), (vec![1, 2, 3, 4, 5], true, false));
    }

    #[test]
    fn first_after_cursor() {
        assert_eq!(window(15, batch(5, false, 5, 0)), (vec![6, 7, 8, 9, 10], true, true));
    }

    #[test]
    fn last_before_cursor() {
        assert_eq!(window(15, batch(5, true, 0, 11)), (vec![6, 7, 8, 9, 10], true, true));
    }

    #[test]
    fn first_covers_everything() {
        let (items, next, prev) = window(15, batch(15, false, 0, 0));
        assert_eq!(items.len(), 15);
        assert!(!next && !prev);
    }

    #[test]
    fn tail_symmetry() {
        for n in 0..8u64 {
            for k in 1..10usize {
                let (items, next, prev) = window(n, batch(k, true, 0, 0));
                let expected: Vec<u64> = (1..=n).skip(n as usize - k.min(n as usize)).collect();
                assert_eq!(items, expected, "n={n} k={k}");
                assert_eq!(prev, n as usize > k);
                assert!(!next);
            }
        }
    }

    #[test]
    fn size_law() {
        for n in 0..8u64 {
            for k in 1..10usize {
                let (items, next, prev) = window(n, batch(k, false, 0, 0));
                assert_eq!(items.len(), k.min(n as usize));
                assert_eq!(next, n as usize > k);
                assert!(!prev);
            }
        }
    }

    #[test]
    fn empty_collection_keeps_cursor_flags() {
        assert_eq!(window(0, batch(5, false, 0, 0)), (vec![], false, false));
        assert_eq!(window(0, batch(5, false, 3, 0)), (vec![], false, true));
        assert_eq!(window(0, batch(5, true, 0, 3)), (vec![], true, false));
    }

    #[test]
    fn cursor_past_the_end() {
        assert_eq!(window(15, batch(5, false, 99, 0)), (vec![], false, true));
        assert_eq!(window(15, batch(5, true, 0, 1)), (vec![], true, false));
    }

    #[test]
    fn cursor_between_keys() {
        let keys = vec![SortKey(10), SortKey(20), SortKey(30), SortKey(40)];
        let bounds = compute_window(&keys, &batch(2, false, 15, 0));
        assert_eq!(bounds.range, 1..3);
        assert!(bounds.has_next_page && bounds.has_previous_page);

        let bounds = compute_window(&keys, &batch(2, true, 0, 35));
        assert_eq!(bounds.range, 1..3);
        assert!(bounds.has_next_page && bounds.has_previous_page);
    }

    #[test]
    fn tail_after_cursor() {
        // last=3 after=c(10): the final three items, previous page implied by the cursor
        assert_eq!(window(15, batch(3, true, 10, 0)), (vec![13, 14, 15], false, true));
        assert_eq!(window(12, batch(5, true, 10, 0)), (vec![11, 12], false, true));
    }

    #[test]
    fn take_counts_the_whole_sequence() {
        let keys = keys(15);
        let window = compute_window(&keys, &batch(5, false, 5, 0)).take(keys);
        assert_eq!(window.items.len(), 5);
        assert_eq!(window.total_count, 15);
    }
}
