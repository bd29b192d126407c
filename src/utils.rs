use std::ops::{Bound, Range, RangeBounds};

#[cfg(test)]
pub mod test_helpers;
#[cfg(test)]
mod tests;

pub(crate) fn to_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n + 1,
        Bound::Excluded(&n) => n,
        Bound::Unbounded => len,
    };
    assert!(start <= end);
    assert!(end <= len);
    start..end
}

/// Marks the items that form a longest strictly increasing subsequence of the `Some` values.
///
/// `None` items are never part of the subsequence.
pub(crate) fn longest_increasing(items: &[Option<usize>]) -> Vec<bool> {
    // tails[k]: index in `items` of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev = vec![usize::MAX; items.len()];
    for (index, item) in items.iter().enumerate() {
        let Some(value) = *item else {
            continue;
        };
        let pos = tails.partition_point(|&t| items[t].is_some_and(|t| t < value));
        if pos > 0 {
            prev[index] = tails[pos - 1];
        }
        if pos == tails.len() {
            tails.push(index);
        } else {
            tails[pos] = index;
        }
    }
    let mut marks = vec![false; items.len()];
    let mut cursor = tails.last().copied().unwrap_or(usize::MAX);
    while cursor != usize::MAX {
        marks[cursor] = true;
        cursor = prev[cursor];
    }
    marks
}
