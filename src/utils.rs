use std::ops::{Bound, Range, RangeBounds};

#[cfg(test)]
mod tests;

/// Converts `range` to a `Range` clamped to `0..len`.
pub(crate) fn to_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n.saturating_add(1),
        Bound::Excluded(&n) => n,
        Bound::Unbounded => len,
    };
    let end = end.min(len);
    start.min(end)..end
}
