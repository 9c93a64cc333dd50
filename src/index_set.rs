use std::{
    cell::Cell,
    cmp::{max, min},
    fmt,
    iter::once,
    marker::PhantomData,
    ops::Range,
};

use parse_display::Display;
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// A set of non-negative integers stored as sorted, disjoint, non-adjacent ranges.
///
/// Used both to describe which indexes of an array changed and which indexes a
/// range observer is interested in.
#[derive(Clone, Default)]
pub struct IndexSet {
    ranges: Vec<Range<usize>>,
    count: Cell<Option<usize>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set containing `start..start + len`.
    pub fn with_range(start: usize, len: usize) -> Result<Self, InvalidRangeError> {
        let mut this = Self::new();
        this.add(start, len)?;
        Ok(this)
    }

    /// Create a set from signed bounds, rejecting negative values.
    pub fn try_from_signed(start: isize, len: isize) -> Result<Self, InvalidRangeError> {
        if start < 0 || len < 0 {
            return Err(InvalidRangeError::new(start as i128, len as i128));
        }
        Self::with_range(start as usize, len as usize)
    }

    /// Add `start..start + len`, merging with overlapping or adjacent ranges.
    pub fn add(&mut self, start: usize, len: usize) -> Result<&mut Self, InvalidRangeError> {
        let end = checked_end(start, len)?;
        self.insert_range(start..end);
        Ok(self)
    }

    /// Remove `start..start + len`, splitting any range that spans it.
    pub fn remove(&mut self, start: usize, len: usize) -> Result<&mut Self, InvalidRangeError> {
        let end = checked_end(start, len)?;
        self.remove_range(start..end);
        Ok(self)
    }

    pub fn add_index(&mut self, index: usize) -> &mut Self {
        self.insert_range(index..index.saturating_add(1));
        self
    }
    pub fn remove_index(&mut self, index: usize) -> &mut Self {
        self.remove_range(index..index.saturating_add(1));
        self
    }

    pub fn insert_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let Range { mut start, mut end } = range;
        let lo = self.ranges.partition_point(|r| r.end < start);
        let hi = self.ranges.partition_point(|r| r.start <= end);
        if lo < hi {
            start = min(start, self.ranges[lo].start);
            end = max(end, self.ranges[hi - 1].end);
        }
        self.ranges.splice(lo..hi, once(start..end));
        self.count.set(None);
    }

    pub fn remove_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let lo = self.ranges.partition_point(|r| r.end <= range.start);
        let hi = self.ranges.partition_point(|r| r.start < range.end);
        if lo >= hi {
            return;
        }
        let first = self.ranges[lo].clone();
        let last = self.ranges[hi - 1].clone();
        let mut rest = Vec::with_capacity(2);
        if first.start < range.start {
            rest.push(first.start..range.start);
        }
        if range.end < last.end {
            rest.push(range.end..last.end);
        }
        self.ranges.splice(lo..hi, rest);
        self.count.set(None);
    }

    pub fn union_with(&mut self, other: &IndexSet) -> &mut Self {
        for range in other.ranges() {
            self.insert_range(range);
        }
        self
    }

    pub fn contains(&self, index: usize) -> bool {
        let i = self.ranges.partition_point(|r| r.end <= index);
        self.ranges.get(i).is_some_and(|r| r.start <= index)
    }

    /// Returns true if every index of `start..start + len` is in the set.
    pub fn contains_range(&self, start: usize, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        let i = self.ranges.partition_point(|r| r.end <= start);
        self.ranges
            .get(i)
            .is_some_and(|r| r.start <= start && end <= r.end)
    }

    pub fn intersects(&self, other: &IndexSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while let (Some(a), Some(b)) = (self.ranges.get(i), other.ranges.get(j)) {
            if a.start < b.end && b.start < a.end {
                return true;
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    pub fn intersection(&self, other: &IndexSet) -> IndexSet {
        let mut ranges = Vec::new();
        let (mut i, mut j) = (0, 0);
        while let (Some(a), Some(b)) = (self.ranges.get(i), other.ranges.get(j)) {
            let start = max(a.start, b.start);
            let end = min(a.end, b.end);
            if start < end {
                ranges.push(start..end);
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        IndexSet {
            ranges,
            count: Cell::new(None),
        }
    }

    /// Number of indexes in the set.
    pub fn count(&self) -> usize {
        if let Some(count) = self.count.get() {
            return count;
        }
        let count = self.ranges.iter().map(|r| r.len()).sum();
        self.count.set(Some(count));
        count
    }
    pub fn len_ranges(&self) -> usize {
        self.ranges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
    pub fn first(&self) -> Option<usize> {
        self.ranges.first().map(|r| r.start)
    }
    /// The largest index in the set.
    pub fn last(&self) -> Option<usize> {
        self.ranges.last().map(|r| r.end - 1)
    }
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.count.set(None);
    }

    /// Ranges in ascending order.
    ///
    /// The iterator can be cloned to restart the traversal.
    pub fn ranges(&self) -> Ranges<'_> {
        Ranges(self.ranges.iter())
    }
    pub fn for_each_range(&self, mut f: impl FnMut(usize, usize)) {
        for r in self.ranges() {
            f(r.start, r.len());
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = usize> + Clone + '_ {
        self.ranges().flatten()
    }
}

fn checked_end(start: usize, len: usize) -> Result<usize, InvalidRangeError> {
    start
        .checked_add(len)
        .ok_or(InvalidRangeError::new(start as i128, len as i128))
}

#[derive(Clone)]
pub struct Ranges<'a>(std::slice::Iter<'a, Range<usize>>);

impl Iterator for Ranges<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().cloned()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl ExactSizeIterator for Ranges<'_> {}

impl PartialEq for IndexSet {
    fn eq(&self, other: &Self) -> bool {
        self.ranges == other.ranges
    }
}
impl Eq for IndexSet {}

impl From<Range<usize>> for IndexSet {
    fn from(value: Range<usize>) -> Self {
        let mut this = Self::new();
        this.insert_range(value);
        this
    }
}
impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut this = Self::new();
        this.extend(iter);
        this
    }
}
impl Extend<usize> for IndexSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.add_index(index);
        }
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            if r.len() == 1 {
                write!(f, "{}", r.start)?;
            } else {
                write!(f, "{}..{}", r.start, r.end)?;
            }
        }
        write!(f, "}}")
    }
}
impl fmt::Debug for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexSet{self}")
    }
}

impl Serialize for IndexSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.ranges().map(|r| (r.start, r.len())))
    }
}
impl<'de> Deserialize<'de> for IndexSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IndexSetVisitor(PhantomData<IndexSet>);
        impl<'de> serde::de::Visitor<'de> for IndexSetVisitor {
            type Value = IndexSet;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("sequence of [start, length] pairs")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut set = IndexSet::new();
                while let Some((start, len)) = seq.next_element::<(usize, usize)>()? {
                    set.add(start, len).map_err(serde::de::Error::custom)?;
                }
                Ok(set)
            }
        }
        deserializer.deserialize_seq(IndexSetVisitor(PhantomData))
    }
}

/// A range whose start or length is negative, or whose end overflows.
#[non_exhaustive]
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[display("invalid range: start {start}, length {len}")]
pub struct InvalidRangeError {
    pub start: i128,
    pub len: i128,
}
impl InvalidRangeError {
    fn new(start: i128, len: i128) -> Self {
        Self { start, len }
    }
}

impl std::error::Error for InvalidRangeError {}
