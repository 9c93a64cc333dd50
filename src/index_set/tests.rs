use super::*;
use rstest::rstest;

fn ranges(set: &IndexSet) -> Vec<Range<usize>> {
    set.ranges().collect()
}

#[test]
fn add_merges_overlapping_and_adjacent() {
    let mut set = IndexSet::new();
    set.add(2, 3).unwrap();
    set.add(8, 2).unwrap();
    assert_eq!(ranges(&set), vec![2..5, 8..10]);

    set.add(5, 1).unwrap();
    assert_eq!(ranges(&set), vec![2..6, 8..10]);

    set.add(6, 2).unwrap();
    assert_eq!(ranges(&set), vec![2..10]);

    set.add(0, 1).unwrap();
    assert_eq!(ranges(&set), vec![0..1, 2..10]);
    assert_eq!(set.count(), 9);
}

#[test]
fn add_is_idempotent() {
    let mut once = IndexSet::new();
    once.add(2, 3).unwrap();
    let mut twice = IndexSet::new();
    twice.add(2, 3).unwrap().add(2, 3).unwrap();

    assert_eq!(once, twice);
    for index in 0..8 {
        assert_eq!(once.contains(index), twice.contains(index), "index {index}");
    }
}

#[test]
fn remove_splits_spanning_range() {
    let mut set = IndexSet::with_range(0, 10).unwrap();
    set.remove(3, 2).unwrap();
    assert_eq!(ranges(&set), vec![0..3, 5..10]);

    set.remove(0, 1).unwrap();
    set.remove(9, 5).unwrap();
    assert_eq!(ranges(&set), vec![1..3, 5..9]);

    set.remove(2, 4).unwrap();
    assert_eq!(ranges(&set), vec![1..2, 6..9]);
    assert_eq!(set.count(), 4);
}

#[test]
fn remove_outside_is_noop() {
    let mut set = IndexSet::with_range(4, 2).unwrap();
    set.remove(0, 4).unwrap();
    set.remove(6, 3).unwrap();
    assert_eq!(ranges(&set), vec![4..6]);
}

#[rstest]
#[case(0, false)]
#[case(2, true)]
#[case(3, false)]
#[case(5, true)]
#[case(7, true)]
#[case(8, false)]
fn contains_uses_ranges(#[case] index: usize, #[case] expected: bool) {
    let mut set = IndexSet::new();
    set.add_index(2);
    set.add(5, 3).unwrap();
    assert_eq!(set.contains(index), expected);
}

#[test]
fn count_is_recomputed_after_mutation() {
    let mut set = IndexSet::with_range(0, 4).unwrap();
    assert_eq!(set.count(), 4);
    set.add(10, 2).unwrap();
    assert_eq!(set.count(), 6);
    set.remove(1, 2).unwrap();
    assert_eq!(set.count(), 4);
    set.clear();
    assert_eq!(set.count(), 0);
    assert!(set.is_empty());
}

#[test]
fn overflowing_range_is_rejected() {
    let mut set = IndexSet::new();
    let e = set.add(usize::MAX, 2).unwrap_err();
    assert_eq!(e.start, usize::MAX as i128);
    assert!(set.is_empty());
}

#[test]
fn negative_signed_range_is_rejected() {
    assert!(IndexSet::try_from_signed(-1, 2).is_err());
    assert!(IndexSet::try_from_signed(1, -2).is_err());
    assert_eq!(
        IndexSet::try_from_signed(1, 2).unwrap(),
        IndexSet::from(1..3)
    );
}

#[test]
fn intersection_and_intersects() {
    let a: IndexSet = [0, 1, 2, 5, 6, 9].into_iter().collect();
    let b = IndexSet::from(2..6);
    assert!(a.intersects(&b));
    assert_eq!(ranges(&a.intersection(&b)), vec![2..3, 5..6]);

    let c = IndexSet::from(3..5);
    assert!(!a.intersects(&c));
    assert!(a.intersection(&c).is_empty());
}

#[test]
fn ranges_is_restartable() {
    let set: IndexSet = [0, 2, 3].into_iter().collect();
    let iter = set.ranges();
    let first: Vec<_> = iter.clone().collect();
    let second: Vec<_> = iter.collect();
    assert_eq!(first, second);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 2, 3]);
}

#[test]
fn for_each_range_reports_start_and_length() {
    let set: IndexSet = [0, 2, 3].into_iter().collect();
    let mut seen = Vec::new();
    set.for_each_range(|start, len| seen.push((start, len)));
    assert_eq!(seen, vec![(0, 1), (2, 2)]);
}

#[test]
fn first_last_and_contains_range() {
    let set: IndexSet = [1, 2, 3, 7].into_iter().collect();
    assert_eq!(set.first(), Some(1));
    assert_eq!(set.last(), Some(7));
    assert!(set.contains_range(1, 3));
    assert!(!set.contains_range(1, 4));
    assert!(set.contains_range(100, 0));
}

#[test]
fn display() {
    let set: IndexSet = [0, 2, 3].into_iter().collect();
    assert_eq!(set.to_string(), "{0, 2..4}");
    assert_eq!(format!("{set:?}"), "IndexSet{0, 2..4}");
}

#[test]
fn serde_pairs() {
    let set: IndexSet = [0, 2, 3].into_iter().collect();
    let json = serde_json::to_string(&set).unwrap();
    assert_eq!(json, "[[0,1],[2,2]]");
    let back: IndexSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
}
