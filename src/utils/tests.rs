use std::ops::Bound::{self, *};

use rstest::rstest;

use super::*;

#[rstest]
#[case(Unbounded, Unbounded, 5, 0..5)]
#[case(Included(1), Excluded(3), 5, 1..3)]
#[case(Included(1), Included(3), 5, 1..4)]
#[case(Excluded(1), Unbounded, 5, 2..5)]
#[case(Unbounded, Excluded(10), 5, 0..5)]
#[case(Included(7), Excluded(9), 5, 5..5)]
#[case(Included(4), Excluded(2), 5, 2..2)]
fn to_range_clamps(
    #[case] start: Bound<usize>,
    #[case] end: Bound<usize>,
    #[case] len: usize,
    #[case] expected: Range<usize>,
) {
    assert_eq!(to_range((start, end), len), expected);
}
