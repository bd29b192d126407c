use rstest::rstest;

use super::*;

fn marked(items: &[Option<usize>]) -> Vec<usize> {
    longest_increasing(items)
        .into_iter()
        .zip(items)
        .filter_map(|(mark, item)| if mark { *item } else { None })
        .collect()
}

#[rstest]
#[case(&[], &[])]
#[case(&[Some(0), Some(1), Some(2)], &[0, 1, 2])]
#[case(&[Some(1), Some(2), Some(0)], &[1, 2])]
#[case(&[Some(3), Some(0), Some(1), Some(2)], &[0, 1, 2])]
#[case(&[None, Some(0), None, Some(1)], &[0, 1])]
#[case(&[Some(2), Some(1), Some(0)], &[0])]
#[case(&[None, None], &[])]
fn longest_increasing_marks(#[case] items: &[Option<usize>], #[case] expected: &[usize]) {
    assert_eq!(marked(items), expected);
}

#[test]
fn to_range_bounds() {
    assert_eq!(to_range(.., 5), 0..5);
    assert_eq!(to_range(1..=2, 5), 1..3);
    assert_eq!(to_range(3.., 5), 3..5);
}

#[test]
#[should_panic]
fn to_range_out_of_bounds() {
    to_range(0..6, 5);
}
