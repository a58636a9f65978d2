use dlite::datamodel::ShapeIter;

#[test]
fn scalar_shape_yields_one_empty_index() {
    let mut it = ShapeIter::new(&[]);
    assert_eq!(it.len(), 1);
    assert_eq!(it.next_index(), Some(&[][..]));
    assert_eq!(it.next_index(), None);
}

#[test]
fn indices_come_in_c_order() {
    let mut it = ShapeIter::new(&[2, 3]);
    assert_eq!(it.len(), 6);
    let mut seen = Vec::new();
    while let Some(idx) = it.next_index() {
        seen.push(idx.to_vec());
    }
    assert_eq!(
        seen,
        [
            vec![0, 0],
            vec![0, 1],
            vec![0, 2],
            vec![1, 0],
            vec![1, 1],
            vec![1, 2],
        ]
    );
}

#[test]
fn zero_sized_axes_yield_nothing() {
    let mut it = ShapeIter::new(&[2, 0, 3]);
    assert!(it.is_empty());
    assert_eq!(it.next_index(), None);
}

#[test]
fn rank_one_walks_the_axis() {
    let mut it = ShapeIter::new(&[4]);
    let mut count = 0;
    while let Some(idx) = it.next_index() {
        assert_eq!(idx, &[count]);
        count += 1;
    }
    assert_eq!(count, 4);
}
