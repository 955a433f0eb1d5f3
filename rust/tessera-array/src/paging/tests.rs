use std::io::Write;

use tessera_common::ErrorKind;
use tessera_page_alloc::Advice;

use crate::{
    IntArray, LogicalArray, LongArray, MapMode, PagingArray, PartitioningScheme,
    PowerOf2PartitioningScheme, QueryBuffer, SearchResult, SequentialPartitioningScheme,
    SortingContext,
};

fn pow2(page_size: u64) -> PowerOf2PartitioningScheme {
    PowerOf2PartitioningScheme::new(page_size).unwrap()
}

fn seq(page_size: u64) -> SequentialPartitioningScheme {
    SequentialPartitioningScheme::new(page_size).unwrap()
}

fn random_words(n: usize, seed: u64) -> Vec<i64> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..n).map(|_| rng.i64(0..(n as i64 * 2 + 10))).collect()
}

fn to_vec<A: LogicalArray<Word = i64>>(arr: &A) -> Vec<i64> {
    let mut out = vec![0; arr.size() as usize];
    arr.get_range(0, &mut out);
    out
}

#[test]
fn test_pages_partition_size() {
    let array = LongArray::new_on_heap(pow2(16), 100).unwrap();
    assert_eq!(array.pages().len(), 7);
    let total: usize = array.pages().iter().map(|p| p.len()).sum();
    assert_eq!(total, 100);
    assert_eq!(array.pages()[6].len(), 4);

    let empty = IntArray::new_on_heap(seq(10), 0).unwrap();
    assert_eq!(empty.size(), 0);
    assert!(empty.pages().is_empty());
}

#[test]
fn test_elemental_access_across_pages() {
    let mut array = LongArray::new_on_heap(seq(7), 50).unwrap();
    for pos in 0..50 {
        array.set(pos, pos as i64 * 2);
    }
    for pos in 0..50 {
        assert_eq!(array.get(pos), pos as i64 * 2);
    }
    array.swap(3, 40);
    assert_eq!((array.get(3), array.get(40)), (80, 6));
    array.increment(13);
    assert_eq!(array.get_and_increment(13), 27);
    assert_eq!(array.get(13), 28);

    match array.try_get(50).unwrap_err().into_kind() {
        ErrorKind::IndexOutOfBounds {
            pos, page, offset, ..
        } => assert_eq!((pos, page, offset), (50, 7, 1)),
        kind => panic!("unexpected {kind:?}"),
    }
    assert!(array.try_set(51, 0).is_err());
    array.try_set(49, -1).unwrap();
    assert_eq!(array.get(49), -1);
}

#[test]
#[should_panic(expected = "index out of bounds for 130 (size 100)")]
fn test_get_out_of_bounds_panics() {
    let array = IntArray::new_on_heap(pow2(64), 100).unwrap();
    array.get(130);
}

#[test]
fn test_bulk_operations_across_pages() {
    let values: Vec<i64> = (0..100).collect();
    let mut array = LongArray::from_words(pow2(8), &values).unwrap();
    assert_eq!(to_vec(&array), values);

    let mut buffer = vec![0i64; 20];
    array.get_range(5, &mut buffer);
    assert_eq!(buffer, (5..25).collect::<Vec<_>>());

    LogicalArray::fill(&mut array, 6, 30, -1);
    assert_eq!(array.get(5), 5);
    assert!((6..30).all(|p| array.get(p) == -1));
    assert_eq!(array.get(30), 30);

    array.set_range(60, &[7; 15]);
    assert!((60..75).all(|p| array.get(p) == 7));

    array.transform_each(0, 100, |pos, v| if v < 0 { pos as i64 } else { v });
    assert_eq!(array.get(10), 10);

    let sum = array.fold(0, 100, 0i64, |acc, v| acc + v);
    assert_eq!(sum, to_vec(&array).iter().sum::<i64>());

    let mut positions = Vec::new();
    array.for_each(14, 18, |pos, _| positions.push(pos));
    assert_eq!(positions, vec![14, 15, 16, 17]);
}

#[test]
fn test_try_transform_stops_at_error_across_pages() {
    let values: Vec<i64> = (0..100).collect();
    let mut array = LongArray::from_words(seq(10), &values).unwrap();

    let mut visited = Vec::new();
    let err = array
        .try_transform_each(5, 95, |pos, v| {
            visited.push(pos);
            if pos == 37 {
                Err(tessera_common::Error::io(
                    "transform",
                    std::io::Error::other("disk full"),
                ))
            } else {
                Ok(-v)
            }
        })
        .unwrap_err();
    assert!(err.is_io());
    assert_eq!(visited, (5..38).collect::<Vec<_>>());
    assert!((0..5).all(|p| array.get(p) == p as i64));
    assert!((5..37).all(|p| array.get(p) == -(p as i64)));
    assert!((37..100).all(|p| array.get(p) == p as i64));

    array.try_transform_each(0, 100, |_, v| Ok(v.abs())).unwrap();
    assert_eq!(to_vec(&array), values);

    let sum = array.try_fold(3, 97, 0i64, |acc, v| Ok(acc + v)).unwrap();
    assert_eq!(sum, (3..97).sum::<i64>());

    let mut folded = 0;
    let err = array
        .try_fold(0, 100, 0i64, |acc, v| {
            folded += 1;
            if v == 64 {
                Err(tessera_common::Error::invalid_arg("word", "word != 64"))
            } else {
                Ok(acc + v)
            }
        })
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
    assert_eq!(folded, 65);
}

#[test]
fn test_record_ops_reject_bad_stride() {
    let records: Vec<i64> = (0..50).flat_map(|i| [i * 2, i]).collect();
    let mut array = LongArray::from_words(seq(16), &records).unwrap();

    // one page and several pages take different paths
    for (start, end) in [(0, 10), (0, 100)] {
        let err = array.binary_search_n(0, 4, start, end).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        let err = array.quick_sort_n(0, start, end).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

        let mut buffer = QueryBuffer::new(vec![2, 4]);
        let err = array.retain_n(&mut buffer, 0, i64::MAX, start, end).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        let err = array.reject_n(&mut buffer, 3, i64::MAX, start, end).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StrideMismatch { .. }));
        assert_eq!(buffer.current_value(), 2);

        let err = array.linear_search_n(2, 4, start, end - 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StrideMismatch { .. }));
        let err = array.merge_sort_n(3, start, end).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StrideMismatch { .. }));
        let err = array.is_sorted_n(3, start, end - 2).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StrideMismatch { .. }));
    }

    let err = array.binary_search_upper_bound_n(2, 4, 90, 102).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
    assert_eq!(to_vec(&array), records);
    assert_eq!(array.binary_search_n(2, 40, 0, 100).unwrap(), SearchResult::Found(40));
}

#[test]
fn test_direct_range() {
    let mut array = IntArray::from_words(pow2(16), &(0..64).collect::<Vec<i32>>()).unwrap();
    assert_eq!(array.direct_range(16, 20), Some(&[16, 17, 18, 19][..]));
    assert_eq!(array.direct_range(0, 16).map(<[i32]>::len), Some(16));
    assert!(array.direct_range(15, 17).is_none());
    assert!(array.direct_range(4, 4).is_none());
    assert!(array.direct_range(60, 70).is_none());
    array.direct_range_mut(32, 34).unwrap()[1] = -5;
    assert_eq!(array.get(33), -5);
}

#[test]
fn test_search_matches_slice_search() {
    let mut values = random_words(3000, 1);
    values.sort_unstable();
    values.dedup();
    let n = values.len() as u64;

    for array in [
        LongArray::from_words(pow2(64), &values).unwrap(),
        LongArray::from_words(pow2(1 << 20), &values).unwrap(),
    ] {
        for (from, to) in [(0, n), (10, 60), (64, 128), (100, n - 5)] {
            for key in (-2..(n as i64 * 2 + 12)).step_by(3) {
                let expected = LogicalArray::binary_search(&values[..], key, from, to);
                assert_eq!(LogicalArray::binary_search(&array, key, from, to), expected);
                assert_eq!(array.linear_search(key, from, to), expected);
                assert_eq!(
                    array.binary_search_upper_bound(key, from, to),
                    LogicalArray::binary_search_upper_bound(&values[..], key, from, to)
                );
                assert_eq!(
                    array.linear_search_upper_bound(key, from, to),
                    LogicalArray::binary_search_upper_bound(&values[..], key, from, to)
                );
            }
        }
    }
}

#[test]
fn test_search_result_is_logical() {
    let values: Vec<i64> = (0..256).map(|i| i * 2).collect();
    let array = LongArray::from_words(pow2(32), &values).unwrap();
    // range confined to page 3
    assert_eq!(LogicalArray::binary_search(&array, 200, 96, 128), SearchResult::Found(100));
    assert_eq!(LogicalArray::binary_search(&array, 201, 96, 128), SearchResult::NotFound(101));
    assert_eq!(array.binary_search_n(2, 200, 96, 128).unwrap(), SearchResult::Found(100));
    assert_eq!(array.binary_search_upper_bound_n(2, 201, 96, 128).unwrap(), 102);
}

#[test]
fn test_retain_reject_across_pages() {
    let mut backing = random_words(500, 2);
    backing.sort_unstable();
    backing.dedup();
    let n = backing.len() as u64;
    let mut candidates = random_words(300, 3);
    candidates.sort_unstable();

    for page_size in [8, 64, 1 << 12] {
        let array = LongArray::from_words(pow2(page_size), &backing).unwrap();

        let mut expected = QueryBuffer::new(candidates.clone());
        LogicalArray::retain(&backing[..], &mut expected, i64::MAX, 0, n);
        expected.finalize_filtering();
        let mut actual = QueryBuffer::new(candidates.clone());
        array.retain(&mut actual, i64::MAX, 0, n);
        actual.finalize_filtering();
        assert_eq!(actual.as_slice(), expected.as_slice(), "page size {page_size}");

        let mut expected = QueryBuffer::new(candidates.clone());
        LogicalArray::reject(&backing[..], &mut expected, 500, 3, n - 3);
        let mut actual = QueryBuffer::new(candidates.clone());
        array.reject(&mut actual, 500, 3, n - 3);
        assert_eq!(actual.has_more(), expected.has_more());
        expected.finalize_filtering();
        actual.finalize_filtering();
        assert_eq!(actual.as_slice(), expected.as_slice(), "page size {page_size}");
    }
}

#[test]
fn test_retain_n_across_pages() {
    let records: Vec<i64> = (0..100).flat_map(|i| [i * 3, -i]).collect();
    let array = LongArray::from_words(seq(9), &records).unwrap();
    let mut buffer = QueryBuffer::new((0..300).collect());
    array.retain_n(&mut buffer, 2, i64::MAX, 0, 200).unwrap();
    buffer.finalize_filtering();
    assert_eq!(buffer.as_slice(), &(0..100).map(|i| i * 3).collect::<Vec<_>>()[..]);
}

#[test]
fn test_sorts_across_pages() {
    for n in [0usize, 1, 2, 31, 32, 63, 64, 65, 10_000] {
        let values = random_words(n, 10 + n as u64);
        let mut expected = values.clone();
        expected.sort_unstable();

        let mut array = LongArray::from_words(pow2(256), &values).unwrap();
        array.quick_sort(0, n as u64);
        assert_eq!(to_vec(&array), expected, "quick_sort n = {n}");
        assert!(LogicalArray::is_sorted(&array, 0, n as u64));

        let mut array = LongArray::from_words(seq(100), &values).unwrap();
        array.merge_sort(0, n as u64);
        assert_eq!(to_vec(&array), expected, "merge_sort n = {n}");

        let mut array = LongArray::from_words(seq(1 << 16), &values).unwrap();
        array.quick_sort(0, n as u64);
        assert_eq!(to_vec(&array), expected, "single page n = {n}");
    }
}

#[test]
fn test_sort_large_span_across_pages() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = SortingContext::new(dir.path(), 1000);
    let values = random_words(20_000, 5);

    let mut in_memory = LongArray::from_words(pow2(4096), &values).unwrap();
    in_memory.quick_sort(0, 20_000);

    let mut external = LongArray::from_words(pow2(4096), &values).unwrap();
    external.sort_large_span(&ctx, 0, 20_000).unwrap();
    assert_eq!(to_vec(&external), to_vec(&in_memory));

    let records: Vec<i64> = values.iter().flat_map(|&k| [k, k + 1]).collect();
    let mut paired = LongArray::from_words(pow2(4096), &records).unwrap();
    paired.sort_large_span_n(&ctx, 2, 0, 40_000).unwrap();
    assert!(paired.is_sorted_n(2, 0, 40_000).unwrap());
    paired.for_each(0, 40_000, |pos, v| {
        if pos % 2 == 1 {
            assert_eq!(v, paired.get(pos - 1) + 1);
        }
    });

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_write_and_map_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.dat");
    let values = random_words(1000, 6);
    let array = LongArray::from_words(pow2(128), &values).unwrap();
    array.write_to(&path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 8000);

    let mapped = LongArray::map_file_read_only(pow2(64), &path).unwrap();
    assert_eq!(mapped.size(), 1000);
    assert!(!mapped.is_writable());
    assert_eq!(to_vec(&mapped), values);
    mapped.advise(Advice::Sequential).unwrap();
    mapped.advise_range(Advice::Random, 100, 700).unwrap();

    let window =
        LongArray::map_file_range(seq(100), &path, 250, 500, MapMode::ReadOnly).unwrap();
    assert_eq!(to_vec(&window), values[250..750]);

    assert!(LongArray::map_file_range(seq(100), &path, 900, 200, MapMode::ReadOnly).is_err());
}

#[test]
fn test_map_read_write_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grow.dat");
    {
        let mut array = IntArray::map_file_read_write_with_size(seq(10), &path, 35).unwrap();
        assert!(array.is_writable());
        array.transform_each(0, 35, |pos, _| 100 - pos as i32);
        array.quick_sort(0, 35);
        array.force().unwrap();
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 35 * 4);

    let mut array = IntArray::map_file_read_write(pow2(16), &path).unwrap();
    assert_eq!(array.size(), 35);
    assert!(LogicalArray::is_sorted(&array, 0, 35));
    assert_eq!(array.get(0), 66);
    array.set(34, 1000);
    drop(array);

    let reopened = IntArray::map_file_read_only(seq(7), &path).unwrap();
    assert_eq!(reopened.get(34), 1000);

    // a read-write range past the end grows the file
    let grown = IntArray::map_file_range(seq(10), &path, 30, 20, MapMode::ReadWrite).unwrap();
    assert_eq!(grown.get(4), 1000);
    assert_eq!(grown.get(19), 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 50 * 4);
}

#[test]
fn test_map_rejects_partial_words() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.dat");
    std::fs::write(&path, [0u8; 12]).unwrap();
    assert!(LongArray::map_file_read_only(pow2(8), &path).is_err());
    let ints = IntArray::map_file_read_only(pow2(8), &path).unwrap();
    assert_eq!(ints.size(), 3);
}

#[test]
fn test_map_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.dat");
    std::fs::write(&path, b"").unwrap();
    let array = LongArray::map_file_read_only(pow2(8), &path).unwrap();
    assert_eq!(array.size(), 0);
    assert!(LogicalArray::binary_search(&array, 5, 0, 0) == SearchResult::NotFound(0));
}

#[test]
fn test_read_only_array_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.dat");
    LongArray::from_words(pow2(8), &[3, 2, 1]).unwrap().write_to(&path).unwrap();
    let mut array = LongArray::map_file_read_only(pow2(8), &path).unwrap();
    assert!(matches!(
        array.try_set(0, 1).unwrap_err().kind(),
        ErrorKind::ReadOnly { .. }
    ));
    let ctx = SortingContext::default();
    assert!(array.sort_large_span(&ctx, 0, 3).is_err());

    let spanning = path.with_extension("spanning");
    let values: Vec<i64> = (0..20).rev().collect();
    LongArray::from_words(pow2(8), &values).unwrap().write_to(&spanning).unwrap();
    let mut array = LongArray::map_file_read_only(pow2(8), &spanning).unwrap();
    assert_eq!(array.pages().len(), 3);
    assert!(matches!(
        array.sort_large_span(&ctx, 0, 20).unwrap_err().kind(),
        ErrorKind::ReadOnly { .. }
    ));
    assert!(matches!(
        array.merge_sort_external(4, 12, dir.path()).unwrap_err().kind(),
        ErrorKind::ReadOnly { .. }
    ));
    assert!(matches!(
        array.quick_sort_n(2, 0, 20).unwrap_err().kind(),
        ErrorKind::ReadOnly { .. }
    ));
    assert!(matches!(
        array.try_transform_each(0, 20, |_, v| Ok(v)).unwrap_err().kind(),
        ErrorKind::ReadOnly { .. }
    ));
    assert_eq!(to_vec(&array), values);
}

#[test]
fn test_transfer_from_file() {
    let mut file = tempfile::tempfile().unwrap();
    let source: Vec<i64> = (1000..1100).collect();
    file.write_all(bytemuck::cast_slice(&source)).unwrap();

    let mut array = LongArray::new_on_heap(seq(16), 60).unwrap();
    array.transfer_from(&file, 40, 5, 55).unwrap();
    assert_eq!(array.get(4), 0);
    assert_eq!(array.get(5), 1040);
    assert_eq!(array.get(54), 1089);
    assert_eq!(array.get(55), 0);

    assert!(array.transfer_from(&file, 0, 50, 70).is_err());
    assert!(array.transfer_from(&file, 90, 0, 20).is_err());
}

#[test]
fn test_default_scheme() {
    let mut array = PagingArray::<i32>::on_heap(10).unwrap();
    assert_eq!(array.scheme().page_size(), crate::DEFAULT_PAGE_SIZE);
    array.set(9, 1);
    assert!(format!("{array:?}").contains("PagingArray"));
}
