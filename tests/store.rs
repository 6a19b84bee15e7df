//! Behavior of the row store: chunk rotation, recycling, memory accounting,
//! bulk ingestion, pointer validity and scanning.

use std::fmt;
use std::sync::Arc;

use rowstore::{
    Chunk, ColumnType, Datum, Fixed, GrowthPolicy, MemTracker, RowPtr, RowStore, Schema,
    StoreConfig, StoreError,
};

fn int_schema() -> Schema {
    Schema::new(vec![ColumnType::Int64])
}

fn store(init: usize, max: usize) -> RowStore {
    RowStore::new(int_schema(), StoreConfig::new(init, max).unwrap())
}

fn push(store: &mut RowStore, v: i64) -> RowPtr {
    store.append_values(&[Datum::Int64(v)]).unwrap()
}

fn capacities(store: &RowStore) -> Vec<usize> {
    store.chunks().iter().map(|c| c.capacity()).collect()
}

fn row_counts(store: &RowStore) -> Vec<usize> {
    (0..store.num_chunks())
        .map(|i| store.num_rows_of_chunk(i).unwrap())
        .collect()
}

fn int_chunk(values: &[i64]) -> Chunk {
    let mut chunk = Chunk::with_capacity(&int_schema(), values.len());
    for &v in values {
        chunk.append_values(&[Datum::Int64(v)]).unwrap();
    }
    chunk
}

fn scanned(store: &RowStore) -> Vec<i64> {
    store
        .iter()
        .map(|row| match row.to_datums()[0] {
            Datum::Int64(v) => v,
            ref other => panic!("unexpected value {:?}", other),
        })
        .collect()
}

#[derive(Debug)]
struct StopAt(i64);

impl fmt::Display for StopAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stopped at {}", self.0)
    }
}

impl std::error::Error for StopAt {}

// ============================================================
// Example scenarios
// ============================================================

#[test]
fn test_five_appends_grow_chunks() {
    let mut s = store(2, 4);
    for v in 0..5 {
        push(&mut s, v);
    }
    assert_eq!(capacities(&s), vec![2, 4]);
    assert_eq!(row_counts(&s), vec![2, 3]);
    assert_eq!(s.len(), 5);
}

#[test]
fn test_reset_moves_chunks_to_freelist() {
    let mut s = store(2, 4);
    for v in 0..5 {
        push(&mut s, v);
    }
    s.reset();
    assert_eq!(s.len(), 0);
    assert!(s.is_empty());
    assert_eq!(s.num_chunks(), 0);
    let mut retired: Vec<usize> = s.freelist().iter().map(|c| c.capacity()).collect();
    retired.sort_unstable();
    assert_eq!(retired, vec![2, 4]);
}

#[test]
fn test_bulk_then_single_opens_new_chunk() {
    let mut s = store(2, 4);
    s.add_chunk(int_chunk(&[10, 11, 12])).unwrap();
    push(&mut s, 13);
    assert_eq!(s.num_chunks(), 2);
    assert_eq!(row_counts(&s), vec![3, 1]);
    let bulk = s.chunk(0).unwrap();
    assert_eq!(bulk.capacity(), 3);
    assert_eq!(bulk.get_row(2).to_datums(), vec![Datum::Int64(12)]);
    assert_eq!(scanned(&s), vec![10, 11, 12, 13]);
}

#[test]
fn test_walk_stops_at_first_failure() {
    let mut s = store(2, 4);
    for v in 1..=5 {
        push(&mut s, v);
    }
    let mut visited = Vec::new();
    let err = s
        .walk(|row| {
            let v = match row.get(0) {
                rowstore::DatumRef::Int64(v) => v,
                _ => unreachable!(),
            };
            visited.push(v);
            if v == 3 { Err(StopAt(v)) } else { Ok(()) }
        })
        .unwrap_err();

    assert_eq!(visited, vec![1, 2, 3]);
    match err {
        StoreError::Walk {
            chunk_idx,
            row_idx,
            source,
        } => {
            assert_eq!((chunk_idx, row_idx), (1, 0));
            let stop = source.downcast_ref::<StopAt>().expect("visitor error preserved");
            assert_eq!(stop.0, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================
// Append and rotation
// ============================================================

#[test]
fn test_row_ptrs_address_appended_rows() {
    let mut s = store(2, 4);
    let ptrs: Vec<RowPtr> = (0..9).map(|v| push(&mut s, v * 10)).collect();
    assert_eq!((ptrs[0].chunk_idx, ptrs[0].row_idx), (0, 0));
    assert_eq!((ptrs[2].chunk_idx, ptrs[2].row_idx), (1, 0));
    assert_eq!((ptrs[6].chunk_idx, ptrs[6].row_idx), (2, 0));
    for (v, ptr) in ptrs.iter().enumerate() {
        let row = s.get_row(*ptr).unwrap();
        assert_eq!(row.to_datums(), vec![Datum::Int64(v as i64 * 10)]);
    }
}

#[test]
fn test_append_row_copies_from_other_store() {
    let mut src = store(4, 4);
    let ptr = push(&mut src, 42);
    let mut dst = store(1, 1);
    let copied = dst.append_row(src.get_row(ptr).unwrap()).unwrap();
    src.clear();
    assert_eq!(
        dst.get_row(copied).unwrap().to_datums(),
        vec![Datum::Int64(42)]
    );
}

#[test]
fn test_append_rejects_mismatched_values() {
    let mut s = store(2, 4);
    let err = s.append_values(&[Datum::from("text")]).unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch(_)));
    assert_eq!(s.len(), 0);
    assert_eq!(s.num_chunks(), 0);
}

#[test]
fn test_capacity_capped_at_max() {
    let mut s = store(1, 4);
    for v in 0..20 {
        push(&mut s, v);
    }
    assert_eq!(capacities(&s), vec![1, 2, 4, 4, 4, 4, 4]);
}

#[test]
fn test_init_above_max_is_clamped() {
    let mut s = store(16, 4);
    push(&mut s, 1);
    assert_eq!(capacities(&s), vec![4]);
}

// ============================================================
// Growth policies
// ============================================================

#[derive(Debug)]
struct Tripling;

impl GrowthPolicy for Tripling {
    fn next_capacity(&self, prev_capacity: usize, max_capacity: usize) -> usize {
        (prev_capacity * 3).min(max_capacity)
    }
}

#[test]
fn test_custom_growth_policy() {
    let mut s = store(1, 100).with_growth_policy(Tripling);
    for v in 0..40 {
        push(&mut s, v);
    }
    assert_eq!(capacities(&s), vec![1, 3, 9, 27]);
}

#[test]
fn test_fixed_growth_policy() {
    let mut s = store(1, 100).with_growth_policy(Fixed { capacity: 3 });
    for v in 0..7 {
        push(&mut s, v);
    }
    assert_eq!(capacities(&s), vec![3, 3, 3]);
    assert_eq!(row_counts(&s), vec![3, 3, 1]);
}

// ============================================================
// Recycling
// ============================================================

#[test]
fn test_append_after_reset_reuses_retired_chunk() {
    let mut s = store(2, 4);
    for v in 0..5 {
        push(&mut s, v);
    }
    s.reset();
    let ptr = push(&mut s, 99);
    assert_eq!((ptr.chunk_idx, ptr.row_idx), (0, 0));
    assert_eq!(s.num_chunks(), 1);
    assert_eq!(s.chunk(0).unwrap().capacity(), 4);
    assert_eq!(s.freelist().len(), 1);
    assert_eq!(s.freelist()[0].capacity(), 2);
    assert_eq!(scanned(&s), vec![99]);
}

#[test]
fn test_refill_after_reset_keeps_rows_in_order() {
    let mut s = store(2, 4);
    for v in 0..6 {
        push(&mut s, v);
    }
    s.reset();
    for v in 100..106 {
        push(&mut s, v);
    }
    assert_eq!(scanned(&s), (100..106).collect::<Vec<_>>());
    assert_eq!(s.len(), 6);
    assert!(s.freelist().is_empty());
}

#[test]
fn test_stale_ptr_rejected_after_reset() {
    let mut s = store(2, 4);
    let old = push(&mut s, 1);
    s.reset();
    let new = push(&mut s, 2);
    assert_eq!((old.chunk_idx, old.row_idx), (new.chunk_idx, new.row_idx));
    assert!(matches!(
        s.get_row(old),
        Err(StoreError::StaleRowPtr {
            ptr_epoch: 0,
            store_epoch: 1
        })
    ));
    assert_eq!(s.get_row(new).unwrap().to_datums(), vec![Datum::Int64(2)]);
}

#[test]
fn test_stale_ptr_rejected_after_clear() {
    let mut s = store(2, 4);
    let old = push(&mut s, 1);
    s.clear();
    assert!(matches!(s.get_row(old), Err(StoreError::StaleRowPtr { .. })));
}

#[test]
fn test_out_of_bounds_ptr() {
    let mut s = store(2, 4);
    let mut ptr = push(&mut s, 1);
    ptr.row_idx = 1;
    assert!(matches!(
        s.get_row(ptr),
        Err(StoreError::RowOutOfBounds {
            chunk_idx: 0,
            row_idx: 1
        })
    ));
    ptr.chunk_idx = 7;
    assert!(matches!(s.get_row(ptr), Err(StoreError::RowOutOfBounds { .. })));
}

// ============================================================
// Bulk ingestion
// ============================================================

#[test]
fn test_add_empty_chunk_is_rejected() {
    let mut s = store(2, 4);
    let err = s.add_chunk(Chunk::with_capacity(&int_schema(), 4)).unwrap_err();
    assert!(matches!(err, StoreError::EmptyChunk));
    assert_eq!(s.num_chunks(), 0);
}

#[test]
fn test_add_chunk_with_other_schema_is_rejected() {
    let mut s = store(2, 4);
    let mut chunk = Chunk::with_capacity(&Schema::new(vec![ColumnType::Bytes]), 1);
    chunk.append_values(&[Datum::from("x")]).unwrap();
    assert!(matches!(
        s.add_chunk(chunk),
        Err(StoreError::SchemaMismatch(_))
    ));
}

#[test]
fn test_add_chunk_seals_partial_chunk() {
    let mut s = store(4, 4);
    push(&mut s, 1);
    assert_eq!(s.sealed_idx(), None);
    s.add_chunk(int_chunk(&[2, 3])).unwrap();
    assert_eq!(s.sealed_idx(), Some(1));
    let expected: i64 = s.chunks().iter().map(|c| c.memory_usage() as i64).sum();
    assert_eq!(s.tracked_bytes(), expected);
    assert_eq!(s.tracker().bytes_consumed(), expected);
    push(&mut s, 4);
    assert_eq!(row_counts(&s), vec![1, 2, 1]);
    assert_eq!(scanned(&s), vec![1, 2, 3, 4]);
}

#[test]
fn test_interleaved_bulk_and_single_count() {
    let mut s = store(2, 8);
    push(&mut s, 0);
    s.add_chunk(int_chunk(&[1, 2, 3])).unwrap();
    s.add_chunk(int_chunk(&[4])).unwrap();
    push(&mut s, 5);
    push(&mut s, 6);
    assert_eq!(s.len(), 7);
    assert_eq!(row_counts(&s).iter().sum::<usize>(), 7);
    assert_eq!(scanned(&s), (0..7).collect::<Vec<_>>());
}

// ============================================================
// Memory accounting
// ============================================================

#[test]
fn test_clear_returns_all_memory() {
    let mut s = store(2, 4);
    for v in 0..9 {
        push(&mut s, v);
    }
    s.reset();
    for v in 0..3 {
        push(&mut s, v);
    }
    s.add_chunk(int_chunk(&[1, 2])).unwrap();
    assert!(s.tracker().bytes_consumed() > 0);
    s.clear();
    assert_eq!(s.tracker().bytes_consumed(), 0);
    assert_eq!(s.tracked_bytes(), 0);
    assert_eq!(s.len(), 0);
    assert_eq!(s.num_chunks(), 0);
    assert!(s.freelist().is_empty());
}

#[test]
fn test_tracker_matches_tracked_bytes_after_reset_cycles() {
    let mut s = store(2, 16);
    for pass in 0..4 {
        if pass > 0 {
            s.reset();
        }
        for v in 0..(10 + pass * 7) {
            push(&mut s, v);
        }
        assert_eq!(s.tracker().bytes_consumed(), s.tracked_bytes());
    }
    s.reset();
    let all: i64 = s.freelist().iter().map(|c| c.memory_usage() as i64).sum();
    assert_eq!(s.tracked_bytes(), all);
}

#[test]
fn test_budget_exhaustion_leaves_store_unchanged() {
    let sample = int_chunk(&[0, 0]);
    let limit = sample.memory_usage() as i64;
    let tracker = MemTracker::with_limit("query", limit);
    let mut s = RowStore::with_tracker(
        int_schema(),
        StoreConfig::new(2, 2).unwrap(),
        Arc::clone(&tracker),
    );
    for v in 0..4 {
        push(&mut s, v);
    }
    // Sealing the second chunk would exceed the budget.
    let err = s.append_values(&[Datum::Int64(4)]).unwrap_err();
    assert!(matches!(err, StoreError::MemoryLimitExceeded { .. }));
    assert_eq!(s.len(), 4);
    assert_eq!(s.num_chunks(), 2);
    assert_eq!(s.sealed_idx(), Some(0));
    assert_eq!(tracker.bytes_consumed(), limit);
}

#[test]
fn test_sibling_stores_share_parent_tracker() {
    let query = MemTracker::new("query");
    let mut a = RowStore::with_tracker(
        int_schema(),
        StoreConfig::new(1, 1).unwrap(),
        query.child("a", None),
    );
    let mut b = RowStore::with_tracker(
        int_schema(),
        StoreConfig::new(1, 1).unwrap(),
        query.child("b", None),
    );
    for v in 0..3 {
        push(&mut a, v);
        push(&mut b, v);
    }
    let a_bytes = a.tracked_bytes();
    assert_eq!(query.bytes_consumed(), a_bytes + b.tracked_bytes());
    a.clear();
    assert_eq!(a.tracker().bytes_consumed(), 0);
    assert_eq!(query.bytes_consumed(), b.tracked_bytes());
    drop(b);
    assert_eq!(query.bytes_consumed(), 0);
}
