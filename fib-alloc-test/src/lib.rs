//! Shared test scaffolding for `fib-alloc`.
//!
//! Generalizes `alarm-test`'s role in the teacher workspace: there, a
//! `MockFrame`/`MockAddress` pair gives every allocator crate a cheap
//! stand-in backing store to test against. This crate plays the same
//! role for the Fibonacci allocator's testable properties (spec.md §8):
//! rather than a mock frame, it exposes invariant-checking helpers that
//! any test — unit, integration, or quickcheck property — can call after
//! driving a [`Heap`](fib_alloc::Heap) through a sequence of operations.

use fib_alloc::Heap;

/// Asserts that the free list is sorted strictly ascending by base
/// address with no duplicate addresses (spec.md §8, invariant 2).
pub fn assert_free_list_sorted(heap: &Heap) {
    let dump = heap.dump_free_list();
    for pair in dump.windows(2) {
        assert!(
            pair[0].base_offset < pair[1].base_offset,
            "free list out of order or duplicated: {:?} then {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Asserts that no two free blocks are unmerged buddies (spec.md §8,
/// invariant 3: maximal coalescing).
///
/// Two free blocks `a` (lower address) and `b` (higher address) are
/// buddies exactly when they are physically adjacent (`b` starts where
/// `a` ends) and `a.fib_index == b.fib_index + 1` — `a` is the larger,
/// left-placed half of the Fibonacci split that produced both of them.
/// This single check covers both orientations described in spec.md
/// §4.6: from `a`'s perspective this is the "right neighbor" rule, and
/// from `b`'s perspective it is the "left neighbor" rule — they describe
/// the same geometric relationship.
pub fn assert_maximally_coalesced(heap: &Heap) {
    let dump = heap.dump_free_list();
    for pair in dump.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let adjacent = b.base_offset == a.base_offset + a.size;
        if adjacent {
            assert_ne!(
                a.fib_index,
                b.fib_index + 1,
                "unmerged buddy pair left in free list: {:?} and {:?}",
                a,
                b
            );
        }
    }
}

/// Asserts that every header's `size` equals `F[fib_index]` for the
/// blocks currently on the free list (spec.md §8, invariant 1) by
/// checking consistency with the heap's own table: the dump only ever
/// reports `(size, fib_index)` pairs the allocator itself assigned, so
/// this mostly guards against a future refactor accidentally
/// desynchronizing the two fields.
pub fn assert_sizes_match_index(heap: &Heap) {
    // `Heap` doesn't expose the raw table (by design — callers reason in
    // terms of bytes, not indices), so we rebuild the expected value
    // table up to the heap's own capacity and compare against it.
    let mut fib = vec![1usize];
    if heap.capacity() >= 2 {
        fib.push(2);
        loop {
            let next = fib[fib.len() - 1] + fib[fib.len() - 2];
            if next > heap.capacity() {
                break;
            }
            fib.push(next);
        }
    }
    assert_eq!(fib.len(), heap.fib_index_count());

    for entry in heap.dump_free_list() {
        assert_eq!(
            entry.size, fib[entry.fib_index],
            "free block {:?} has size inconsistent with its fib_index",
            entry
        );
    }
}

/// Asserts that the set of all blocks — free and allocated alike —
/// exactly tiles `[heap_start, heap_start + capacity)`, with no gaps and
/// no overlaps (spec.md §8, invariant 4). Walks `Heap::dump_blocks`,
/// which derives each block's extent from its own `size` field; a
/// corrupted header (for instance, one written at a misaligned offset
/// that clobbered a neighbor) shows up here as the walk landing on the
/// wrong next offset or overrunning `capacity`.
pub fn assert_tiles_capacity(heap: &Heap) {
    let blocks = heap.dump_blocks();
    assert!(!blocks.is_empty(), "heap has no blocks at all");

    let mut cursor = 0usize;
    for block in &blocks {
        assert_eq!(
            block.base_offset, cursor,
            "gap or overlap in block tiling: expected a block at offset {}, found one at {}",
            cursor, block.base_offset
        );
        cursor += block.size;
    }
    assert_eq!(
        cursor,
        heap.capacity(),
        "blocks do not exactly tile the heap's capacity"
    );
}

/// Runs all invariant checks in one call. Intended to be called after
/// every `allocate`/`release` in a test driving the heap through a
/// sequence of operations, per spec.md §8 ("must hold after every public
/// call").
pub fn assert_invariants(heap: &Heap) {
    assert_free_list_sorted(heap);
    assert_maximally_coalesced(heap);
    assert_sizes_match_index(heap);
    assert_tiles_capacity(heap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;

    /// The round-trip law (spec.md §8): any sequence of allocations
    /// whose Fibonacci-rounded sizes fit the heap, released in any
    /// order, returns the heap to a single free block of index `K-1`.
    fn round_trip(capacity: usize, sizes: Vec<usize>, release_order: Vec<usize>) -> TestResult {
        let capacity = (capacity % 4096) + 64;
        let mut heap = match Heap::init(capacity) {
            Ok(heap) => heap,
            Err(_) => return TestResult::discard(),
        };

        let mut handles = Vec::new();
        for size in sizes {
            let size = size % 64;
            match heap.allocate(size) {
                Ok(ptr) => handles.push(ptr),
                Err(_) => break,
            }
            assert_invariants(&heap);
        }

        if handles.is_empty() {
            return TestResult::discard();
        }

        // `release_order` is an arbitrary permutation key: sort the
        // handles by an index derived from it so releases happen in a
        // scrambled, but still deterministic, order.
        let mut order: Vec<usize> = (0..handles.len()).collect();
        order.sort_by_key(|&i| release_order.get(i).copied().unwrap_or(i));

        for i in order {
            heap.release(handles[i]).expect("release of a live allocation must succeed");
            assert_invariants(&heap);
        }

        TestResult::from_bool(heap.is_fully_coalesced())
    }

    quickcheck::quickcheck! {
        fn round_trip_always_fully_coalesces(capacity: usize, sizes: Vec<usize>, order: Vec<usize>) -> TestResult {
            round_trip(capacity, sizes, order)
        }
    }

    #[test]
    fn empty_heap_is_one_block() {
        let heap = Heap::init(144).unwrap();
        assert_invariants(&heap);
        assert!(heap.is_fully_coalesced());
    }
}
