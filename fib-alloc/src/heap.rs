//! The allocator façade: `init`, `allocate`, `release`, `dump_free_list`,
//! `shutdown`.
//!
//! Generalizes `alarm-buddy::Heap` and its `Alloc` impl. The biggest
//! structural departure from the teacher is the free list itself:
//! `alarm-buddy` keeps one LIFO free list *per order* (`free_lists: &mut
//! [FreeList]`), because within a power-of-two order any free block is
//! as good as any other. A Fibonacci buddy's coalescing pass needs to
//! find a *specific* neighbor address, so spec.md §4.2 calls for a
//! single address-sorted list instead — see [`fib_list::List`].
//!
//! Per spec.md §9's redesign note, every piece of allocator state
//! (`heap_start`, the Fibonacci table, the free-list head) lives in one
//! `Heap` value passed explicitly to every operation, rather than in
//! the teacher's file-scope globals. This also means more than one
//! `Heap` can exist at a time, each over its own backing region.
use std::ptr::NonNull;

use fib_list::List;
use log::{debug, trace, warn};

use crate::block::BlockHeader;
use crate::error::{AllocError, InitError, ReleaseError};
use crate::fib::FibTable;

/// A single free block's description, as returned by
/// [`Heap::dump_free_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlockInfo {
    /// Offset of the block's base address from the start of the heap.
    pub base_offset: usize,
    /// Total footprint of the block in bytes, header included.
    pub size: usize,
    /// The block's Fibonacci index.
    pub fib_index: usize,
}

/// One block's description — free or allocated — as returned by
/// [`Heap::dump_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block's base address from the start of the heap.
    pub base_offset: usize,
    /// Total footprint of the block in bytes, header included.
    pub size: usize,
    /// The block's Fibonacci index.
    pub fib_index: usize,
    /// Whether the block is currently free.
    pub is_free: bool,
}

/// A Fibonacci buddy heap over a single, owned backing region.
///
/// The allocator is single-threaded and synchronous (spec.md §5): every
/// call here runs to completion with no suspension points, and the
/// caller is responsible for serializing concurrent access.
pub struct Heap {
    region: Box<[u8]>,
    table: FibTable,
    free: List<BlockHeader>,
    /// `F[K-1]`: the tiled, usable portion of the backing region. Bytes
    /// of `region` beyond this are permanently unused (spec.md §4.7).
    capacity: usize,
}

impl Heap {
    /// Obtain a backing region of `bytes` bytes and initialize a single
    /// free block spanning its usable (Fibonacci-tileable) prefix.
    pub fn init(bytes: usize) -> Result<Self, InitError> {
        let header_size = BlockHeader::SIZE;
        let minimum = 2 + header_size; // F[1] + H
        if bytes < minimum {
            return Err(InitError::TooSmall { bytes, minimum });
        }

        // `FibError` can only fire on capacity 0, already excluded above.
        let table = FibTable::build(bytes).expect("capacity already checked above");
        let capacity = table.value(table.count() - 1);

        let mut region = vec![0u8; bytes].into_boxed_slice();
        let base = NonNull::new(region.as_mut_ptr()).expect("boxed slice is never null");

        let mut free = List::new();
        unsafe {
            let head = BlockHeader::write_free(base.cast(), capacity, table.count() - 1);
            free.insert(head);
        }

        debug!(
            "fib-alloc: initialized {} bytes ({} usable) as one F[{}] block",
            bytes,
            capacity,
            table.count() - 1
        );

        Ok(Heap {
            region,
            table,
            free,
            capacity,
        })
    }

    /// The usable heap capacity, `F[K-1]`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn heap_start(&self) -> usize {
        self.region.as_ptr() as usize
    }

    /// Allocate a block of at least `n` bytes.
    ///
    /// Rounds `n + header_size` up to the smallest admissible Fibonacci
    /// size, scans the free list once for an exact-index match or (if
    /// none exists) the first larger block, and splits that block down
    /// to the target index before handing it out.
    pub fn allocate(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        let header_size = BlockHeader::SIZE;
        let need = n
            .checked_add(header_size)
            .filter(|&need| need <= self.capacity)
            .ok_or(AllocError::OutOfMemory { requested: n })?;

        let target = self
            .table
            .smallest_index_at_least(need)
            .ok_or(AllocError::OutOfMemory { requested: n })?;

        // Single ascending-address pass: exact match wins outright; the
        // first block with a strictly larger index is the fallback.
        // Both candidates are already verified `fib_index >= target`
        // before we touch the free list, so once we commit to a
        // candidate the split below can never fail partway through
        // (spec.md §7's rollback-safety requirement).
        let mut exact: Option<NonNull<BlockHeader>> = None;
        let mut larger: Option<NonNull<BlockHeader>> = None;
        unsafe {
            for node in self.free.iter() {
                let fib_index = BlockHeader::load(node).fib_index;
                if fib_index == target {
                    exact = Some(node);
                    break;
                }
                if larger.is_none() && fib_index > target {
                    larger = Some(node);
                }
            }
        }

        let chosen = exact.or(larger).ok_or(AllocError::OutOfMemory { requested: n })?;

        unsafe {
            self.free.remove(chosen);

            let mut current = chosen;
            while BlockHeader::load(current).fib_index > target {
                let (left, right) = BlockHeader::split(&self.table, current);
                trace!(
                    "fib-alloc: split index {} into left idx {} / right idx {}",
                    BlockHeader::load(current).fib_index,
                    BlockHeader::load(left).fib_index,
                    BlockHeader::load(right).fib_index
                );
                self.free.insert(right);
                current = left;
            }

            let mut header = BlockHeader::load(current);
            header.is_free = false;
            header.req_size = n;
            BlockHeader::store(current, header);

            Ok(BlockHeader::payload_ptr(current))
        }
    }

    /// Release a block previously returned by `allocate`.
    pub fn release(&mut self, ptr: NonNull<u8>) -> Result<(), ReleaseError> {
        let addr = ptr.as_ptr() as usize;
        let block = BlockHeader::header_of(ptr).ok_or(ReleaseError::InvalidPointer { address: addr })?;

        let start = self.heap_start();
        let end = start + self.capacity;
        let block_addr = block.as_ptr() as usize;
        if block_addr < start || addr > end {
            return Err(ReleaseError::InvalidPointer { address: addr });
        }

        // The range check above only rules out pointers outside the
        // backing region; it cannot tell a genuine block boundary from
        // an address in the middle of someone else's live block (e.g.
        // `release(payload.add(1))`). Load the header before trusting
        // any of it, and reject anything whose own bookkeeping is
        // inconsistent with this heap's Fibonacci table, or whose
        // footprint would run past the end of the heap, or that is
        // already free. In particular this keeps `fib_index` in range
        // *before* any later lookup indexes the table with it — an
        // out-of-range index from a fabricated header must become
        // `InvalidPointer`, not a panic.
        let header = unsafe { BlockHeader::load(block) };
        let fib_index_in_range = header.fib_index < self.table.count();
        let is_well_formed = fib_index_in_range
            && header.size == self.table.value(header.fib_index)
            && block_addr + header.size <= end;
        if !is_well_formed || header.is_free {
            return Err(ReleaseError::InvalidPointer { address: addr });
        }

        unsafe {
            let mut header = header;
            header.is_free = true;
            header.req_size = 0;
            BlockHeader::store(block, header);
        }

        let mut current = block;
        while let Some(merged) = unsafe { self.try_merge_once(current) } {
            current = merged;
        }
        unsafe { self.free.insert(current) };

        Ok(())
    }

    /// Attempt a single buddy merge starting from `current`, returning
    /// the merged block if one of the two orientations in spec.md §4.6
    /// matched, or `None` if neither did.
    ///
    /// # Safety
    /// `current` must be a valid, currently-detached free header.
    unsafe fn try_merge_once(&mut self, current: NonNull<BlockHeader>) -> Option<NonNull<BlockHeader>> {
        let i = BlockHeader::load(current).fib_index;
        let k = self.table.count();
        let size = self.table.value(i);
        let addr = current.as_ptr() as usize;
        let start = self.heap_start();

        // Right-neighbor candidate: `current` as the left child (index
        // `i`) of a parent of index `i+1`, whose right child must be
        // index `i-1`.
        if i >= 1 && i + 1 < k {
            let right_addr = addr + size;
            if let Some(buddy) = self.free.remove_at(right_addr) {
                if BlockHeader::load(buddy).fib_index == i - 1 {
                    let merged = BlockHeader::merge(&self.table, current, buddy, i + 1);
                    trace!("fib-alloc: merged idx {} + right idx {} -> idx {}", i, i - 1, i + 1);
                    return Some(merged);
                }
                // Not a buddy at this orientation; put it back before
                // trying the other one.
                self.free.insert(buddy);
            }
        }

        // Left-neighbor candidate: `current` as the right child (index
        // `i`) of a parent of index `i+2`, whose left child must be
        // index `i+1`, starting `F[i+1]` bytes before `current`.
        if i + 2 < k {
            let left_child_size = self.table.value(i + 1);
            if addr >= start + left_child_size {
                let left_addr = addr - left_child_size;
                if let Some(buddy) = self.free.remove_at(left_addr) {
                    if BlockHeader::load(buddy).fib_index == i + 1 {
                        let merged = BlockHeader::merge(&self.table, buddy, current, i + 2);
                        trace!("fib-alloc: merged left idx {} + idx {} -> idx {}", i + 1, i, i + 2);
                        return Some(merged);
                    }
                    self.free.insert(buddy);
                }
            }
        }

        None
    }

    /// A read-only, address-ordered snapshot of the free list. Does not
    /// mutate allocator state.
    pub fn dump_free_list(&self) -> Vec<FreeBlockInfo> {
        let start = self.heap_start();
        unsafe {
            self.free
                .iter()
                .map(|b| {
                    let header = BlockHeader::load(b);
                    FreeBlockInfo {
                        base_offset: (b.as_ptr() as usize) - start,
                        size: header.size,
                        fib_index: header.fib_index,
                    }
                })
                .collect()
        }
    }

    /// A read-only walk of every block, free or allocated, in address
    /// order — used to verify spec.md §8's tiling invariant (every block
    /// footprint together exactly covers `[heap_start, heap_start +
    /// capacity)` with no gaps or overlaps). Each block's own `size`
    /// gives the stride to the next one, starting from `heap_start`;
    /// this is sound because every offset this walk lands on is, by
    /// construction of `allocate`/`release`, the base of some node in
    /// the Fibonacci split tree. Does not mutate state.
    pub fn dump_blocks(&self) -> Vec<BlockInfo> {
        let start = self.heap_start();
        let mut blocks = Vec::new();
        let mut offset = 0usize;
        while offset < self.capacity {
            let ptr = unsafe { NonNull::new_unchecked((start + offset) as *mut BlockHeader) };
            let header = unsafe { BlockHeader::load(ptr) };
            blocks.push(BlockInfo {
                base_offset: offset,
                size: header.size,
                fib_index: header.fib_index,
                is_free: header.is_free,
            });
            offset += header.size;
        }
        blocks
    }

    /// `true` if the entire heap is one free block of index `K-1` — the
    /// state spec.md §8's round-trip law guarantees after releasing
    /// every outstanding allocation.
    pub fn is_fully_coalesced(&self) -> bool {
        let free = self.dump_free_list();
        free.len() == 1 && free[0].fib_index == self.table.count() - 1
    }

    /// Number of entries in the Fibonacci table backing this heap.
    #[inline]
    pub fn fib_index_count(&self) -> usize {
        self.table.count()
    }

    /// Size in bytes of the header stored before every block's payload.
    #[inline]
    pub fn header_size(&self) -> usize {
        BlockHeader::SIZE
    }

    /// Tear down the heap, logging its final free-list state.
    ///
    /// Consumes `self`; the backing region is dropped along with it and
    /// does not need to (and cannot) survive process exit (spec.md §6).
    pub fn shutdown(self) {
        if self.is_fully_coalesced() {
            debug!("fib-alloc: shutting down, heap fully coalesced");
        } else {
            let free = self.dump_free_list();
            warn!(
                "fib-alloc: shutting down with {} free block(s) outstanding: {:?}",
                free.len(),
                free
            );
        }
    }
}
