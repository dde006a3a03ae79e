//! A user-space heap allocator built on a Fibonacci buddy system.
//!
//! Rather than restricting block sizes to powers of two, admissible
//! block sizes are drawn from the Fibonacci sequence, and the
//! splitting/merging algebra rests on `F[n] = F[n-1] + F[n-2]`. The
//! allocator manages a single, contiguous region obtained once at
//! [`Heap::init`], and exposes two primary operations: [`Heap::allocate`]
//! a block of at least a requested number of bytes, and
//! [`Heap::release`] a previously allocated block. Freed blocks
//! opportunistically coalesce with their Fibonacci buddy to form the
//! next-larger Fibonacci-sized block.
//!
//! This crate generalizes the power-of-two `alarm-buddy` allocator in
//! this workspace: the core data-flow (scan the free list, split down to
//! a target size, coalesce on release) is the same shape, but buddy
//! identification can no longer be a single address XOR, because
//! Fibonacci splits are asymmetric (`F[i-1] != F[i-2]`). See the
//! two-orientation buddy rule inside `Heap::release`'s coalescing loop
//! for what replaces it.
#![deny(missing_docs)]

pub mod block;
pub mod error;
pub mod fib;
pub mod heap;

pub use block::BlockHeader;
pub use error::{AllocError, InitError, ReleaseError};
pub use fib::{FibError, FibTable};
pub use heap::{BlockInfo, FreeBlockInfo, Heap};
