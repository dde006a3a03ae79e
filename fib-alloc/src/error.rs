//! Error types for the allocator façade.
//!
//! Generalizes `alarm-base`'s `AllocErr`/`AllocResult` pair: there, a
//! single `AllocErr` covers every way a frame-backed allocator can fail.
//! Here the core draws a sharper line because the two failure kinds have
//! different blast radii (spec.md §7): `AllocError` is an ordinary,
//! recoverable condition a caller can retry after freeing something;
//! `ReleaseError` is a programming error the caller made, and internal
//! consistency violations (a corrupted header, a broken free-list) are
//! not represented here at all — those are fatal and panic rather than
//! return an `Err`.

use thiserror::Error;

/// Could not set up a [`crate::Heap`] over a backing region.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitError {
    /// The backing region is smaller than the minimum admissible block
    /// (`F[1]` bytes) plus one header.
    #[error(
        "backing region of {bytes} bytes is smaller than the minimum usable heap ({minimum} bytes)"
    )]
    TooSmall {
        /// Size of the backing region that was supplied.
        bytes: usize,
        /// Smallest backing region size that would have worked.
        minimum: usize,
    },
}

/// `allocate` could not satisfy a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    /// No free block — after all possible splits — was large enough.
    #[error("out of memory: no free block large enough for a {requested}-byte allocation")]
    OutOfMemory {
        /// Bytes the caller asked for.
        requested: usize,
    },
}

/// `release` was called with an argument that is not a live allocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseError {
    /// The pointer does not correspond to a block currently on loan from
    /// this heap: it is outside the backing region, misaligned to a
    /// header boundary, or already free.
    #[error("invalid pointer: {address:#x} is not a live allocation in this heap")]
    InvalidPointer {
        /// The address the caller passed to `release`.
        address: usize,
    },
}
