//! # Offset Suballocator
//!
//! An `O(1)` offset-based suballocator for carving a single contiguous
//! address range — a GPU heap, an arena, a slab of shared memory, anything
//! addressed by `(offset, size)` rather than a raw pointer — into
//! variable-sized blocks.
//!
//! ## Algorithm
//!
//! Free blocks are grouped into 256 size classes ([`bins`]) using a
//! logarithmic quantization scheme ([`small_float`]) with 5 exponent bits and
//! 3 mantissa bits, so the worst-case internal fragmentation from rounding a
//! request up to its size class is bounded at ~12.5%. A two-level bitmap
//! (32 top bins of 8 leaves each) lets [`Allocator::allocate`] find the
//! smallest satisfying size class in a handful of bit operations instead of a
//! linear scan.
//!
//! Every block — used or free — is a [`Node`](node) descriptor drawn from a
//! fixed-capacity pool ([`pool`]) sized once at construction. Descriptors
//! track their *physical* left/right neighbors independently of their
//! *logical* bin membership, which is what lets [`Allocator::free`] coalesce
//! adjacent free blocks in constant time: no block ever needs to scan the
//! region to find out what is next to it.
//!
//! ## Example
//!
//! ```
//! use offset_suballocator::Allocator;
//!
//! let mut allocator = Allocator::new(1024, 128).unwrap();
//! let a = allocator.allocate(100).unwrap();
//! let b = allocator.allocate(200).unwrap();
//! assert_eq!(a.offset, 0);
//! assert_eq!(b.offset, 100);
//!
//! allocator.free(a);
//! let report = allocator.storage_report();
//! assert_eq!(report.total_free_space, 824);
//! ```
//!
//! ## Concurrency
//!
//! [`Allocator`] is `!Sync` by convention of use, not by type: nothing
//! inside it is atomic or lock-protected. Callers sharing one allocator
//! across threads must serialize access themselves, the same way a caller
//! of a `kernel-sync` spinlock-guarded structure would.
//!
//! ## Non-goals
//!
//! This crate does not touch the memory the offsets describe: it hands out
//! `(offset, size)` pairs and nothing else. It performs no defragmentation
//! or compaction pass — coalescing is strictly neighbor-local and
//! constant-time. It is single-threaded by design; wrap an [`Allocator`] in
//! whatever synchronization primitive fits the caller's environment.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod allocator;
pub mod bins;
pub mod error;
mod node;
mod pool;
pub mod small_float;

pub use allocator::{Allocation, Allocator, BinState, StorageReport};
pub use error::AllocatorError;
