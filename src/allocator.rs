//! The allocator engine: `allocate` / `free` / reporting, composing the
//! `SmallFloat` codec, the two-level bin index, and the node pool.

use crate::bins::{self, BinIndex};
use crate::error::AllocatorError;
use crate::node::{self, Node, NodeIndex, NONE};
use crate::pool::NodePool;
use crate::small_float;

/// An opaque handle to a live allocation.
///
/// Returned by [`Allocator::allocate`], consumed by [`Allocator::free`]. The
/// `offset` field is a convenience for callers that want the block's
/// position without a round trip through the allocator; `node` is private
/// and only meaningful to the [`Allocator`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an Allocation must be passed to Allocator::free or its block leaks"]
pub struct Allocation {
    node: NodeIndex,
    /// Offset of the block within the region, in the same units as
    /// [`Allocator::region_size`].
    pub offset: u32,
}

/// Snapshot returned by [`Allocator::storage_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageReport {
    /// Sum of the sizes of every free block.
    pub total_free_space: u32,
    /// Size of the largest single free block (decoded from its bin, so it
    /// may understate the true size by up to the bin's quantization step).
    pub largest_free_region: u32,
    /// Total number of size-class bins (always 256).
    pub number_of_bins: u32,
    /// Number of bins that currently hold at least one free block.
    pub number_of_used_bins: u32,
}

/// Snapshot returned by [`Allocator::storage_bin_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinState {
    /// The size class this bin represents.
    pub size: u32,
    /// Number of free blocks currently queued in this bin.
    pub count: u32,
}

/// An O(1) offset-based suballocator over `[0, region_size)`.
///
/// See the crate-level documentation for the algorithm. This type owns no
/// memory belonging to the region itself — it only hands out `(offset,
/// size)` pairs as [`Allocation`] handles; dereferencing those offsets is
/// entirely the caller's responsibility.
pub struct Allocator {
    region_size: u32,
    free_storage: u32,
    bins: BinIndex,
    pool: NodePool,
}

impl Allocator {
    /// Default `max_allocations` used by [`Allocator::new_default`], matching
    /// the reference implementation's default budget.
    pub const DEFAULT_MAX_ALLOCATIONS: u32 = 128 * 1024;

    pub const NUM_TOP_BINS: u32 = bins::NUM_TOP_BINS;
    pub const BINS_PER_LEAF: u32 = bins::BINS_PER_LEAF;
    pub const NUM_LEAF_BINS: u32 = bins::NUM_LEAF_BINS;
    pub const MANTISSA_BITS: u32 = small_float::MANTISSA_BITS;
    pub const TOP_BINS_INDEX_SHIFT: u32 = bins::TOP_BINS_INDEX_SHIFT;
    pub const LEAF_BINS_INDEX_MASK: u32 = bins::LEAF_BINS_INDEX_MASK;

    /// Construct an allocator over `[0, region_size)` with room for up to
    /// `max_allocations` simultaneously-live blocks.
    ///
    /// # Errors
    /// Returns [`AllocatorError::EmptyRegion`] if `region_size == 0`, or
    /// [`AllocatorError::TooManyAllocations`] if `max_allocations` exceeds
    /// what the node-index width (`u32`, or `u16` under the
    /// `narrow-indices` feature) can address.
    pub fn new(region_size: u32, max_allocations: u32) -> Result<Self, AllocatorError> {
        if region_size == 0 {
            return Err(AllocatorError::EmptyRegion);
        }
        if max_allocations > node::MAX_NODE_INDEX_COUNT {
            return Err(AllocatorError::TooManyAllocations {
                max: max_allocations,
                limit: node::MAX_NODE_INDEX_COUNT,
            });
        }

        let mut allocator = Self {
            region_size,
            free_storage: 0,
            bins: BinIndex::new(),
            pool: NodePool::new(max_allocations),
        };

        // Seed state: the whole region starts out as one free node. Splits
        // carve it up as allocations land; merges reassemble it on free.
        allocator.insert_node_into_bin(region_size, 0);

        log::debug!(
            "offset-suballocator initialized: region_size={region_size} max_allocations={max_allocations}"
        );

        Ok(allocator)
    }

    /// Construct an allocator using [`Allocator::DEFAULT_MAX_ALLOCATIONS`].
    ///
    /// # Errors
    /// See [`Allocator::new`].
    pub fn new_default(region_size: u32) -> Result<Self, AllocatorError> {
        Self::new(region_size, Self::DEFAULT_MAX_ALLOCATIONS)
    }

    #[must_use]
    pub const fn region_size(&self) -> u32 {
        self.region_size
    }

    #[must_use]
    pub fn max_allocations(&self) -> u32 {
        self.pool.capacity()
    }

    /// Carve out `size` units from the region.
    ///
    /// Returns `None` on exhaustion — either no bin large enough currently
    /// holds a free block, or one does but the node pool has no spare
    /// descriptor left to hold its remainder after the split. A `size`
    /// greater than [`Allocator::region_size`] always falls into the
    /// former case: no bin can ever hold a block that large, so this
    /// returns `None` in every build rather than asserting, matching the
    /// boundary behavior callers can rely on regardless of build profile.
    /// The allocator's state is unchanged when `None` is returned, and the
    /// request can be retried after any successful [`Allocator::free`].
    ///
    /// Node-pool exhaustion only blocks a request that actually needs a
    /// fresh descriptor for a leftover remainder; a request that exactly
    /// consumes the free block it's matched to never needs one, and
    /// succeeds even with zero spare descriptors. This is what lets a
    /// region tile exactly into `max_allocations`-many same-size blocks,
    /// with every one of them succeeding, including the last.
    ///
    /// # Panics
    /// Debug builds assert `size >= 1`; `allocate(0)` is a caller contract
    /// violation, not a reported failure.
    pub fn allocate(&mut self, size: u32) -> Option<Allocation> {
        debug_assert!(size >= 1, "allocate(0) is a contract violation");

        let min_bin = small_float::round_up(size);
        let bin = self.bins.find_smallest_occupied_at_least(min_bin);
        if bin == bins::NO_SPACE {
            return None;
        }

        let head_index = self.bins.head(bin);
        let extent = self.pool.get(head_index).data_size;
        debug_assert!(extent >= size);
        let remainder = extent - size;

        if remainder > 0 && self.pool.is_exhausted() {
            log::warn!(
                "allocate({size}) found a satisfying {extent}-byte block but has no spare descriptor for its {remainder}-byte remainder"
            );
            return None;
        }

        let node_index = self.pop_bin_head(bin);
        self.free_storage -= extent;

        {
            let node = self.pool.get_mut(node_index);
            node.data_size = size;
            node.set_used(true);
            node.bin_prev = NONE;
            node.bin_next = NONE;
        }

        if remainder > 0 {
            let remainder_offset = self.pool.get(node_index).data_offset + size;
            let had_next = self.pool.get(node_index).has_neighbor_next();
            let former_next = self.pool.get(node_index).neighbor_next();

            let remainder_index = self.insert_node_into_bin(remainder, remainder_offset);

            if had_next {
                self.pool
                    .get_mut(former_next)
                    .set_neighbor_prev(remainder_index);
            }
            self.pool
                .get_mut(remainder_index)
                .set_neighbor_prev(node_index);
            self.pool
                .get_mut(remainder_index)
                .set_neighbor_next(former_next);
            self.pool.get_mut(node_index).set_neighbor_next(remainder_index);
        }

        let offset = self.pool.get(node_index).data_offset;
        log::trace!("allocate({size}) -> offset={offset} node={node_index}");
        Some(Allocation {
            node: node_index,
            offset,
        })
    }

    /// Release a previously-returned allocation, coalescing with any
    /// physically-adjacent free neighbors.
    ///
    /// # Panics
    /// Debug builds assert the handle's node is currently marked used;
    /// freeing an already-freed or foreign handle is a contract violation,
    /// not recoverable.
    pub fn free(&mut self, allocation: Allocation) {
        let node_index = allocation.node;
        debug_assert!(
            self.pool.get(node_index).is_used(),
            "double free or foreign handle"
        );

        let mut offset = self.pool.get(node_index).data_offset;
        let mut size = self.pool.get(node_index).data_size;

        if self.pool.get(node_index).has_neighbor_prev() {
            let prev_index = self.pool.get(node_index).neighbor_prev();
            if !self.pool.get(prev_index).is_used() {
                offset = self.pool.get(prev_index).data_offset;
                size += self.pool.get(prev_index).data_size;
                let prev_had_prev = self.pool.get(prev_index).has_neighbor_prev();
                let prev_prev = self.pool.get(prev_index).neighbor_prev();

                self.remove_node_from_bin(prev_index);

                if prev_had_prev {
                    self.pool.get_mut(node_index).set_neighbor_prev(prev_prev);
                } else {
                    self.pool.get_mut(node_index).clear_neighbor_prev();
                }
            }
        }

        if self.pool.get(node_index).has_neighbor_next() {
            let next_index = self.pool.get(node_index).neighbor_next();
            if !self.pool.get(next_index).is_used() {
                size += self.pool.get(next_index).data_size;
                let next_had_next = self.pool.get(next_index).has_neighbor_next();
                let next_next = self.pool.get(next_index).neighbor_next();

                self.remove_node_from_bin(next_index);

                if next_had_next {
                    self.pool.get_mut(node_index).set_neighbor_next(next_next);
                } else {
                    self.pool.get_mut(node_index).clear_neighbor_next();
                }
            }
        }

        let had_prev = self.pool.get(node_index).has_neighbor_prev();
        let final_prev = self.pool.get(node_index).neighbor_prev();
        let had_next = self.pool.get(node_index).has_neighbor_next();
        let final_next = self.pool.get(node_index).neighbor_next();

        log::trace!("free(node={node_index}) -> offset={offset} size={size}");
        self.pool.release(node_index);

        let combined_index = self.insert_node_into_bin(size, offset);

        if had_next {
            self.pool
                .get_mut(combined_index)
                .set_neighbor_next(final_next);
            self.pool
                .get_mut(final_next)
                .set_neighbor_prev(combined_index);
        }
        if had_prev {
            self.pool
                .get_mut(combined_index)
                .set_neighbor_prev(final_prev);
            self.pool
                .get_mut(final_prev)
                .set_neighbor_next(combined_index);
        }
    }

    /// Total free space, largest single free region, and bin occupancy.
    ///
    /// Reads several fields without atomicity guarantees — callers sharing
    /// an allocator across threads must serialize every public call,
    /// including this one.
    #[must_use]
    pub fn storage_report(&self) -> StorageReport {
        let highest = self.bins.highest_occupied();
        let largest_free_region = if highest == bins::NO_SPACE {
            0
        } else {
            small_float::decode(highest)
        };

        StorageReport {
            total_free_space: self.free_storage,
            largest_free_region,
            number_of_bins: bins::NUM_LEAF_BINS,
            number_of_used_bins: self.bins.used_bin_count(),
        }
    }

    /// Decoded size and free-block count for one bin.
    ///
    /// Returns a zeroed [`BinState`] if `bin_index` is out of `[0, 256)`.
    #[must_use]
    pub fn storage_bin_state(&self, bin_index: u32) -> BinState {
        if bin_index >= bins::NUM_LEAF_BINS {
            return BinState::default();
        }

        let mut count = 0;
        let mut node = self.bins.head(bin_index);
        while node != NONE {
            count += 1;
            node = self.pool.get(node).bin_next;
        }

        BinState {
            size: small_float::decode(bin_index),
            count,
        }
    }

    /// Unlink and return the head node of `bin` without releasing its
    /// descriptor — the caller is about to repurpose it as a live
    /// allocation.
    fn pop_bin_head(&mut self, bin: u32) -> NodeIndex {
        let index = self.bins.head(bin);
        let next = self.pool.get(index).bin_next;
        self.bins.set_head(bin, next);
        if next != NONE {
            self.pool.get_mut(next).bin_prev = NONE;
        }
        if self.bins.is_empty(bin) {
            self.bins.mark_vacated(bin);
        }
        index
    }

    /// Shared primitive: acquire a descriptor, initialize it as a free
    /// block of `(offset, size)`, and push it onto the head of its size
    /// class's bin list.
    fn insert_node_into_bin(&mut self, size: u32, offset: u32) -> NodeIndex {
        let bin = small_float::round_down(size);
        let was_empty = self.bins.is_empty(bin);
        let old_head = self.bins.head(bin);

        let index = self.pool.acquire();
        {
            let node = self.pool.get_mut(index);
            *node = Node::empty();
            node.data_offset = offset;
            node.data_size = size;
            node.bin_next = old_head;
        }
        if old_head != NONE {
            self.pool.get_mut(old_head).bin_prev = index;
        }
        self.bins.set_head(bin, index);
        if was_empty {
            self.bins.mark_occupied(bin);
        }
        self.free_storage += size;
        index
    }

    /// Shared primitive: remove an arbitrary (not necessarily head) node
    /// from its bin list and return its descriptor to the node pool
    /// freelist.
    fn remove_node_from_bin(&mut self, index: NodeIndex) {
        let bin_prev = self.pool.get(index).bin_prev;
        let bin_next = self.pool.get(index).bin_next;

        if bin_prev != NONE {
            self.pool.get_mut(bin_prev).bin_next = bin_next;
            if bin_next != NONE {
                self.pool.get_mut(bin_next).bin_prev = bin_prev;
            }
        } else {
            let bin = small_float::round_down(self.pool.get(index).data_size);
            self.bins.set_head(bin, bin_next);
            if bin_next != NONE {
                self.pool.get_mut(bin_next).bin_prev = NONE;
            }
            if self.bins.is_empty(bin) {
                self.bins.mark_vacated(bin);
            }
        }

        self.free_storage -= self.pool.get(index).data_size;
        self.pool.release(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_region() {
        assert_eq!(Allocator::new(0, 16), Err(AllocatorError::EmptyRegion));
    }

    #[test]
    fn fresh_allocator_reports_whole_region_free() {
        let alloc = Allocator::new(1024, 128).unwrap();
        let report = alloc.storage_report();
        assert_eq!(report.total_free_space, 1024);
        assert_eq!(report.number_of_bins, 256);
        assert_eq!(report.number_of_used_bins, 1);
        assert_eq!(report.largest_free_region, small_float::decode(small_float::round_down(1024)));
    }

    #[test]
    fn scenario_simple_allocate_reports_remainder() {
        let mut alloc = Allocator::new(1024, 128).unwrap();
        let a = alloc.allocate(100).unwrap();
        assert_eq!(a.offset, 0);

        let report = alloc.storage_report();
        assert_eq!(report.total_free_space, 924);
        assert_eq!(
            report.largest_free_region,
            small_float::decode(small_float::round_down(924))
        );
    }

    #[test]
    fn scenario_free_in_order_restores_whole_region() {
        let mut alloc = Allocator::new(1024, 128).unwrap();
        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(50).unwrap();
        assert_eq!(b.offset, 100);

        alloc.free(a);
        assert_eq!(alloc.storage_report().total_free_space, 974);

        alloc.free(b);
        let report = alloc.storage_report();
        assert_eq!(report.total_free_space, 1024);
        assert_eq!(report.number_of_used_bins, 1);
    }

    #[test]
    fn scenario_fragmentation_and_lifo_reuse() {
        let mut alloc = Allocator::new(1024, 128).unwrap();
        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(100).unwrap();
        let c = alloc.allocate(100).unwrap();
        alloc.free(a);
        alloc.free(c);

        // a's hole (0..100) and the tail (200..1024) are both free; b
        // (100..200) stays used. round_up(100) lands past a's freed bin
        // (round_down(100)), so it's never a candidate; the only occupied
        // bin at or above it is the merged c+tail block, which starts at
        // 200 — the smallest satisfying bin always wins.
        let d = alloc.allocate(100).unwrap();
        assert_eq!(d.offset, 200);
        let _ = b;
    }

    #[test]
    fn exhaustion_is_bounded_by_max_allocations_not_space() {
        // 1024 / 8 == 128 == max_allocations: the region tiles exactly, so
        // every one of the 128 requests succeeds, including the last one,
        // which lands with zero spare descriptors and zero remainder.
        let mut alloc = Allocator::new(1024, 128).unwrap();
        let mut live = 0;
        while alloc.allocate(8).is_some() {
            live += 1;
        }
        assert_eq!(live, 128);
        assert_eq!(alloc.storage_report().total_free_space, 0);
    }

    #[test]
    fn exact_fit_succeeds_even_with_no_spare_descriptors() {
        let mut alloc = Allocator::new(64, 4).unwrap();
        let a = alloc.allocate(16).unwrap();
        let b = alloc.allocate(16).unwrap();
        let c = alloc.allocate(16).unwrap();
        // Three 16-byte blocks plus the original seed node have now used
        // all 4 descriptors; the remaining free block is exactly 16 bytes,
        // so this last allocation needs no new descriptor and must still
        // succeed.
        let d = alloc.allocate(16).unwrap();
        assert_eq!(alloc.storage_report().total_free_space, 0);
        let _ = (a, b, c, d);
    }

    #[test]
    fn allocate_region_size_succeeds_once() {
        let mut alloc = Allocator::new(1024, 8).unwrap();
        let a = alloc.allocate(1024).unwrap();
        assert_eq!(a.offset, 0);
        assert!(alloc.allocate(1).is_none());
    }

    #[test]
    fn allocate_more_than_region_always_fails() {
        let mut alloc = Allocator::new(1024, 8).unwrap();
        assert!(alloc.allocate(1025).is_none());
    }

    #[test]
    fn bin_state_out_of_range_is_zeroed() {
        let alloc = Allocator::new(1024, 8).unwrap();
        assert_eq!(alloc.storage_bin_state(256), BinState::default());
        assert_eq!(alloc.storage_bin_state(10_000), BinState::default());
    }

    #[test]
    fn reinit_matches_fresh_baseline() {
        let a = Allocator::new(1024, 128).unwrap();
        let b = Allocator::new(1024, 128).unwrap();
        assert_eq!(a.storage_report(), b.storage_report());
    }
}
