//! Block descriptors.
//!
//! A [`Node`] describes one block of the region, used or free. Used nodes
//! only carry neighbor links; free nodes additionally sit in a bin's
//! doubly-linked list via `bin_prev`/`bin_next`. See the crate-level docs
//! for the overall data flow.

#[cfg(not(feature = "narrow-indices"))]
use bitfield_struct::bitfield;

/// Index into the node pool.
///
/// `u32` by default (cap: see [`MAX_NODE_INDEX_COUNT`]). With the
/// `narrow-indices` feature, `u16` halves the per-node metadata footprint at
/// the cost of a lower allocation ceiling.
#[cfg(not(feature = "narrow-indices"))]
pub type NodeIndex = u32;
#[cfg(feature = "narrow-indices")]
pub type NodeIndex = u16;

/// Sentinel value used by `bin_prev`/`bin_next`/`neighbor_prev` (and, in
/// `narrow-indices` builds, `neighbor_next`): "no node" / "end of list".
pub const NONE: NodeIndex = NodeIndex::MAX;

/// In the default (32-bit index) build, `neighbor_next` shares its storage
/// word with the `used` flag (high bit), so only 31 bits are available for
/// the index itself. The sentinel there is the all-ones 31-bit pattern, not
/// `NONE` — matching the historical C++ implementation this crate is
/// grounded on, where `getNeighborNext()` masks `unused` (`0xffffffff`) down
/// to `0x7fffffff`.
#[cfg(not(feature = "narrow-indices"))]
const NEIGHBOR_NEXT_NONE: u32 = (1u32 << 31) - 1;
#[cfg(feature = "narrow-indices")]
const NEIGHBOR_NEXT_NONE: NodeIndex = NONE;

/// The largest number of simultaneously-live allocations the current
/// `NodeIndex` width can address (bounded by the narrowest link field: the
/// packed 31-bit `neighbor_next` in the default build, the full 16 bits in
/// `narrow-indices` builds).
#[cfg(not(feature = "narrow-indices"))]
pub const MAX_NODE_INDEX_COUNT: u32 = NEIGHBOR_NEXT_NONE; // 2^31 - 1
#[cfg(feature = "narrow-indices")]
pub const MAX_NODE_INDEX_COUNT: u32 = NodeIndex::MAX as u32;

#[cfg(not(feature = "narrow-indices"))]
#[bitfield(u32)]
struct NeighborNext {
    /// Index of the physical-order right neighbor, or [`NEIGHBOR_NEXT_NONE`]
    /// when there is none.
    #[bits(31)]
    index: u32,
    /// Set iff this node is currently handed out to a caller.
    used: bool,
}

/// A single block descriptor: either a live allocation or a free block
/// sitting in a bin's free list.
///
/// Fields are `pub(crate)`: all mutation goes through the allocator engine,
/// which is the only code that can keep the bin/bitmap/neighbor invariants
/// in sync.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Node {
    pub(crate) data_offset: u32,
    pub(crate) data_size: u32,
    pub(crate) bin_prev: NodeIndex,
    pub(crate) bin_next: NodeIndex,
    neighbor_prev: NodeIndex,
    #[cfg(not(feature = "narrow-indices"))]
    neighbor_next: NeighborNext,
    #[cfg(feature = "narrow-indices")]
    neighbor_next: NodeIndex,
    #[cfg(feature = "narrow-indices")]
    used: bool,
}

impl Node {
    pub(crate) const fn empty() -> Self {
        Self {
            data_offset: 0,
            data_size: 0,
            bin_prev: NONE,
            bin_next: NONE,
            neighbor_prev: NONE,
            #[cfg(not(feature = "narrow-indices"))]
            neighbor_next: NeighborNext::new()
                .with_index(NEIGHBOR_NEXT_NONE)
                .with_used(false),
            #[cfg(feature = "narrow-indices")]
            neighbor_next: NEIGHBOR_NEXT_NONE,
            #[cfg(feature = "narrow-indices")]
            used: false,
        }
    }

    #[must_use]
    pub(crate) const fn neighbor_prev(&self) -> NodeIndex {
        self.neighbor_prev
    }

    #[must_use]
    pub(crate) const fn has_neighbor_prev(&self) -> bool {
        self.neighbor_prev != NONE
    }

    pub(crate) const fn set_neighbor_prev(&mut self, index: NodeIndex) {
        self.neighbor_prev = index;
    }

    pub(crate) const fn clear_neighbor_prev(&mut self) {
        self.neighbor_prev = NONE;
    }

    #[must_use]
    pub(crate) fn neighbor_next(&self) -> NodeIndex {
        #[cfg(not(feature = "narrow-indices"))]
        {
            self.neighbor_next.index()
        }
        #[cfg(feature = "narrow-indices")]
        {
            self.neighbor_next
        }
    }

    #[must_use]
    pub(crate) fn has_neighbor_next(&self) -> bool {
        self.neighbor_next() != NEIGHBOR_NEXT_NONE
    }

    pub(crate) fn set_neighbor_next(&mut self, index: NodeIndex) {
        #[cfg(not(feature = "narrow-indices"))]
        {
            self.neighbor_next.set_index(index);
        }
        #[cfg(feature = "narrow-indices")]
        {
            self.neighbor_next = index;
        }
    }

    pub(crate) fn clear_neighbor_next(&mut self) {
        self.set_neighbor_next(NEIGHBOR_NEXT_NONE);
    }

    #[must_use]
    pub(crate) fn is_used(&self) -> bool {
        #[cfg(not(feature = "narrow-indices"))]
        {
            self.neighbor_next.used()
        }
        #[cfg(feature = "narrow-indices")]
        {
            self.used
        }
    }

    pub(crate) fn set_used(&mut self, used: bool) {
        #[cfg(not(feature = "narrow-indices"))]
        {
            self.neighbor_next.set_used(used);
        }
        #[cfg(feature = "narrow-indices")]
        {
            self.used = used;
        }
    }
}
