//! Construction-time error type.
//!
//! Everything past construction reports exhaustion via `Option::None` (see
//! [`crate::Allocator::allocate`]) — there is nothing left to validate once
//! the allocator exists. Only `Allocator::new` can fail, and only on a
//! caller-supplied precondition it can cheaply check itself.

/// Reasons [`crate::Allocator::new`] can refuse to construct an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    /// `region_size` was zero; there is nothing to suballocate.
    #[error("region size must be non-zero")]
    EmptyRegion,
    /// `max_allocations` exceeds what the configured node-index width can
    /// address.
    #[error(
        "max_allocations ({max}) exceeds the {limit} supported by the node index width"
    )]
    TooManyAllocations {
        /// The value the caller asked for.
        max: u32,
        /// The largest value the current `NodeIndex` width supports.
        limit: u32,
    },
}
