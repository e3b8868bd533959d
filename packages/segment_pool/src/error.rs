use std::alloc::{Layout, LayoutError};

use thiserror::Error;

/// Errors that can occur when reserving storage for a segment or a pool.
///
/// Every variant is final: retrying the same operation with the same configuration will fail
/// in the same way, so callers should treat these as reasons to give up rather than to retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The element type has no size, so the slots of a segment would not have distinct addresses.
    #[error("cannot pool zero-sized type {type_name}: slots would not have distinct addresses")]
    ZeroSizedItem {
        /// Name of the element type.
        type_name: &'static str,
    },

    /// The requested segment capacity does not fit in the address space for this element type.
    #[error("a segment of {capacity} x {type_name} does not fit in the address space")]
    CapacityOverflow {
        /// Name of the element type.
        type_name: &'static str,

        /// The number of slots that was requested for each segment.
        capacity: usize,

        /// Why the layout could not be calculated.
        #[source]
        source: LayoutError,
    },

    /// The memory allocator could not reserve storage for a new segment.
    #[error("out of memory: failed to reserve a segment of {} bytes", .layout.size())]
    OutOfMemory {
        /// The layout of the segment buffer that could not be allocated.
        layout: Layout,
    },

    /// The recycling list was still empty after the pool tried to grow.
    #[error("no slot is available in the pool")]
    Exhausted,
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn out_of_memory_mentions_size() {
        let layout = Layout::array::<u64>(16).unwrap();
        let error = Error::OutOfMemory { layout };

        assert_eq!(
            error.to_string(),
            "out of memory: failed to reserve a segment of 128 bytes"
        );
    }

    #[test]
    fn capacity_overflow_exposes_source() {
        let source = Layout::array::<u64>(usize::MAX).unwrap_err();
        let error = Error::CapacityOverflow {
            type_name: "u64",
            capacity: usize::MAX,
            source,
        };

        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("u64"));
    }
}
