use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;

/// The error returned by `try_reserve` and friends.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TryReserveError {
    /// The requested capacity does not fit in `usize`, or the resulting
    /// allocation would exceed `isize::MAX` bytes.
    CapacityOverflow,

    /// The allocator returned an error.
    AllocError {
        /// The layout of the allocation request that failed.
        layout: Layout,
    },
}

impl core::fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("hash table capacity exceeds the addressable range")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "allocating {} bytes (align {}) for hash table storage failed",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}

/// Whether a failed allocation is reported to the caller or is fatal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Fallibility {
    Fallible,
    Infallible,
}

impl Fallibility {
    #[cold]
    pub(crate) fn capacity_overflow(self) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::CapacityOverflow,
            Fallibility::Infallible => panic!("hash table capacity overflow"),
        }
    }

    #[cold]
    pub(crate) fn alloc_err(self, layout: Layout) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::AllocError { layout },
            Fallibility::Infallible => handle_alloc_error(layout),
        }
    }
}
