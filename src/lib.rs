#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use cfg_if::cfg_if;

mod control;
mod probe;
mod storage;

/// Errors reported by fallible reservation.
pub mod error;

/// A HashMap built on the Swiss-table [`HashTable`].
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers and
/// allocators, plus the insert-if-absent [`add`](HashMap::add) family.
pub mod hash_map;

pub mod hash_table;

/// A hash set built on the Swiss-table [`HashTable`].
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers and allocators.
pub mod hash_set;

pub use allocator_api2::alloc::AllocError;
pub use allocator_api2::alloc::Allocator;
pub use allocator_api2::alloc::Global;
pub use error::TryReserveError;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::HashTable;

cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is named.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is named.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher builder for builds without `std` or `foldhash`.
        ///
        /// It has no values, so maps and sets using it must name a hasher
        /// explicitly through `with_hasher`.
        pub enum DefaultHashBuilder {}
    }
}
