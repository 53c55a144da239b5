//! The raw Swiss table.
//!
//! [`HashTable`] stores values of any type and leaves hashing and equality to
//! the caller: every lookup takes a precomputed `u64` hash and an equality
//! predicate, and every operation that may grow the table also takes a hasher
//! to re-hash elements during relocation. [`HashMap`](crate::HashMap) and
//! [`HashSet`](crate::HashSet) are thin keyed wrappers over it.

use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

use crate::control;
#[cfg(feature = "stats")]
use crate::control::Group;
use crate::error::Fallibility;
use crate::error::TryReserveError;
#[cfg(feature = "stats")]
use crate::probe::ProbeSeq;
use crate::storage::RawIter;
use crate::storage::SlotStorage;
use crate::storage::capacity_for;
use crate::storage::capacity_to_growth;
use crate::storage::next_capacity;

/// Statistics about the storage of a [`HashTable`].
///
/// Available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of elements currently in the table
    pub populated: usize,
    /// Maximum number of elements before the table must grow
    pub capacity: usize,
    /// Total number of slots allocated
    pub total_slots: usize,
    /// Slots holding a tombstone
    pub tombstones: usize,
    /// Insertions into `EMPTY` slots left before the next growth
    pub growth_left: usize,
    /// Control bytes matched per probe step
    pub group_width: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Slot utilization (populated / total_slots)
    pub slot_utilization: f64,
    /// Total memory in bytes used by the table
    pub total_bytes: usize,
    /// Bytes spent on slots that hold no element
    pub wasted_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Slot Usage: {}/{} ({:.2}% utilization, {} tombstones)",
            self.populated,
            self.total_slots,
            self.slot_utilization * 100.0,
            self.tombstones
        );
        println!(
            "Growth: {} insertions left, {}-byte groups",
            self.growth_left, self.group_width
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// How many probe steps lookups need to reach each element.
///
/// `windows[n]` counts the elements found in the `n`-th group window of their
/// probe sequence, so `windows[0]` holds everything found without probing.
///
/// Available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Element count per probe length.
    pub windows: alloc::vec::Vec<usize>,
}

#[cfg(feature = "stats")]
impl ProbeHistogram {
    /// Total number of elements counted.
    pub fn total(&self) -> usize {
        self.windows.iter().sum()
    }

    /// The longest probe length observed, `None` for an empty table.
    pub fn max_probe_length(&self) -> Option<usize> {
        self.windows.iter().rposition(|&count| count != 0)
    }

    /// Mean number of extra windows a successful lookup visits.
    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: usize = self
            .windows
            .iter()
            .enumerate()
            .map(|(probes, &count)| probes * count)
            .sum();
        weighted as f64 / total as f64
    }

    /// Pretty-prints the histogram horizontally using stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.windows.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "probe histogram ({} entries, mean {:.3}):",
            self.total(),
            self.mean()
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
            if units % 8 > 0 {
                bar.push(partial[units % 8 - 1]);
            }
            bar
        };

        for (probes, &count) in self.windows.iter().enumerate() {
            println!("{:>3} | {} ({})", probes, make_bar(count), count);
        }
    }
}

/// A Swiss table storing values of type `T`.
///
/// Slots are tagged with one control byte each; lookups compare a whole group
/// of tags against the 7-bit fragment of the hash at once and only call `eq`
/// on the lanes that match. Unlike standard hash maps, this table requires
/// you to provide the hash value and an equality predicate for each
/// operation, plus a hasher for operations that may grow the table.
///
/// ## Performance Characteristics
///
/// - **Memory**: one control byte per slot plus the size of `T`, with a
///   maximum load factor of 7/8.
/// - **Growth**: capacity doubles when the table fills; a table whose budget
///   is mostly taken by tombstones is rehashed at the same size instead.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use swiss_hash::hash_table::Entry;
/// # use swiss_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::with_capacity(100);
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123, |p| hash_id(p.id)) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => unreachable!(),
/// }
///
/// assert_eq!(table.find(hash, |p| p.id == 123).unwrap().name, "Alice");
/// ```
pub struct HashTable<T, A: Allocator = Global> {
    storage: SlotStorage<T>,
    alloc: A,
}

// SAFETY: The table owns its elements and its allocator; the raw pointers
// inside the storage are never shared outside a borrow of the table.
unsafe impl<T: Send, A: Allocator + Send> Send for HashTable<T, A> {}
// SAFETY: Shared access only hands out `&T`.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for HashTable<T, A> {}

impl<T: Debug, A: Allocator> Debug for HashTable<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("slots", &self.storage.capacity())
            .field("growth_left", &self.storage.growth_left())
            .field("ctrl", &CtrlDump(&self.storage))
            .field("elements", &DebugList(self.iter()))
            .finish()
    }
}

/// Renders the control bytes of a storage, one token per slot plus the
/// sentinel, with a bar between groups.
struct CtrlDump<'a, T>(&'a SlotStorage<T>);

impl<T> Debug for CtrlDump<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let storage = self.0;
        if storage.capacity() == 0 {
            return f.write_str("[]");
        }

        f.write_str("[")?;
        for index in 0..=storage.capacity() {
            if index != 0 {
                f.write_str(if index % crate::control::Group::WIDTH == 0 {
                    " | "
                } else {
                    " "
                })?;
            }
            // SAFETY: `index <= capacity` is inside the control array.
            let ctrl = unsafe { storage.ctrl(index) };
            if control::is_full(ctrl) {
                write!(f, "{ctrl:02x}")?;
            } else if control::is_deleted(ctrl) {
                f.write_str("xx")?;
            } else if control::is_sentinel(ctrl) {
                f.write_str("##")?;
            } else {
                f.write_str("..")?;
            }
        }
        f.write_str("]")
    }
}

struct DebugList<I>(I);

impl<I> Debug for DebugList<I>
where
    I: Iterator + Clone,
    I::Item: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.0.clone()).finish()
    }
}

impl<T, A> Clone for HashTable<T, A>
where
    T: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        let alloc = self.alloc.clone();
        let storage = Self::allocate_storage(&alloc, self.storage.capacity());
        let mut table = HashTable { storage, alloc };

        // SAFETY: `table` is freshly allocated with the same capacity. If a
        // clone panics, `table` owns exactly the clones made so far and drops
        // them.
        unsafe { table.storage.clone_from_storage(&self.storage) };
        table
    }

    /// Reuses the existing allocation when the slot capacity already matches.
    fn clone_from(&mut self, source: &Self) {
        self.storage.clear();
        if self.storage.capacity() != source.storage.capacity() {
            let storage = Self::allocate_storage(&self.alloc, source.storage.capacity());
            let mut old = mem::replace(&mut self.storage, storage);
            // SAFETY: `old` came from `self.alloc` and holds no elements.
            unsafe { old.free(&self.alloc) };
        }

        // SAFETY: `self.storage` is empty, tombstone-free and as large as the
        // source.
        unsafe { self.storage.clone_from_storage(&source.storage) };
    }
}

impl<T, A: Allocator> Drop for HashTable<T, A> {
    fn drop(&mut self) {
        // SAFETY: The elements are dropped exactly once here, then the memory
        // goes back to the allocator that produced it.
        unsafe {
            self.storage.drop_elements();
            self.storage.free(&self.alloc);
        }
    }
}

impl<T, A: Allocator + Default> Default for HashTable<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T> HashTable<T, Global> {
    /// Creates an empty table. Nothing is allocated until the first insert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashTable;
    /// #
    /// let table: HashTable<u64> = HashTable::new();
    /// assert_eq!(table.capacity(), 0);
    /// ```
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a new hash table with room for at least `capacity` elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashTable;
    /// #
    /// // Create a table that can hold at least 100 items without resizing
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T, A: Allocator> HashTable<T, A> {
    /// Creates an empty table drawing its storage from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        HashTable {
            storage: SlotStorage::new(),
            alloc,
        }
    }

    /// Creates a table with room for at least `capacity` elements, allocated
    /// from `alloc`.
    ///
    /// # Panics
    ///
    /// Panics if the required storage size overflows `isize::MAX` bytes.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        let Some(slots) = capacity_for(capacity) else {
            panic!("hash table capacity overflow");
        };
        let storage = Self::allocate_storage(&alloc, slots);
        HashTable { storage, alloc }
    }

    fn allocate_storage(alloc: &A, capacity: usize) -> SlotStorage<T> {
        match SlotStorage::allocate(alloc, capacity, Fallibility::Infallible) {
            Ok(storage) => storage,
            // Infallible allocation panics or aborts instead of returning.
            Err(_) => unreachable!(),
        }
    }

    /// Returns a reference to the table's allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the number of elements in the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table = HashTable::new();
    /// assert_eq!(table.len(), 0);
    ///
    /// table.insert_unique(hash_u64(7), 7u64, |&v| hash_u64(v));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Returns how many elements the table holds before it has to grow.
    ///
    /// The table grows at a 7/8 load factor, so this is smaller than the
    /// number of allocated slots. Removed elements leave tombstones that keep
    /// counting against this budget until the next rehash.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashTable;
    /// #
    /// let table: HashTable<i32> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// ```
    pub fn capacity(&self) -> usize {
        capacity_to_growth(self.storage.capacity())
    }

    /// Number of allocated slots; zero or one less than a power of two.
    #[cfg(test)]
    pub(crate) fn slot_capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Finds the element matching `eq` among those stored under `hash`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table = HashTable::new();
    /// table.insert_unique(hash_u64(1), (1u64, "one"), |(k, _)| hash_u64(*k));
    ///
    /// assert_eq!(table.find(hash_u64(1), |(k, _)| *k == 1), Some(&(1, "one")));
    /// assert_eq!(table.find(hash_u64(2), |(k, _)| *k == 2), None);
    /// ```
    pub fn find(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&T> {
        if self.storage.len() == 0 {
            return None;
        }
        let index = self.storage.find(hash, eq)?;
        // SAFETY: `find` only returns full slots.
        Some(unsafe { self.storage.slot(index).as_ref() })
    }

    /// Finds the element matching `eq` and returns a mutable reference to it.
    pub fn find_mut(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        if self.storage.len() == 0 {
            return None;
        }
        let index = self.storage.find(hash, eq)?;
        // SAFETY: `find` only returns full slots, and `&mut self` makes the
        // reference unique.
        Some(unsafe { &mut *self.storage.slot(index).as_ptr() })
    }

    /// Looks up the element matching `eq` and returns an [`Entry`] for it.
    ///
    /// The lookup and the search for an insertion slot happen in a single
    /// probe. If the element is absent and the table has no room for it, the
    /// table grows before this returns, re-hashing every element with
    /// `hasher`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::hash_table::Entry;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write(s.as_bytes());
    /// #     hasher.finish()
    /// # }
    /// let mut table: HashTable<(String, u32)> = HashTable::new();
    /// for word in ["apple", "pear", "apple"] {
    ///     match table.entry(hash_str(word), |(w, _)| w == word, |(w, _)| hash_str(w)) {
    ///         Entry::Occupied(mut entry) => entry.get_mut().1 += 1,
    ///         Entry::Vacant(entry) => {
    ///             entry.insert((word.to_string(), 1));
    ///         }
    ///     }
    /// }
    ///
    /// assert_eq!(table.find(hash_str("apple"), |(w, _)| w == "apple").unwrap().1, 2);
    /// ```
    pub fn entry(
        &mut self,
        hash: u64,
        eq: impl FnMut(&T) -> bool,
        hasher: impl Fn(&T) -> u64,
    ) -> Entry<'_, T, A> {
        match self.storage.find_or_find_insert_slot(hash, eq) {
            Ok(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Err(candidate) => {
                let index = self.prepare_insert(hash, candidate, hasher);
                Entry::Vacant(VacantEntry {
                    table: self,
                    hash,
                    index,
                })
            }
        }
    }

    /// Inserts `value` without checking whether an equal element exists.
    ///
    /// Inserting a duplicate does not corrupt the table, but which of the
    /// duplicates later lookups return is unspecified.
    pub fn insert_unique(&mut self, hash: u64, value: T, hasher: impl Fn(&T) -> u64) -> &mut T {
        let candidate = if self.storage.len() < self.storage.capacity() {
            // SAFETY: Allocated, and at least one slot is vacant.
            Some(unsafe { self.storage.find_insert_slot(hash) })
        } else {
            None
        };
        let index = self.prepare_insert(hash, candidate, hasher);

        // SAFETY: `prepare_insert` returns a vacant slot with budget for it.
        unsafe { &mut *self.storage.insert_at(index, hash, value).as_ptr() }
    }

    /// Settle on the slot for a new element, growing the table first when the
    /// candidate cannot be used.
    #[inline]
    fn prepare_insert(
        &mut self,
        hash: u64,
        candidate: Option<usize>,
        hasher: impl Fn(&T) -> u64,
    ) -> usize {
        match candidate {
            // SAFETY: Candidates are vacant slots of the current storage.
            Some(index) if unsafe { self.storage.can_insert_at(index) } => index,
            _ => {
                self.grow_for_insert(hasher);
                // SAFETY: The grown storage has budget and an `EMPTY` slot.
                unsafe { self.storage.find_insert_slot(hash) }
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn grow_for_insert(&mut self, hasher: impl Fn(&T) -> u64) {
        let capacity = self.storage.capacity();
        let target = if self.storage.len() < capacity_to_growth(capacity) / 2 {
            // Mostly tombstones: rehashing at the same size frees the budget.
            capacity
        } else {
            match next_capacity(capacity) {
                Some(capacity) => capacity,
                None => panic!("hash table capacity overflow"),
            }
        };

        if self.resize(target, hasher, Fallibility::Infallible).is_err() {
            // Infallible resizing panics or aborts instead of returning.
            unreachable!()
        }
    }

    /// Move every element into a fresh storage of `capacity` slots.
    ///
    /// The new storage is allocated before anything is touched. If `hasher`
    /// panics, the partially filled new storage is freed without dropping
    /// anything and the table keeps its old storage intact.
    #[cold]
    #[inline(never)]
    fn resize(
        &mut self,
        capacity: usize,
        hasher: impl Fn(&T) -> u64,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        debug_assert!(capacity_to_growth(capacity) >= self.storage.len());
        let mut storage = SlotStorage::allocate(&self.alloc, capacity, fallibility)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = self.storage.capacity(),
            to = capacity,
            items = self.storage.len(),
            tombstones = self.storage.tombstones(),
            "resizing hash table"
        );

        struct FreeOnUnwind<'a, T, A: Allocator> {
            storage: &'a mut SlotStorage<T>,
            alloc: &'a A,
        }

        impl<T, A: Allocator> Drop for FreeOnUnwind<'_, T, A> {
            fn drop(&mut self) {
                // SAFETY: The storage came from `alloc`; its elements are
                // bitwise duplicates still owned by the old storage.
                unsafe { self.storage.free(self.alloc) };
            }
        }

        let guard = FreeOnUnwind {
            storage: &mut storage,
            alloc: &self.alloc,
        };
        // SAFETY: The new storage is fresh with a budget for every element.
        unsafe { self.storage.relocate_into(&mut *guard.storage, hasher) };
        mem::forget(guard);

        let mut old = mem::replace(&mut self.storage, storage);
        // SAFETY: `old` came from `self.alloc`, and its elements now belong to
        // the new storage.
        unsafe { old.free(&self.alloc) };
        Ok(())
    }

    fn reserve_inner(
        &mut self,
        additional: usize,
        hasher: impl Fn(&T) -> u64,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        if additional <= self.storage.growth_left() {
            return Ok(());
        }

        let items = self
            .storage
            .len()
            .checked_add(additional)
            .ok_or_else(|| fallibility.capacity_overflow())?;
        let wanted = capacity_for(items).ok_or_else(|| fallibility.capacity_overflow())?;

        // Never shrink here: if `wanted` fits the current size, the budget is
        // held by tombstones and a same-size rehash releases it.
        self.resize(wanted.max(self.storage.capacity()), hasher, fallibility)
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows, and aborts through
    /// [`handle_alloc_error`](alloc::alloc::handle_alloc_error) if the
    /// allocator fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.reserve(50, |&v| hash_u64(v));
    /// assert!(table.capacity() >= 50);
    /// ```
    pub fn reserve(&mut self, additional: usize, hasher: impl Fn(&T) -> u64) {
        if self
            .reserve_inner(additional, hasher, Fallibility::Infallible)
            .is_err()
        {
            unreachable!()
        }
    }

    /// Like [`reserve`](Self::reserve), but reports failure instead of
    /// panicking. On error the table is unchanged.
    pub fn try_reserve(
        &mut self,
        additional: usize,
        hasher: impl Fn(&T) -> u64,
    ) -> Result<(), TryReserveError> {
        self.reserve_inner(additional, hasher, Fallibility::Fallible)
    }

    /// Shrinks the storage as much as the current elements allow.
    ///
    /// An empty table gives its allocation back entirely.
    pub fn shrink_to_fit(&mut self, hasher: impl Fn(&T) -> u64) {
        self.shrink_to(0, hasher);
    }

    /// Shrinks the storage, keeping room for at least `min_capacity` elements.
    ///
    /// Does nothing if the table is already that small.
    pub fn shrink_to(&mut self, min_capacity: usize, hasher: impl Fn(&T) -> u64) {
        let Some(target) = capacity_for(self.storage.len().max(min_capacity)) else {
            return;
        };

        if target == 0 {
            // SAFETY: No elements remain; only tombstones are forgotten.
            unsafe { self.storage.free(&self.alloc) };
        } else if target < self.storage.capacity()
            && self
                .resize(target, hasher, Fallibility::Infallible)
                .is_err()
        {
            unreachable!()
        }
    }

    /// Removes and returns the element matching `eq`.
    ///
    /// The slot becomes a tombstone, so probe chains running through it stay
    /// intact.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table = HashTable::new();
    /// table.insert_unique(hash_u64(3), 3u64, |&v| hash_u64(v));
    ///
    /// assert_eq!(table.remove(hash_u64(3), |&v| v == 3), Some(3));
    /// assert_eq!(table.remove(hash_u64(3), |&v| v == 3), None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<T> {
        if self.storage.len() == 0 {
            return None;
        }
        let index = self.storage.find(hash, eq)?;
        // SAFETY: `find` only returns full slots.
        Some(unsafe { self.storage.take_at(index) })
    }

    /// Drops the element matching `eq` in place. Returns whether one was
    /// found.
    pub fn erase(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> bool {
        if self.storage.len() == 0 {
            return false;
        }
        match self.storage.find(hash, eq) {
            Some(index) => {
                // SAFETY: `find` only returns full slots.
                unsafe { self.storage.erase_at(index) };
                true
            }
            None => false,
        }
    }

    /// Removes every element, keeping the allocation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table = HashTable::new();
    /// table.insert_unique(hash_u64(1), 1u64, |&v| hash_u64(v));
    /// let capacity = table.capacity();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Keeps only the elements for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&mut T) -> bool) {
        for index in self.storage.full_indices() {
            // SAFETY: `full_indices` yields full slots, and erasing a slot the
            // cursor already passed does not disturb it.
            unsafe {
                if !f(&mut *self.storage.slot(index).as_ptr()) {
                    self.storage.erase_at(index);
                }
            }
        }
    }

    /// An iterator over all elements, in unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            raw: self.storage.full_indices(),
            storage: &self.storage,
        }
    }

    /// An iterator over mutable references to all elements.
    ///
    /// Changing an element in a way that changes its hash leaves it
    /// unreachable by lookups.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            raw: self.storage.full_indices(),
            storage: &self.storage,
            _marker: PhantomData,
        }
    }

    /// Removes all elements, yielding them by value. The allocation is kept.
    ///
    /// Elements not consumed when the iterator is dropped are dropped with it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hasher;
    /// # use swiss_hash::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(v: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     hasher.write_u64(v);
    /// #     hasher.finish()
    /// # }
    /// let mut table = HashTable::new();
    /// for v in 0..10u64 {
    ///     table.insert_unique(hash_u64(v), v, |&v| hash_u64(v));
    /// }
    ///
    /// let mut drained: Vec<u64> = table.drain().collect();
    /// drained.sort();
    /// assert_eq!(drained, (0..10).collect::<Vec<_>>());
    /// assert!(table.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, T, A> {
        Drain {
            raw: self.storage.full_indices(),
            table: self,
        }
    }

    /// Computes a histogram of probe lengths for the current table state.
    ///
    /// For each element, counts how many group windows a lookup visits before
    /// the one holding it. `hasher` must be the hasher the table was filled
    /// with.
    ///
    /// Available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self, hasher: impl Fn(&T) -> u64) -> ProbeHistogram {
        let mut windows = alloc::vec::Vec::new();
        let capacity = self.storage.capacity();

        for index in self.storage.full_indices() {
            // SAFETY: `full_indices` only yields full slots.
            let hash = hasher(unsafe { self.storage.slot(index).as_ref() });
            let mut seq = ProbeSeq::new(hash, capacity);
            let mut probes = 0;
            while index.wrapping_sub(seq.offset()) & capacity >= Group::WIDTH {
                seq.move_next();
                probes += 1;
            }

            if windows.len() <= probes {
                windows.resize(probes + 1, 0);
            }
            windows[probes] += 1;
        }

        ProbeHistogram { windows }
    }

    /// Returns detailed utilization statistics for debugging.
    ///
    /// Available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let populated = self.len();
        let capacity = self.capacity();
        let total_slots = self.storage.capacity();
        let ratio = |num: usize, den: usize| {
            if den == 0 { 0.0 } else { num as f64 / den as f64 }
        };

        DebugStats {
            populated,
            capacity,
            total_slots,
            tombstones: self.storage.tombstones(),
            growth_left: self.storage.growth_left(),
            group_width: Group::WIDTH,
            load_factor: ratio(populated, capacity),
            slot_utilization: ratio(populated, total_slots),
            total_bytes: self.storage.allocation_size(),
            wasted_bytes: (total_slots - populated) * mem::size_of::<T>(),
        }
    }
}

/// A view into a single entry in the hash table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, T, A: Allocator = Global> {
    /// The element is not in the table; a slot for it has been reserved.
    Vacant(VacantEntry<'a, T, A>),
    /// The element is present in the table.
    Occupied(OccupiedEntry<'a, T, A>),
}

impl<'a, T, A: Allocator> Entry<'a, T, A> {
    /// Inserts `default` if the entry is vacant and returns a mutable reference
    /// to the element.
    pub fn or_insert(self, default: T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Like [`or_insert`](Self::or_insert), computing the value only when the
    /// entry is vacant.
    pub fn or_insert_with(self, default: impl FnOnce() -> T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Runs `f` on the element if the entry is occupied.
    pub fn and_modify(self, f: impl FnOnce(&mut T)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Stores `value` in the entry, replacing (and dropping) any previous
    /// element.
    pub fn insert(self, value: T) -> OccupiedEntry<'a, T, A> {
        match self {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() = value;
                entry
            }
            Entry::Vacant(entry) => entry.insert_entry(value),
        }
    }

    /// Returns the table the entry points into.
    pub fn into_table(self) -> &'a mut HashTable<T, A> {
        match self {
            Entry::Occupied(entry) => entry.table,
            Entry::Vacant(entry) => entry.table,
        }
    }
}

impl<'a, T: Default, A: Allocator> Entry<'a, T, A> {
    /// Inserts `T::default()` if the entry is vacant.
    pub fn or_default(self) -> &'a mut T {
        self.or_insert_with(T::default)
    }
}

/// A vacant entry, holding a slot reserved for the new element.
pub struct VacantEntry<'a, T, A: Allocator = Global> {
    table: &'a mut HashTable<T, A>,
    hash: u64,
    index: usize,
}

impl<'a, T, A: Allocator> VacantEntry<'a, T, A> {
    /// Inserts `value` into the reserved slot and returns a mutable reference
    /// to it.
    ///
    /// The table has already grown if it needed to, so this never allocates.
    pub fn insert(self, value: T) -> &'a mut T {
        // SAFETY: `entry` reserved a vacant, budgeted slot, and the table has
        // been exclusively borrowed since.
        unsafe {
            &mut *self
                .table
                .storage
                .insert_at(self.index, self.hash, value)
                .as_ptr()
        }
    }

    /// Inserts `value` and returns an occupied entry for it.
    pub fn insert_entry(self, value: T) -> OccupiedEntry<'a, T, A> {
        // SAFETY: See `insert`.
        unsafe {
            self.table.storage.insert_at(self.index, self.hash, value);
        }
        OccupiedEntry {
            table: self.table,
            index: self.index,
        }
    }

    /// Returns the table without inserting anything.
    pub fn into_table(self) -> &'a mut HashTable<T, A> {
        self.table
    }
}

/// An occupied entry.
pub struct OccupiedEntry<'a, T, A: Allocator = Global> {
    table: &'a mut HashTable<T, A>,
    index: usize,
}

impl<'a, T, A: Allocator> OccupiedEntry<'a, T, A> {
    /// Returns a reference to the element.
    pub fn get(&self) -> &T {
        // SAFETY: `index` is a full slot for the lifetime of the entry.
        unsafe { self.table.storage.slot(self.index).as_ref() }
    }

    /// Returns a mutable reference to the element.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: `index` is a full slot, and the entry borrows the table
        // exclusively.
        unsafe { &mut *self.table.storage.slot(self.index).as_ptr() }
    }

    /// Converts the entry into a mutable reference with the table's lifetime.
    pub fn into_mut(self) -> &'a mut T {
        // SAFETY: See `get_mut`.
        unsafe { &mut *self.table.storage.slot(self.index).as_ptr() }
    }

    /// Removes the element from the table and returns it.
    pub fn remove(self) -> T {
        // SAFETY: `index` is a full slot.
        unsafe { self.table.storage.take_at(self.index) }
    }

    /// Returns the table the entry points into.
    pub fn into_table(self) -> &'a mut HashTable<T, A> {
        self.table
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a HashTable<T, A> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut HashTable<T, A> {
    type IntoIter = IterMut<'a, T>;
    type Item = &'a mut T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A: Allocator> IntoIterator for HashTable<T, A> {
    type IntoIter = IntoIter<T, A>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            raw: self.storage.full_indices(),
            table: self,
        }
    }
}

/// An iterator over the elements of a [`HashTable`].
pub struct Iter<'a, T> {
    raw: RawIter,
    storage: &'a SlotStorage<T>,
}

// SAFETY: `Iter` only hands out shared references to the elements.
unsafe impl<T: Sync> Send for Iter<'_, T> {}
// SAFETY: See above.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            raw: self.raw.clone(),
            storage: self.storage,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.raw.next()?;
        // SAFETY: The cursor only yields full slots of a storage borrowed for
        // `'a`.
        Some(unsafe { self.storage.slot(index).as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// A mutable iterator over the elements of a [`HashTable`].
pub struct IterMut<'a, T> {
    raw: RawIter,
    storage: &'a SlotStorage<T>,
    _marker: PhantomData<&'a mut T>,
}

// SAFETY: `IterMut` hands out unique references to distinct elements.
unsafe impl<T: Send> Send for IterMut<'_, T> {}
// SAFETY: Shared access to the iterator exposes nothing.
unsafe impl<T: Sync> Sync for IterMut<'_, T> {}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.raw.next()?;
        // SAFETY: Each full slot is yielded once, and the table is exclusively
        // borrowed for `'a`.
        Some(unsafe { &mut *self.storage.slot(index).as_ptr() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

impl<T> FusedIterator for IterMut<'_, T> {}

/// A draining iterator over the elements of a [`HashTable`].
pub struct Drain<'a, T, A: Allocator = Global> {
    raw: RawIter,
    table: &'a mut HashTable<T, A>,
}

// SAFETY: `Drain` moves elements out of a table it borrows exclusively.
unsafe impl<T: Send, A: Allocator + Send> Send for Drain<'_, T, A> {}
// SAFETY: Shared access to the iterator exposes nothing.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for Drain<'_, T, A> {}

impl<T, A: Allocator> Drop for Drain<'_, T, A> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.table.storage.reset_ctrl();
    }
}

impl<T, A: Allocator> Iterator for Drain<'_, T, A> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.raw.next()?;
        // SAFETY: `index` is full, and retagging it does not disturb the
        // cursor.
        Some(unsafe { self.table.storage.take_at(index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<T, A: Allocator> ExactSizeIterator for Drain<'_, T, A> {}

impl<T, A: Allocator> FusedIterator for Drain<'_, T, A> {}

/// An owning iterator over the elements of a [`HashTable`].
///
/// Elements not consumed are dropped with the iterator, along with the
/// allocation.
pub struct IntoIter<T, A: Allocator = Global> {
    raw: RawIter,
    table: HashTable<T, A>,
}

// SAFETY: `IntoIter` owns the table.
unsafe impl<T: Send, A: Allocator + Send> Send for IntoIter<T, A> {}
// SAFETY: Shared access to the iterator exposes nothing.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for IntoIter<T, A> {}

impl<T, A: Allocator> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.raw.next()?;
        // SAFETY: `index` is full; the table drops whatever is left.
        Some(unsafe { self.table.storage.take_at(index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<T, A: Allocator> ExactSizeIterator for IntoIter<T, A> {}

impl<T, A: Allocator> FusedIterator for IntoIter<T, A> {}
