use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem;
use core::ptr;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;

use crate::control;
use crate::control::DELETED;
use crate::control::EMPTY;
use crate::control::Group;
use crate::control::SENTINEL;
use crate::error::Fallibility;
use crate::error::TryReserveError;
use crate::probe::ProbeSeq;
use crate::probe::h2;

/// Number of elements a storage of `capacity` slots accepts before it must
/// grow, counting tombstones against the budget.
///
/// The 7/8 load factor always leaves an `EMPTY` slot for lookups to stop at.
/// A table of exactly `WIDTH - 1` slots is seen whole by every window (slots,
/// sentinel and mirrors, nothing else), so it needs one slot held back
/// explicitly. Smaller tables may fill completely: their windows always reach
/// the untouched `EMPTY` bytes past the mirrored tail.
#[inline]
pub(crate) fn capacity_to_growth(capacity: usize) -> usize {
    if capacity == Group::WIDTH - 1 {
        capacity - 1
    } else {
        capacity - capacity / 8
    }
}

/// The smallest valid slot capacity (`2^k - 1`) that holds `items` elements.
///
/// Returns `None` on overflow.
#[inline]
pub(crate) fn capacity_for(items: usize) -> Option<usize> {
    if items == 0 {
        return Some(0);
    }

    let mut capacity = items.checked_add(1)?.checked_next_power_of_two()? - 1;
    while capacity_to_growth(capacity) < items {
        capacity = next_capacity(capacity)?;
    }
    Some(capacity)
}

/// Growth step: doubling, keeping the `2^k - 1` shape (0 -> 1 -> 3 -> 7 ...).
#[inline]
pub(crate) fn next_capacity(capacity: usize) -> Option<usize> {
    capacity.checked_mul(2)?.checked_add(1)
}

#[derive(Clone, Copy, Debug)]
struct StorageLayout {
    layout: Layout,
    slots_offset: usize,
}

impl StorageLayout {
    /// Control bytes first (`capacity` tags, the sentinel, `WIDTH - 1`
    /// mirrors), then the slot array at its natural alignment.
    fn new<T>(capacity: usize) -> Option<Self> {
        let ctrl = Layout::array::<u8>(capacity.checked_add(Group::WIDTH)?).ok()?;
        let slots = Layout::array::<T>(capacity).ok()?;
        let (layout, slots_offset) = ctrl.extend(slots).ok()?;

        Some(StorageLayout {
            layout: layout.pad_to_align(),
            slots_offset,
        })
    }
}

/// The control-byte array and the parallel slot array of one table.
///
/// `SlotStorage` knows nothing about allocators beyond the one passed to
/// [`allocate`](Self::allocate) and [`free`](Self::free); it never drops
/// elements on its own. The owning table decides when elements die and when
/// the memory goes back.
///
/// Invariants while allocated:
/// - `capacity + 1` is a power of two.
/// - `ctrl[capacity] == SENTINEL`.
/// - `ctrl[capacity + 1 + i] == ctrl[i]` for `i < min(capacity, WIDTH - 1)`;
///   any other tail byte is `EMPTY`.
/// - `items + tombstones + growth_left == capacity_to_growth(capacity)`.
pub(crate) struct SlotStorage<T> {
    ctrl: NonNull<u8>,
    slots: NonNull<T>,
    capacity: usize,
    items: usize,
    growth_left: usize,
    layout: Layout,
    _marker: PhantomData<T>,
}

impl<T> SlotStorage<T> {
    /// An unallocated storage with zero capacity.
    pub(crate) const fn new() -> Self {
        SlotStorage {
            ctrl: NonNull::dangling(),
            slots: NonNull::dangling(),
            capacity: 0,
            items: 0,
            growth_left: 0,
            layout: Layout::new::<()>(),
            _marker: PhantomData,
        }
    }

    /// Allocate a storage of exactly `capacity` slots with every slot `EMPTY`.
    pub(crate) fn allocate<A: Allocator>(
        alloc: &A,
        capacity: usize,
        fallibility: Fallibility,
    ) -> Result<Self, TryReserveError> {
        debug_assert!(capacity == 0 || capacity.wrapping_add(1).is_power_of_two());
        if capacity == 0 {
            return Ok(Self::new());
        }

        let Some(layout) = StorageLayout::new::<T>(capacity) else {
            return Err(fallibility.capacity_overflow());
        };
        let ptr = match alloc.allocate(layout.layout) {
            Ok(block) => block.cast::<u8>(),
            Err(_) => return Err(fallibility.alloc_err(layout.layout)),
        };

        // SAFETY: The block is at least `capacity + WIDTH` bytes (the control
        // array) followed by the slot array at `slots_offset`.
        unsafe {
            ptr::write_bytes(ptr.as_ptr(), EMPTY, capacity + Group::WIDTH);
            *ptr.as_ptr().add(capacity) = SENTINEL;

            Ok(SlotStorage {
                ctrl: ptr,
                slots: ptr.add(layout.slots_offset).cast(),
                capacity,
                items: 0,
                growth_left: capacity_to_growth(capacity),
                layout: layout.layout,
                _marker: PhantomData,
            })
        }
    }

    /// Return the memory to `alloc` and reset to the unallocated state.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator (or a clone of the allocator) this storage
    /// was allocated with. Elements still marked full are forgotten, not
    /// dropped.
    pub(crate) unsafe fn free<A: Allocator>(&mut self, alloc: &A) {
        if self.capacity != 0 {
            // SAFETY: Caller guarantees `alloc` produced this block with
            // `self.layout`.
            unsafe { alloc.deallocate(self.ctrl, self.layout) };
        }
        *self = Self::new();
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.items
    }

    #[inline(always)]
    pub(crate) fn growth_left(&self) -> usize {
        self.growth_left
    }

    /// Size in bytes of the current allocation, zero when unallocated.
    #[cfg(any(test, feature = "stats"))]
    #[inline]
    pub(crate) fn allocation_size(&self) -> usize {
        if self.capacity == 0 {
            0
        } else {
            self.layout.size()
        }
    }

    /// # Safety
    ///
    /// `index < capacity + WIDTH` and the storage is allocated.
    #[inline(always)]
    pub(crate) unsafe fn ctrl(&self, index: usize) -> u8 {
        debug_assert!(index < self.capacity + Group::WIDTH);
        // SAFETY: Caller guarantees `index` is inside the control array.
        unsafe { *self.ctrl.as_ptr().add(index) }
    }

    /// Write `tag` at `index` and at its mirror in the tail.
    ///
    /// # Safety
    ///
    /// `index < capacity` and the storage is allocated.
    #[inline(always)]
    pub(crate) unsafe fn set_ctrl(&mut self, index: usize, tag: u8) {
        debug_assert!(index < self.capacity);
        let mirror = (index.wrapping_sub(Group::WIDTH - 1) & self.capacity)
            + ((Group::WIDTH - 1) & self.capacity);

        // SAFETY: `index < capacity`, and `mirror <= capacity + WIDTH - 1`.
        unsafe {
            *self.ctrl.as_ptr().add(index) = tag;
            *self.ctrl.as_ptr().add(mirror) = tag;
        }
    }

    /// # Safety
    ///
    /// `index < capacity`. The returned pointer is only readable if the slot
    /// is full.
    #[inline(always)]
    pub(crate) unsafe fn slot(&self, index: usize) -> NonNull<T> {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees `index` is inside the slot array.
        unsafe { self.slots.add(index) }
    }

    /// Cursor over the indices of full slots, in slot order.
    #[inline]
    pub(crate) fn full_indices(&self) -> RawIter {
        RawIter {
            ctrl: self.ctrl,
            capacity: self.capacity,
            index: 0,
            remaining: self.items,
        }
    }

    /// Load the window the probe sequence currently points at.
    ///
    /// # Safety
    ///
    /// The storage is allocated and `seq` was created with mask `capacity`.
    #[inline(always)]
    unsafe fn window(&self, seq: &ProbeSeq) -> Group {
        // SAFETY: `seq.offset() <= capacity`, and the control array extends
        // `WIDTH - 1` bytes past the sentinel.
        unsafe { Group::load(self.ctrl.as_ptr().add(seq.offset())) }
    }

    /// First lane of `group` that maps to a real `EMPTY` or `DELETED` slot.
    ///
    /// Lanes past the mirrored tail of a small table read as `EMPTY` but wrap
    /// onto arbitrary slots, so each candidate is checked against the real
    /// control byte.
    ///
    /// # Safety
    ///
    /// The storage is allocated and `seq` was created with mask `capacity`.
    #[inline(always)]
    unsafe fn first_vacant(&self, seq: &ProbeSeq, group: Group) -> Option<usize> {
        for lane in group.mask_empty_or_deleted() {
            let index = seq.offset_at(lane);
            // SAFETY: `offset_at` is masked by `capacity`.
            if control::is_empty_or_deleted(unsafe { self.ctrl(index) }) {
                return Some(index);
            }
        }
        None
    }

    /// Index of the full slot whose element satisfies `eq`.
    #[inline]
    pub(crate) fn find(&self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }

        let tag = h2(hash);
        let mut seq = ProbeSeq::new(hash, self.capacity);
        loop {
            // SAFETY: Allocated, and `seq` is masked by `capacity`.
            let group = unsafe { self.window(&seq) };
            for lane in group.match_tag(tag) {
                let index = seq.offset_at(lane);
                // SAFETY: Only full bytes match an H2 tag, and full bytes in
                // the mirrored tail wrap back onto the full slot they copy.
                if eq(unsafe { self.slot(index).as_ref() }) {
                    return Some(index);
                }
            }

            // An empty lane means the key was never displaced past here.
            if group.mask_empty().any_bit_set() {
                return None;
            }
            seq.move_next();
        }
    }

    /// Single-pass lookup that also remembers where the element would go.
    ///
    /// Returns `Ok(index)` of the match, or `Err(candidate)` with the first
    /// `EMPTY` or `DELETED` slot seen along the probe sequence. The candidate
    /// is `None` for an unallocated storage or a completely full small one.
    #[inline]
    pub(crate) fn find_or_find_insert_slot(
        &self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
    ) -> Result<usize, Option<usize>> {
        if self.capacity == 0 {
            return Err(None);
        }

        let tag = h2(hash);
        let mut seq = ProbeSeq::new(hash, self.capacity);
        let mut insert_slot = None;
        loop {
            // SAFETY: Allocated, and `seq` is masked by `capacity`.
            let group = unsafe { self.window(&seq) };
            for lane in group.match_tag(tag) {
                let index = seq.offset_at(lane);
                // SAFETY: See `find`.
                if eq(unsafe { self.slot(index).as_ref() }) {
                    return Ok(index);
                }
            }

            if insert_slot.is_none() {
                // SAFETY: Allocated, and `seq` is masked by `capacity`.
                insert_slot = unsafe { self.first_vacant(&seq, group) };
            }

            if group.mask_empty().any_bit_set() {
                return Err(insert_slot);
            }
            seq.move_next();
        }
    }

    /// First `EMPTY` or `DELETED` slot on the probe sequence of `hash`.
    ///
    /// # Safety
    ///
    /// The storage is allocated and at least one slot is `EMPTY` or `DELETED`.
    #[inline]
    pub(crate) unsafe fn find_insert_slot(&self, hash: u64) -> usize {
        debug_assert!(self.capacity != 0);
        let mut seq = ProbeSeq::new(hash, self.capacity);
        loop {
            // SAFETY: Allocated, and `seq` is masked by `capacity`.
            unsafe {
                let group = self.window(&seq);
                if let Some(index) = self.first_vacant(&seq, group) {
                    return index;
                }
            }
            seq.move_next();
        }
    }

    /// Whether `index` (a vacant slot) may take a new element without growing.
    ///
    /// Reusing a tombstone never costs budget: it was already counted.
    ///
    /// # Safety
    ///
    /// `index < capacity` and the storage is allocated.
    #[inline(always)]
    pub(crate) unsafe fn can_insert_at(&self, index: usize) -> bool {
        // SAFETY: Forwarded contract.
        self.growth_left > 0 || control::is_deleted(unsafe { self.ctrl(index) })
    }

    /// Move `value` into the vacant slot `index`.
    ///
    /// # Safety
    ///
    /// `index` is `EMPTY` or `DELETED`, and `can_insert_at(index)` holds.
    #[inline]
    pub(crate) unsafe fn insert_at(&mut self, index: usize, hash: u64, value: T) -> NonNull<T> {
        // SAFETY: Caller guarantees a vacant, budgeted slot inside the table.
        unsafe {
            let old = self.ctrl(index);
            debug_assert!(control::is_empty_or_deleted(old));
            debug_assert!(self.growth_left > 0 || control::is_deleted(old));

            self.growth_left -= control::is_empty(old) as usize;
            self.set_ctrl(index, h2(hash));
            let slot = self.slot(index);
            slot.as_ptr().write(value);
            self.items += 1;
            slot
        }
    }

    /// Move the element out of `index`, leaving a tombstone.
    ///
    /// # Safety
    ///
    /// `index` is a full slot.
    #[inline]
    pub(crate) unsafe fn take_at(&mut self, index: usize) -> T {
        // SAFETY: Caller guarantees a full slot inside the table.
        unsafe {
            debug_assert!(control::is_full(self.ctrl(index)));
            self.set_ctrl(index, DELETED);
            self.items -= 1;
            self.slot(index).as_ptr().read()
        }
    }

    /// Drop the element at `index` in place, leaving a tombstone.
    ///
    /// # Safety
    ///
    /// `index` is a full slot.
    #[inline]
    pub(crate) unsafe fn erase_at(&mut self, index: usize) {
        // SAFETY: Caller guarantees a full slot inside the table. The tag is
        // cleared first so a panicking destructor cannot cause a double drop.
        unsafe {
            debug_assert!(control::is_full(self.ctrl(index)));
            self.set_ctrl(index, DELETED);
            self.items -= 1;
            if mem::needs_drop::<T>() {
                ptr::drop_in_place(self.slot(index).as_ptr());
            }
        }
    }

    /// Mark every slot `EMPTY` and restore the full growth budget.
    ///
    /// Elements still in the table are forgotten.
    pub(crate) fn reset_ctrl(&mut self) {
        if self.capacity != 0 {
            // SAFETY: Allocated; the control array is `capacity + WIDTH` bytes.
            unsafe {
                ptr::write_bytes(self.ctrl.as_ptr(), EMPTY, self.capacity + Group::WIDTH);
                *self.ctrl.as_ptr().add(self.capacity) = SENTINEL;
            }
        }
        self.items = 0;
        self.growth_left = capacity_to_growth(self.capacity);
    }

    /// Drop every element and reset the control bytes, keeping the memory.
    pub(crate) fn clear(&mut self) {
        struct ResetOnDrop<'a, T>(&'a mut SlotStorage<T>);

        impl<T> Drop for ResetOnDrop<'_, T> {
            fn drop(&mut self) {
                self.0.reset_ctrl();
            }
        }

        let guard = ResetOnDrop(self);
        // SAFETY: Every index yielded is a full slot, and the guard forgets
        // them all afterwards (also when a destructor panics).
        unsafe { guard.0.drop_elements() };
    }

    /// Drop every full element without touching the control bytes.
    ///
    /// # Safety
    ///
    /// The elements must not be used (or dropped) again.
    pub(crate) unsafe fn drop_elements(&mut self) {
        if mem::needs_drop::<T>() && self.items != 0 {
            for index in self.full_indices() {
                // SAFETY: `full_indices` only yields full slots.
                unsafe { ptr::drop_in_place(self.slot(index).as_ptr()) };
            }
        }
    }

    /// Bitwise-relocate every element into `dest`, placing each by its hash.
    ///
    /// This storage's tags are left untouched, so if `hasher` panics the
    /// source is still complete and `dest` only holds duplicate bits that
    /// must be freed without dropping.
    ///
    /// # Safety
    ///
    /// `dest` is freshly allocated (all `EMPTY`) with a growth budget of at
    /// least `self.len()`. On return the elements are owned by `dest` and
    /// this storage must be freed without dropping them.
    pub(crate) unsafe fn relocate_into(&self, dest: &mut SlotStorage<T>, hasher: impl Fn(&T) -> u64) {
        debug_assert_eq!(dest.items, 0);
        debug_assert!(dest.growth_left >= self.items);

        for index in self.full_indices() {
            // SAFETY: `index` is full here, and `dest` has an empty slot for
            // every element still to come.
            unsafe {
                let src = self.slot(index);
                let hash = hasher(src.as_ref());
                let new_index = dest.find_insert_slot(hash);
                dest.set_ctrl(new_index, h2(hash));
                ptr::copy_nonoverlapping(src.as_ptr(), dest.slot(new_index).as_ptr(), 1);
            }
        }

        dest.items = self.items;
        dest.growth_left -= self.items;
    }

    /// Clone every element of `src` into the same slot of `self`, then copy
    /// the control bytes verbatim so tombstones (and with them every probe
    /// chain) survive.
    ///
    /// If a clone panics, `self` holds exactly the elements cloned so far.
    ///
    /// # Safety
    ///
    /// `self` is freshly allocated or reset (no elements, no tombstones) and
    /// has the same capacity as `src`.
    pub(crate) unsafe fn clone_from_storage(&mut self, src: &SlotStorage<T>)
    where
        T: Clone,
    {
        debug_assert_eq!(self.capacity, src.capacity);
        debug_assert_eq!(self.items, 0);
        if src.capacity == 0 {
            return;
        }

        for index in src.full_indices() {
            // SAFETY: `index` is full in `src` and empty in `self`; both have
            // the same capacity.
            unsafe {
                let value = src.slot(index).as_ref().clone();
                self.slot(index).as_ptr().write(value);
                self.set_ctrl(index, src.ctrl(index));
            }
            self.items += 1;
        }

        // SAFETY: Both control arrays are `capacity + WIDTH` bytes.
        unsafe {
            ptr::copy_nonoverlapping(
                src.ctrl.as_ptr(),
                self.ctrl.as_ptr(),
                self.capacity + Group::WIDTH,
            );
        }
        self.growth_left = src.growth_left;
    }

    /// Number of `DELETED` slots.
    #[cfg(any(test, feature = "stats", feature = "tracing"))]
    pub(crate) fn tombstones(&self) -> usize {
        capacity_to_growth(self.capacity) - self.items - self.growth_left
    }
}

/// Cursor over the full slots of a storage.
///
/// Scans a group at a time from slot 0, using the full mask to skip whole
/// runs of vacant slots. Lanes at or past `capacity` (the sentinel and the
/// mirrored tail) end the scan, so no bounds check is needed per slot.
///
/// The cursor reads control bytes lazily. Callers may retag slots it already
/// yielded, but must not retag slots ahead of it.
#[derive(Clone)]
pub(crate) struct RawIter {
    ctrl: NonNull<u8>,
    capacity: usize,
    index: usize,
    remaining: usize,
}

impl Iterator for RawIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }

        while self.index < self.capacity {
            // SAFETY: `index < capacity`, so `index + WIDTH - 1` is within the
            // `capacity + WIDTH` control bytes.
            let group = unsafe { Group::load(self.ctrl.as_ptr().add(self.index)) };
            match group.mask_full().lowest_set_bit() {
                Some(lane) if self.index + lane < self.capacity => {
                    let slot = self.index + lane;
                    self.index = slot + 1;
                    self.remaining -= 1;
                    return Some(slot);
                }
                Some(_) => break,
                None => self.index += Group::WIDTH,
            }
        }

        debug_assert!(false, "ran out of slots with {} items left", self.remaining);
        self.index = self.capacity;
        self.remaining = 0;
        None
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RawIter {}

impl core::iter::FusedIterator for RawIter {}
