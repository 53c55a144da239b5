//! Control bytes and the group-at-a-time matching used by the table.
//!
//! Every slot in a [`SlotStorage`](crate::storage) owns one control byte:
//!
//! ```text
//! EMPTY    = 0b1000_0000
//! DELETED  = 0b1111_1110
//! SENTINEL = 0b1111_1111
//! FULL     = 0b0xxx_xxxx   (low 7 bits hold the H2 hash fragment)
//! ```
//!
//! A [`Group`] is `Group::WIDTH` consecutive control bytes loaded at once. The
//! portable implementation packs eight bytes into a `u64`; on x86 with SSE2 a
//! sixteen-lane vector implementation is used instead unless the `eight-way`
//! feature is enabled. Both expose the same interface and produce identical
//! answers lane for lane.

use cfg_if::cfg_if;

#[cfg_attr(
    all(
        target_feature = "sse2",
        any(target_arch = "x86", target_arch = "x86_64"),
        not(miri),
        not(feature = "eight-way")
    ),
    allow(dead_code)
)]
pub(crate) mod generic;

#[cfg(all(
    target_feature = "sse2",
    any(target_arch = "x86", target_arch = "x86_64"),
    not(miri)
))]
#[cfg_attr(feature = "eight-way", allow(dead_code))]
pub(crate) mod sse2;

cfg_if! {
    if #[cfg(all(
        target_feature = "sse2",
        any(target_arch = "x86", target_arch = "x86_64"),
        not(miri),
        not(feature = "eight-way")
    ))] {
        pub(crate) use sse2::Group;
    } else {
        pub(crate) use generic::Group;
    }
}

/// Tag of a slot that has never held a value.
///
/// The sign bit is set so vector scans can pick it up with `movemask`, and bit
/// 1 is clear, which is what separates it from the other special tags in the
/// portable formulas.
pub(crate) const EMPTY: u8 = 0b1000_0000;

/// Tag of a slot whose value was removed (tombstone).
pub(crate) const DELETED: u8 = 0b1111_1110;

/// Tag stored exactly once, right after the last real slot.
pub(crate) const SENTINEL: u8 = 0b1111_1111;

#[inline(always)]
pub(crate) fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

#[inline(always)]
pub(crate) fn is_empty(ctrl: u8) -> bool {
    ctrl == EMPTY
}

#[inline(always)]
pub(crate) fn is_deleted(ctrl: u8) -> bool {
    ctrl == DELETED
}

#[inline(always)]
pub(crate) fn is_sentinel(ctrl: u8) -> bool {
    ctrl == SENTINEL
}

/// `EMPTY` and `DELETED` are the only tags below `SENTINEL` when read as `i8`.
#[inline(always)]
pub(crate) fn is_empty_or_deleted(ctrl: u8) -> bool {
    (ctrl as i8) < (SENTINEL as i8)
}

/// A set of lanes within a [`Group`].
///
/// Each lane occupies `STRIDE` bits of the word and only the top bit of a lane
/// may be set, so the lane index is `trailing_zeros / STRIDE`. The portable
/// group uses a stride of eight (one bit per byte), SSE2 `movemask` output
/// uses a stride of one.
///
/// The mask is `Copy`; iterating it consumes a copy, so the same mask may be
/// walked again from a saved value.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitMask<const STRIDE: u32>(pub(crate) u64);

impl<const STRIDE: u32> BitMask<STRIDE> {
    #[inline(always)]
    pub(crate) fn any_bit_set(self) -> bool {
        self.0 != 0
    }

    #[inline(always)]
    pub(crate) fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some((self.0.trailing_zeros() / STRIDE) as usize)
        }
    }

    #[inline(always)]
    pub(crate) fn remove_lowest_bit(self) -> Self {
        BitMask(self.0 & self.0.wrapping_sub(1))
    }

    /// Number of lanes in the mask.
    #[inline(always)]
    pub(crate) fn count(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl<const STRIDE: u32> IntoIterator for BitMask<STRIDE> {
    type IntoIter = BitMaskIter<STRIDE>;
    type Item = usize;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        BitMaskIter(self)
    }
}

impl<const STRIDE: u32> core::fmt::Debug for BitMask<STRIDE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(*self).finish()
    }
}

/// Ascending iterator over the lanes of a [`BitMask`].
#[derive(Clone)]
pub(crate) struct BitMaskIter<const STRIDE: u32>(BitMask<STRIDE>);

impl<const STRIDE: u32> Iterator for BitMaskIter<STRIDE> {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        let lane = self.0.lowest_set_bit()?;
        self.0 = self.0.remove_lowest_bit();
        Some(lane)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count();
        (n, Some(n))
    }
}

impl<const STRIDE: u32> ExactSizeIterator for BitMaskIter<STRIDE> {}

impl<const STRIDE: u32> core::iter::FusedIterator for BitMaskIter<STRIDE> {}
