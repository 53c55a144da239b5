#[cfg(target_arch = "x86")]
use core::arch::x86 as arch;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64 as arch;

use super::BitMask;
use super::EMPTY;
use super::SENTINEL;

/// Sixteen control bytes in an SSE2 register.
///
/// `movemask` collects the top bit of every byte, so the masks produced here
/// have a stride of one bit per lane.
#[derive(Clone, Copy)]
pub(crate) struct Group(arch::__m128i);

impl Group {
    pub(crate) const WIDTH: usize = 16;

    /// Load a group starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + WIDTH` must be readable. No alignment is required.
    #[inline(always)]
    pub(crate) unsafe fn load(ptr: *const u8) -> Self {
        // SAFETY: Caller guarantees `WIDTH` readable bytes at `ptr`, and
        // `_mm_loadu_si128` tolerates any alignment.
        unsafe { Group(arch::_mm_loadu_si128(ptr as *const arch::__m128i)) }
    }

    /// Lanes whose tag equals `tag`.
    #[inline(always)]
    pub(crate) fn match_tag(self, tag: u8) -> BitMask<1> {
        // SAFETY: SSE2 is statically enabled for this module.
        unsafe {
            let cmp = arch::_mm_cmpeq_epi8(self.0, arch::_mm_set1_epi8(tag as i8));
            BitMask(arch::_mm_movemask_epi8(cmp) as u16 as u64)
        }
    }

    #[inline(always)]
    pub(crate) fn mask_empty(self) -> BitMask<1> {
        self.match_tag(EMPTY)
    }

    /// Signed compare: `EMPTY` (-128) and `DELETED` (-2) are the only tags
    /// below `SENTINEL` (-1).
    #[inline(always)]
    pub(crate) fn mask_empty_or_deleted(self) -> BitMask<1> {
        // SAFETY: SSE2 is statically enabled for this module.
        unsafe {
            let special = arch::_mm_set1_epi8(SENTINEL as i8);
            let cmp = arch::_mm_cmpgt_epi8(special, self.0);
            BitMask(arch::_mm_movemask_epi8(cmp) as u16 as u64)
        }
    }

    #[inline(always)]
    pub(crate) fn mask_full(self) -> BitMask<1> {
        // SAFETY: SSE2 is statically enabled for this module.
        unsafe { BitMask((arch::_mm_movemask_epi8(self.0) as u16 ^ 0xffff) as u64) }
    }
}
