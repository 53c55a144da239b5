use crate::control::Group;

/// Bits of the hash that select where probing starts.
#[inline(always)]
pub(crate) fn h1(hash: u64) -> usize {
    // On 32-bit targets the high bits are simply dropped.
    (hash >> 7) as usize
}

/// The 7-bit fragment stored in a full control byte.
#[inline(always)]
pub(crate) fn h2(hash: u64) -> u8 {
    (hash & 0x7f) as u8
}

/// Triangular probe over group windows.
///
/// Starting at `h1 & mask`, the window start advances by `WIDTH`, `2 * WIDTH`,
/// `3 * WIDTH`, ... modulo `mask + 1`. Because `mask + 1` is a power of two
/// and a multiple of (or smaller than) `WIDTH`, every window position congruent
/// to the start is visited exactly once before the sequence repeats, so the
/// windows jointly cover every slot.
///
/// See <https://fgiesen.wordpress.com/2015/02/22/triangular-numbers-mod-2n/>.
#[derive(Clone, Debug)]
pub(crate) struct ProbeSeq {
    mask: usize,
    offset: usize,
    index: usize,
}

impl ProbeSeq {
    #[inline(always)]
    pub(crate) fn new(hash: u64, mask: usize) -> Self {
        ProbeSeq {
            mask,
            offset: h1(hash) & mask,
            index: 0,
        }
    }

    /// Start of the current window.
    #[inline(always)]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Slot index of `lane` within the current window.
    ///
    /// Lanes that land on the mirrored tail wrap back to the slot they mirror.
    #[inline(always)]
    pub(crate) fn offset_at(&self, lane: usize) -> usize {
        (self.offset + lane) & self.mask
    }

    #[inline(always)]
    pub(crate) fn move_next(&mut self) {
        self.index += Group::WIDTH;
        self.offset = (self.offset + self.index) & self.mask;
        debug_assert!(
            self.index <= self.mask.wrapping_add(Group::WIDTH),
            "probe sequence ran past the table"
        );
    }
}
