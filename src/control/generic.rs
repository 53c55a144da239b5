use super::BitMask;

const LSBS: u64 = 0x0101_0101_0101_0101;
const LOW7: u64 = 0x7f7f_7f7f_7f7f_7f7f;
const MSBS: u64 = 0x8080_8080_8080_8080;

/// Eight control bytes packed little-endian into a `u64`, so lane `i` is byte
/// `i` in memory on every target.
///
/// All masks are exact: the formulas never carry between bytes, so a lane is
/// reported if and only if its own byte satisfies the predicate.
#[derive(Clone, Copy)]
pub(crate) struct Group(u64);

impl Group {
    pub(crate) const WIDTH: usize = 8;

    /// Load a group starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + WIDTH` must be readable. No alignment is required.
    #[inline(always)]
    pub(crate) unsafe fn load(ptr: *const u8) -> Self {
        // SAFETY: Caller guarantees `WIDTH` readable bytes at `ptr`.
        let bytes = unsafe { core::ptr::read_unaligned(ptr as *const [u8; 8]) };
        Group(u64::from_le_bytes(bytes))
    }

    /// Lanes whose tag equals `tag`.
    #[inline(always)]
    pub(crate) fn match_tag(self, tag: u8) -> BitMask<8> {
        let x = self.0 ^ LSBS.wrapping_mul(tag as u64);
        BitMask(!(((x & LOW7) + LOW7) | x) & MSBS)
    }

    /// Lanes holding `EMPTY`: top bit set and bit 1 clear.
    #[inline(always)]
    pub(crate) fn mask_empty(self) -> BitMask<8> {
        BitMask((self.0 & (!self.0 << 6)) & MSBS)
    }

    /// Lanes holding `EMPTY` or `DELETED`: top bit set and bit 0 clear.
    #[inline(always)]
    pub(crate) fn mask_empty_or_deleted(self) -> BitMask<8> {
        BitMask((self.0 & (!self.0 << 7)) & MSBS)
    }

    /// Lanes holding an H2 tag.
    #[inline(always)]
    pub(crate) fn mask_full(self) -> BitMask<8> {
        BitMask(!self.0 & MSBS)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::control::DELETED;
    use crate::control::EMPTY;
    use crate::control::SENTINEL;
    use crate::control::is_empty;
    use crate::control::is_empty_or_deleted;
    use crate::control::is_full;

    fn group(tags: [u8; 8]) -> Group {
        // SAFETY: `tags` is exactly `WIDTH` bytes.
        unsafe { Group::load(tags.as_ptr()) }
    }

    fn lanes(mask: BitMask<8>) -> Vec<usize> {
        mask.into_iter().collect()
    }

    #[test]
    fn match_finds_exact_lanes() {
        let g = group([0x12, EMPTY, 0x12, DELETED, 0x13, SENTINEL, 0x12, 0x00]);
        assert_eq!(lanes(g.match_tag(0x12)), [0, 2, 6]);
        assert_eq!(lanes(g.match_tag(0x13)), [4]);
        assert_eq!(lanes(g.match_tag(0x00)), [7]);
        assert!(lanes(g.match_tag(0x7f)).is_empty());
    }

    #[test]
    fn match_has_no_borrow_false_positives() {
        // A zero lane followed by `tag ^ 1` trips the classic
        // `(x - 0x01..) & !x & 0x80..` trick. Ours must not report lane 1.
        let g = group([0x05, 0x04, 0x05, 0x04, EMPTY, EMPTY, EMPTY, EMPTY]);
        assert_eq!(lanes(g.match_tag(0x05)), [0, 2]);
        assert_eq!(lanes(g.match_tag(0x04)), [1, 3]);
    }

    #[test]
    fn special_masks() {
        let g = group([EMPTY, DELETED, SENTINEL, 0x00, 0x7f, EMPTY, 0x41, DELETED]);
        assert_eq!(lanes(g.mask_empty()), [0, 5]);
        assert_eq!(lanes(g.mask_empty_or_deleted()), [0, 1, 5, 7]);
        assert_eq!(lanes(g.mask_full()), [3, 4, 6]);
    }

    #[test]
    fn masks_agree_with_byte_classifiers() {
        let choices = [EMPTY, DELETED, SENTINEL];
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..2000 {
            let mut tags = [0u8; 8];
            for tag in tags.iter_mut() {
                *tag = if rng.random_bool(0.5) {
                    choices[rng.random_range(0..choices.len())]
                } else {
                    rng.random_range(0..=0x7f)
                };
            }
            let g = group(tags);
            let probe = tags[rng.random_range(0..8)] & 0x7f;

            for (lane, &tag) in tags.iter().enumerate() {
                let bit = |m: BitMask<8>| m.into_iter().any(|l| l == lane);
                assert_eq!(bit(g.mask_empty()), is_empty(tag), "{tags:02x?}");
                assert_eq!(bit(g.mask_full()), is_full(tag), "{tags:02x?}");
                assert_eq!(
                    bit(g.mask_empty_or_deleted()),
                    is_empty_or_deleted(tag),
                    "{tags:02x?}"
                );
                assert_eq!(bit(g.match_tag(probe)), tag == probe, "{tags:02x?}");
            }

            // Empty and full never overlap.
            assert_eq!(g.mask_empty().0 & g.mask_full().0, 0);
        }
    }

    #[test]
    fn load_is_unaligned() {
        let bytes = [EMPTY, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        // SAFETY: `bytes[1..]` has eight readable bytes.
        let g = unsafe { Group::load(bytes.as_ptr().add(1)) };
        assert_eq!(lanes(g.match_tag(0x01)), [0]);
        assert_eq!(lanes(g.match_tag(0x08)), [7]);
        assert_eq!(g.mask_full().count(), 8);
    }
}
