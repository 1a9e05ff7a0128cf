//! Fixed-width bitset over component ids.
//!
//! Every entity's component membership and every system's require/exclude
//! signature is one of these. Sized at compile time from [`MAX_COMPONENTS`]
//! so matching a signature against an entity is a handful of word-sized
//! bitops, never an allocation.

use bitset_core::BitSet;

#[cfg(not(feature = "components64"))]
pub const MAX_COMPONENTS: usize = 32;
#[cfg(feature = "components64")]
pub const MAX_COMPONENTS: usize = 64;

const WORD_BITS: usize = 64;
const WORDS: usize = (MAX_COMPONENTS + WORD_BITS - 1) / WORD_BITS;

/// A fixed-width set of component indices, backed by [`bitset_core::BitSet`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentBits([u64; WORDS]);

impl ComponentBits {
    /// The empty set.
    pub const fn zero() -> Self {
        Self([0; WORDS])
    }

    /// Set or clear `bit`.
    pub fn set(&mut self, bit: usize, on: bool) {
        debug_assert!(bit < MAX_COMPONENTS, "component index out of range");
        if on {
            self.0.bit_set(bit);
        } else {
            self.0.bit_reset(bit);
        }
    }

    /// Test whether `bit` is set.
    pub fn test(&self, bit: usize) -> bool {
        debug_assert!(bit < MAX_COMPONENTS, "component index out of range");
        self.0.bit_test(bit)
    }

    /// True if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    fn anded_with(&self, other: &Self) -> Self {
        let mut out = *self;
        out.0.bit_and(&other.0);
        out
    }

    /// True if `self` has every bit that `required` has.
    pub fn contains_all(&self, required: &Self) -> bool {
        self.anded_with(required) == *required
    }

    /// True if `self` and `other` share at least one bit.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.anded_with(other).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_test_round_trip() {
        let mut bits = ComponentBits::zero();
        assert!(bits.is_zero());
        bits.set(3, true);
        bits.set(9, true);
        assert!(bits.test(3));
        assert!(bits.test(9));
        assert!(!bits.test(4));
        bits.set(3, false);
        assert!(!bits.test(3));
        assert!(bits.test(9));
    }

    #[test]
    fn contains_all_and_intersects() {
        let mut a = ComponentBits::zero();
        a.set(0, true);
        a.set(1, true);
        a.set(2, true);

        let mut required = ComponentBits::zero();
        required.set(0, true);
        required.set(2, true);
        assert!(a.contains_all(&required));

        let mut exclude = ComponentBits::zero();
        exclude.set(5, true);
        assert!(!a.intersects(&exclude));

        exclude.set(1, true);
        assert!(a.intersects(&exclude));
    }

    #[test]
    fn empty_exclude_never_intersects() {
        let mut a = ComponentBits::zero();
        a.set(0, true);
        let empty = ComponentBits::zero();
        assert!(!a.intersects(&empty));
    }
}
