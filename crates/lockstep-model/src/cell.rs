use lockstep_types::{NativeInt, RmwOp, Width};

use crate::rmw_result;

/// Single-threaded reference cell: one N-bit location, mutated only through
/// the atomic entry points.
///
/// The value is stored as a masked `u64`; the stored bits are always within
/// `width.mask()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryCell {
    width: Width,
    bits: u64,
}

impl MemoryCell {
    pub fn new(width: Width, initial: u64) -> Self {
        MemoryCell {
            width,
            bits: width.truncate(initial),
        }
    }

    /// Builds a cell of `T`'s width holding `value`.
    pub fn of<T: NativeInt>(value: T) -> Self {
        MemoryCell::new(T::WIDTH, value.to_bits())
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// Current value as masked bits.
    pub fn load(&self) -> u64 {
        self.bits
    }

    /// Current value reinterpreted as `T`.
    pub fn get<T: NativeInt>(&self) -> T {
        T::from_bits(self.bits)
    }

    /// One indivisible read-modify-write step: `f` maps the old value to
    /// `(new_value, result)`. The new value is masked to the cell width.
    pub fn atomic_rmw<R>(&mut self, f: impl FnOnce(u64) -> (u64, R)) -> R {
        let (new, ret) = f(self.bits);
        self.bits = self.width.truncate(new);
        ret
    }

    /// Strong compare-and-swap. Returns the pre-call value in every case;
    /// the cell becomes `replacement` iff it held `expected`. Both operands
    /// are truncated to the cell width before use.
    pub fn strong_cas(&mut self, expected: u64, replacement: u64) -> u64 {
        let expected = self.width.truncate(expected);
        let replacement = self.width.truncate(replacement);
        self.atomic_rmw(|old| {
            if old == expected {
                (replacement, old)
            } else {
                (old, old)
            }
        })
    }

    /// Weak compare-and-swap. A single-shot evaluation of the reference
    /// model never fails spuriously, so the flag is `true` exactly when the
    /// cell held `expected`.
    pub fn weak_cas(&mut self, expected: u64, replacement: u64) -> bool {
        let expected = self.width.truncate(expected);
        let prior = self.strong_cas(expected, replacement);
        prior == expected
    }

    /// Atomic read-modify-write; returns the pre-update value.
    pub fn rmw(&mut self, op: RmwOp, operand: u64) -> u64 {
        let width = self.width;
        self.atomic_rmw(|old| (rmw_result(op, old, operand, width), old))
    }

    /// Strong CAS whose result is widened to `T`'s canonical register type,
    /// the way compiled code returns a sub-width result.
    pub fn strong_cas_canonical<T: NativeInt>(&mut self, expected: T, replacement: T) -> T::Canonical {
        debug_assert_eq!(T::WIDTH, self.width);
        let prior = self.strong_cas(expected.to_bits(), replacement.to_bits());
        T::from_bits(prior).to_canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_types::AtomicOp;

    #[test]
    fn strong_cas_returns_prior_and_swaps_on_match() {
        let mut cell = MemoryCell::new(Width::W32, 42);
        assert_eq!(cell.strong_cas(42, 0xbeef), 42);
        assert_eq!(cell.load(), 0xbeef);
        // Second attempt no longer matches; the cell is untouched.
        assert_eq!(cell.strong_cas(42, 0xbeef), 0xbeef);
        assert_eq!(cell.load(), 0xbeef);
    }

    #[test]
    fn weak_cas_flag_tracks_match() {
        let mut cell = MemoryCell::new(Width::W16, 42);
        assert!(cell.weak_cas(42, 0xbeef));
        assert_eq!(cell.load(), 0xbeef);
        assert!(!cell.weak_cas(42, 0x1111));
        assert_eq!(cell.load(), 0xbeef);
    }

    #[test]
    fn cas_truncates_wide_expected_values() {
        // A 64-bit constant whose low bits are 42 matches sub-64-bit cells
        // but not a 64-bit cell.
        let wide = 0x0f00_0000_0000_0000u64 + 42;
        for w in [Width::W8, Width::W16, Width::W32] {
            let mut cell = MemoryCell::new(w, 42);
            assert_eq!(cell.strong_cas(wide, 0xbeef), 42);
            assert_eq!(cell.load(), w.truncate(0xbeef));
        }
        let mut cell = MemoryCell::new(Width::W64, 42);
        assert_eq!(cell.strong_cas(wide, 0xbeef), 42);
        assert_eq!(cell.load(), 42);
    }

    #[test]
    fn rmw_returns_prior_for_every_op() {
        for op in AtomicOp::ALL {
            let Some(rmw) = op.rmw_op() else { continue };
            let mut cell = MemoryCell::new(Width::W8, 5);
            let prior = cell.rmw(rmw, 1);
            assert_eq!(prior, 5, "{op}");
            assert_eq!(cell.load(), rmw_result(rmw, 5, 1, Width::W8), "{op}");
        }
    }

    #[test]
    fn add_wraps_modulo_width() {
        let mut cell = MemoryCell::new(Width::W8, 0xff);
        assert_eq!(cell.rmw(RmwOp::Add, 1), 0xff);
        assert_eq!(cell.load(), 0);
    }

    #[test]
    fn xchg_twice_is_idempotent_in_value() {
        let mut cell = MemoryCell::new(Width::W32, 5);
        assert_eq!(cell.rmw(RmwOp::Xchg, 42), 5);
        assert_eq!(cell.load(), 42);
        // Value-level no-op, but the prior is still reported faithfully.
        assert_eq!(cell.rmw(RmwOp::Xchg, 42), 42);
        assert_eq!(cell.load(), 42);
    }

    #[test]
    fn canonical_widening_sign_extends() {
        let mut cell = MemoryCell::of(-1i8);
        let prior: i32 = cell.strong_cas_canonical(42i8, 0x3fi8);
        assert_eq!(prior, -1);
        assert_eq!(cell.get::<i8>(), -1);

        let mut cell = MemoryCell::of(42i8);
        let prior: i32 = cell.strong_cas_canonical(42i8, -17i8);
        assert_eq!(prior, 42);
        assert_eq!(cell.get::<i8>(), -17);
    }

    #[test]
    fn typed_accessors_round_trip() {
        let cell = MemoryCell::of(-300i16);
        assert_eq!(cell.get::<i16>(), -300);
        assert_eq!(cell.load(), (-300i16 as u16) as u64);
    }
}
