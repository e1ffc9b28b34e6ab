//! Q64.64 fixed-point numbers.
//!
//! A value `v` represents the real number `v / 2^64`: the top 64 bits are the
//! integer part, the bottom 64 bits the fraction. Financial values never wrap,
//! so every operation is checked and overflow is reported as an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::Q64;
use crate::error::{AutocompounderError, Result};

const LO_MASK: u128 = u64::MAX as u128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPoint(u128);

impl FixedPoint {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(Q64);

    /// Wrap a raw Q64.64 encoding.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u128 {
        self.0
    }

    /// Integer `n` with a zero fraction.
    pub const fn from_int(n: u64) -> Self {
        Self((n as u128) << 64)
    }

    /// `num / den`, truncated to 64 fractional bits.
    pub fn from_fraction(num: u64, den: u64) -> Result<Self> {
        Self::from_int(num).checked_div(Self::from_int(den))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(AutocompounderError::MathOverflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(AutocompounderError::MathOverflow)
    }

    /// `(a · b) >> 64`, floored, with a full 256-bit intermediate.
    pub fn checked_mul(self, rhs: Self) -> Result<Self> {
        let (ah, al) = (self.0 >> 64, self.0 & LO_MASK);
        let (bh, bl) = (rhs.0 >> 64, rhs.0 & LO_MASK);

        // (a·b) >> 64 = ah·bh·2^64 + ah·bl + al·bh + (al·bl >> 64)
        // Each partial product of two 64-bit limbs fits in u128.
        let hh = ah * bh;
        if hh > LO_MASK {
            return Err(AutocompounderError::MathOverflow);
        }
        (hh << 64)
            .checked_add(ah * bl)
            .and_then(|v| v.checked_add(al * bh))
            .and_then(|v| v.checked_add((al * bl) >> 64))
            .map(Self)
            .ok_or(AutocompounderError::MathOverflow)
    }

    /// `(a << 64) / b`, floored, by long division over the remainder.
    pub fn checked_div(self, rhs: Self) -> Result<Self> {
        if rhs.0 == 0 {
            return Err(AutocompounderError::DivideByZero);
        }
        let int_part = self.0 / rhs.0;
        if int_part > LO_MASK {
            return Err(AutocompounderError::MathOverflow);
        }

        let mut rem = self.0 % rhs.0;
        let mut frac: u128 = 0;
        for _ in 0..64 {
            // rem < rhs, so a carried-out top bit means rem·2 > rhs.
            let carry = rem >> 127;
            rem <<= 1;
            frac <<= 1;
            if carry == 1 || rem >= rhs.0 {
                rem = rem.wrapping_sub(rhs.0);
                frac |= 1;
            }
        }
        Ok(Self((int_part << 64) | frac))
    }

    /// Integer part.
    pub const fn floor(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Fractional part, as a Q64.64 value below one.
    pub const fn fract(self) -> Self {
        Self(self.0 & LO_MASK)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// 16-byte big-endian encoding (8 integer bytes, then 8 fraction bytes).
    pub const fn to_be_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub const fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }
}

impl fmt::Display for FixedPoint {
    /// Integer part and nine truncated decimal places.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = (self.fract().0 * 1_000_000_000) >> 64;
        write!(f, "{}.{:09}", self.floor(), nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integer_round_trip() {
        let v = FixedPoint::from_int(1_000);
        assert_eq!(v.floor(), 1_000);
        assert!(v.fract().is_zero());
        assert_eq!(v.to_bits(), 1_000u128 << 64);
    }

    #[test]
    fn growth_factor_of_ten_percent() {
        let growth = FixedPoint::ONE
            .checked_add(FixedPoint::from_fraction(100, 1_000).unwrap())
            .unwrap();
        assert_eq!(growth.floor(), 1);
        // 2^64 / 10 truncated
        assert_eq!(growth.fract().to_bits(), 1_844_674_407_370_955_161);
        assert_eq!(growth.to_string(), "1.099999999");
    }

    #[test]
    fn mul_truncates_towards_zero() {
        let growth = FixedPoint::from_bits(Q64 + Q64 / 10);
        let grown = FixedPoint::from_int(1_000).checked_mul(growth).unwrap();
        // 1.1 is not representable exactly; the product sits just below 1100.
        assert_eq!(grown.floor(), 1_099);
        let dust = FixedPoint::from_int(1_100).checked_sub(grown).unwrap();
        assert!(dust.to_bits() <= 1_000);
    }

    #[test]
    fn mul_of_exact_values_is_exact() {
        let half = FixedPoint::from_fraction(1, 2).unwrap();
        let v = FixedPoint::from_int(7).checked_mul(half).unwrap();
        assert_eq!(v.floor(), 3);
        assert_eq!(v.fract(), half);
    }

    #[test]
    fn mul_overflow_is_an_error() {
        let big = FixedPoint::from_int(u64::MAX);
        assert_eq!(big.checked_mul(big), Err(AutocompounderError::MathOverflow));
        assert_eq!(
            FixedPoint::from_bits(u128::MAX).checked_add(FixedPoint::from_bits(1)),
            Err(AutocompounderError::MathOverflow)
        );
    }

    #[test]
    fn sub_underflow_is_an_error() {
        assert_eq!(
            FixedPoint::from_int(1).checked_sub(FixedPoint::from_int(2)),
            Err(AutocompounderError::MathOverflow)
        );
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert_eq!(
            FixedPoint::ONE.checked_div(FixedPoint::ZERO),
            Err(AutocompounderError::DivideByZero)
        );
        assert_eq!(
            FixedPoint::from_fraction(1, 0),
            Err(AutocompounderError::DivideByZero)
        );
    }

    #[test]
    fn div_overflow_is_an_error() {
        let tiny = FixedPoint::from_bits(1);
        assert_eq!(
            FixedPoint::from_int(2).checked_div(tiny),
            Err(AutocompounderError::MathOverflow)
        );
    }

    #[test]
    fn div_handles_remainders_near_the_top_bit() {
        let a = FixedPoint::from_bits(u128::MAX - 1);
        let b = FixedPoint::from_bits(u128::MAX);
        let q = a.checked_div(b).unwrap();
        assert_eq!(q.floor(), 0);
        assert_eq!(q.fract().to_bits(), LO_MASK);
    }

    #[test]
    fn be_bytes_layout() {
        let v = FixedPoint::from_int(1).checked_add(FixedPoint::from_bits(2)).unwrap();
        let bytes = v.to_be_bytes();
        assert_eq!(&bytes[..8], &1u64.to_be_bytes());
        assert_eq!(&bytes[8..], &2u64.to_be_bytes());
        assert_eq!(FixedPoint::from_be_bytes(bytes), v);
    }

    #[test]
    fn divisor_below_one_amplifies_truncation() {
        // 3 ulp × 0.25 truncates to 0, and dividing cannot recover it.
        let a = FixedPoint::from_bits(3);
        let quarter = FixedPoint::from_bits(1 << 62);
        let back = a.checked_mul(quarter).unwrap().checked_div(quarter).unwrap();
        assert_eq!(back, FixedPoint::ZERO);
        assert!(a.to_bits() - back.to_bits() > 1);
    }

    proptest! {
        // Holds for b >= 1.0, every growth factor the pool divides by.
        #[test]
        fn div_undoes_mul_within_one_unit(
            a in 0u128..(1u128 << 100),
            b in Q64..(1u128 << 80),
        ) {
            let a = FixedPoint::from_bits(a);
            let b = FixedPoint::from_bits(b);
            let back = a.checked_mul(b).unwrap().checked_div(b).unwrap();
            prop_assert!(back <= a);
            prop_assert!(a.to_bits() - back.to_bits() <= 1);
        }

        #[test]
        fn mul_is_commutative(a in 0u128..(1u128 << 96), b in 0u128..(1u128 << 96)) {
            let (a, b) = (FixedPoint::from_bits(a), FixedPoint::from_bits(b));
            prop_assert_eq!(a.checked_mul(b), b.checked_mul(a));
        }

        #[test]
        fn mul_by_one_is_identity(a in any::<u128>()) {
            let a = FixedPoint::from_bits(a);
            prop_assert_eq!(a.checked_mul(FixedPoint::ONE).unwrap(), a);
        }
    }
}
