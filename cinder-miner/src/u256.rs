//! 256-bit unsigned integer arithmetic.
//!
//! Wraps `ruint::aliases::U256` to provide a stable interface. This adapter
//! module exists so we can swap the underlying library or implement our own
//! arithmetic without changing callers.

use ruint::aliases::U256 as Ruint256;
use std::ops::Div;

/// A 256-bit unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct U256(Ruint256);

impl U256 {
    /// Zero constant.
    pub const ZERO: Self = Self(Ruint256::ZERO);

    /// Create from little-endian 64-bit limbs.
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(Ruint256::from_limbs(limbs))
    }

    /// Create from big-endian bytes.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(Ruint256::from_be_bytes(bytes))
    }

    /// Convert to big-endian bytes.
    pub fn to_be_bytes(self) -> [u8; 32] {
        self.0.to_be_bytes()
    }

    /// Convert to `f64`.
    ///
    /// Values above 2^53 lose precision; callers use the result for
    /// human-readable metrics, not validation.
    pub fn to_f64(self) -> f64 {
        self.0
            .as_limbs()
            .iter()
            .rev()
            .fold(0.0, |acc, &limb| acc * 2f64.powi(64) + limb as f64)
    }
}

impl Default for U256 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        Self(Ruint256::from(value))
    }
}

impl Div for U256 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0 / rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division() {
        assert_eq!(U256::from(100) / U256::from(10), U256::from(10));
    }

    #[test]
    fn test_be_bytes_roundtrip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0xcd;
        assert_eq!(U256::from_be_bytes(bytes).to_be_bytes(), bytes);
    }

    #[test]
    fn test_to_f64_exact_small() {
        // Values within f64's integer range convert exactly
        let v = U256::from(1u64 << 32);
        assert_eq!(v.to_f64(), 4294967296.0);
    }

    #[test]
    fn test_to_f64_high_limbs() {
        // 2^192 occupies the top limb only
        let v = U256::from_limbs([0, 0, 0, 1]);
        assert_eq!(v.to_f64(), 2f64.powi(192));
    }

    #[test]
    fn test_from_limbs_ordering() {
        // Limbs are little-endian: limb 0 is the least significant
        let v = U256::from_limbs([7, 0, 0, 0]);
        assert_eq!(v, U256::from(7));
    }
}
