//! Core types for cinder-miner.
//!
//! This module provides a unified location for type definitions used
//! throughout the miner: work packages and solutions exchanged between pool
//! and farm, hashrate measurements, and pool difficulty derivation.

use std::fmt;
use strum::{Display, EnumString};

use crate::u256::U256;

/// A 256-bit hash value (block header, seed, mix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First four bytes as hex, for compact job logging.
    pub fn abridged(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A unit of work distributed by the pool.
///
/// The farm searches the nonce space for a hash numerically less-or-equal to
/// `boundary`. An empty package (all-zero header) is the mining-suspension
/// signal: assigning it halts kernel dispatch without tearing the farm down.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkPackage {
    /// Block header hash to mine on
    pub header: Hash256,

    /// Share target: a solution is valid iff its hash <= boundary
    pub boundary: U256,

    /// Dataset epoch; a change signals DAG regeneration downstream
    pub epoch: u32,
}

impl WorkPackage {
    /// True for the empty (suspension) package.
    pub fn is_empty(&self) -> bool {
        self.header.is_zero()
    }
}

/// A candidate solution produced by the farm.
#[derive(Debug, Clone, Copy)]
pub struct Solution {
    /// The winning nonce
    pub nonce: u64,

    /// Set when the work this solution answers is already superseded
    pub stale: bool,
}

/// Which compute backends the farm should spin up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MinerType {
    /// OpenCL kernels only
    Cl,
    /// CUDA kernels only
    Cuda,
    /// CUDA primary with OpenCL secondary
    Mixed,
}

impl MinerType {
    /// Backends to start for this miner type, in start order.
    ///
    /// The bool marks a secondary backend (started alongside the primary).
    pub fn backends(&self) -> &'static [(Backend, bool)] {
        match self {
            MinerType::Cl => &[(Backend::OpenCl, false)],
            MinerType::Cuda => &[(Backend::Cuda, false)],
            MinerType::Mixed => &[(Backend::Cuda, false), (Backend::OpenCl, true)],
        }
    }
}

/// A single compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    Cuda,
    OpenCl,
}

/// Hashrate measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HashRate(pub u64); // hashes per second

impl HashRate {
    /// Create from megahashes per second
    pub fn from_megahashes(mh: f64) -> Self {
        Self((mh * 1_000_000.0) as u64)
    }

    /// Get value as megahashes per second
    pub fn as_megahashes(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Format as human-readable string with appropriate units
    pub fn to_human_readable(&self) -> String {
        if self.0 >= 1_000_000_000_000 {
            format!("{:.2} TH/s", self.0 as f64 / 1e12)
        } else if self.0 >= 1_000_000_000 {
            format!("{:.2} GH/s", self.0 as f64 / 1e9)
        } else if self.0 >= 1_000_000 {
            format!("{:.2} MH/s", self.as_megahashes())
        } else {
            format!("{} H/s", self.0)
        }
    }

    /// Render for upstream hashrate submission: a 32-byte big-endian
    /// unsigned as `0x` plus exactly 64 lowercase hex digits.
    pub fn to_submit_hex(&self) -> String {
        format!("0x{:064x}", self.0)
    }
}

/// Dividend for difficulty derivation: 0xffff shifted left by 240 bits.
const DIFFICULTY_DIVIDEND: U256 = U256::from_limbs([0, 0, 0, 0xffff_0000_0000_0000]);

/// Derive pool difficulty from a share boundary.
///
/// difficulty = (0xffff << 240) / boundary, as floating point. The 256-bit
/// quotient can exceed 2^53 for very easy boundaries; the precision loss is
/// acceptable for a human-readable metric. A zero boundary yields 0.
pub fn difficulty_from_boundary(boundary: U256) -> f64 {
    if boundary == U256::ZERO {
        return 0.0;
    }
    (DIFFICULTY_DIVIDEND / boundary).to_f64()
}

/// Wrapper that formats a derived difficulty the way the pool log line
/// expects: divided by 1e9 with two fractional digits, in "K megahash".
pub struct DisplayDifficulty(pub f64);

impl fmt::Display for DisplayDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}K megahash", self.0 / 1e9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// The classic difficulty-1 share boundary: 0x00000000ffff0000...0.
    fn difficulty_one_boundary() -> U256 {
        let mut bytes = [0u8; 32];
        bytes[4] = 0xff;
        bytes[5] = 0xff;
        U256::from_be_bytes(bytes)
    }

    #[test]
    fn test_difficulty_one_boundary_is_2_pow_32() {
        let d = difficulty_from_boundary(difficulty_one_boundary());
        assert_eq!(d, 4294967296.0);
    }

    #[test]
    fn test_difficulty_display() {
        let d = difficulty_from_boundary(difficulty_one_boundary());
        assert_eq!(DisplayDifficulty(d).to_string(), "4.29K megahash");
    }

    #[test]
    fn test_difficulty_zero_boundary() {
        assert_eq!(difficulty_from_boundary(U256::ZERO), 0.0);
    }

    #[test]
    fn test_difficulty_halving_boundary_doubles() {
        // Halving the boundary doubles the difficulty
        let mut bytes = [0u8; 32];
        bytes[4] = 0x7f;
        bytes[5] = 0xff;
        bytes[6] = 0x80;
        let halved = U256::from_be_bytes(bytes);
        let d = difficulty_from_boundary(halved);
        assert_eq!(d, 2.0 * 4294967296.0);
    }

    #[test]
    fn test_hashrate_submit_hex() {
        let rate = HashRate(0);
        assert_eq!(rate.to_submit_hex(), format!("0x{}", "0".repeat(64)));

        let rate = HashRate::from_megahashes(25.5);
        let hex = rate.to_submit_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(u64::from_str_radix(&hex[2..], 16).unwrap(), 25_500_000);
    }

    #[test]
    fn test_hashrate_human_readable() {
        assert_eq!(HashRate(500).to_human_readable(), "500 H/s");
        assert_eq!(
            HashRate::from_megahashes(25.0).to_human_readable(),
            "25.00 MH/s"
        );
        assert_eq!(HashRate(2_500_000_000).to_human_readable(), "2.50 GH/s");
    }

    #[test]
    fn test_miner_type_parse() {
        assert_eq!(MinerType::from_str("cl").unwrap(), MinerType::Cl);
        assert_eq!(MinerType::from_str("CUDA").unwrap(), MinerType::Cuda);
        assert_eq!(MinerType::from_str("mixed").unwrap(), MinerType::Mixed);
        assert!(MinerType::from_str("fpga").is_err());
    }

    #[test]
    fn test_miner_type_backends() {
        assert_eq!(MinerType::Cl.backends(), &[(Backend::OpenCl, false)]);
        assert_eq!(MinerType::Cuda.backends(), &[(Backend::Cuda, false)]);
        assert_eq!(
            MinerType::Mixed.backends(),
            &[(Backend::Cuda, false), (Backend::OpenCl, true)]
        );
        assert_eq!(Backend::OpenCl.to_string(), "opencl");
        assert_eq!(Backend::Cuda.to_string(), "cuda");
    }

    #[test]
    fn test_work_package_empty() {
        assert!(WorkPackage::default().is_empty());

        let work = WorkPackage {
            header: Hash256::from_bytes([0x11; 32]),
            boundary: difficulty_one_boundary(),
            epoch: 7,
        };
        assert!(!work.is_empty());
    }

    #[test]
    fn test_hash_abridged() {
        let hash = Hash256::from_bytes([0xab; 32]);
        assert_eq!(hash.abridged(), "abababab");
        assert_eq!(hash.to_string().len(), 64);
    }
}
