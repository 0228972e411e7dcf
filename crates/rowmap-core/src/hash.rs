//! Stable hashing helpers for schema fingerprints, persisted checksums, and
//! value hashing.

use blake3::Hasher;
use serde::Serialize;

use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First eight bytes as a little-endian integer.
    pub fn prefix_u64(&self) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(word)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

pub fn hash_str(s: &str) -> Hash256 {
    hash_bytes(s.as_bytes())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v).map_err(|e| crate::error::Error::Codec(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Feed a scalar into `hasher`, tagged with its variant so that equal bit
/// patterns of different types hash apart.
pub fn hash_scalar(scalar: &Scalar, hasher: &mut Hasher) {
    use Scalar::*;

    let tag: u8 = match scalar {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
    };
    hasher.update(&[tag]);

    match scalar {
        Null => {}
        Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        I32(i) => {
            hasher.update(&i.to_le_bytes());
        }
        I64(i) => {
            hasher.update(&i.to_le_bytes());
        }
        F32(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        F64(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Str(s) => {
            hasher.update(s.as_bytes());
        }
        Bin(b) => {
            hasher.update(b);
        }
    }
}
