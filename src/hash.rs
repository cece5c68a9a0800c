//! Key hashing and value-equality helpers.
//!
//! Keys opt into value semantics through the standard [`Hash`] + [`Eq`]
//! traits; the trie consumes a 32-bit hash obtained by xor-folding the
//! 64-bit output of a pluggable [`BuildHasher`]. The default builder is
//! SipHash with fixed keys, so hashes are deterministic within a process.
//!
//! Floats are not `Eq`, so [`Float64`] and [`Float32`] wrap them with
//! canonicalized-bits equality: every NaN is one key, and `-0.0` equals
//! `+0.0`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

/// Default hasher factory used by [`HamtMap`](crate::HamtMap).
pub type DefaultBuildHasher = BuildHasherDefault<DefaultHasher>;

/// First mixing seed (golden ratio constant).
const SEED_1: u64 = 0x9E37_79B9_7F4A_7C15;

/// Second mixing seed (large prime).
const SEED_2: u64 = 0x517C_C1B7_2722_0A95;

/// Hashes a key down to the 32-bit trie hash.
///
/// Both halves of the 64-bit hasher output contribute, so builders that
/// concentrate entropy in the high bits still shard well.
#[must_use]
pub(crate) fn hash_key<T: Hash + ?Sized, H: BuildHasher>(key: &T, hasher_builder: &H) -> u32 {
    let h = hasher_builder.hash_one(key);
    ((h >> 32) ^ h) as u32
}

/// Order-independent contribution of one entry to a map's hash code.
///
/// `f(k, v) = key_hash · SEED₁ ⊕ value_hash · SEED₂`; contributions are
/// combined with wrapping addition so insertion order cannot matter.
#[must_use]
pub(crate) const fn entry_mix(key_hash: u64, value_hash: u64) -> u64 {
    key_hash.wrapping_mul(SEED_1) ^ value_hash.wrapping_mul(SEED_2)
}

/// `f64` map key with value-equality semantics.
///
/// All NaN payloads compare equal and hash alike, and `-0.0` and `+0.0`
/// are a single key:
///
/// ```
/// use hamt_map::{Float64, HamtMap};
///
/// let m = HamtMap::new().insert(Float64(f64::NAN), 1);
/// assert_eq!(m.get(&Float64(f64::NAN)), Some(&1));
/// assert_eq!(m.insert(Float64(-0.0), 2).get(&Float64(0.0)), Some(&2));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Float64(pub f64);

impl Float64 {
    /// Canonical bit pattern used for both equality and hashing.
    fn key_bits(self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else if self.0 == 0.0 {
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.key_bits() == other.key_bits()
    }
}

impl Eq for Float64 {}

impl Hash for Float64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_bits().hash(state);
    }
}

impl From<f64> for Float64 {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// `f32` map key with value-equality semantics; see [`Float64`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Float32(pub f32);

impl Float32 {
    fn key_bits(self) -> u32 {
        if self.0.is_nan() {
            f32::NAN.to_bits()
        } else if self.0 == 0.0 {
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Float32 {
    fn eq(&self, other: &Self) -> bool {
        self.key_bits() == other.key_bits()
    }
}

impl Eq for Float32 {}

impl Hash for Float32 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_bits().hash(state);
    }
}

impl From<f32> for Float32 {
    fn from(value: f32) -> Self {
        Self(value)
    }
}
