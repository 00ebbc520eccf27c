//! Hashing of effect dependencies.
//!
//! Keys must stay stable for the lifetime of the process, so the hasher is
//! built with fixed keys rather than a random state. `ahash` is used unless
//! the `std-hash` feature selects the standard library's SipHash.

use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use crate::Key;

#[cfg(not(feature = "std-hash"))]
type KeyHasher = ahash::AHasher;

#[cfg(feature = "std-hash")]
type KeyHasher = std::collections::hash_map::DefaultHasher;

/// Fixed-key hasher state behind [`hash_one`].
pub type KeyState = BuildHasherDefault<KeyHasher>;

/// Hash one dependency value into the key stored in an effect record.
#[inline]
pub fn hash_one<T: Hash + ?Sized>(value: &T) -> Key {
    KeyState::default().hash_one(value)
}
