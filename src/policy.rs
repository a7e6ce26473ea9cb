//! Key policies: how a table finds the key inside a stored value, hashes it
//! and compares it.
//!
//! Policies are types, not values. A table may sit in memory shared by
//! several processes, so it cannot carry per-instance hasher state; the
//! policy functions are resolved statically instead.

use core::hash::{BuildHasher, BuildHasherDefault, Hash};
use core::marker::PhantomData;
use std::collections::hash_map::DefaultHasher;

/// The three functions that tie a stored value type to its key.
///
/// `hash` must agree with `equal` (equal keys hash equally) and must give the
/// same result in every process attached to a segment, otherwise a key looked
/// up by one process lands in a different bucket than where another stored it.
pub trait KeyPolicy<V> {
    type Key: ?Sized;

    fn extract_key(value: &V) -> &Self::Key;
    fn hash(key: &Self::Key) -> u64;
    fn equal(a: &Self::Key, b: &Self::Key) -> bool;
}

/// Deterministic hasher builder: SipHash with fixed zero keys.
///
/// Stable within one build of the standard library, so every process running
/// the same binary agrees on bucket placement. `RandomState` would not.
pub type FixedState = BuildHasherDefault<DefaultHasher>;

/// Set policy: the stored value is its own key.
pub struct Identity<S = FixedState>(PhantomData<fn() -> S>);

impl<K, S> KeyPolicy<K> for Identity<S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    type Key = K;

    #[inline]
    fn extract_key(value: &K) -> &K {
        value
    }

    #[inline]
    fn hash(key: &K) -> u64 {
        S::default().hash_one(key)
    }

    #[inline]
    fn equal(a: &K, b: &K) -> bool {
        a == b
    }
}

/// Map policy: values are `(key, payload)` pairs keyed by the first element.
pub struct First<S = FixedState>(PhantomData<fn() -> S>);

impl<K, T, S> KeyPolicy<(K, T)> for First<S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    type Key = K;

    #[inline]
    fn extract_key(value: &(K, T)) -> &K {
        &value.0
    }

    #[inline]
    fn hash(key: &K) -> u64 {
        S::default().hash_one(key)
    }

    #[inline]
    fn equal(a: &K, b: &K) -> bool {
        a == b
    }
}
