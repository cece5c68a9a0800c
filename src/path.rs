//! Deep operations over nested maps.
//!
//! The value type decides its own recursion shape through [`NestedValue`]:
//! a map-shaped value exposes its inner map, everything else is a leaf.
//! Deep writes fabricate empty maps for missing intermediate segments and
//! report [`MapError::Path`] when a leaf blocks the way; a deep update
//! that changes nothing hands back the receiver's root.

use std::hash::{BuildHasher, Hash};

use archery::SharedPointerKind;

use crate::error::{MapError, Result};
use crate::map::HamtMap;

/// A value type deep path operations can descend through.
///
/// Implement this for the value enum of a nested tree (configuration,
/// documents, ...); the leaf arms return `None` from [`as_map`](Self::as_map).
pub trait NestedValue<K, P, H>: Sized
where
    P: SharedPointerKind,
    H: BuildHasher,
{
    /// Returns the map inside this value, if it is map-shaped.
    fn as_map(&self) -> Option<&HamtMap<K, Self, P, H>>;

    /// Wraps a map back into a value.
    fn from_map(map: HamtMap<K, Self, P, H>) -> Self;
}

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: NestedValue<K, P, H> + PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    /// Returns the value nested under `path`, descending one map level per
    /// segment.
    ///
    /// `None` for an empty path, an absent segment, or a leaf met before
    /// the last segment.
    #[must_use]
    pub fn get_in(&self, path: &[K]) -> Option<&V> {
        let (last, init) = path.split_last()?;
        let mut map = self;
        for key in init {
            map = map.get(key)?.as_map()?;
        }
        map.get(last)
    }

    /// Returns a map with `value` bound at `path`, fabricating empty maps
    /// for missing intermediate segments.
    ///
    /// # Errors
    ///
    /// [`MapError::Path`] when a segment's value is a leaf, or when `path`
    /// is empty (the receiver itself is not a value).
    pub fn set_in(&self, path: &[K], value: V) -> Result<Self> {
        self.update_in(path, |_| value)
    }

    /// Reads the value under `path` (or `None`), applies `f`, and binds
    /// the result there, fabricating empty maps for missing intermediate
    /// segments.
    ///
    /// An update that returns an equal value hands back a root-sharing
    /// map.
    ///
    /// # Errors
    ///
    /// [`MapError::Path`] when a segment's value is a leaf, or when `path`
    /// is empty.
    pub fn update_in<F>(&self, path: &[K], f: F) -> Result<Self>
    where
        F: FnOnce(Option<&V>) -> V,
    {
        if path.is_empty() {
            return Err(MapError::Path { depth: 0 });
        }
        update_in_rec(self, path, 0, f)
    }

    /// Returns a map without the entry nested under `path`.
    ///
    /// An absent path is a no-op: the result shares the receiver's root.
    ///
    /// # Errors
    ///
    /// [`MapError::Path`] when a segment's value is a leaf, or when `path`
    /// is empty.
    pub fn remove_in(&self, path: &[K]) -> Result<Self> {
        if path.is_empty() {
            return Err(MapError::Path { depth: 0 });
        }
        remove_in_rec(self, path, 0)
    }

    /// Shallow-merges `source` into the map nested under `path`,
    /// fabricating empty maps for missing segments.
    ///
    /// # Errors
    ///
    /// [`MapError::Path`] when a segment's value — including the terminal
    /// one — is a leaf, or when `path` is empty.
    pub fn merge_in(&self, path: &[K], source: &Self) -> Result<Self> {
        if path.is_empty() {
            return Err(MapError::Path { depth: 0 });
        }
        merge_in_rec(self, path, 0, source)
    }
}

fn update_in_rec<K, V, P, H, F>(
    map: &HamtMap<K, V, P, H>,
    path: &[K],
    depth: usize,
    f: F,
) -> Result<HamtMap<K, V, P, H>>
where
    K: Hash + Eq + Clone,
    V: NestedValue<K, P, H> + PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
    F: FnOnce(Option<&V>) -> V,
{
    let (key, rest) = path.split_first().expect("non-empty path");
    if rest.is_empty() {
        return Ok(map.update(key.clone(), f));
    }
    let new_child = match map.get(key) {
        Some(value) => {
            let child = value.as_map().ok_or(MapError::Path { depth: depth + 1 })?;
            let new_child = update_in_rec(child, rest, depth + 1, f)?;
            if child.ptr_eq(&new_child) {
                // nothing changed below; keep our own root too
                return Ok(map.clone());
            }
            new_child
        }
        None => {
            let empty = HamtMap::with_hasher(map.hasher_builder().clone());
            update_in_rec(&empty, rest, depth + 1, f)?
        }
    };
    Ok(map.insert(key.clone(), V::from_map(new_child)))
}

fn remove_in_rec<K, V, P, H>(
    map: &HamtMap<K, V, P, H>,
    path: &[K],
    depth: usize,
) -> Result<HamtMap<K, V, P, H>>
where
    K: Hash + Eq + Clone,
    V: NestedValue<K, P, H> + PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    let (key, rest) = path.split_first().expect("non-empty path");
    if rest.is_empty() {
        return Ok(map.remove(key));
    }
    match map.get(key) {
        None => Ok(map.clone()),
        Some(value) => {
            let child = value.as_map().ok_or(MapError::Path { depth: depth + 1 })?;
            let new_child = remove_in_rec(child, rest, depth + 1)?;
            if child.ptr_eq(&new_child) {
                Ok(map.clone())
            } else {
                Ok(map.insert(key.clone(), V::from_map(new_child)))
            }
        }
    }
}

fn merge_in_rec<K, V, P, H>(
    map: &HamtMap<K, V, P, H>,
    path: &[K],
    depth: usize,
    source: &HamtMap<K, V, P, H>,
) -> Result<HamtMap<K, V, P, H>>
where
    K: Hash + Eq + Clone,
    V: NestedValue<K, P, H> + PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    let (key, rest) = path.split_first().expect("non-empty path");
    if rest.is_empty() {
        let merged = match map.get(key) {
            Some(value) => {
                let child = value.as_map().ok_or(MapError::Path { depth: depth + 1 })?;
                let merged = child.merge(source);
                if child.ptr_eq(&merged) {
                    return Ok(map.clone());
                }
                merged
            }
            None => HamtMap::with_hasher(map.hasher_builder().clone()).merge(source),
        };
        return Ok(map.insert(key.clone(), V::from_map(merged)));
    }
    let new_child = match map.get(key) {
        Some(value) => {
            let child = value.as_map().ok_or(MapError::Path { depth: depth + 1 })?;
            let new_child = merge_in_rec(child, rest, depth + 1, source)?;
            if child.ptr_eq(&new_child) {
                return Ok(map.clone());
            }
            new_child
        }
        None => {
            let empty = HamtMap::with_hasher(map.hasher_builder().clone());
            merge_in_rec(&empty, rest, depth + 1, source)?
        }
    };
    Ok(map.insert(key.clone(), V::from_map(new_child)))
}
