//! The persistent map façade.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops;

use archery::{ArcK, RcK, SharedPointer, SharedPointerKind};

use crate::hash::{self, DefaultBuildHasher};
use crate::iter::{Iter, Keys, Values};
use crate::node::Node;
use crate::ops::get;
use crate::ops::update::{self, UpdateOutcome};
use crate::owner::OwnerToken;

/// Creates a [`HamtMap`] containing the given entries:
///
/// ```
/// use hamt_map::{HamtMap, hamt_map};
///
/// let m = HamtMap::new().insert(1, "one").insert(2, "two");
/// assert_eq!(hamt_map![1 => "one", 2 => "two"], m);
/// ```
#[macro_export]
macro_rules! hamt_map {
    ($($k:expr => $v:expr),* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut m = $crate::HamtMap::new();
            $(
                m.insert_mut($k, $v);
            )*
            m
        }
    };
}

/// Persistent hash map backed by a hash array mapped trie.
///
/// Every mutating-looking operation returns a new map sharing the bulk of
/// its structure with the receiver; operations that change nothing return
/// a map sharing the receiver's root (observable via [`ptr_eq`](Self::ptr_eq)).
/// Batched construction goes through the transient protocol
/// ([`as_mutable`](Self::as_mutable) / [`with_mutations`](Self::with_mutations)),
/// which permits in-place edits behind the immutable façade: nodes are
/// stamped with the transient's owner token, and only operations carrying
/// the same token — on unshared nodes — may edit them in place.
///
/// Lookups and updates touch O(log₃₂ n) nodes.
pub struct HamtMap<K, V, P = RcK, H = DefaultBuildHasher>
where
    P: SharedPointerKind,
    H: BuildHasher,
{
    root: Option<SharedPointer<Node<K, V, P>, P>>,
    size: usize,
    owner: Option<OwnerToken>,
    altered: bool,
    hasher_builder: H,
}

/// Thread-safe [`HamtMap`] flavor backed by `Arc` pointers.
pub type HamtMapSync<K, V, H = DefaultBuildHasher> = HamtMap<K, V, ArcK, H>;

// ---------------------------------------------------------------------------
// Construction & accessors
// ---------------------------------------------------------------------------

impl<K, V> HamtMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(DefaultBuildHasher::default())
    }
}

impl<K, V> HamtMapSync<K, V> {
    /// Creates an empty map that implements `Sync`.
    #[must_use]
    pub fn new_sync() -> Self {
        Self::with_hasher(DefaultBuildHasher::default())
    }
}

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    P: SharedPointerKind,
    H: BuildHasher,
{
    /// Creates an empty map that hashes keys with `hasher_builder`.
    #[must_use]
    pub fn with_hasher(hasher_builder: H) -> Self {
        Self {
            root: None,
            size: 0,
            owner: None,
            altered: false,
            hasher_builder,
        }
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if any mutation took effect since this transient was
    /// created (always `false` on maps that never were transients).
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Returns `true` when both maps share the same root node or are both
    /// empty.
    ///
    /// This is the reference-equality observable: logical no-ops hand back
    /// the receiver's root unchanged.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => std::ptr::eq::<Node<K, V, P>>(&**a, &**b),
            _ => false,
        }
    }

    /// Returns an iterator over `(&K, &V)` pairs.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V, P> {
        Iter::new(self.root.as_deref(), self.size)
    }

    /// Returns an iterator over the keys.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V, P> {
        Keys(self.iter())
    }

    /// Returns an iterator over the values.
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V, P> {
        Values(self.iter())
    }

    /// Calls `f` for every entry until it returns `false`.
    ///
    /// Returns `false` iff the traversal was cut short.
    pub fn for_each_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (key, value) in self.iter() {
            if !f(key, value) {
                return false;
            }
        }
        true
    }

    pub(crate) const fn hasher_builder(&self) -> &H {
        &self.hasher_builder
    }

    #[cfg(test)]
    pub(crate) fn root_node(&self) -> Option<&Node<K, V, P>> {
        self.root.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq,
    P: SharedPointerKind,
    H: BuildHasher,
{
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let root = self.root.as_deref()?;
        let hash = hash::hash_key(key, &self.hasher_builder);
        get::get_in_node(root, 0, hash, key).map(|e| &e.value)
    }

    /// Returns `true` if the map contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    /// Returns a map with `key` bound to `value`.
    ///
    /// When the stored value is already equal, the result shares the
    /// receiver's root.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut map = self.clone();
        map.insert_mut(key, value);
        map
    }

    /// Binds `key` to `value` in place.
    ///
    /// On a transient this reuses nodes the transient owns; on an
    /// immutable handle it path-copies, leaving prior clones untouched.
    pub fn insert_mut(&mut self, key: K, value: V) {
        let hash = hash::hash_key(&key, &self.hasher_builder);
        let out = update::update_root(&mut self.root, self.owner, hash, &key, Some(value));
        self.apply(&out);
    }

    /// Returns a map without `key`.
    ///
    /// When the key is absent, the result shares the receiver's root.
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        let mut map = self.clone();
        map.remove_mut(key);
        map
    }

    /// Removes `key` in place. Returns `true` if an entry was removed.
    pub fn remove_mut(&mut self, key: &K) -> bool {
        let hash = hash::hash_key(key, &self.hasher_builder);
        let out = update::update_root(&mut self.root, self.owner, hash, key, None);
        self.apply(&out);
        out.size_delta < 0
    }

    /// Reads the current value under `key` (or `None`), applies `f`, and
    /// binds the result.
    ///
    /// An update that returns an equal value hands back a root-sharing
    /// map.
    #[must_use]
    pub fn update<F>(&self, key: K, f: F) -> Self
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let value = f(self.get(&key));
        self.insert(key, value)
    }

    /// In-place form of [`update`](Self::update).
    pub fn update_mut<F>(&mut self, key: K, f: F)
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let value = f(self.get(&key));
        self.insert_mut(key, value);
    }

    /// Returns an empty map, keeping the receiver's transient session if
    /// it has one.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self {
            root: None,
            size: 0,
            owner: self.owner,
            altered: self.altered || self.size > 0,
            hasher_builder: self.hasher_builder.clone(),
        }
    }

    /// Drops every entry in place.
    pub fn clear_mut(&mut self) {
        if self.size > 0 {
            self.altered = true;
        }
        self.root = None;
        self.size = 0;
    }

    fn apply(&mut self, out: &UpdateOutcome) {
        match out.size_delta {
            1 => self.size += 1,
            -1 => self.size -= 1,
            _ => {}
        }
        if out.changed {
            self.altered = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Transient protocol
// ---------------------------------------------------------------------------

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    /// Opens a transient editing session: a map carrying a fresh owner
    /// token whose `_mut` operations may edit nodes in place.
    ///
    /// The root is shared with the receiver and only stamped as edits
    /// land, so an untouched transient costs nothing. Calling this on a
    /// transient returns a handle in the same session.
    #[must_use]
    pub fn as_mutable(&self) -> Self {
        if self.owner.is_some() {
            Self {
                root: self.root.clone(),
                size: self.size,
                owner: self.owner,
                altered: self.altered,
                hasher_builder: self.hasher_builder.clone(),
            }
        } else {
            Self {
                root: self.root.clone(),
                size: self.size,
                owner: Some(OwnerToken::fresh()),
                altered: false,
                hasher_builder: self.hasher_builder.clone(),
            }
        }
    }

    /// Seals a transient, returning the map with no owner token.
    ///
    /// Consumes the handle: a sealed transient cannot be written through,
    /// by construction. Node stamps left behind are inert because tokens
    /// are never reused.
    #[must_use]
    pub fn as_immutable(mut self) -> Self {
        self.owner = None;
        self.altered = false;
        self
    }

    /// Runs `f` over a transient copy of the map and seals the result.
    ///
    /// ```
    /// use hamt_map::HamtMap;
    ///
    /// let m = HamtMap::new().with_mutations(|m| {
    ///     for i in 0..100 {
    ///         m.insert_mut(i, i * i);
    ///     }
    /// });
    /// assert_eq!(m.len(), 100);
    /// assert_eq!(m.get(&50), Some(&2500));
    /// ```
    ///
    /// Mutability is released on every exit path: a panic in `f` unwinds
    /// through and drops the transient. When `f` changes nothing the
    /// receiver's root is handed back.
    #[must_use]
    pub fn with_mutations<F>(&self, f: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut map = self.as_mutable();
        f(&mut map);
        if map.was_altered() {
            map.as_immutable()
        } else {
            self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Merge & per-entry rebuilds
// ---------------------------------------------------------------------------

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    /// Shallow merge: every entry of `other` lands in the result,
    /// overwriting the receiver's value under the same key (last wins).
    ///
    /// Runs inside an implicit transient; if nothing effectively changes,
    /// the result shares the receiver's root.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.merge_with(|_, incoming, _| incoming.clone(), other)
    }

    /// Shallow merge resolving conflicts through `merger`.
    ///
    /// `merger(current, incoming, key)` is consulted only for keys present
    /// on both sides; keys only in `other` take the incoming value as-is.
    #[must_use]
    pub fn merge_with<F>(&self, mut merger: F, other: &Self) -> Self
    where
        F: FnMut(&V, &V, &K) -> V,
    {
        let mut map = self.as_mutable();
        for (key, incoming) in other.iter() {
            let merged = match map.get(key) {
                Some(current) => merger(current, incoming, key),
                None => incoming.clone(),
            };
            map.insert_mut(key.clone(), merged);
        }
        if map.was_altered() {
            map.as_immutable()
        } else {
            self.clone()
        }
    }

    /// Returns a map with the entries the predicate keeps.
    ///
    /// Visits each entry exactly once; keeping everything hands back the
    /// receiver's root.
    #[must_use]
    pub fn filter<F>(&self, mut pred: F) -> Self
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = Self::with_hasher(self.hasher_builder.clone()).as_mutable();
        let mut kept_all = true;
        for (key, value) in self.iter() {
            if pred(key, value) {
                map.insert_mut(key.clone(), value.clone());
            } else {
                kept_all = false;
            }
        }
        if kept_all {
            self.clone()
        } else {
            map.as_immutable()
        }
    }
}

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    /// Returns a map with the same keys and `f` applied to every value.
    ///
    /// Visits each entry exactly once, building through an internal
    /// transient.
    #[must_use]
    pub fn map_values<W, F>(&self, mut f: F) -> HamtMap<K, W, P, H>
    where
        W: PartialEq + Clone,
        F: FnMut(&K, &V) -> W,
    {
        let mut map = HamtMap::with_hasher(self.hasher_builder.clone()).as_mutable();
        for (key, value) in self.iter() {
            map.insert_mut(key.clone(), f(key, value));
        }
        map.as_immutable()
    }
}

// ---------------------------------------------------------------------------
// Conversions & hashing
// ---------------------------------------------------------------------------

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Clone,
    V: Clone,
    P: SharedPointerKind,
    H: BuildHasher,
{
    /// Clones the entries out into a vector, in iteration order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<K, V, P, H> HamtMap<K, V, P, H>
where
    K: Hash,
    V: Hash,
    P: SharedPointerKind,
    H: BuildHasher,
{
    /// Returns an order-independent hash of the map's contents.
    ///
    /// Entry contributions are mixed with two fixed seeds and combined
    /// with wrapping addition, so equal maps built in different insertion
    /// orders agree.
    #[must_use]
    pub fn hash_code(&self) -> u32 {
        let mut acc = 0_u64;
        for (key, value) in self.iter() {
            let key_hash = u64::from(hash::hash_key(key, &self.hasher_builder));
            let value_hash = self.hasher_builder.hash_one(value);
            acc = acc.wrapping_add(hash::entry_mix(key_hash, value_hash));
        }
        ((acc >> 32) ^ acc) as u32
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

// Manual impl — a clone shares the root but never the transient session,
// so a stashed copy of a transient cannot edit nodes the original still
// reaches.
impl<K, V, P, H> Clone for HamtMap<K, V, P, H>
where
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
            owner: None,
            altered: false,
            hasher_builder: self.hasher_builder.clone(),
        }
    }
}

impl<K, V, P, H> Default for HamtMap<K, V, P, H>
where
    P: SharedPointerKind,
    H: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V, P, H> fmt::Debug for HamtMap<K, V, P, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
    P: SharedPointerKind,
    H: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, P, PO, H> PartialEq<HamtMap<K, V, PO, H>> for HamtMap<K, V, P, H>
where
    K: Hash + Eq,
    V: PartialEq,
    P: SharedPointerKind,
    PO: SharedPointerKind,
    H: BuildHasher,
{
    fn eq(&self, other: &HamtMap<K, V, PO, H>) -> bool {
        self.size == other.size
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| *value == *v))
    }
}

impl<K, V, P, H> Eq for HamtMap<K, V, P, H>
where
    K: Hash + Eq,
    V: Eq,
    P: SharedPointerKind,
    H: BuildHasher,
{
}

impl<K, V, P, H> Hash for HamtMap<K, V, P, H>
where
    K: Hash,
    V: Hash,
    P: SharedPointerKind,
    H: BuildHasher,
{
    fn hash<S: Hasher>(&self, state: &mut S) {
        state.write_usize(self.size);
        state.write_u32(self.hash_code());
    }
}

impl<'a, K, V, P, H> ops::Index<&'a K> for HamtMap<K, V, P, H>
where
    K: Hash + Eq,
    P: SharedPointerKind,
    H: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<K, V, P, H> Extend<(K, V)> for HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert_mut(key, value);
        }
    }
}

impl<K, V, P, H> FromIterator<(K, V)> for HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(H::default()).as_mutable();
        map.extend(iter);
        map.as_immutable()
    }
}

impl<K, V, P, H, const N: usize> From<[(K, V); N]> for HamtMap<K, V, P, H>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    H: BuildHasher + Clone + Default,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a, K, V, P, H> IntoIterator for &'a HamtMap<K, V, P, H>
where
    P: SharedPointerKind,
    H: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, P>;

    fn into_iter(self) -> Iter<'a, K, V, P> {
        self.iter()
    }
}
