//! Trie node variants and bitmap helpers.

use archery::{SharedPointer, SharedPointerKind};

use crate::owner::OwnerToken;

/// Bits of hash consumed per trie level (5 → 32-way branching).
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Deepest shift with hash bits left; below it only collision buckets.
pub(crate) const MAX_SHIFT: u32 = 30;

/// Slot count of a `HashArrayMap` node.
pub(crate) const SIZE: usize = 32;

/// Most entries an `ArrayMap` holds before expanding to `BitmapIndexed`.
pub(crate) const MAX_ARRAY_MAP_SIZE: usize = 8;

/// Most children a `BitmapIndexed` holds before expanding to `HashArrayMap`.
pub(crate) const MAX_BITMAP_SIZE: usize = 16;

/// `BitmapIndexed` collapses to `ArrayMap` at this many leaf children.
pub(crate) const MIN_BITMAP_SIZE: usize = 7;

/// `HashArrayMap` packs back to `BitmapIndexed` at this occupancy.
pub(crate) const MIN_HASH_ARRAY_SIZE: usize = 12;

/// A key-value pair with the key's precomputed 32-bit trie hash.
#[derive(Clone)]
pub(crate) struct Entry<K, V> {
    pub hash: u32,
    pub key: K,
    pub value: V,
}

/// HAMT node.
///
/// Variant choice tracks subtree occupancy: small subtrees are flat entry
/// lists, mid-size branches are bitmap-compressed, dense branches hold one
/// slot per fragment, and full-hash collisions fall into linear buckets.
/// Every variant carries the token of the transient allowed to edit it in
/// place; `None` marks an immutable node.
pub(crate) enum Node<K, V, P>
where
    P: SharedPointerKind,
{
    /// Flat entry list, searched linearly by equality.
    ArrayMap {
        owner: Option<OwnerToken>,
        entries: Vec<Entry<K, V>>,
    },
    /// Bitmap-compressed branch.
    ///
    /// Invariant: `bitmap.count_ones() == children.len()`, and the child
    /// for set bit `b` sits at the popcount of the bits below `b`.
    BitmapIndexed {
        owner: Option<OwnerToken>,
        bitmap: u32,
        children: Vec<SharedPointer<Node<K, V, P>, P>>,
    },
    /// Dense branch with one optional slot per 5-bit fragment.
    HashArrayMap {
        owner: Option<OwnerToken>,
        count: u8,
        children: Box<[Option<SharedPointer<Node<K, V, P>, P>>; SIZE]>,
    },
    /// Linear bucket of entries sharing one full 32-bit hash.
    ///
    /// Invariant: at least two entries, pairwise-distinct keys.
    Collision {
        owner: Option<OwnerToken>,
        hash: u32,
        entries: Vec<Entry<K, V>>,
    },
    /// Single-entry leaf.
    Value {
        owner: Option<OwnerToken>,
        entry: Entry<K, V>,
    },
}

// ---------------------------------------------------------------------------
// Bitmap helpers
// ---------------------------------------------------------------------------

/// Extracts the 5-bit hash fragment at the given bit-shift depth.
#[inline]
#[must_use]
pub(crate) const fn fragment(hash: u32, shift: u32) -> u32 {
    debug_assert!(shift <= MAX_SHIFT);
    (hash >> shift) & 0x1F
}

/// Returns the single-bit mask for the given fragment (0..31).
#[inline]
#[must_use]
pub(crate) const fn mask(frag: u32) -> u32 {
    1 << frag
}

/// Returns the compact index of `bit` within `bitmap`.
///
/// Counts the number of set bits below `bit`.
#[inline]
#[must_use]
pub(crate) const fn compact_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// ---------------------------------------------------------------------------
// Node accessors
// ---------------------------------------------------------------------------

impl<K, V, P> Node<K, V, P>
where
    P: SharedPointerKind,
{
    /// Returns the token of the transient that stamped this node.
    pub(crate) const fn owner(&self) -> Option<OwnerToken> {
        match self {
            Self::ArrayMap { owner, .. }
            | Self::BitmapIndexed { owner, .. }
            | Self::HashArrayMap { owner, .. }
            | Self::Collision { owner, .. }
            | Self::Value { owner, .. } => *owner,
        }
    }

    /// Returns `true` for the leaf variants a branch may hoist in place
    /// of itself when it is down to a single child.
    pub(crate) const fn is_leaf(&self) -> bool {
        matches!(self, Self::Value { .. } | Self::Collision { .. })
    }
}

// Manual impl — derive would demand P: Clone, but only the pointed-to data
// must be cloneable.
impl<K, V, P> Clone for Node<K, V, P>
where
    K: Clone,
    V: Clone,
    P: SharedPointerKind,
{
    fn clone(&self) -> Self {
        match self {
            Self::ArrayMap { owner, entries } => Self::ArrayMap {
                owner: *owner,
                entries: entries.clone(),
            },
            Self::BitmapIndexed {
                owner,
                bitmap,
                children,
            } => Self::BitmapIndexed {
                owner: *owner,
                bitmap: *bitmap,
                children: children.clone(),
            },
            Self::HashArrayMap {
                owner,
                count,
                children,
            } => Self::HashArrayMap {
                owner: *owner,
                count: *count,
                children: children.clone(),
            },
            Self::Collision {
                owner,
                hash,
                entries,
            } => Self::Collision {
                owner: *owner,
                hash: *hash,
                entries: entries.clone(),
            },
            Self::Value { owner, entry } => Self::Value {
                owner: *owner,
                entry: entry.clone(),
            },
        }
    }
}
