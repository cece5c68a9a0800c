//! Unit tests and shared test fixtures.

use std::hash::{BuildHasher, Hash, Hasher};

use archery::{RcK, SharedPointerKind};

use crate::HamtMap;
use crate::node::{self, Node};

mod path;
mod transient;

/// Build-hasher that passes the written integer through untouched, giving
/// tests full control over trie hashes and fragments.
#[derive(Clone, Default)]
pub(crate) struct IdentityBuild;

pub(crate) struct IdentityHasher(u64);

impl BuildHasher for IdentityBuild {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0_u8; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        self.0 = u64::from_le_bytes(buf);
    }
}

/// Map whose 32-bit trie hash equals the key, for deterministic fragment
/// layouts.
pub(crate) fn identity_map<V: PartialEq + Clone>() -> HamtMap<u32, V, RcK, IdentityBuild> {
    HamtMap::with_hasher(IdentityBuild)
}

/// Key with a controllable hash, for forcing collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollidingKey {
    pub id: u32,
    pub forced_hash: u32,
}

impl CollidingKey {
    pub(crate) const fn new(id: u32, forced_hash: u32) -> Self {
        Self { id, forced_hash }
    }
}

impl Hash for CollidingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.forced_hash.hash(state);
    }
}

/// Walks the trie and asserts every structural invariant: variant
/// occupancy ranges, bitmap consistency, hash placement along the descent
/// path, collision shape, and that reachable leaves match `len()`.
pub(crate) fn check_invariants<K, V, P, H>(map: &HamtMap<K, V, P, H>)
where
    K: Hash + Eq,
    P: SharedPointerKind,
    H: BuildHasher,
{
    let total = map.root_node().map_or(0, |root| verify_node(root, 0, &[]));
    assert_eq!(total, map.len(), "leaf count must match size");
    if map.is_empty() {
        assert!(map.root_node().is_none(), "empty map must have no root");
    }
}

fn verify_node<K, V, P>(n: &Node<K, V, P>, shift: u32, path: &[(u32, u32)]) -> usize
where
    K: Eq,
    P: SharedPointerKind,
{
    let on_path = |hash: u32| path.iter().all(|&(s, f)| node::fragment(hash, s) == f);
    match n {
        Node::ArrayMap { entries, .. } => {
            assert!(
                (1..=node::MAX_ARRAY_MAP_SIZE).contains(&entries.len()),
                "array map occupancy"
            );
            for e in entries {
                assert!(on_path(e.hash), "entry hash off its descent path");
            }
            entries.len()
        }
        Node::BitmapIndexed {
            bitmap, children, ..
        } => {
            assert_eq!(
                bitmap.count_ones() as usize,
                children.len(),
                "bitmap popcount"
            );
            assert!(!children.is_empty(), "bitmap node with no children");
            assert!(
                children.len() <= node::MAX_BITMAP_SIZE,
                "bitmap node over capacity"
            );
            let mut total = 0;
            let mut idx = 0;
            for f in 0..32_u32 {
                if bitmap & node::mask(f) != 0 {
                    let mut child_path = path.to_vec();
                    child_path.push((shift, f));
                    total +=
                        verify_node(&children[idx], shift + node::BITS_PER_LEVEL, &child_path);
                    idx += 1;
                }
            }
            total
        }
        Node::HashArrayMap {
            count, children, ..
        } => {
            let occupied = children.iter().filter(|c| c.is_some()).count();
            assert_eq!(usize::from(*count), occupied, "hash array count");
            assert!(
                occupied > node::MIN_HASH_ARRAY_SIZE && occupied <= node::SIZE,
                "hash array occupancy"
            );
            let mut total = 0;
            for (f, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    let mut child_path = path.to_vec();
                    child_path.push((shift, f as u32));
                    total += verify_node(child, shift + node::BITS_PER_LEVEL, &child_path);
                }
            }
            total
        }
        Node::Collision { hash, entries, .. } => {
            assert!(entries.len() >= 2, "collision with fewer than two entries");
            for e in entries {
                assert_eq!(e.hash, *hash, "collision entry hash");
            }
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    assert!(a.key != b.key, "collision with duplicate keys");
                }
            }
            assert!(on_path(*hash), "collision hash off its descent path");
            entries.len()
        }
        Node::Value { entry, .. } => {
            assert!(on_path(entry.hash), "leaf hash off its descent path");
            1
        }
    }
}
