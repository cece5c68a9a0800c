//! Lookup operation — traverses the trie to find a key.

use archery::SharedPointerKind;

use crate::node::{self, Entry, Node};

/// Searches for `key` in the subtree rooted at `node`.
///
/// Returns the matching entry if found. The hash is compared before the
/// key so mismatches are rejected without touching `K::eq`.
pub(crate) fn get_in_node<'a, K, V, P>(
    node: &'a Node<K, V, P>,
    shift: u32,
    hash: u32,
    key: &K,
) -> Option<&'a Entry<K, V>>
where
    K: Eq,
    P: SharedPointerKind,
{
    match node {
        Node::ArrayMap { entries, .. } => {
            entries.iter().find(|e| e.hash == hash && e.key == *key)
        }
        Node::BitmapIndexed {
            bitmap, children, ..
        } => {
            let bit = node::mask(node::fragment(hash, shift));
            if bitmap & bit == 0 {
                return None;
            }
            let child = &children[node::compact_index(*bitmap, bit)];
            get_in_node(child, shift + node::BITS_PER_LEVEL, hash, key)
        }
        Node::HashArrayMap { children, .. } => {
            let frag = node::fragment(hash, shift) as usize;
            children[frag]
                .as_ref()
                .and_then(|child| get_in_node(child, shift + node::BITS_PER_LEVEL, hash, key))
        }
        Node::Collision {
            hash: node_hash,
            entries,
            ..
        } => {
            if hash != *node_hash {
                return None;
            }
            entries.iter().find(|e| e.key == *key)
        }
        Node::Value { entry, .. } => {
            (entry.hash == hash && entry.key == *key).then_some(entry)
        }
    }
}
