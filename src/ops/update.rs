//! Write operation — insert and delete unified behind one descent.
//!
//! A write carries `Option<V>`: `Some` sets, `None` is the delete
//! tombstone. Each step edits its node in place when the caller's owner
//! token matches the node's stamp (and `make_mut` confirms the pointer is
//! unshared), otherwise it rebuilds the node stamped with the caller's
//! token. Writes that change nothing leave every pointer untouched, so
//! reference equality survives logical no-ops.

use archery::{SharedPointer, SharedPointerKind};

use crate::node::{self, Entry, Node};
use crate::owner::OwnerToken;

/// Outcome of a write applied at the root.
pub(crate) struct UpdateOutcome {
    /// Net change in entry count: -1, 0 or +1.
    pub size_delta: i8,
    /// `true` if the write changed anything at all.
    pub changed: bool,
}

/// Outcome of a write applied to one child slot.
struct SlotOutcome {
    size_delta: i8,
    changed: bool,
    /// The subtree is now empty; the parent must drop the slot.
    removed: bool,
}

impl SlotOutcome {
    const NOOP: Self = Self {
        size_delta: 0,
        changed: false,
        removed: false,
    };

    const fn changed(size_delta: i8) -> Self {
        Self {
            size_delta,
            changed: true,
            removed: false,
        }
    }
}

/// Applies a write to the trie under `root`.
pub(crate) fn update_root<K, V, P>(
    root: &mut Option<SharedPointer<Node<K, V, P>, P>>,
    owner: Option<OwnerToken>,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> UpdateOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    match root {
        None => match value {
            None => UpdateOutcome {
                size_delta: 0,
                changed: false,
            },
            Some(value) => {
                let entry = Entry {
                    hash,
                    key: key.clone(),
                    value,
                };
                *root = Some(SharedPointer::new(Node::ArrayMap {
                    owner,
                    entries: vec![entry],
                }));
                UpdateOutcome {
                    size_delta: 1,
                    changed: true,
                }
            }
        },
        Some(slot) => {
            let out = update_slot(slot, owner, 0, hash, key, value);
            if out.removed {
                *root = None;
            }
            UpdateOutcome {
                size_delta: out.size_delta,
                changed: out.changed,
            }
        }
    }
}

/// In-place edits require a live token matching the node's stamp; the
/// reference count is gated separately by `make_mut`.
fn editable<K, V, P>(node: &Node<K, V, P>, owner: Option<OwnerToken>) -> bool
where
    P: SharedPointerKind,
{
    owner.is_some() && node.owner() == owner
}

fn update_slot<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    match &**slot {
        Node::ArrayMap { .. } => update_array_map(slot, owner, shift, hash, key, value),
        Node::BitmapIndexed { .. } => update_bitmap(slot, owner, shift, hash, key, value),
        Node::HashArrayMap { .. } => update_hash_array(slot, owner, shift, hash, key, value),
        Node::Collision { .. } => update_collision(slot, owner, shift, hash, key, value),
        Node::Value { .. } => update_value(slot, owner, hash, key, value),
    }
}

// ---------------------------------------------------------------------------
// ArrayMap
// ---------------------------------------------------------------------------

enum ArrayMapPlan {
    Noop,
    Replace(usize),
    Remove(usize),
    RemoveLast,
    Append,
    Expand,
}

fn update_array_map<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let plan = {
        let Node::ArrayMap { entries, .. } = &**slot else {
            unreachable!()
        };
        let pos = entries.iter().position(|e| e.hash == hash && e.key == *key);
        match (pos, value.as_ref()) {
            (None, None) => ArrayMapPlan::Noop,
            (Some(i), None) => {
                if entries.len() == 1 {
                    ArrayMapPlan::RemoveLast
                } else {
                    ArrayMapPlan::Remove(i)
                }
            }
            (Some(i), Some(v)) => {
                if entries[i].value == *v {
                    ArrayMapPlan::Noop
                } else {
                    ArrayMapPlan::Replace(i)
                }
            }
            (None, Some(_)) => {
                if entries.len() < node::MAX_ARRAY_MAP_SIZE {
                    ArrayMapPlan::Append
                } else {
                    ArrayMapPlan::Expand
                }
            }
        }
    };

    match plan {
        ArrayMapPlan::Noop => SlotOutcome::NOOP,
        ArrayMapPlan::RemoveLast => SlotOutcome {
            size_delta: -1,
            changed: true,
            removed: true,
        },
        ArrayMapPlan::Remove(i) => {
            if editable(&**slot, owner) {
                let Node::ArrayMap { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries.remove(i);
            } else {
                let Node::ArrayMap { entries, .. } = &**slot else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries.remove(i);
                *slot = SharedPointer::new(Node::ArrayMap { owner, entries });
            }
            SlotOutcome::changed(-1)
        }
        ArrayMapPlan::Replace(i) => {
            let value = value.expect("replace implies set");
            if editable(&**slot, owner) {
                let Node::ArrayMap { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries[i].value = value;
            } else {
                let Node::ArrayMap { entries, .. } = &**slot else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries[i].value = value;
                *slot = SharedPointer::new(Node::ArrayMap { owner, entries });
            }
            SlotOutcome::changed(0)
        }
        ArrayMapPlan::Append => {
            let value = value.expect("append implies set");
            let entry = Entry {
                hash,
                key: key.clone(),
                value,
            };
            if editable(&**slot, owner) {
                let Node::ArrayMap { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries.push(entry);
            } else {
                let Node::ArrayMap { entries, .. } = &**slot else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries.push(entry);
                *slot = SharedPointer::new(Node::ArrayMap { owner, entries });
            }
            SlotOutcome::changed(1)
        }
        ArrayMapPlan::Expand => {
            let value = value.expect("expand implies set");
            let entry = Entry {
                hash,
                key: key.clone(),
                value,
            };
            expand_array_map(slot, owner, shift, entry);
            SlotOutcome::changed(1)
        }
    }
}

/// Expands a full `ArrayMap` into a `BitmapIndexed` subtree, re-inserting
/// every entry at this shift by its stored hash.
///
/// Construction runs under a live token (the caller's, or a throwaway one)
/// so the batch builds in place; a throwaway token is inert once dropped.
fn expand_array_map<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    new_entry: Entry<K, V>,
) where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let build_owner = owner.or_else(|| Some(OwnerToken::fresh()));
    let entries = {
        let Node::ArrayMap { entries, .. } = &**slot else {
            unreachable!()
        };
        entries.clone()
    };

    let mut built = SharedPointer::new(Node::BitmapIndexed {
        owner: build_owner,
        bitmap: 0,
        children: Vec::with_capacity(entries.len() + 1),
    });
    for e in entries {
        let Entry { hash, key, value } = e;
        update_slot(&mut built, build_owner, shift, hash, &key, Some(value));
    }
    let Entry { hash, key, value } = new_entry;
    update_slot(&mut built, build_owner, shift, hash, &key, Some(value));

    *slot = built;
}

// ---------------------------------------------------------------------------
// BitmapIndexed
// ---------------------------------------------------------------------------

enum BitmapPlan {
    Noop,
    Insert(usize),
    Expand,
    Descend(usize),
}

fn update_bitmap<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let frag = node::fragment(hash, shift);
    let bit = node::mask(frag);
    let plan = {
        let Node::BitmapIndexed { bitmap, .. } = &**slot else {
            unreachable!()
        };
        if bitmap & bit != 0 {
            BitmapPlan::Descend(node::compact_index(*bitmap, bit))
        } else if value.is_none() {
            BitmapPlan::Noop
        } else if bitmap.count_ones() as usize >= node::MAX_BITMAP_SIZE {
            BitmapPlan::Expand
        } else {
            BitmapPlan::Insert(node::compact_index(*bitmap, bit))
        }
    };

    match plan {
        BitmapPlan::Noop => SlotOutcome::NOOP,
        BitmapPlan::Insert(idx) => {
            let value = value.expect("insert implies set");
            let leaf = SharedPointer::new(Node::Value {
                owner,
                entry: Entry {
                    hash,
                    key: key.clone(),
                    value,
                },
            });
            if editable(&**slot, owner) {
                let Node::BitmapIndexed {
                    bitmap, children, ..
                } = SharedPointer::make_mut(slot)
                else {
                    unreachable!()
                };
                *bitmap |= bit;
                children.insert(idx, leaf);
            } else {
                let Node::BitmapIndexed {
                    bitmap, children, ..
                } = &**slot
                else {
                    unreachable!()
                };
                let mut new_children = Vec::with_capacity(children.len() + 1);
                new_children.extend_from_slice(&children[..idx]);
                new_children.push(leaf);
                new_children.extend_from_slice(&children[idx..]);
                *slot = SharedPointer::new(Node::BitmapIndexed {
                    owner,
                    bitmap: bitmap | bit,
                    children: new_children,
                });
            }
            SlotOutcome::changed(1)
        }
        BitmapPlan::Expand => {
            let value = value.expect("expand implies set");
            let entry = Entry {
                hash,
                key: key.clone(),
                value,
            };
            expand_bitmap(slot, owner, frag, entry);
            SlotOutcome::changed(1)
        }
        BitmapPlan::Descend(idx) => {
            update_bitmap_child(slot, owner, shift, hash, key, value, idx, bit)
        }
    }
}

/// Promotes a full `BitmapIndexed` to a `HashArrayMap`, adding a fresh
/// leaf for `entry` at fragment `frag`.
fn expand_bitmap<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    frag: u32,
    entry: Entry<K, V>,
) where
    P: SharedPointerKind,
{
    let Node::BitmapIndexed {
        bitmap, children, ..
    } = &**slot
    else {
        unreachable!()
    };

    let mut slots: Box<[Option<SharedPointer<Node<K, V, P>, P>>; node::SIZE]> =
        Box::new(std::array::from_fn(|_| None));
    let mut count = 0_u8;
    for f in 0..node::SIZE {
        let b = node::mask(f as u32);
        if bitmap & b != 0 {
            slots[f] = Some(children[node::compact_index(*bitmap, b)].clone());
            count += 1;
        }
    }
    slots[frag as usize] = Some(SharedPointer::new(Node::Value { owner, entry }));
    count += 1;

    *slot = SharedPointer::new(Node::HashArrayMap {
        owner,
        count,
        children: slots,
    });
}

#[allow(clippy::too_many_arguments)]
fn update_bitmap_child<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
    idx: usize,
    bit: u32,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let child_out;
    if editable(&**slot, owner) {
        let Node::BitmapIndexed {
            bitmap, children, ..
        } = SharedPointer::make_mut(slot)
        else {
            unreachable!()
        };
        child_out = update_slot(
            &mut children[idx],
            owner,
            shift + node::BITS_PER_LEVEL,
            hash,
            key,
            value,
        );
        if !child_out.changed {
            return child_out;
        }
        if child_out.removed {
            children.remove(idx);
            *bitmap &= !bit;
        }
    } else {
        let mut child = {
            let Node::BitmapIndexed { children, .. } = &**slot else {
                unreachable!()
            };
            children[idx].clone()
        };
        child_out = update_slot(
            &mut child,
            owner,
            shift + node::BITS_PER_LEVEL,
            hash,
            key,
            value,
        );
        if !child_out.changed {
            return child_out;
        }
        let Node::BitmapIndexed {
            bitmap, children, ..
        } = &**slot
        else {
            unreachable!()
        };
        let mut new_children = children.clone();
        if child_out.removed {
            new_children.remove(idx);
            *slot = SharedPointer::new(Node::BitmapIndexed {
                owner,
                bitmap: bitmap & !bit,
                children: new_children,
            });
        } else {
            new_children[idx] = child;
            *slot = SharedPointer::new(Node::BitmapIndexed {
                owner,
                bitmap: *bitmap,
                children: new_children,
            });
        }
    }

    // Deletions may leave the branch below its variant's occupancy range.
    if child_out.size_delta < 0 && canonicalize_bitmap(slot, owner) {
        return SlotOutcome {
            size_delta: child_out.size_delta,
            changed: true,
            removed: true,
        };
    }
    SlotOutcome {
        size_delta: child_out.size_delta,
        changed: child_out.changed,
        removed: false,
    }
}

/// Restores `BitmapIndexed` invariants after a deletion below it: hoists a
/// lone leaf child and collapses a small all-leaf branch into an
/// `ArrayMap`.
///
/// Returns `true` when the branch has no children left and the caller must
/// drop the slot.
fn canonicalize_bitmap<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
) -> bool
where
    K: Clone,
    V: Clone,
    P: SharedPointerKind,
{
    let replacement = {
        let Node::BitmapIndexed { children, .. } = &**slot else {
            unreachable!()
        };
        if children.is_empty() {
            return true;
        }
        if children.len() == 1 && children[0].is_leaf() {
            Some(children[0].clone())
        } else if children.len() <= node::MIN_BITMAP_SIZE
            && children.iter().all(|c| matches!(&**c, Node::Value { .. }))
        {
            let entries = children
                .iter()
                .map(|c| {
                    let Node::Value { entry, .. } = &**c else {
                        unreachable!()
                    };
                    entry.clone()
                })
                .collect();
            Some(SharedPointer::new(Node::ArrayMap { owner, entries }))
        } else {
            None
        }
    };
    if let Some(replacement) = replacement {
        *slot = replacement;
    }
    false
}

// ---------------------------------------------------------------------------
// HashArrayMap
// ---------------------------------------------------------------------------

enum HashArrayPlan {
    Noop,
    Insert,
    Descend,
}

fn update_hash_array<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let frag = node::fragment(hash, shift) as usize;
    let plan = {
        let Node::HashArrayMap { children, .. } = &**slot else {
            unreachable!()
        };
        if children[frag].is_some() {
            HashArrayPlan::Descend
        } else if value.is_some() {
            HashArrayPlan::Insert
        } else {
            HashArrayPlan::Noop
        }
    };

    match plan {
        HashArrayPlan::Noop => SlotOutcome::NOOP,
        HashArrayPlan::Insert => {
            let value = value.expect("insert implies set");
            let leaf = SharedPointer::new(Node::Value {
                owner,
                entry: Entry {
                    hash,
                    key: key.clone(),
                    value,
                },
            });
            if editable(&**slot, owner) {
                let Node::HashArrayMap {
                    count, children, ..
                } = SharedPointer::make_mut(slot)
                else {
                    unreachable!()
                };
                children[frag] = Some(leaf);
                *count += 1;
            } else {
                let Node::HashArrayMap {
                    count, children, ..
                } = &**slot
                else {
                    unreachable!()
                };
                let mut new_children = children.clone();
                new_children[frag] = Some(leaf);
                *slot = SharedPointer::new(Node::HashArrayMap {
                    owner,
                    count: count + 1,
                    children: new_children,
                });
            }
            SlotOutcome::changed(1)
        }
        HashArrayPlan::Descend => {
            update_hash_array_child(slot, owner, shift, hash, key, value, frag)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_hash_array_child<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
    frag: usize,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let child_out;
    if editable(&**slot, owner) {
        let Node::HashArrayMap {
            count, children, ..
        } = SharedPointer::make_mut(slot)
        else {
            unreachable!()
        };
        let child_slot = children[frag].as_mut().expect("descend implies child");
        child_out = update_slot(
            child_slot,
            owner,
            shift + node::BITS_PER_LEVEL,
            hash,
            key,
            value,
        );
        if !child_out.changed {
            return child_out;
        }
        if child_out.removed {
            children[frag] = None;
            *count -= 1;
        }
    } else {
        let mut child = {
            let Node::HashArrayMap { children, .. } = &**slot else {
                unreachable!()
            };
            children[frag].clone().expect("descend implies child")
        };
        child_out = update_slot(
            &mut child,
            owner,
            shift + node::BITS_PER_LEVEL,
            hash,
            key,
            value,
        );
        if !child_out.changed {
            return child_out;
        }
        let Node::HashArrayMap {
            count, children, ..
        } = &**slot
        else {
            unreachable!()
        };
        let mut new_children = children.clone();
        let new_count = if child_out.removed {
            new_children[frag] = None;
            count - 1
        } else {
            new_children[frag] = Some(child);
            *count
        };
        *slot = SharedPointer::new(Node::HashArrayMap {
            owner,
            count: new_count,
            children: new_children,
        });
    }

    if child_out.size_delta < 0 {
        pack_hash_array_if_sparse(slot, owner);
    }
    SlotOutcome {
        size_delta: child_out.size_delta,
        changed: child_out.changed,
        removed: false,
    }
}

/// Packs a sparse `HashArrayMap` back into a `BitmapIndexed` once its
/// occupancy falls to the shrink threshold.
fn pack_hash_array_if_sparse<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
) where
    P: SharedPointerKind,
{
    let packed = {
        let Node::HashArrayMap {
            count, children, ..
        } = &**slot
        else {
            unreachable!()
        };
        if usize::from(*count) > node::MIN_HASH_ARRAY_SIZE {
            return;
        }
        let mut bitmap = 0_u32;
        let mut packed_children = Vec::with_capacity(usize::from(*count));
        for (f, child) in children.iter().enumerate() {
            if let Some(child) = child {
                bitmap |= node::mask(f as u32);
                packed_children.push(child.clone());
            }
        }
        SharedPointer::new(Node::BitmapIndexed {
            owner,
            bitmap,
            children: packed_children,
        })
    };
    *slot = packed;
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

enum CollisionPlan {
    Noop,
    Replace(usize),
    Append,
    Remove(usize),
    CollapseTo(usize),
    Branch,
}

fn update_collision<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let plan = {
        let Node::Collision {
            hash: node_hash,
            entries,
            ..
        } = &**slot
        else {
            unreachable!()
        };
        if hash == *node_hash {
            let pos = entries.iter().position(|e| e.key == *key);
            match (pos, value.as_ref()) {
                (None, None) => CollisionPlan::Noop,
                (Some(i), Some(v)) => {
                    if entries[i].value == *v {
                        CollisionPlan::Noop
                    } else {
                        CollisionPlan::Replace(i)
                    }
                }
                (None, Some(_)) => CollisionPlan::Append,
                (Some(i), None) => {
                    if entries.len() == 2 {
                        CollisionPlan::CollapseTo(1 - i)
                    } else {
                        CollisionPlan::Remove(i)
                    }
                }
            }
        } else if value.is_some() {
            CollisionPlan::Branch
        } else {
            CollisionPlan::Noop
        }
    };

    match plan {
        CollisionPlan::Noop => SlotOutcome::NOOP,
        CollisionPlan::Replace(i) => {
            let value = value.expect("replace implies set");
            if editable(&**slot, owner) {
                let Node::Collision { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries[i].value = value;
            } else {
                let Node::Collision {
                    hash: node_hash,
                    entries,
                    ..
                } = &**slot
                else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries[i].value = value;
                *slot = SharedPointer::new(Node::Collision {
                    owner,
                    hash: *node_hash,
                    entries,
                });
            }
            SlotOutcome::changed(0)
        }
        CollisionPlan::Append => {
            let value = value.expect("append implies set");
            let entry = Entry {
                hash,
                key: key.clone(),
                value,
            };
            if editable(&**slot, owner) {
                let Node::Collision { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries.push(entry);
            } else {
                let Node::Collision {
                    hash: node_hash,
                    entries,
                    ..
                } = &**slot
                else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries.push(entry);
                *slot = SharedPointer::new(Node::Collision {
                    owner,
                    hash: *node_hash,
                    entries,
                });
            }
            SlotOutcome::changed(1)
        }
        CollisionPlan::Remove(i) => {
            if editable(&**slot, owner) {
                let Node::Collision { entries, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entries.remove(i);
            } else {
                let Node::Collision {
                    hash: node_hash,
                    entries,
                    ..
                } = &**slot
                else {
                    unreachable!()
                };
                let mut entries = entries.clone();
                entries.remove(i);
                *slot = SharedPointer::new(Node::Collision {
                    owner,
                    hash: *node_hash,
                    entries,
                });
            }
            SlotOutcome::changed(-1)
        }
        CollisionPlan::CollapseTo(i) => {
            let entry = {
                let Node::Collision { entries, .. } = &**slot else {
                    unreachable!()
                };
                entries[i].clone()
            };
            *slot = SharedPointer::new(Node::Value { owner, entry });
            SlotOutcome::changed(-1)
        }
        CollisionPlan::Branch => {
            let value = value.expect("branch implies set");
            let node_hash = {
                let Node::Collision { hash, .. } = &**slot else {
                    unreachable!()
                };
                *hash
            };
            let leaf = SharedPointer::new(Node::Value {
                owner,
                entry: Entry {
                    hash,
                    key: key.clone(),
                    value,
                },
            });
            let merged = merge_leaves(owner, shift, slot.clone(), node_hash, leaf, hash);
            *slot = merged;
            SlotOutcome::changed(1)
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

enum ValuePlan {
    Noop,
    Replace,
    Delete,
    Collide,
    Branch,
}

fn update_value<K, V, P>(
    slot: &mut SharedPointer<Node<K, V, P>, P>,
    owner: Option<OwnerToken>,
    hash: u32,
    key: &K,
    value: Option<V>,
) -> SlotOutcome
where
    K: Eq + Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
{
    let plan = {
        let Node::Value { entry, .. } = &**slot else {
            unreachable!()
        };
        if entry.hash == hash && entry.key == *key {
            match value.as_ref() {
                Some(v) => {
                    if entry.value == *v {
                        ValuePlan::Noop
                    } else {
                        ValuePlan::Replace
                    }
                }
                None => ValuePlan::Delete,
            }
        } else {
            match value.as_ref() {
                None => ValuePlan::Noop,
                Some(_) => {
                    if entry.hash == hash {
                        ValuePlan::Collide
                    } else {
                        ValuePlan::Branch
                    }
                }
            }
        }
    };

    match plan {
        ValuePlan::Noop => SlotOutcome::NOOP,
        ValuePlan::Delete => SlotOutcome {
            size_delta: -1,
            changed: true,
            removed: true,
        },
        ValuePlan::Replace => {
            let value = value.expect("replace implies set");
            if editable(&**slot, owner) {
                let Node::Value { entry, .. } = SharedPointer::make_mut(slot) else {
                    unreachable!()
                };
                entry.value = value;
            } else {
                let entry = {
                    let Node::Value { entry, .. } = &**slot else {
                        unreachable!()
                    };
                    Entry {
                        hash,
                        key: entry.key.clone(),
                        value,
                    }
                };
                *slot = SharedPointer::new(Node::Value { owner, entry });
            }
            SlotOutcome::changed(0)
        }
        ValuePlan::Collide => {
            let value = value.expect("collide implies set");
            let existing = {
                let Node::Value { entry, .. } = &**slot else {
                    unreachable!()
                };
                entry.clone()
            };
            let entries = vec![
                existing,
                Entry {
                    hash,
                    key: key.clone(),
                    value,
                },
            ];
            *slot = SharedPointer::new(Node::Collision {
                owner,
                hash,
                entries,
            });
            SlotOutcome::changed(1)
        }
        ValuePlan::Branch => {
            // Distinct hashes under one fragment: hold both flat. The pair
            // re-shards by stored hash once the bucket outgrows its range.
            let value = value.expect("branch implies set");
            let existing = {
                let Node::Value { entry, .. } = &**slot else {
                    unreachable!()
                };
                entry.clone()
            };
            let entries = vec![
                existing,
                Entry {
                    hash,
                    key: key.clone(),
                    value,
                },
            ];
            *slot = SharedPointer::new(Node::ArrayMap { owner, entries });
            SlotOutcome::changed(1)
        }
    }
}

// ---------------------------------------------------------------------------
// Leaf merging
// ---------------------------------------------------------------------------

/// Builds the branch separating two leaves whose hashes differ, nesting
/// one single-child level per shared fragment.
///
/// Terminates by `MAX_SHIFT`: distinct 32-bit hashes differ in some
/// fragment on the way down.
fn merge_leaves<K, V, P>(
    owner: Option<OwnerToken>,
    shift: u32,
    a: SharedPointer<Node<K, V, P>, P>,
    a_hash: u32,
    b: SharedPointer<Node<K, V, P>, P>,
    b_hash: u32,
) -> SharedPointer<Node<K, V, P>, P>
where
    P: SharedPointerKind,
{
    debug_assert!(a_hash != b_hash);
    let fa = node::fragment(a_hash, shift);
    let fb = node::fragment(b_hash, shift);
    if fa == fb {
        let child = merge_leaves(owner, shift + node::BITS_PER_LEVEL, a, a_hash, b, b_hash);
        SharedPointer::new(Node::BitmapIndexed {
            owner,
            bitmap: node::mask(fa),
            children: vec![child],
        })
    } else {
        let children = if fa < fb { vec![a, b] } else { vec![b, a] };
        SharedPointer::new(Node::BitmapIndexed {
            owner,
            bitmap: node::mask(fa) | node::mask(fb),
            children,
        })
    }
}
