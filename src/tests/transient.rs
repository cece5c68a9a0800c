//! Transient batching: `as_mutable` / `as_immutable` / `with_mutations`.

use crate::HamtMap;

use super::check_invariants;

/// Batched and persistent construction agree entry-for-entry.
#[test]
fn with_mutations_matches_persistent_replay() {
    let batched = HamtMap::new().with_mutations(|m| {
        for i in 0..500_u32 {
            m.insert_mut(i, i * 2);
        }
        for i in (0..500_u32).step_by(3) {
            m.remove_mut(&i);
        }
    });

    let mut persistent = HamtMap::new();
    for i in 0..500_u32 {
        persistent = persistent.insert(i, i * 2);
    }
    for i in (0..500_u32).step_by(3) {
        persistent = persistent.remove(&i);
    }

    assert_eq!(batched, persistent);
    check_invariants(&batched);
    check_invariants(&persistent);
}

/// The thousand-entry batch: size, lookups, and sealed result.
#[test]
fn with_mutations_thousand() {
    let map = HamtMap::new().with_mutations(|m| {
        for i in 0..1000_u64 {
            m.insert_mut(i, i * i);
        }
    });
    assert_eq!(map.len(), 1000);
    assert_eq!(map.get(&500), Some(&250_000));
    assert!(!map.was_altered());
    check_invariants(&map);
}

/// A batch that changes nothing hands back the receiver's root.
#[test]
fn with_mutations_noop_shares_root() {
    let map = HamtMap::new().insert("a", 1).insert("b", 2);
    let same = map.with_mutations(|m| {
        m.insert_mut("a", 1); // equal value: no-op
        m.remove_mut(&"zzz"); // absent: no-op
    });
    assert!(map.ptr_eq(&same));
}

/// The source of a transient is never disturbed by the batch.
#[test]
fn with_mutations_leaves_source_intact() {
    let mut source = HamtMap::new();
    for i in 0..100_u32 {
        source.insert_mut(i, i);
    }
    let edited = source.with_mutations(|m| {
        for i in 0..100_u32 {
            m.insert_mut(i, i + 1000);
        }
        for i in 50..100_u32 {
            m.remove_mut(&i);
        }
    });

    assert_eq!(source.len(), 100);
    for i in 0..100_u32 {
        assert_eq!(source.get(&i), Some(&i), "source disturbed at {i}");
    }
    assert_eq!(edited.len(), 50);
    assert_eq!(edited.get(&0), Some(&1000));
    check_invariants(&source);
    check_invariants(&edited);
}

/// `was_altered` flips on the first effective mutation only.
#[test]
fn was_altered_tracks_effective_changes() {
    let map = HamtMap::new().insert("a", 1);
    let mut t = map.as_mutable();
    assert!(!t.was_altered());

    t.insert_mut("a", 1); // equal value
    assert!(!t.was_altered());
    t.remove_mut(&"nope"); // absent
    assert!(!t.was_altered());

    t.insert_mut("a", 2);
    assert!(t.was_altered());
}

/// `as_mutable` on a transient stays in the same session.
#[test]
fn as_mutable_is_idempotent_on_transients() {
    let mut t = HamtMap::new().insert(1, 1).as_mutable();
    t.insert_mut(2, 2);
    let mut t2 = t.as_mutable();
    assert!(t2.was_altered());
    t2.insert_mut(3, 3);
    assert_eq!(t2.len(), 3);
}

/// Sealing and re-reading yields the same contents as the transient saw.
#[test]
fn as_immutable_round_trip() {
    let mut t = HamtMap::new().as_mutable();
    for i in 0..40_u32 {
        t.insert_mut(i, i);
    }
    let sealed = t.as_immutable();
    assert_eq!(sealed.len(), 40);
    for i in 0..40_u32 {
        assert_eq!(sealed.get(&i), Some(&i));
    }
    check_invariants(&sealed);
}

/// A clone taken mid-batch is a plain immutable map: later batch edits
/// must not leak into it.
#[test]
fn clone_of_transient_is_isolated() {
    let mut t = HamtMap::new().as_mutable();
    for i in 0..100_u32 {
        t.insert_mut(i, i);
    }
    let snapshot = t.clone();
    for i in 0..100_u32 {
        t.insert_mut(i, i + 1_000_000);
    }
    t.remove_mut(&0);

    assert_eq!(snapshot.len(), 100);
    for i in 0..100_u32 {
        assert_eq!(snapshot.get(&i), Some(&i), "batch leaked into clone at {i}");
    }
    check_invariants(&snapshot);
}

/// `clear` keeps the transient session live.
#[test]
fn clear_inside_batch() {
    let map = HamtMap::new().insert(1, 1).with_mutations(|m| {
        m.clear_mut();
        m.insert_mut(7, 7);
    });
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&7), Some(&7));
    assert_eq!(map.get(&1), None);
}

/// Transient edits reuse owned nodes instead of snapshotting the map.
#[test]
fn transient_reuses_its_own_nodes() {
    let mut t = HamtMap::new().as_mutable();
    t.insert_mut(1_u32, 0);
    let root_after_first = t.root_node().map(std::ptr::from_ref);

    // further edits to the same small node happen in place
    t.insert_mut(2, 0);
    t.insert_mut(3, 0);
    let root_after_more = t.root_node().map(std::ptr::from_ref);
    assert_eq!(root_after_first, root_after_more, "owned root was copied");
}
