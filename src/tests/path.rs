//! Deep path operations over nested maps.

use archery::RcK;

use crate::hash::DefaultBuildHasher;
use crate::{HamtMap, MapError, NestedValue};

/// Nested test value: either a number or another map level.
#[derive(Debug, Clone, PartialEq)]
enum Val {
    Leaf(i64),
    Map(HamtMap<&'static str, Val>),
}

impl NestedValue<&'static str, RcK, DefaultBuildHasher> for Val {
    fn as_map(&self) -> Option<&HamtMap<&'static str, Val>> {
        match self {
            Val::Map(m) => Some(m),
            Val::Leaf(_) => None,
        }
    }

    fn from_map(map: HamtMap<&'static str, Val>) -> Self {
        Val::Map(map)
    }
}

fn leaf(n: i64) -> Val {
    Val::Leaf(n)
}

#[test]
fn set_in_builds_missing_levels() {
    let map: HamtMap<&str, Val> = HamtMap::new();
    let built = map.set_in(&["a", "b", "c"], leaf(7)).unwrap();

    // equivalent to wrapping maps by hand
    let expected = HamtMap::new().insert(
        "a",
        Val::Map(HamtMap::new().insert("b", Val::Map(HamtMap::new().insert("c", leaf(7))))),
    );
    assert_eq!(built, expected);
    assert_eq!(built.get_in(&["a", "b", "c"]), Some(&leaf(7)));
}

#[test]
fn get_in_resolves_nested_values() {
    let map = HamtMap::new()
        .set_in(&["x", "y"], leaf(1))
        .unwrap()
        .set_in(&["x", "z"], leaf(2))
        .unwrap();

    assert_eq!(map.get_in(&["x", "y"]), Some(&leaf(1)));
    assert_eq!(map.get_in(&["x", "z"]), Some(&leaf(2)));
    assert_eq!(map.get_in(&["x", "missing"]), None);
    assert_eq!(map.get_in(&["missing", "y"]), None);
    assert_eq!(map.get_in(&[]), None);
    // one-segment paths behave like get
    assert!(matches!(map.get_in(&["x"]), Some(Val::Map(_))));
}

#[test]
fn get_in_stops_at_leaves() {
    let map = HamtMap::new().insert("a", leaf(1));
    assert_eq!(map.get_in(&["a", "b"]), None);
}

#[test]
fn set_in_through_leaf_is_an_error() {
    let map = HamtMap::new().insert("a", leaf(1));
    let err = map.set_in(&["a", "b"], leaf(2)).unwrap_err();
    assert_eq!(err, MapError::Path { depth: 1 });

    let deeper = map.set_in(&["a", "b", "c"], leaf(2)).unwrap_err();
    assert_eq!(deeper, MapError::Path { depth: 1 });
}

#[test]
fn empty_path_writes_are_errors() {
    let map: HamtMap<&str, Val> = HamtMap::new();
    assert_eq!(
        map.set_in(&[], leaf(1)).unwrap_err(),
        MapError::Path { depth: 0 }
    );
    assert_eq!(map.remove_in(&[]).unwrap_err(), MapError::Path { depth: 0 });
}

#[test]
fn update_in_modifies_nested_value() {
    let map = HamtMap::new().set_in(&["a", "b"], leaf(10)).unwrap();
    let bumped = map
        .update_in(&["a", "b"], |v| match v {
            Some(Val::Leaf(n)) => Val::Leaf(n + 1),
            _ => leaf(0),
        })
        .unwrap();
    assert_eq!(bumped.get_in(&["a", "b"]), Some(&leaf(11)));
    // receiver untouched
    assert_eq!(map.get_in(&["a", "b"]), Some(&leaf(10)));
}

#[test]
fn update_in_identity_shares_root() {
    let map = HamtMap::new().set_in(&["a", "b"], leaf(10)).unwrap();
    let same = map.update_in(&["a", "b"], |v| v.cloned().unwrap()).unwrap();
    assert!(map.ptr_eq(&same));
}

#[test]
fn remove_in_deletes_nested_entry() {
    let map = HamtMap::new()
        .set_in(&["a", "b"], leaf(1))
        .unwrap()
        .set_in(&["a", "c"], leaf(2))
        .unwrap();

    let removed = map.remove_in(&["a", "b"]).unwrap();
    assert_eq!(removed.get_in(&["a", "b"]), None);
    assert_eq!(removed.get_in(&["a", "c"]), Some(&leaf(2)));
}

#[test]
fn remove_in_absent_path_is_noop() {
    let map = HamtMap::new().set_in(&["a", "b"], leaf(1)).unwrap();
    let same = map.remove_in(&["a", "zzz"]).unwrap();
    assert!(map.ptr_eq(&same));
    let same = map.remove_in(&["nope", "b"]).unwrap();
    assert!(map.ptr_eq(&same));
}

#[test]
fn merge_in_merges_at_depth() {
    let map = HamtMap::new()
        .set_in(&["cfg", "a"], leaf(1))
        .unwrap()
        .set_in(&["cfg", "b"], leaf(2))
        .unwrap();
    let source = HamtMap::new().insert("b", leaf(20)).insert("c", leaf(30));

    let merged = map.merge_in(&["cfg"], &source).unwrap();
    assert_eq!(merged.get_in(&["cfg", "a"]), Some(&leaf(1)));
    assert_eq!(merged.get_in(&["cfg", "b"]), Some(&leaf(20)));
    assert_eq!(merged.get_in(&["cfg", "c"]), Some(&leaf(30)));
}

#[test]
fn merge_in_fabricates_missing_target() {
    let map: HamtMap<&str, Val> = HamtMap::new();
    let source = HamtMap::new().insert("k", leaf(1));
    let merged = map.merge_in(&["deep", "down"], &source).unwrap();
    assert_eq!(merged.get_in(&["deep", "down", "k"]), Some(&leaf(1)));
}

#[test]
fn merge_in_through_leaf_is_an_error() {
    let map = HamtMap::new().insert("a", leaf(1));
    let source: HamtMap<&str, Val> = HamtMap::new().insert("k", leaf(2));
    assert_eq!(
        map.merge_in(&["a"], &source).unwrap_err(),
        MapError::Path { depth: 1 }
    );
}
