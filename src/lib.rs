//! Persistent hash map — a hash array mapped trie behind an immutable
//! façade.
//!
//! Every mutating-looking operation returns a new logical map that shares
//! the bulk of its structure with its predecessor. Five node variants keep
//! each subtree in the representation its occupancy calls for, and batched
//! construction goes through **transients**: maps stamped with an owner
//! token whose `_mut` operations may edit token-matching, unshared nodes
//! in place.
//!
//! # Key properties
//!
//! - **O(log₃₂ n) get/insert/remove** with structural sharing
//! - **Reference equality on no-ops**: setting an equal value or removing
//!   an absent key hands back the receiver's root
//! - **Transient batching**: [`HamtMap::with_mutations`] builds in place
//!   behind the immutable façade
//! - **Deep path operations** over nested maps via [`NestedValue`]
//!
//! # Example
//!
//! ```
//! use hamt_map::HamtMap;
//!
//! let empty = HamtMap::new();
//! let a = empty.insert("a", 1).insert("b", 2);
//! let b = a.insert("a", 3);
//!
//! assert_eq!(a.get(&"a"), Some(&1)); // prior version untouched
//! assert_eq!(b.get(&"a"), Some(&3));
//! assert_eq!(b.len(), 2);
//! ```
//!
//! # References
//!
//! - Bagwell, 2001 — "Ideal Hash Trees"
//! - Steindorfer & Vinju, 2015 — "Optimizing Hash-Array Mapped Tries
//!   for Fast and Lean Immutable JVM Collections", OOPSLA 2015

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod hash;
pub mod iter;

mod error;
mod map;
mod node;
mod ops;
mod owner;
mod path;

#[cfg(test)]
mod tests;

pub use error::{MapError, Result};
pub use hash::{DefaultBuildHasher, Float32, Float64};
pub use map::{HamtMap, HamtMapSync};
pub use path::NestedValue;
