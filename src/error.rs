//! Error types for map operations.
//!
//! Lookup misses are `None`, never errors; the error surface exists for
//! deep path operations. Writing through a sealed transient cannot be
//! expressed at all: [`as_immutable`](crate::HamtMap::as_immutable)
//! consumes its handle.

/// Convenience alias for results carrying [`MapError`].
pub type Result<T, E = MapError> = std::result::Result<T, E>;

/// Errors reported by map operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// A deep operation met a non-collection value before its path ended.
    ///
    /// `depth` is the zero-based index of the first path segment that
    /// could not be traversed into. Write operations also report depth 0
    /// for an empty path, which would have to replace the receiver itself.
    #[error("path segment {depth} is not a collection")]
    Path {
        /// Index of the offending path segment.
        depth: usize,
    },

    /// Reserved for user key protocols that can fail to produce a hash.
    ///
    /// Never produced by the built-in [`Hash`](std::hash::Hash)-based
    /// protocol.
    #[error("key cannot be hashed")]
    InvalidKey,
}
