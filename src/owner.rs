//! Owner tokens — per-transient edit identities.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one transient editing session.
///
/// Tokens are drawn from a process-global monotonic counter and never
/// reused, so two tokens compare equal only if they belong to the same
/// session. A node stamped with a token may be edited in place by
/// operations carrying the same token; the immutable state is `None` at
/// every call site.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct OwnerToken(u64);

impl OwnerToken {
    /// Allocates a token no other session has held or will hold.
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
