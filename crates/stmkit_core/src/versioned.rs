//! Identity-versioned value snapshots.

use std::sync::Arc;

/// Immutable snapshot of a ref's committed value.
///
/// A new `Versioned` is allocated for every committed write. Versions are
/// compared by allocation identity, never by content: writing an equal value
/// still produces a new version.
#[derive(Debug)]
pub struct Versioned<A> {
    value: A,
}

impl<A> Versioned<A> {
    /// Wraps `value` in a freshly allocated version.
    pub fn new(value: A) -> Arc<Self> {
        Arc::new(Self { value })
    }

    /// Returns the snapshot value.
    pub fn value(&self) -> &A {
        &self.value
    }

    /// Returns true if both handles point at the same version.
    pub fn same(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }
}
