//! HostPromiseRejectionTracker.
//!
//! The promise core reports two operations: `Reject` when a promise with no
//! handler is rejected, and `Handle` when a handler is attached to a promise
//! that was already rejected without one. The tracker keeps the rejected,
//! still-unhandled promises in rejection order until the host takes them.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::heap::ObjectId;

/// Operation reported to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOperation {
    /// A promise was rejected while it had no handler
    Reject,
    /// A handler was attached to an unhandled rejected promise
    Handle,
}

/// Unhandled rejection bookkeeping for one context
#[derive(Debug)]
pub struct RejectionTracker {
    pending: IndexSet<ObjectId, FxBuildHasher>,
    enabled: bool,
}

impl RejectionTracker {
    /// Creates a new, enabled, empty tracker
    pub fn new() -> Self {
        Self {
            pending: IndexSet::default(),
            enabled: true,
        }
    }

    /// Turn tracking on or off. Disabling drops what was recorded.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending.clear();
        }
    }

    /// Whether operations are being recorded
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an operation for `promise`
    pub fn track(&mut self, promise: ObjectId, operation: RejectionOperation) {
        if !self.enabled {
            return;
        }
        trace!(promise = promise.index(), ?operation, "rejection tracker");
        match operation {
            RejectionOperation::Reject => {
                self.pending.insert(promise);
            }
            RejectionOperation::Handle => {
                // Order of the remaining entries is preserved.
                self.pending.shift_remove(&promise);
            }
        }
    }

    /// Whether `promise` is currently recorded as unhandled
    pub fn is_pending(&self, promise: ObjectId) -> bool {
        self.pending.contains(&promise)
    }

    /// Number of unhandled rejections recorded
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the unhandled rejections in rejection order
    pub fn take_pending(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

impl Default for RejectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
