//! Batched change notifications for skeleton edits.
//!
//! Subdivide and merge operations append to pending lists on the skeleton.
//! [`crate::TriangleSkeleton::notify`] flushes those lists to every registered
//! listener and clears them, so dependent geometry can be rebuilt once per
//! batch of edits rather than once per edit.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{TriId, VrtxId};

/// Handle returned by [`crate::TriangleSkeleton::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u32);

/// Receives batched skeleton changes. Every callback defaults to a no-op.
pub trait SkeletonListener {
    /// Groups of 4 children created by subdivision.
    fn on_triangles_added(&mut self, _ids: &[TriId]) {}

    /// Groups of 4 children deleted by merging.
    fn on_triangles_removed(&mut self, _ids: &[TriId]) {}

    /// Midpoint vertices no longer referenced by any subdivided triangle.
    fn on_vertices_removed(&mut self, _ids: &[VrtxId]) {}
}

/// The three change lists accumulated between flushes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkeletonChanges {
    pub triangles_added: Vec<TriId>,
    pub triangles_removed: Vec<TriId>,
    pub vertices_removed: Vec<VrtxId>,
}

impl SkeletonChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles_added.is_empty()
            && self.triangles_removed.is_empty()
            && self.vertices_removed.is_empty()
    }
}

/// A listener that records changes into a shared log for later draining.
///
/// Register one clone with the skeleton and keep another; call
/// [`ChangeLog::take`] whenever convenient.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    changes: Rc<RefCell<SkeletonChanges>>,
}

impl ChangeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    #[must_use]
    pub fn take(&self) -> SkeletonChanges {
        std::mem::take(&mut *self.changes.borrow_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.borrow().is_empty()
    }
}

impl SkeletonListener for ChangeLog {
    fn on_triangles_added(&mut self, ids: &[TriId]) {
        self.changes.borrow_mut().triangles_added.extend_from_slice(ids);
    }

    fn on_triangles_removed(&mut self, ids: &[TriId]) {
        self.changes
            .borrow_mut()
            .triangles_removed
            .extend_from_slice(ids);
    }

    fn on_vertices_removed(&mut self, ids: &[VrtxId]) {
        self.changes
            .borrow_mut()
            .vertices_removed
            .extend_from_slice(ids);
    }
}
