//! Policy-driven update pass over the whole skeleton.

use std::rc::Rc;

use planeta_skeleton::{ICOSAHEDRON_FACE_COUNT, INVALID_TRI, SubTriangle, TriId};
use tracing::{debug, warn};

use crate::record::SubTriangleChunk;
use crate::ChunkedLodMesh;

/// What the update pass should do with one triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateAction {
    /// Leave the triangle as it is and keep descending if subdivided.
    #[default]
    Nothing,
    /// Drop any chunk here and split the triangle.
    Subdivide,
    /// Cover the triangle with one chunk, dropping chunks below it.
    Chunk,
    /// Drop any chunk here.
    Unchunk,
}

/// Decides per triangle what the update pass does.
///
/// Implemented for any `FnMut(&SubTriangle, &SubTriangleChunk, TriId) ->
/// UpdateAction`.
pub trait UpdatePolicy {
    fn decide(&mut self, tri: &SubTriangle, chunk: &SubTriangleChunk, id: TriId) -> UpdateAction;
}

impl<F> UpdatePolicy for F
where
    F: FnMut(&SubTriangle, &SubTriangleChunk, TriId) -> UpdateAction,
{
    fn decide(&mut self, tri: &SubTriangle, chunk: &SubTriangleChunk, id: TriId) -> UpdateAction {
        self(tri, chunk, id)
    }
}

/// Counters from one [`ChunkedLodMesh::chunk_geometry_update_all`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub visited: u32,
    pub subdivided: u32,
    /// Subdivisions refused by the skeleton; the triangle was chunked instead.
    pub subdivide_failures: u32,
    pub chunks_added: u32,
    pub chunks_removed: u32,
    /// Queued chunk adds that failed or were skipped after a capacity failure.
    pub chunk_failures: u32,
    pub slots_packed: u32,
    /// Subdivided triangles merged because a chunk at or above them covers
    /// their area.
    pub merged: u32,
}

impl ChunkedLodMesh {
    /// Walk the skeleton depth-first from the 20 roots, applying `policy`.
    ///
    /// Removals and subdivisions happen during the walk; chunk adds are queued
    /// and run afterwards so each sees the final neighbour layout. A chunked
    /// or queued triangle is a leaf of the walk. When the skeleton refuses to
    /// subdivide, an existing chunk is kept and an unchunked triangle is
    /// chunked instead, so the surface stays covered. After the first
    /// capacity failure among queued adds, the rest are skipped. Slots are
    /// packed if anything was removed, then skeleton triangles covered by a
    /// coarser chunk are merged back.
    pub fn chunk_geometry_update_all<P: UpdatePolicy>(&mut self, policy: &mut P) -> UpdateStats {
        let mut stats = UpdateStats::default();
        let mut queued: Vec<TriId> = Vec::new();
        let mut stack: Vec<TriId> = (0..ICOSAHEDRON_FACE_COUNT as TriId).rev().collect();
        let skeleton_rc = Rc::clone(&self.skeleton);

        while let Some(t) = stack.pop() {
            let action = {
                let skeleton = skeleton_rc.borrow();
                let Some(tri) = skeleton.get_triangle(t) else {
                    continue;
                };
                policy.decide(tri, self.record(t), t)
            };
            stats.visited += 1;
            let mut leaf = false;

            match action {
                UpdateAction::Nothing => {}
                UpdateAction::Unchunk => self.remove_counted(t, &mut stats),
                UpdateAction::Chunk => {
                    if !self.record(t).is_chunked() {
                        self.remove_descendant_chunks(t, &mut stats);
                        queued.push(t);
                        leaf = true;
                    }
                }
                UpdateAction::Subdivide => {
                    let result = {
                        let mut skeleton = skeleton_rc.borrow_mut();
                        if skeleton.triangle(t).subdivided {
                            Ok(false)
                        } else {
                            skeleton.subdivide_add(t).map(|()| true)
                        }
                    };
                    match result {
                        Ok(subdivided) => {
                            if subdivided {
                                stats.subdivided += 1;
                            }
                            self.remove_counted(t, &mut stats);
                        }
                        Err(err) => {
                            stats.subdivide_failures += 1;
                            // An existing chunk keeps covering the triangle.
                            if !self.record(t).is_chunked() {
                                warn!("Subdivision of triangle {t} refused, chunking instead: {err}");
                                queued.push(t);
                                leaf = true;
                            }
                        }
                    }
                }
            }

            if leaf || self.record(t).is_chunked() {
                continue;
            }
            let skeleton = skeleton_rc.borrow();
            let tri = skeleton.triangle(t);
            if tri.subdivided {
                stack.extend((tri.children..tri.children + 4).rev());
            }
        }

        for (i, &t) in queued.iter().enumerate() {
            match self.chunk_add(t) {
                Ok(()) => stats.chunks_added += 1,
                Err(err) if err.is_capacity() => {
                    let skipped = (queued.len() - i) as u32;
                    warn!("Chunk pool full, skipping {skipped} queued chunks: {err}");
                    stats.chunk_failures += skipped;
                    break;
                }
                Err(err) => {
                    warn!("Chunk add for triangle {t} failed: {err}");
                    stats.chunk_failures += 1;
                }
            }
        }

        if stats.chunks_removed > 0 {
            stats.slots_packed = self.chunk_pack();
        }
        stats.merged = self.merge_covered();
        debug!("Update pass: {stats:?}");
        stats
    }

    /// Merge every subdivided triangle whose area is covered by a chunk on
    /// itself or an ancestor, deepest first. Returns the number of merges.
    ///
    /// Triangles the skeleton refuses to merge stay subdivided.
    fn merge_covered(&mut self) -> u32 {
        let skeleton_rc = Rc::clone(&self.skeleton);
        let mut skeleton = skeleton_rc.borrow_mut();
        self.sync_skeleton(&mut skeleton);

        let mut covered: Vec<(u8, TriId)> = skeleton
            .triangles()
            .iter()
            .enumerate()
            .filter(|(_, tri)| tri.subdivided && !tri.deleted)
            .map(|(t, tri)| (tri.depth, t as TriId))
            .filter(|&(_, t)| {
                let record = self.record(t);
                record.is_chunked() || record.ancestor_chunked != INVALID_TRI
            })
            .collect();
        covered.sort_unstable_by(|a, b| b.cmp(a));

        let mut merged = 0;
        for (_, t) in covered {
            match skeleton.subdivide_remove(t) {
                Ok(()) => merged += 1,
                Err(err) => debug!("Triangle {t} stays subdivided: {err}"),
            }
        }
        if merged > 0 {
            self.sync_skeleton(&mut skeleton);
            debug!("Merged {merged} covered triangles");
        }
        merged
    }

    fn remove_counted(&mut self, t: TriId, stats: &mut UpdateStats) {
        if !self.record(t).is_chunked() {
            return;
        }
        match self.chunk_remove(t) {
            Ok(()) => stats.chunks_removed += 1,
            Err(err) => warn!("Chunk remove for triangle {t} failed: {err}"),
        }
    }

    /// Remove every chunk strictly below `t`.
    fn remove_descendant_chunks(&mut self, t: TriId, stats: &mut UpdateStats) {
        if self.record(t).descendant_chunked == 0 {
            return;
        }
        let skeleton_rc = Rc::clone(&self.skeleton);
        let children = skeleton_rc.borrow().triangle(t).children;
        let mut stack: Vec<TriId> = (children..children + 4).collect();
        while let Some(d) = stack.pop() {
            if self.record(d).is_chunked() {
                self.remove_counted(d, stats);
                continue;
            }
            if self.record(d).descendant_chunked == 0 {
                continue;
            }
            let node_children = skeleton_rc.borrow().triangle(d).children;
            stack.extend(node_children..node_children + 4);
        }
    }
}
