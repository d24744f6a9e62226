//! Chunk removal and slot compaction.

use std::rc::Rc;

use planeta_skeleton::{INVALID_TRI, TriId, TriangleSkeleton};
use tracing::{debug, trace};

use crate::record::INVALID_CHUNK;
use crate::vertex::INDEX_SIZE;
use crate::{ChunkError, ChunkedLodMesh};

impl ChunkedLodMesh {
    /// Remove the chunk over triangle `t`. Does nothing if `t` is not chunked.
    ///
    /// Border vertices no longer used by any chunk return to the shared pool
    /// and the interior block is freed. The slot becomes pending-free: its
    /// index data stays in place until [`ChunkedLodMesh::chunk_pack`].
    pub fn chunk_remove(&mut self, t: TriId) -> Result<(), ChunkError> {
        let skeleton_rc = Rc::clone(&self.skeleton);
        let mut skeleton = skeleton_rc.borrow_mut();
        self.sync_skeleton(&mut skeleton);

        if skeleton.get_triangle(t).is_none() {
            return Err(ChunkError::InvalidTriangle(t));
        }
        let record = self.record(t).clone();
        if !record.is_chunked() {
            return Ok(());
        }

        let mut freed = 0;
        for ring in 0..self.layout.shared_count() {
            let id = self.ring_vertex(t, ring);
            if self.shared.release(id) {
                freed += 1;
            }
        }
        let block = (record.data_vertex - self.config.max_shared_vertices) / self.layout.interior_count();
        self.interior_free.push(block);

        self.unlink_neighbours(&skeleton, t);
        self.release_ancestry(&mut skeleton, t)?;

        let cleared = self.record_mut(t);
        cleared.chunk = INVALID_CHUNK;
        for side in 0..3 {
            cleared.unlink(side);
        }
        self.chunk_free.insert(record.chunk);
        self.chunk_to_tri[record.chunk as usize] = INVALID_TRI;

        debug!(
            "Chunk removed: triangle {t} from slot {}, {freed} shared vertices freed",
            record.chunk
        );
        Ok(())
    }

    /// Drop links from chunks across `t`'s edges that point at `t`.
    fn unlink_neighbours(&mut self, skeleton: &TriangleSkeleton, t: TriId) {
        let tri = skeleton.triangle(t);
        for side in 0..3 {
            let nb_id = tri.neighbours[side];
            let nb_side = tri.neighbour_sides[side];
            // Coarser neighbours never link to finer chunks.
            if skeleton.triangle(nb_id).depth != tri.depth {
                continue;
            }
            let mut stack = vec![nb_id];
            while let Some(d) = stack.pop() {
                let record = self.record_mut(d);
                if record.neighbour_chunked[nb_side as usize] == t {
                    record.unlink(nb_side);
                }
                let chunked = record.is_chunked();
                let node = skeleton.triangle(d);
                if node.subdivided && !chunked {
                    stack.extend(node.children_along(nb_side));
                }
            }
        }
    }

    fn release_ancestry(&mut self, skeleton: &mut TriangleSkeleton, t: TriId) -> Result<(), ChunkError> {
        let tri = skeleton.triangle(t);
        if tri.subdivided {
            let mut stack: Vec<TriId> = (tri.children..tri.children + 4).collect();
            while let Some(d) = stack.pop() {
                self.record_mut(d).ancestor_chunked = INVALID_TRI;
                let node = skeleton.triangle(d);
                if node.subdivided {
                    stack.extend(node.children..node.children + 4);
                }
            }
        }

        let mut cur = skeleton.triangle(t).parent;
        while cur != INVALID_TRI {
            let record = self.record_mut(cur);
            record.descendant_chunked = record.descendant_chunked.saturating_sub(1);
            skeleton.decrement_use_count(cur)?;
            cur = skeleton.triangle(cur).parent;
        }
        skeleton.decrement_use_count(t)?;
        Ok(())
    }

    /// Compact the slot table by filling removed slots with the last live
    /// chunks. Returns the number of slots reclaimed.
    ///
    /// Slots are processed highest first: a removed last slot just shrinks
    /// the count, any other receives the index data of the current last
    /// chunk, and the moved range is recorded as an index update.
    pub fn chunk_pack(&mut self) -> u32 {
        let count = self.layout.index_count();
        let mut reclaimed = 0;

        while let Some(slot) = self.chunk_free.pop_last() {
            reclaimed += 1;
            self.chunk_count -= 1;
            let last = self.chunk_count;
            if slot == last {
                continue;
            }

            let t = self.chunk_to_tri[last as usize];
            let (src, dst) = ((last * count) as usize, slot * count);
            self.indices.copy_within(src..src + count as usize, dst as usize);

            let record = self.record_mut(t);
            record.chunk = slot;
            record.data_index = dst;
            self.chunk_to_tri[slot as usize] = t;
            self.chunk_to_tri[last as usize] = INVALID_TRI;
            self.index_updates.mark(dst, count, INDEX_SIZE);
            trace!("Moved chunk of triangle {t} from slot {last} to {slot}");
        }

        if reclaimed > 0 {
            debug!("Packed {reclaimed} chunk slots, {} remain", self.chunk_count);
        }
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use planeta_skeleton::SkeletonConfig;

    use super::*;
    use crate::vertex::UpdateRange;
    use crate::ChunkConfig;

    fn setup(max_chunks: u32) -> (Rc<RefCell<TriangleSkeleton>>, ChunkedLodMesh) {
        let sk = Rc::new(RefCell::new(
            TriangleSkeleton::with_config(SkeletonConfig {
                radius: 50.0,
                max_vertices: 1024,
                max_triangles: 512,
                max_depth: 4,
            })
            .unwrap(),
        ));
        let config = ChunkConfig {
            subdivision: 3,
            max_chunks,
            max_shared_vertices: 2048,
        };
        let mesh = ChunkedLodMesh::new(Rc::clone(&sk), config).unwrap();
        (sk, mesh)
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_sk, mut mesh) = setup(8);
        mesh.chunk_remove(4).unwrap();
        assert_eq!(mesh.chunk_count(), 0);

        mesh.chunk_add(4).unwrap();
        mesh.chunk_remove(4).unwrap();
        let stats = mesh.stats();
        mesh.chunk_remove(4).unwrap();
        assert_eq!(mesh.stats(), stats);
        assert!(!mesh.triangle_chunk(4).unwrap().is_chunked());
    }

    #[test]
    fn test_remove_frees_shared_vertices_and_corner_map() {
        let (sk, mut mesh) = setup(8);
        let nb = sk.borrow().triangle(0).neighbours[1];
        mesh.chunk_add(0).unwrap();
        mesh.chunk_add(nb).unwrap();
        let both = mesh.stats().shared_in_use;

        mesh.chunk_remove(0).unwrap();
        // The common edge survives with the neighbour.
        assert_eq!(mesh.stats().shared_in_use, 24);
        assert!(both > 24);
        // Side 1 is opposite corner 1, so that corner was never shared.
        let left = sk.borrow().triangle(0).corners[1];
        assert!(!sk.borrow().triangle(nb).corners.contains(&left));
        assert_eq!(mesh.shared.corner(left), None);

        assert_eq!(
            mesh.triangle_chunk(nb).unwrap().neighbour_chunked,
            [INVALID_TRI; 3]
        );
        mesh.chunk_remove(nb).unwrap();
        assert_eq!(mesh.stats().shared_in_use, 0);
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_removed_slot_is_reused_lowest_first() {
        let (_sk, mut mesh) = setup(8);
        for t in [0, 1, 2, 3] {
            mesh.chunk_add(t).unwrap();
        }
        mesh.chunk_remove(2).unwrap();
        mesh.chunk_remove(0).unwrap();
        assert_eq!(mesh.chunk_count(), 4);

        mesh.chunk_add(10).unwrap();
        assert_eq!(mesh.triangle_chunk(10).unwrap().chunk, 0);
        mesh.chunk_add(11).unwrap();
        assert_eq!(mesh.triangle_chunk(11).unwrap().chunk, 2);
        assert_eq!(mesh.chunk_count(), 4);
    }

    #[test]
    fn test_pack_moves_last_chunk_into_hole() {
        let (_sk, mut mesh) = setup(8);
        let tris = [0, 2, 6, 8, 11, 13, 16, 19];
        for t in tris {
            mesh.chunk_add(t).unwrap();
        }
        assert_eq!(mesh.chunk_count(), 8);
        let moved = mesh.chunk_to_triangle(7).unwrap();
        let data: Vec<u32> = mesh.index_buffer()[7 * 192..8 * 192].to_vec();

        mesh.chunk_remove(mesh.chunk_to_triangle(3).unwrap()).unwrap();
        mesh.take_index_updates();
        mesh.take_vertex_updates();

        assert_eq!(mesh.chunk_pack(), 1);
        assert_eq!(mesh.chunk_count(), 7);
        assert_eq!(mesh.chunk_to_triangle(3), Some(moved));
        assert_eq!(mesh.chunk_to_triangle(7), None);
        assert_eq!(mesh.triangle_chunk(moved).unwrap().chunk, 3);
        assert_eq!(&mesh.index_buffer()[3 * 192..4 * 192], data.as_slice());
        assert_eq!(
            mesh.take_index_updates(),
            vec![UpdateRange {
                start: 3 * 192 * 4,
                end: 4 * 192 * 4
            }]
        );
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_pack_shrinks_when_last_slot_freed() {
        let (_sk, mut mesh) = setup(8);
        for t in [0, 5, 10, 15] {
            mesh.chunk_add(t).unwrap();
        }
        mesh.chunk_remove(15).unwrap();
        mesh.chunk_remove(0).unwrap();
        mesh.take_index_updates();

        assert_eq!(mesh.chunk_pack(), 2);
        assert_eq!(mesh.chunk_count(), 2);
        assert_eq!(mesh.chunk_to_triangle(0), Some(10));
        assert_eq!(mesh.chunk_to_triangle(1), Some(5));
        assert_eq!(mesh.take_index_updates().len(), 1);
        assert_eq!(mesh.chunk_pack(), 0);
    }

    #[test]
    fn test_conservation_through_mixed_edits() {
        let (sk, mut mesh) = setup(32);
        for t in 0..10 {
            mesh.chunk_add(t).unwrap();
        }
        mesh.chunk_remove(5).unwrap();
        sk.borrow_mut().subdivide_add(5).unwrap();
        let children = sk.borrow().triangle(5).children;
        for c in children..children + 4 {
            mesh.chunk_add(c).unwrap();
        }
        mesh.chunk_remove(children + 3).unwrap();
        mesh.chunk_remove(0).unwrap();
        mesh.chunk_pack();
        mesh.chunk_add(12).unwrap();
        mesh.chunk_remove(children).unwrap();
        mesh.chunk_add(children + 3).unwrap();
        assert!(mesh.verify().is_empty(), "{:?}", mesh.verify());
    }
}
