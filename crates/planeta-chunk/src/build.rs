//! Chunk construction: neighbour linking, vertex sharing, and seam snapping.

use std::rc::Rc;

use glam::Vec3;
use planeta_skeleton::{INVALID_TRI, Pool, SideTransform, TriId, TriangleSkeleton};
use tracing::{debug, trace};

use crate::layout::ChunkLayout;
use crate::vertex::{CHUNK_VERTEX_SIZE, ChunkVertex, INDEX_SIZE};
use crate::{ChunkError, ChunkedLodMesh};

/// Tolerance, in grid units, for a mapped edge parameter to count as landing
/// on a vertex.
const GRID_EPSILON: f32 = 1e-4;

const NO_VERTEX: u32 = u32::MAX;

type Xy = (u32, u32);

/// Nearest grid position to `q` if it is within tolerance and on the edge.
fn grid_point(q: f32, edge: u32) -> Option<u32> {
    let k = q.round();
    if (q - k).abs() > GRID_EPSILON || k < 0.0 || k > edge as f32 {
        return None;
    }
    Some(k as u32)
}

impl ChunkedLodMesh {
    /// Build a chunk over triangle `t`.
    ///
    /// Does nothing if `t` is already chunked. Refuses with
    /// [`ChunkError::Overlapping`] if an ancestor or descendant is chunked,
    /// and with [`ChunkError::CapacityExceeded`] before touching any state if
    /// a pool cannot hold the chunk.
    pub fn chunk_add(&mut self, t: TriId) -> Result<(), ChunkError> {
        let skeleton_rc = Rc::clone(&self.skeleton);
        let mut skeleton = skeleton_rc.borrow_mut();
        self.sync_skeleton(&mut skeleton);

        if skeleton.get_triangle(t).is_none() {
            return Err(ChunkError::InvalidTriangle(t));
        }
        let record = self.record(t);
        if record.is_chunked() {
            return Ok(());
        }
        if record.ancestor_chunked != INVALID_TRI || record.descendant_chunked > 0 {
            return Err(ChunkError::Overlapping { tri: t });
        }
        self.check_capacity()?;

        let slot = self.chunk_free.pop_first().unwrap_or_else(|| {
            self.chunk_count += 1;
            self.chunk_count - 1
        });
        let block = self.interior_free.pop().unwrap_or_else(|| {
            self.interior_blocks += 1;
            self.interior_blocks - 1
        });
        let data_index = slot * self.layout.index_count();
        let data_vertex = self.config.max_shared_vertices + block * self.layout.interior_count();
        {
            let record = self.record_mut(t);
            record.chunk = slot;
            record.data_index = data_index;
            record.data_vertex = data_vertex;
        }
        self.chunk_to_tri[slot as usize] = t;

        let mut seams = Vec::new();
        self.link_sides(&skeleton, t, &mut seams);
        let local = self.build_vertices(&skeleton, t)?;
        self.write_indices(t, &local);
        self.track_ancestry(&mut skeleton, t)?;
        for (tri, side) in seams {
            self.snap_seam(&skeleton, tri, side);
        }

        debug!(
            "Chunk added: triangle {t} (depth {}) in slot {slot}",
            skeleton.triangle(t).depth
        );
        Ok(())
    }

    fn check_capacity(&self) -> Result<(), ChunkError> {
        let max_chunks = self.config.max_chunks;
        if self.chunk_free.is_empty() && self.chunk_count >= max_chunks {
            return Err(ChunkError::CapacityExceeded {
                pool: Pool::Chunks,
                capacity: max_chunks,
            });
        }
        if self.interior_free.is_empty() && self.interior_blocks >= max_chunks {
            return Err(ChunkError::CapacityExceeded {
                pool: Pool::ChunkVertices,
                capacity: max_chunks,
            });
        }
        // Worst case: no border vertex can be borrowed from a neighbour.
        if self.shared.available() < self.layout.shared_count() {
            return Err(ChunkError::CapacityExceeded {
                pool: Pool::SharedVertices,
                capacity: self.shared.capacity(),
            });
        }
        Ok(())
    }

    /// Record, for each side of `t`, the chunk owning the opposite edge, and
    /// point finer chunks across the edge back at `t`. Collects the
    /// `(triangle, side)` pairs whose vertices must be snapped onto a coarser
    /// edge.
    fn link_sides(&mut self, skeleton: &TriangleSkeleton, t: TriId, seams: &mut Vec<(TriId, u8)>) {
        let tri = skeleton.triangle(t);

        for side in 0..3u8 {
            let nb_id = tri.neighbours[side as usize];
            let nb_side = tri.neighbour_sides[side as usize];
            let nb = skeleton.triangle(nb_id);
            let nb_record = self.record(nb_id).clone();
            let to_nb = skeleton
                .transform_to_ancestor(t, side, nb.depth)
                .then(SideTransform::REVERSE);

            if nb_record.is_chunked() {
                self.record_mut(t).link(side, nb_id, to_nb);
                if nb.depth == tri.depth {
                    self.record_mut(nb_id).link(nb_side, t, SideTransform::REVERSE);
                } else {
                    seams.push((t, side));
                }
            } else if nb_record.ancestor_chunked != INVALID_TRI {
                let owner = nb_record.ancestor_chunked;
                let owner_depth = skeleton.triangle(owner).depth;
                let transform =
                    to_nb.then(skeleton.transform_to_ancestor(nb_id, nb_side, owner_depth));
                self.record_mut(t).link(side, owner, transform);
                seams.push((t, side));
            } else if nb.depth == tri.depth && nb_record.descendant_chunked > 0 {
                let mut stack = Vec::from(nb.children_along(nb_side));
                while let Some(d) = stack.pop() {
                    let record = self.record(d);
                    if record.is_chunked() {
                        let transform = skeleton
                            .transform_to_ancestor(d, nb_side, tri.depth)
                            .then(SideTransform::REVERSE);
                        self.record_mut(d).link(nb_side, t, transform);
                        seams.push((d, nb_side));
                    } else if record.descendant_chunked > 0 {
                        stack.extend(skeleton.triangle(d).children_along(nb_side));
                    }
                }
            }
        }
    }

    /// Produce every vertex of the chunk, returning vertex buffer ids indexed
    /// by local flat index.
    fn build_vertices(&mut self, skeleton: &TriangleSkeleton, t: TriId) -> Result<Vec<u32>, ChunkError> {
        let edge = self.layout.edge();
        let mut local = vec![NO_VERTEX; self.layout.vertex_count() as usize];
        let corners = skeleton.triangle(t).corners;

        for (c, &corner) in corners.iter().enumerate() {
            let (x, y) = self.layout.corner_xy(c);
            let id = if let Some(id) = self.shared.corner(corner) {
                id
            } else if let Some(id) = self
                .shared_from_neighbour(skeleton, t, ((c + 2) % 3) as u8, 0)
                .or_else(|| self.shared_from_neighbour(skeleton, t, ((c + 1) % 3) as u8, edge))
            {
                self.shared.map_corner(corner, id);
                id
            } else {
                let id = self.alloc_shared()?;
                self.write_vertex(id, skeleton.vertex_normal(corner));
                self.mark_vertex(id);
                self.shared.map_corner(corner, id);
                id
            };
            self.shared.add_user(id);
            local[ChunkLayout::get_index(x, y) as usize] = id;
        }

        let mut stack: Vec<[Xy; 3]> = vec![[0, 1, 2].map(|c| self.layout.corner_xy(c))];
        while let Some(item) = stack.pop() {
            let [a, b, c] = item;
            let span = b.0.abs_diff(c.0).max(b.1.abs_diff(c.1));
            if span <= 1 {
                continue;
            }
            let mid = |p: Xy, q: Xy| ((p.0 + q.0) / 2, (p.1 + q.1) / 2);
            let mids = [mid(b, c), mid(c, a), mid(a, b)];

            for (i, &(x, y)) in mids.iter().enumerate() {
                let flat = ChunkLayout::get_index(x, y) as usize;
                if local[flat] != NO_VERTEX {
                    continue;
                }
                let (p, q) = (item[(i + 1) % 3], item[(i + 2) % 3]);
                let ends = [p, q].map(|(x, y)| local[ChunkLayout::get_index(x, y) as usize]);
                local[flat] = self.midpoint_vertex(skeleton, t, (x, y), ends)?;
            }

            let [m0, m1, m2] = mids;
            stack.push([a, m2, m1]);
            stack.push([m2, b, m0]);
            stack.push([m1, m0, c]);
            stack.push([m0, m1, m2]);
        }
        Ok(local)
    }

    fn midpoint_vertex(
        &mut self,
        skeleton: &TriangleSkeleton,
        t: TriId,
        (x, y): Xy,
        ends: [u32; 2],
    ) -> Result<u32, ChunkError> {
        let [a, b] = ends.map(|v| self.vertices[v as usize].position());
        let dir = (a + b).normalize();

        let Some((side, p)) = self.layout.border_position(x, y) else {
            let record = self.record(t);
            let id = record.data_vertex + self.layout.ringed_index(x, y) - self.layout.shared_count();
            self.write_vertex(id, dir);
            return Ok(id);
        };

        let id = match self.shared_from_neighbour(skeleton, t, side, p) {
            Some(id) => {
                trace!("Triangle {t} side {side} position {p} shares vertex {id}");
                id
            }
            None => {
                let id = self.alloc_shared()?;
                self.write_vertex(id, dir);
                self.mark_vertex(id);
                id
            }
        };
        self.shared.add_user(id);
        Ok(id)
    }

    /// Find an existing shared vertex at position `p` along `side` of `t` in
    /// a neighbouring chunk.
    ///
    /// Looks in the linked coarser or equal chunk first. Otherwise searches
    /// finer chunks below a same-depth neighbour, halving the edge parameter
    /// at each level.
    pub(crate) fn shared_from_neighbour(
        &self,
        skeleton: &TriangleSkeleton,
        t: TriId,
        side: u8,
        p: u32,
    ) -> Option<u32> {
        let edge = self.layout.edge();
        let b = edge as f32;
        let record = self.record(t);
        let tri = skeleton.triangle(t);
        let nb_side = tri.neighbour_sides[side as usize];

        let target = record.neighbour_chunked[side as usize];
        if target != INVALID_TRI {
            let q = record.side_transforms[side as usize].apply(p as f32 / b) * b;
            let k = grid_point(q, edge)?;
            return Some(self.ring_vertex(target, self.layout.ring_position(nb_side, k)));
        }

        let nb_id = tri.neighbours[side as usize];
        let nb = skeleton.triangle(nb_id);
        if nb.depth != tri.depth || self.record(nb_id).descendant_chunked == 0 {
            return None;
        }

        let mut stack = vec![(nb_id, 1.0 - p as f32 / b)];
        while let Some((d, u)) = stack.pop() {
            let record = self.record(d);
            if record.is_chunked() {
                if let Some(k) = grid_point(u * b, edge) {
                    return Some(self.ring_vertex(d, self.layout.ring_position(nb_side, k)));
                }
                continue;
            }
            let node = skeleton.triangle(d);
            if !node.subdivided || record.descendant_chunked == 0 {
                continue;
            }
            let [first, second] = node.children_along(nb_side);
            let tolerance = GRID_EPSILON / b;
            if u <= 0.5 + tolerance {
                stack.push((first, u * 2.0));
            }
            if u >= 0.5 - tolerance {
                stack.push((second, u * 2.0 - 1.0));
            }
        }
        None
    }

    fn alloc_shared(&mut self) -> Result<u32, ChunkError> {
        self.shared.alloc().ok_or(ChunkError::CapacityExceeded {
            pool: Pool::SharedVertices,
            capacity: self.shared.capacity(),
        })
    }

    /// Place vertex `id` along unit direction `dir`, displaced by the height
    /// function.
    fn write_vertex(&mut self, id: u32, dir: Vec3) {
        let height = (self.height)(dir);
        self.vertices[id as usize] = ChunkVertex::new(dir * (self.radius + height), dir);
    }

    fn write_indices(&mut self, t: TriId, local: &[u32]) {
        let record = self.record(t);
        let (base, interior) = (record.data_index as usize, record.data_vertex);
        let count = self.layout.index_count();
        for (offset, &flat) in self.layout.pattern().iter().enumerate() {
            self.indices[base + offset] = local[flat as usize];
        }
        self.index_updates.mark(base as u32, count, INDEX_SIZE);
        self.vertex_updates
            .mark(interior, self.layout.interior_count(), CHUNK_VERTEX_SIZE);
    }

    /// Point descendants at `t` as their chunked ancestor and take a use
    /// count on `t` and every ancestor.
    fn track_ancestry(&mut self, skeleton: &mut TriangleSkeleton, t: TriId) -> Result<(), ChunkError> {
        let tri = skeleton.triangle(t);
        if tri.subdivided {
            let mut stack: Vec<TriId> = (tri.children..tri.children + 4).collect();
            while let Some(d) = stack.pop() {
                self.record_mut(d).ancestor_chunked = t;
                let node = skeleton.triangle(d);
                if node.subdivided {
                    stack.extend(node.children..node.children + 4);
                }
            }
        }

        let mut cur = skeleton.triangle(t).parent;
        while cur != INVALID_TRI {
            self.record_mut(cur).descendant_chunked += 1;
            skeleton.increment_use_count(cur)?;
            cur = skeleton.triangle(cur).parent;
        }
        skeleton.increment_use_count(t)?;
        Ok(())
    }

    /// Move the intermediate vertices on `side` of chunk `d` onto the
    /// straight segments of the coarser chunk linked on that side.
    pub(crate) fn snap_seam(&mut self, skeleton: &TriangleSkeleton, d: TriId, side: u8) {
        let record = self.record(d);
        let target = record.neighbour_chunked[side as usize];
        if target == INVALID_TRI {
            return;
        }
        let transform = record.side_transforms[side as usize];
        let target_side = skeleton.triangle(d).neighbour_sides[side as usize];
        let edge = self.layout.edge();
        let b = edge as f32;

        let mut snapped = 0;
        for p in 1..edge {
            let q = transform.apply(p as f32 / b) * b;
            if grid_point(q, edge).is_some() {
                continue;
            }
            let k0 = (q.floor().max(0.0) as u32).min(edge - 1);
            let frac = q - k0 as f32;
            let [start, end] = [k0, k0 + 1].map(|k| {
                let id = self.ring_vertex(target, self.layout.ring_position(target_side, k));
                self.vertices[id as usize]
            });

            let id = self.ring_vertex(d, self.layout.ring_position(side, p));
            self.vertices[id as usize] = ChunkVertex::new(
                start.position().lerp(end.position(), frac),
                start.normal().lerp(end.normal(), frac).normalize(),
            );
            self.mark_vertex(id);
            snapped += 1;
        }
        trace!("Snapped {snapped} vertices on triangle {d} side {side} to chunk {target}");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use planeta_skeleton::SkeletonConfig;

    use super::*;
    use crate::ChunkConfig;

    const RADIUS: f32 = 100.0;

    fn setup(config: ChunkConfig) -> (Rc<RefCell<TriangleSkeleton>>, ChunkedLodMesh) {
        let sk = Rc::new(RefCell::new(
            TriangleSkeleton::with_config(SkeletonConfig {
                radius: RADIUS,
                max_vertices: 2048,
                max_triangles: 1024,
                max_depth: 6,
            })
            .unwrap(),
        ));
        let mesh = ChunkedLodMesh::new(Rc::clone(&sk), config).unwrap();
        (sk, mesh)
    }

    fn position_at(mesh: &ChunkedLodMesh, t: TriId, side: u8, p: u32) -> Vec3 {
        let id = mesh.ring_vertex(t, mesh.layout().ring_position(side, p));
        mesh.vertex_buffer()[id as usize].position()
    }

    #[test]
    fn test_single_chunk_vertices_on_sphere() {
        let (_sk, mut mesh) = setup(ChunkConfig::default());
        mesh.chunk_add(0).unwrap();

        assert_eq!(mesh.chunk_count(), 1);
        assert_eq!(mesh.calc_index_count(), 192);
        assert_eq!(mesh.chunk_to_triangle(0), Some(0));
        for &id in &mesh.index_buffer()[..192] {
            let v = mesh.vertex_buffer()[id as usize];
            assert!((v.position().length() - RADIUS).abs() < 1e-2);
            assert!((v.normal().length() - 1.0).abs() < 1e-4);
        }
        assert_eq!(mesh.stats().shared_in_use, 24);
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_chunk_triangles_wound_outward() {
        let (_sk, mut mesh) = setup(ChunkConfig::default());
        for t in 0..20 {
            mesh.chunk_add(t).unwrap();
        }
        let count = mesh.calc_index_count() as usize;
        assert_eq!(count, 20 * 192);
        for tri in mesh.index_buffer()[..count].chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|id| mesh.vertex_buffer()[id as usize].position());
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a + b + c) > 0.0, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn test_chunk_add_is_idempotent() {
        let (_sk, mut mesh) = setup(ChunkConfig::default());
        mesh.chunk_add(3).unwrap();
        let record = mesh.triangle_chunk(3).cloned();
        let shared = mesh.stats().shared_in_use;
        mesh.take_index_updates();

        mesh.chunk_add(3).unwrap();
        assert_eq!(mesh.chunk_count(), 1);
        assert_eq!(mesh.triangle_chunk(3).cloned(), record);
        assert_eq!(mesh.stats().shared_in_use, shared);
        assert!(mesh.take_index_updates().is_empty());
    }

    #[test]
    fn test_equal_depth_neighbours_share_edge() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        let nb = sk.borrow().triangle(0).neighbours[0];
        let nb_side = sk.borrow().triangle(0).neighbour_sides[0];
        mesh.chunk_add(0).unwrap();
        mesh.chunk_add(nb).unwrap();

        // 9 vertices along the common edge are shared.
        assert_eq!(mesh.stats().shared_in_use, 24 + 24 - 9);
        for p in 0..=8 {
            let mine = mesh.ring_vertex(0, mesh.layout().ring_position(0, p));
            let theirs = mesh.ring_vertex(nb, mesh.layout().ring_position(nb_side, 8 - p));
            assert_eq!(mine, theirs);
            assert_eq!(mesh.shared_users(mine), 2);
        }
        assert_eq!(mesh.triangle_chunk(0).unwrap().neighbour_chunked[0], nb);
        assert_eq!(
            mesh.triangle_chunk(nb).unwrap().neighbour_chunked[nb_side as usize],
            0
        );
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_chunks_meeting_at_a_corner_share_it() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        // Faces 0 and 2 touch only at the north pole.
        mesh.chunk_add(0).unwrap();
        mesh.chunk_add(2).unwrap();
        let pole = sk.borrow().triangle(0).corners[0];
        assert_eq!(sk.borrow().triangle(2).corners[0], pole);
        let id = mesh.shared.corner(pole).unwrap();
        assert_eq!(mesh.shared_users(id), 2);
        assert_eq!(mesh.stats().shared_in_use, 47);
    }

    fn assert_stitched(sk: &Rc<RefCell<TriangleSkeleton>>, mesh: &ChunkedLodMesh, fine: TriId, side: u8) {
        let record = mesh.triangle_chunk(fine).unwrap().clone();
        let coarse = record.neighbour_chunked[side as usize];
        assert_ne!(coarse, INVALID_TRI);
        let coarse_side = sk.borrow().triangle(fine).neighbour_sides[side as usize];
        let transform = record.side_transforms[side as usize];

        for p in 1..8 {
            let q = transform.apply(p as f32 / 8.0) * 8.0;
            let v = position_at(mesh, fine, side, p);
            if let Some(k) = grid_point(q, 8) {
                let shared = mesh.ring_vertex(fine, mesh.layout().ring_position(side, p));
                let theirs = mesh.ring_vertex(coarse, mesh.layout().ring_position(coarse_side, k));
                assert_eq!(shared, theirs, "grid vertex {p} not shared");
            } else {
                let k0 = q.floor() as u32;
                let a = position_at(mesh, coarse, coarse_side, k0);
                let b = position_at(mesh, coarse, coarse_side, k0 + 1);
                let off_line = (v - a).cross(b - a).length() / (b - a).length();
                assert!(off_line < 1e-3, "vertex {p} is {off_line} off the coarse edge");
            }
        }
    }

    #[test]
    fn test_lod_stitch_coarse_first() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        let (b, b_side) = {
            let sk = sk.borrow();
            (sk.triangle(0).neighbours[0], sk.triangle(0).neighbour_sides[0])
        };
        mesh.chunk_add(0).unwrap();
        sk.borrow_mut().subdivide_add(b).unwrap();
        let [child, _] = sk.borrow().triangle(b).children_along(b_side);
        mesh.chunk_add(child).unwrap();

        assert_eq!(mesh.triangle_chunk(child).unwrap().neighbour_chunked[b_side as usize], 0);
        assert_stitched(&sk, &mesh, child, b_side);
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_lod_stitch_fine_first() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        let (b, b_side) = {
            let sk = sk.borrow();
            (sk.triangle(0).neighbours[0], sk.triangle(0).neighbour_sides[0])
        };
        sk.borrow_mut().subdivide_add(b).unwrap();
        let [_, child] = sk.borrow().triangle(b).children_along(b_side);
        mesh.chunk_add(child).unwrap();
        mesh.chunk_add(0).unwrap();

        assert_eq!(mesh.triangle_chunk(child).unwrap().neighbour_chunked[b_side as usize], 0);
        assert_stitched(&sk, &mesh, child, b_side);
        assert!(mesh.verify().is_empty());
    }

    #[test]
    fn test_two_level_difference_links_through_ancestor() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        let (b, b_side) = {
            let sk = sk.borrow();
            (sk.triangle(0).neighbours[0], sk.triangle(0).neighbour_sides[0])
        };
        mesh.chunk_add(0).unwrap();
        sk.borrow_mut().subdivide_add(b).unwrap();
        let [_, child] = sk.borrow().triangle(b).children_along(b_side);
        sk.borrow_mut().subdivide_add(child).unwrap();
        let [grandchild, _] = sk.borrow().triangle(child).children_along(b_side);
        mesh.chunk_add(grandchild).unwrap();

        let transform = mesh.triangle_chunk(grandchild).unwrap().side_transforms[b_side as usize];
        assert!((transform.scale.abs() - 0.25).abs() < 1e-6);
        assert_stitched(&sk, &mesh, grandchild, b_side);
    }

    #[test]
    fn test_overlapping_chunks_refused() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        sk.borrow_mut().subdivide_add(6).unwrap();
        let child = sk.borrow().triangle(6).children;
        mesh.chunk_add(6).unwrap();
        assert_eq!(mesh.chunk_add(child), Err(ChunkError::Overlapping { tri: child }));

        mesh.chunk_remove(6).unwrap();
        mesh.chunk_add(child).unwrap();
        assert_eq!(mesh.chunk_add(6), Err(ChunkError::Overlapping { tri: 6 }));
    }

    #[test]
    fn test_chunk_holds_use_counts_on_ancestors() {
        let (sk, mut mesh) = setup(ChunkConfig::default());
        sk.borrow_mut().subdivide_add(9).unwrap();
        let child = sk.borrow().triangle(9).children + 3;
        mesh.chunk_add(child).unwrap();

        assert_eq!(sk.borrow().triangle(9).use_count, 1);
        assert_eq!(sk.borrow().triangle(child).use_count, 1);
        assert_eq!(mesh.triangle_chunk(9).unwrap().descendant_chunked, 1);
        assert!(matches!(
            sk.borrow_mut().subdivide_remove(9),
            Err(planeta_skeleton::SkeletonError::InUse { tri, .. }) if tri == child
        ));

        mesh.chunk_remove(child).unwrap();
        assert_eq!(sk.borrow().triangle(9).use_count, 0);
        sk.borrow_mut().subdivide_remove(9).unwrap();
    }

    #[test]
    fn test_capacity_refusal_leaves_no_partial_state() {
        let (_sk, mut mesh) = setup(ChunkConfig {
            subdivision: 3,
            max_chunks: 1,
            max_shared_vertices: 64,
        });
        mesh.chunk_add(0).unwrap();
        let stats = mesh.stats();
        let err = mesh.chunk_add(10).unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(mesh.stats(), stats);
        assert!(!mesh.triangle_chunk(10).unwrap().is_chunked());
    }

    #[test]
    fn test_shared_pool_capacity_checked_up_front() {
        let (_sk, mut mesh) = setup(ChunkConfig {
            subdivision: 2,
            max_chunks: 8,
            max_shared_vertices: 20,
        });
        mesh.chunk_add(0).unwrap();
        assert_eq!(
            mesh.chunk_add(15),
            Err(ChunkError::CapacityExceeded {
                pool: Pool::SharedVertices,
                capacity: 20
            })
        );
        assert_eq!(mesh.chunk_count(), 1);
    }

    #[test]
    fn test_height_function_displaces_vertices() {
        let (_sk, mut mesh) = setup(ChunkConfig::default());
        mesh.set_height_fn(Box::new(|dir: Vec3| if dir.z > 0.0 { 2.0 } else { 1.0 }));
        mesh.chunk_add(0).unwrap();
        for &id in &mesh.index_buffer()[..192] {
            let v = mesh.vertex_buffer()[id as usize];
            let expected = RADIUS + if v.normal().z > 0.0 { 2.0 } else { 1.0 };
            assert!((v.position().length() - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn test_add_records_dirty_ranges() {
        let (_sk, mut mesh) = setup(ChunkConfig::default());
        mesh.chunk_add(0).unwrap();
        let index_updates = mesh.take_index_updates();
        assert_eq!(index_updates.len(), 1);
        assert_eq!(index_updates[0].len(), 192 * INDEX_SIZE);
        assert!(!mesh.take_vertex_updates().is_empty());
        assert!(mesh.take_vertex_updates().is_empty());
    }
}
