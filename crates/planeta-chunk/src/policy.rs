//! Distance-based LOD policy.

use glam::Vec3;
use planeta_skeleton::{SubTriangle, TriId, icosahedron_edge_length};

use crate::record::SubTriangleChunk;
use crate::update::{UpdateAction, UpdatePolicy};

/// Subdivides triangles that look large from the viewer, chunks the rest.
///
/// A triangle's apparent size is its edge length divided by its distance
/// from the viewer. Edge length halves with every level of depth.
#[derive(Clone, Debug, PartialEq)]
pub struct DistancePolicy {
    pub viewer: Vec3,
    pub radius: f32,
    /// Apparent size above which a triangle is subdivided.
    pub subdivide_threshold: f32,
    pub max_depth: u8,
}

impl DistancePolicy {
    #[must_use]
    pub fn new(radius: f32, subdivide_threshold: f32, max_depth: u8) -> Self {
        Self {
            viewer: Vec3::ZERO,
            radius,
            subdivide_threshold,
            max_depth,
        }
    }

    /// Edge length divided by distance from the viewer.
    #[must_use]
    pub fn apparent_size(&self, tri: &SubTriangle) -> f32 {
        let edge = icosahedron_edge_length(self.radius) / (1u32 << tri.depth) as f32;
        let distance = self.viewer.distance(tri.center).max(f32::EPSILON);
        edge / distance
    }
}

impl UpdatePolicy for DistancePolicy {
    fn decide(&mut self, tri: &SubTriangle, chunk: &SubTriangleChunk, _id: TriId) -> UpdateAction {
        if tri.depth < self.max_depth && self.apparent_size(tri) > self.subdivide_threshold {
            UpdateAction::Subdivide
        } else if chunk.is_chunked() {
            UpdateAction::Nothing
        } else {
            UpdateAction::Chunk
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use planeta_skeleton::{SkeletonConfig, TriangleSkeleton};

    use super::*;
    use crate::{ChunkConfig, ChunkedLodMesh};

    #[test]
    fn test_size_halves_per_level() {
        let policy = DistancePolicy::new(1.0, 0.5, 8);
        let tri = SubTriangle {
            center: Vec3::new(0.0, 0.0, 2.0),
            ..SubTriangle::default()
        };
        let deeper = SubTriangle { depth: 1, ..tri.clone() };
        let ratio = policy.apparent_size(&tri) / policy.apparent_size(&deeper);
        assert!((ratio - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_decisions() {
        let mut policy = DistancePolicy::new(1.0, 0.5, 2);
        policy.viewer = Vec3::new(0.0, 0.0, 1.5);
        let near = SubTriangle {
            center: Vec3::new(0.0, 0.0, 1.0),
            ..SubTriangle::default()
        };
        let far = SubTriangle {
            center: Vec3::new(0.0, 0.0, -1.0),
            ..SubTriangle::default()
        };
        let unchunked = SubTriangleChunk::default();
        assert_eq!(policy.decide(&near, &unchunked, 0), UpdateAction::Subdivide);
        assert_eq!(policy.decide(&far, &unchunked, 1), UpdateAction::Chunk);

        let at_limit = SubTriangle { depth: 2, ..near };
        assert_eq!(policy.decide(&at_limit, &unchunked, 2), UpdateAction::Chunk);
        let chunked = SubTriangleChunk {
            chunk: 0,
            ..SubTriangleChunk::default()
        };
        assert_eq!(policy.decide(&far, &chunked, 1), UpdateAction::Nothing);
    }

    fn planet() -> (Rc<RefCell<TriangleSkeleton>>, ChunkedLodMesh) {
        let sk = Rc::new(RefCell::new(
            TriangleSkeleton::with_config(SkeletonConfig {
                radius: 100.0,
                max_vertices: 8192,
                max_triangles: 4096,
                max_depth: 6,
            })
            .unwrap(),
        ));
        let mesh = ChunkedLodMesh::new(
            Rc::clone(&sk),
            ChunkConfig {
                subdivision: 2,
                max_chunks: 512,
                max_shared_vertices: 8192,
            },
        )
        .unwrap();
        (sk, mesh)
    }

    #[test]
    fn test_approach_refines_near_viewer() {
        let (sk, mut mesh) = planet();
        let mut policy = DistancePolicy::new(100.0, 1.0, 4);

        for altitude in [400.0, 150.0, 105.0] {
            policy.viewer = Vec3::new(0.0, 0.0, altitude);
            mesh.chunk_geometry_update_all(&mut policy);
            assert!(mesh.verify().is_empty(), "{:?}", mesh.verify());
            assert!(sk.borrow().verify().is_empty());
        }

        // Every root is covered by exactly one chunk somewhere in its subtree.
        let sk = sk.borrow();
        for root in 0..20 {
            let record = mesh.triangle_chunk(root).unwrap();
            assert!(record.is_chunked() || record.descendant_chunked > 0);
        }
        let deepest = (0..sk.triangle_slots())
            .filter(|&t| mesh.triangle_chunk(t).is_some_and(SubTriangleChunk::is_chunked))
            .map(|t| sk.triangle(t).depth)
            .max();
        assert_eq!(deepest, Some(4));
    }

    #[test]
    fn test_receding_viewer_merges_skeleton() {
        let (sk, mut mesh) = planet();
        let mut policy = DistancePolicy::new(100.0, 1.0, 4);

        policy.viewer = Vec3::new(0.0, 0.0, 105.0);
        mesh.chunk_geometry_update_all(&mut policy);
        let near_triangles = sk.borrow().live_triangle_count();
        assert!(near_triangles > 20);

        policy.viewer = Vec3::new(0.0, 0.0, 400.0);
        let stats = mesh.chunk_geometry_update_all(&mut policy);
        assert!(stats.merged > 0);
        assert_eq!(stats.subdivided, 0);
        assert_eq!(mesh.chunk_count(), 20);
        assert!(mesh.verify().is_empty(), "{:?}", mesh.verify());

        let sk = sk.borrow();
        assert!(sk.verify().is_empty());
        assert_eq!(sk.live_triangle_count(), 20);
        assert_eq!(sk.live_vertex_count(), 12);
    }
}
