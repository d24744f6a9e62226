//! Bookkeeping self-check for the chunk builder.

use planeta_skeleton::{INVALID_TRI, TriId};
use tracing::warn;

use crate::record::ChunkId;
use crate::ChunkedLodMesh;

/// A broken bookkeeping invariant found by [`ChunkedLodMesh::verify`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChunkInvariantViolation {
    #[error("shared vertex {vertex}: tracks {tracked} users, {counted} chunks reference it")]
    SharedUsersMismatch { vertex: u32, tracked: u16, counted: u32 },

    #[error("chunk slot {slot} and triangle {tri} disagree about each other")]
    SlotMismatch { slot: ChunkId, tri: TriId },

    #[error("triangle {tri}: chunked together with an ancestor or descendant")]
    OverlappingChunk { tri: TriId },
}

impl ChunkedLodMesh {
    /// Recount shared vertex users from the index data of live chunks and
    /// cross-check slot ownership and chunk overlap.
    ///
    /// Reads state as of the last mutating call. Each violation is also
    /// logged.
    #[must_use]
    pub fn verify(&self) -> Vec<ChunkInvariantViolation> {
        let mut found = Vec::new();
        let mut counted = vec![0u32; self.shared.slots() as usize];

        for (slot, &t) in self.chunk_to_tri.iter().enumerate() {
            let slot = slot as ChunkId;
            if t == INVALID_TRI {
                continue;
            }
            let record = self.record(t);
            if record.chunk != slot
                || slot >= self.chunk_count
                || record.data_index != slot * self.layout.index_count()
            {
                found.push(ChunkInvariantViolation::SlotMismatch { slot, tri: t });
                continue;
            }
            for ring in 0..self.layout.shared_count() {
                if let Some(count) = counted.get_mut(self.ring_vertex(t, ring) as usize) {
                    *count += 1;
                }
            }
        }

        for (t, record) in self.records.iter().enumerate() {
            let t = t as TriId;
            if !record.is_chunked() {
                continue;
            }
            if self.chunk_to_tri.get(record.chunk as usize) != Some(&t) {
                found.push(ChunkInvariantViolation::SlotMismatch {
                    slot: record.chunk,
                    tri: t,
                });
            }
            if record.ancestor_chunked != INVALID_TRI || record.descendant_chunked > 0 {
                found.push(ChunkInvariantViolation::OverlappingChunk { tri: t });
            }
        }

        for (vertex, &count) in counted.iter().enumerate() {
            let tracked = self.shared.users(vertex as u32);
            if u32::from(tracked) != count {
                found.push(ChunkInvariantViolation::SharedUsersMismatch {
                    vertex: vertex as u32,
                    tracked,
                    counted: count,
                });
            }
        }

        for violation in &found {
            warn!("Chunk invariant violated: {violation}");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use planeta_skeleton::TriangleSkeleton;

    use super::*;
    use crate::ChunkConfig;

    fn setup() -> (Rc<RefCell<TriangleSkeleton>>, ChunkedLodMesh) {
        let sk = Rc::new(RefCell::new(TriangleSkeleton::new(20.0)));
        let mesh = ChunkedLodMesh::new(Rc::clone(&sk), ChunkConfig::default()).unwrap();
        (sk, mesh)
    }

    #[test]
    fn test_consistent_mesh_passes() {
        let (_sk, mut mesh) = setup();
        for t in 0..20 {
            mesh.chunk_add(t).unwrap();
        }
        assert!(mesh.verify().is_empty());
        // A closed surface of 20 chunks at 8 segments: 12 corners, 30 edges
        // with 7 inner points each.
        assert_eq!(mesh.stats().shared_in_use, 12 + 30 * 7);
    }

    #[test]
    fn test_detects_user_count_drift() {
        let (_sk, mut mesh) = setup();
        mesh.chunk_add(0).unwrap();
        let id = mesh.ring_vertex(0, 5);
        mesh.shared.add_user(id);

        let found = mesh.verify();
        assert_eq!(
            found,
            vec![ChunkInvariantViolation::SharedUsersMismatch {
                vertex: id,
                tracked: 2,
                counted: 1
            }]
        );
    }

    #[test]
    fn test_detects_slot_and_overlap_errors() {
        let (_sk, mut mesh) = setup();
        mesh.chunk_add(3).unwrap();
        mesh.chunk_to_tri[0] = 7;
        mesh.record_mut(3).ancestor_chunked = 1;

        let found = mesh.verify();
        assert!(found.contains(&ChunkInvariantViolation::SlotMismatch { slot: 0, tri: 7 }));
        assert!(found.contains(&ChunkInvariantViolation::SlotMismatch { slot: 0, tri: 3 }));
        assert!(found.contains(&ChunkInvariantViolation::OverlappingChunk { tri: 3 }));
    }
}
