//! Per-triangle chunk state kept parallel to the skeleton triangle array.

use planeta_skeleton::{INVALID_TRI, SideTransform, TriId};

/// Index of a chunk slot in the index buffer.
pub type ChunkId = u32;

/// Marks a triangle without a chunk.
pub const INVALID_CHUNK: ChunkId = u32::MAX;

/// Chunk bookkeeping for one skeleton triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct SubTriangleChunk {
    /// Chunk slot, or [`INVALID_CHUNK`].
    pub chunk: ChunkId,
    /// Number of chunked triangles below this one.
    pub descendant_chunked: u32,
    /// Nearest chunked ancestor, or [`INVALID_TRI`].
    pub ancestor_chunked: TriId,
    /// First index of this chunk's slice of the index buffer.
    pub data_index: u32,
    /// First vertex of this chunk's interior block.
    pub data_vertex: u32,
    /// Per side, the chunked triangle of equal or lower depth owning the
    /// opposite edge.
    pub neighbour_chunked: [TriId; 3],
    /// Per side, maps this edge's parameter onto the edge parameter of
    /// `neighbour_chunked`.
    pub side_transforms: [SideTransform; 3],
}

impl Default for SubTriangleChunk {
    fn default() -> Self {
        Self {
            chunk: INVALID_CHUNK,
            descendant_chunked: 0,
            ancestor_chunked: INVALID_TRI,
            data_index: 0,
            data_vertex: 0,
            neighbour_chunked: [INVALID_TRI; 3],
            side_transforms: [SideTransform::IDENTITY; 3],
        }
    }
}

impl SubTriangleChunk {
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        self.chunk != INVALID_CHUNK
    }

    /// Drop the link on `side`.
    pub(crate) fn unlink(&mut self, side: u8) {
        self.neighbour_chunked[side as usize] = INVALID_TRI;
        self.side_transforms[side as usize] = SideTransform::IDENTITY;
    }

    pub(crate) fn link(&mut self, side: u8, target: TriId, transform: SideTransform) {
        self.neighbour_chunked[side as usize] = target;
        self.side_transforms[side as usize] = transform;
    }
}
