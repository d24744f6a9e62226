//! Chunk builder error types.

use planeta_skeleton::{Pool, SkeletonError, TriId};

/// Errors returned by [`crate::ChunkedLodMesh`] operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// A fixed-capacity pool cannot hold another chunk.
    #[error("{pool} pool exhausted (capacity {capacity})")]
    CapacityExceeded { pool: Pool, capacity: u32 },

    /// The triangle has a chunked ancestor or chunked descendants.
    #[error("triangle {tri} overlaps an existing chunk")]
    Overlapping { tri: TriId },

    /// The id is out of range or refers to a deleted triangle.
    #[error("triangle {0} does not exist")]
    InvalidTriangle(TriId),

    /// The configuration cannot describe a usable chunk builder.
    #[error("invalid chunk config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Skeleton(#[from] SkeletonError),
}

impl ChunkError {
    /// Whether this error means a pool is full and the caller should back off.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        match self {
            ChunkError::CapacityExceeded { .. } => true,
            ChunkError::Skeleton(err) => err.is_capacity(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_classification() {
        let full = ChunkError::CapacityExceeded {
            pool: Pool::SharedVertices,
            capacity: 64,
        };
        assert!(full.is_capacity());
        assert_eq!(full.to_string(), "shared vertex pool exhausted (capacity 64)");

        let skeleton: ChunkError = SkeletonError::CapacityExceeded {
            pool: Pool::Triangles,
            capacity: 256,
        }
        .into();
        assert!(skeleton.is_capacity());
        assert!(!ChunkError::Overlapping { tri: 4 }.is_capacity());
    }
}
