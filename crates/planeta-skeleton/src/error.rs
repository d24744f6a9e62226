//! Skeleton error types.

use std::fmt;

use crate::TriId;

/// A fixed-capacity pool that can run out of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pool {
    /// Skeleton triangle records.
    Triangles,
    /// Skeleton position + normal vertices.
    Vertices,
    /// Chunk slots in a chunk builder.
    Chunks,
    /// Per-chunk interior vertex blocks.
    ChunkVertices,
    /// Chunk-border shared vertices.
    SharedVertices,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pool::Triangles => "triangle",
            Pool::Vertices => "vertex",
            Pool::Chunks => "chunk",
            Pool::ChunkVertices => "chunk vertex",
            Pool::SharedVertices => "shared vertex",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`crate::TriangleSkeleton`] operations.
///
/// None of these are retried internally. Capacity errors mean the caller
/// should back off; the others mean the requested transition is invalid for
/// the current topology.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SkeletonError {
    /// A fixed-capacity pool has no free slots left.
    #[error("{pool} pool exhausted (capacity {capacity})")]
    CapacityExceeded {
        /// Which pool ran out.
        pool: Pool,
        /// Configured size of that pool.
        capacity: u32,
    },

    /// Subdividing would exceed the configured maximum depth.
    #[error("triangle {tri} is at the maximum subdivision depth {max_depth}")]
    DepthLimit {
        /// Triangle that was asked to subdivide.
        tri: TriId,
        /// Configured depth limit.
        max_depth: u8,
    },

    /// The triangle already has children.
    #[error("triangle {0} is already subdivided")]
    AlreadySubdivided(TriId),

    /// The triangle has no children to remove.
    #[error("triangle {0} is not subdivided")]
    NotSubdivided(TriId),

    /// A chunk depends on a child of the triangle being merged, or on one of
    /// that child's descendants.
    #[error("triangle {tri} is in use (use count {use_count})")]
    InUse {
        /// The child holding the use count.
        tri: TriId,
        /// Current use count.
        use_count: u32,
    },

    /// At least one child is itself subdivided; merge leaves first.
    #[error("triangle {0} has a subdivided child")]
    ChildSubdivided(TriId),

    /// The id is out of range or refers to a deleted triangle.
    #[error("triangle {0} does not exist")]
    InvalidTriangle(TriId),

    /// The configuration cannot hold the base icosahedron.
    #[error("invalid skeleton config: {0}")]
    InvalidConfig(String),
}

impl SkeletonError {
    /// Whether this error means a pool is full.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            SkeletonError::CapacityExceeded { .. } | SkeletonError::DepthLimit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_pool() {
        let err = SkeletonError::CapacityExceeded {
            pool: Pool::Vertices,
            capacity: 512,
        };
        assert_eq!(err.to_string(), "vertex pool exhausted (capacity 512)");
        assert!(err.is_capacity());
    }

    #[test]
    fn test_transition_errors_are_not_capacity() {
        assert!(!SkeletonError::NotSubdivided(3).is_capacity());
        assert!(!SkeletonError::ChildSubdivided(3).is_capacity());
        assert!(!SkeletonError::InUse { tri: 3, use_count: 1 }.is_capacity());
    }
}
