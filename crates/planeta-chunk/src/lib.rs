//! Chunked LOD mesh over a [`planeta_skeleton::TriangleSkeleton`].
//!
//! A chunk is a fixed-resolution triangle grid covering one skeleton
//! triangle. Neighbouring chunks share their border vertices through a
//! reference-counted pool, and the border of a finer chunk is snapped onto
//! the edge of a coarser neighbour so no cracks open between levels of
//! detail. [`ChunkedLodMesh::chunk_geometry_update_all`] drives subdivision
//! and chunking from an [`UpdatePolicy`].

mod build;
mod error;
mod layout;
mod mesh;
mod policy;
mod record;
mod remove;
mod shared;
mod update;
mod verify;
mod vertex;

pub use error::ChunkError;
pub use layout::ChunkLayout;
pub use mesh::{ChunkConfig, ChunkedLodMesh, HeightFn, MeshStats};
pub use policy::DistancePolicy;
pub use record::{ChunkId, INVALID_CHUNK, SubTriangleChunk};
pub use update::{UpdateAction, UpdatePolicy, UpdateStats};
pub use verify::ChunkInvariantViolation;
pub use vertex::{CHUNK_VERTEX_SIZE, ChunkVertex, INDEX_SIZE, UpdateRange};
