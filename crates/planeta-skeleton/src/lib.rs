//! Hierarchical triangle skeleton over an icosahedron.
//!
//! The skeleton owns a flat position + normal vertex buffer and a dense array
//! of [`SubTriangle`] records. Triangles are subdivided into groups of four and
//! merged back, keeping a bidirectional neighbour graph crack-free across
//! shared edges. Topology edits are reported in batches to registered
//! [`SkeletonListener`]s.

mod error;
mod icosahedron;
mod listener;
mod skeleton;
mod types;
mod verify;

pub use error::{Pool, SkeletonError};
pub use icosahedron::{
    ICOSAHEDRON_FACE_COUNT, ICOSAHEDRON_VERTEX_COUNT, ICO_TEMPLATE_NEIGHBOURS, ICO_TEMPLATE_TRIS,
    icosahedron_edge_length, icosahedron_vertices,
};
pub use listener::{ChangeLog, ListenerId, SkeletonChanges, SkeletonListener};
pub use skeleton::{SkeletonConfig, TriangleSkeleton};
pub use types::{
    INVALID_TRI, INVALID_VRTX, SideTransform, SiblingRole, SkeletonVertex, SubTriangle, TriId,
    VrtxId,
};
pub use verify::InvariantViolation;
