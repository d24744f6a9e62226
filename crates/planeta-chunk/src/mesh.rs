//! The chunk builder: storage, configuration, and skeleton synchronisation.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;
use planeta_skeleton::{ChangeLog, INVALID_TRI, ListenerId, TriId, TriangleSkeleton};
use tracing::{debug, info};

use crate::layout::ChunkLayout;
use crate::record::{ChunkId, SubTriangleChunk};
use crate::shared::SharedVertexPool;
use crate::vertex::{ChunkVertex, DirtyRanges, UpdateRange};
use crate::ChunkError;

/// Displacement added to the radius for a unit direction.
pub type HeightFn = Box<dyn Fn(Vec3) -> f32>;

/// Resolution and pool sizes for a [`ChunkedLodMesh`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Chunks have `2^subdivision` segments per edge.
    pub subdivision: u8,
    /// Capacity of the chunk slot table and interior vertex blocks.
    pub max_chunks: u32,
    /// Capacity of the shared border vertex pool.
    pub max_shared_vertices: u32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            subdivision: 3,
            max_chunks: 64,
            max_shared_vertices: 4096,
        }
    }
}

impl ChunkConfig {
    /// Smallest exponent that leaves room for interior vertices.
    pub const MIN_SUBDIVISION: u8 = 2;
    pub const MAX_SUBDIVISION: u8 = 8;

    fn validate(&self) -> Result<(), ChunkError> {
        if !(Self::MIN_SUBDIVISION..=Self::MAX_SUBDIVISION).contains(&self.subdivision) {
            return Err(ChunkError::InvalidConfig(format!(
                "subdivision {} outside {}..={}",
                self.subdivision,
                Self::MIN_SUBDIVISION,
                Self::MAX_SUBDIVISION
            )));
        }
        if self.max_chunks == 0 {
            return Err(ChunkError::InvalidConfig("max_chunks must be nonzero".into()));
        }
        let ring = 3u32 << self.subdivision;
        if self.max_shared_vertices < ring {
            return Err(ChunkError::InvalidConfig(format!(
                "max_shared_vertices {} cannot hold one chunk border of {ring}",
                self.max_shared_vertices
            )));
        }
        let layout = ChunkLayout::new(self.subdivision);
        let vertices = self
            .max_chunks
            .checked_mul(layout.interior_count())
            .and_then(|interior| interior.checked_add(self.max_shared_vertices));
        let indices = self.max_chunks.checked_mul(layout.index_count());
        if vertices.is_none() || indices.is_none() {
            return Err(ChunkError::InvalidConfig(format!(
                "{} chunks at subdivision {} overflow the 32-bit buffers",
                self.max_chunks, self.subdivision
            )));
        }
        Ok(())
    }
}

/// Counters reported by [`ChunkedLodMesh::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Logical chunk count, live and pending-free slots.
    pub chunk_count: u32,
    pub live_chunks: u32,
    pub pending_free: u32,
    pub shared_in_use: u32,
    pub shared_capacity: u32,
    pub interior_blocks_in_use: u32,
}

impl fmt::Display for MeshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunks: {} live / {} slots ({} pending free), shared vertices: {}/{}",
            self.live_chunks,
            self.chunk_count,
            self.pending_free,
            self.shared_in_use,
            self.shared_capacity
        )
    }
}

/// Fixed-resolution mesh patches built over chosen skeleton triangles.
///
/// The vertex buffer is laid out as `[shared border vertices | interior
/// blocks]`; a shared vertex id is its buffer index. Each chunk slot owns
/// `layout().index_count()` consecutive indices. Removing a chunk leaves its
/// index data in place until [`ChunkedLodMesh::chunk_pack`] compacts the slot
/// table, so pack before drawing `calc_index_count()` indices.
pub struct ChunkedLodMesh {
    pub(crate) skeleton: Rc<RefCell<TriangleSkeleton>>,
    pub(crate) changes: ChangeLog,
    listener: ListenerId,
    pub(crate) config: ChunkConfig,
    pub(crate) layout: ChunkLayout,
    pub(crate) radius: f32,
    pub(crate) records: Vec<SubTriangleChunk>,
    pub(crate) chunk_to_tri: Vec<TriId>,
    pub(crate) chunk_count: u32,
    /// Removed slots whose index data is still in place.
    pub(crate) chunk_free: BTreeSet<ChunkId>,
    pub(crate) interior_free: Vec<u32>,
    pub(crate) interior_blocks: u32,
    pub(crate) shared: SharedVertexPool,
    pub(crate) vertices: Vec<ChunkVertex>,
    pub(crate) indices: Vec<u32>,
    pub(crate) vertex_updates: DirtyRanges,
    pub(crate) index_updates: DirtyRanges,
    pub(crate) height: HeightFn,
}

impl ChunkedLodMesh {
    /// Create a builder over `skeleton`, registering for its change batches.
    pub fn new(
        skeleton: Rc<RefCell<TriangleSkeleton>>,
        config: ChunkConfig,
    ) -> Result<Self, ChunkError> {
        config.validate()?;
        let layout = ChunkLayout::new(config.subdivision);

        let changes = ChangeLog::new();
        let (listener, radius, max_triangles, max_vertices) = {
            let mut sk = skeleton.borrow_mut();
            let listener = sk.add_listener(Box::new(changes.clone()));
            let sk_config = sk.config();
            (
                listener,
                sk_config.radius,
                sk_config.max_triangles,
                sk_config.max_vertices,
            )
        };

        let vertex_capacity =
            config.max_shared_vertices as usize + (config.max_chunks * layout.interior_count()) as usize;
        let index_capacity = (config.max_chunks * layout.index_count()) as usize;

        debug!(
            "Chunk builder created: subdivision {} ({} segments per edge), {} chunks, {} shared vertices",
            layout.subdivision(),
            layout.edge(),
            config.max_chunks,
            config.max_shared_vertices
        );

        Ok(Self {
            changes,
            listener,
            radius,
            records: vec![SubTriangleChunk::default(); max_triangles as usize],
            chunk_to_tri: vec![INVALID_TRI; config.max_chunks as usize],
            chunk_count: 0,
            chunk_free: BTreeSet::new(),
            interior_free: Vec::new(),
            interior_blocks: 0,
            shared: SharedVertexPool::new(config.max_shared_vertices, max_vertices),
            vertices: vec![ChunkVertex::default(); vertex_capacity],
            indices: vec![0; index_capacity],
            vertex_updates: DirtyRanges::default(),
            index_updates: DirtyRanges::default(),
            height: Box::new(|_| 0.0),
            skeleton,
            config,
            layout,
        })
    }

    /// Replace the terrain height function. Affects chunks built afterwards.
    pub fn set_height_fn(&mut self, height: HeightFn) {
        self.height = height;
    }

    // --- Accessors ---

    #[must_use]
    pub fn skeleton(&self) -> &Rc<RefCell<TriangleSkeleton>> {
        &self.skeleton
    }

    #[must_use]
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// The whole vertex buffer, `[shared | interior blocks]`.
    #[must_use]
    pub fn vertex_buffer(&self) -> &[ChunkVertex] {
        &self.vertices
    }

    /// The whole index buffer; only the first `calc_index_count()` entries
    /// are meaningful after packing.
    #[must_use]
    pub fn index_buffer(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Logical chunk count, including slots removed but not yet packed.
    #[must_use]
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Number of indices to draw.
    #[must_use]
    pub fn calc_index_count(&self) -> u32 {
        self.chunk_count * self.layout.index_count()
    }

    /// Chunk record of triangle `t`, as of the last mutating call.
    #[must_use]
    pub fn triangle_chunk(&self, t: TriId) -> Option<&SubTriangleChunk> {
        self.records.get(t as usize)
    }

    /// Triangle owning chunk slot `chunk`, or `None` for free slots.
    #[must_use]
    pub fn chunk_to_triangle(&self, chunk: ChunkId) -> Option<TriId> {
        self.chunk_to_tri
            .get(chunk as usize)
            .copied()
            .filter(|&t| t != INVALID_TRI)
    }

    /// Chunks currently referencing shared vertex `id`.
    #[must_use]
    pub fn shared_users(&self, id: u32) -> u16 {
        self.shared.users(id)
    }

    /// Drain the vertex buffer byte ranges changed since the last drain.
    pub fn take_vertex_updates(&mut self) -> Vec<UpdateRange> {
        self.vertex_updates.take()
    }

    /// Drain the index buffer byte ranges changed since the last drain.
    pub fn take_index_updates(&mut self) -> Vec<UpdateRange> {
        self.index_updates.take()
    }

    #[must_use]
    pub fn stats(&self) -> MeshStats {
        MeshStats {
            chunk_count: self.chunk_count,
            live_chunks: self.chunk_count - self.chunk_free.len() as u32,
            pending_free: self.chunk_free.len() as u32,
            shared_in_use: self.shared.in_use(),
            shared_capacity: self.shared.capacity(),
            interior_blocks_in_use: self.interior_blocks - self.interior_free.len() as u32,
        }
    }

    /// Log pool usage of this builder and its skeleton.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!("{stats}");
        if let Ok(sk) = self.skeleton.try_borrow() {
            info!(
                "skeleton: {} vertices ({} slots), {} triangles ({} slots)",
                sk.live_vertex_count(),
                sk.vertex_slots(),
                sk.live_triangle_count(),
                sk.triangle_slots()
            );
        }
    }

    // --- Skeleton synchronisation ---

    /// Flush the skeleton's pending changes and fold them into chunk records.
    pub(crate) fn sync_skeleton(&mut self, skeleton: &mut TriangleSkeleton) {
        skeleton.notify();
        let changes = self.changes.take();
        if changes.is_empty() {
            return;
        }

        for &t in &changes.triangles_removed {
            if skeleton.get_triangle(t).is_none() {
                self.records[t as usize] = SubTriangleChunk::default();
            }
        }
        for &t in &changes.triangles_added {
            let Some(tri) = skeleton.get_triangle(t) else {
                continue;
            };
            let parent = &self.records[tri.parent as usize];
            let ancestor = if parent.is_chunked() {
                tri.parent
            } else {
                parent.ancestor_chunked
            };
            self.records[t as usize] = SubTriangleChunk {
                ancestor_chunked: ancestor,
                ..SubTriangleChunk::default()
            };
        }
        for &v in &changes.vertices_removed {
            self.shared.detach_corner(v);
        }
    }

    pub(crate) fn record(&self, t: TriId) -> &SubTriangleChunk {
        &self.records[t as usize]
    }

    pub(crate) fn record_mut(&mut self, t: TriId) -> &mut SubTriangleChunk {
        &mut self.records[t as usize]
    }

    /// Shared vertex id referenced by `t`'s chunk at ring number `ring`.
    pub(crate) fn ring_vertex(&self, t: TriId, ring: u32) -> u32 {
        let base = self.records[t as usize].data_index;
        self.indices[(base + self.layout.ind_to_shared(ring)) as usize]
    }

    pub(crate) fn mark_vertex(&mut self, id: u32) {
        self.vertex_updates
            .mark(id, 1, crate::vertex::CHUNK_VERTEX_SIZE);
    }
}

impl Drop for ChunkedLodMesh {
    fn drop(&mut self) {
        let Ok(mut sk) = self.skeleton.try_borrow_mut() else {
            return;
        };
        sk.remove_listener(self.listener);
        // Give back the use counts held by live chunks so the skeleton can
        // merge again.
        for &t in &self.chunk_to_tri {
            if t == INVALID_TRI {
                continue;
            }
            let mut cur = t;
            while cur != INVALID_TRI {
                if sk.decrement_use_count(cur).is_err() {
                    break;
                }
                cur = sk.triangle(cur).parent;
            }
        }
    }
}
