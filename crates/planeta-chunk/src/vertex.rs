//! Chunk vertex format and dirty-range tracking for partial uploads.

use std::mem;

use glam::Vec3;

/// One vertex of the chunk vertex buffer.
///
/// The layout matches the skeleton vertex so both buffers can share a
/// pipeline vertex layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ChunkVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

static_assertions::assert_eq_size!(ChunkVertex, [f32; 6]);
static_assertions::assert_eq_size!(ChunkVertex, planeta_skeleton::SkeletonVertex);

/// Size of one [`ChunkVertex`] in bytes.
pub const CHUNK_VERTEX_SIZE: u64 = mem::size_of::<ChunkVertex>() as u64;

/// Size of one index in bytes.
pub const INDEX_SIZE: u64 = mem::size_of::<u32>() as u64;

impl ChunkVertex {
    #[must_use]
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// A half-open byte range of a buffer that changed since the last drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateRange {
    pub start: u64,
    pub end: u64,
}

impl UpdateRange {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Pending byte ranges for one buffer. Consecutive pushes that touch or
/// overlap the previous range are merged into it.
#[derive(Clone, Debug, Default)]
pub(crate) struct DirtyRanges {
    ranges: Vec<UpdateRange>,
}

impl DirtyRanges {
    /// Mark `count` elements of `stride` bytes starting at element `first`.
    pub(crate) fn mark(&mut self, first: u32, count: u32, stride: u64) {
        if count == 0 {
            return;
        }
        let start = u64::from(first) * stride;
        let end = start + u64::from(count) * stride;
        if let Some(last) = self.ranges.last_mut() {
            if start <= last.end && end >= last.start {
                last.start = last.start.min(start);
                last.end = last.end.max(end);
                return;
            }
        }
        self.ranges.push(UpdateRange { start, end });
    }

    pub(crate) fn take(&mut self) -> Vec<UpdateRange> {
        mem::take(&mut self.ranges)
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[UpdateRange] {
        &self.ranges
    }
}
