//! Core skeleton records: triangle nodes, vertices, and edge transforms.

use glam::Vec3;

/// Dense index of a triangle in the skeleton.
pub type TriId = u32;

/// Index of a vertex in the skeleton vertex buffer.
pub type VrtxId = u32;

/// Marks an absent triangle reference.
pub const INVALID_TRI: TriId = u32::MAX;

/// Marks an absent vertex reference.
pub const INVALID_VRTX: VrtxId = u32::MAX;

/// Position of a child within its group of four siblings.
///
/// Corner children share the parent's corner with the same index. `Center`
/// is built purely from the three edge midpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SiblingRole {
    #[default]
    Top = 0,
    Left = 1,
    Right = 2,
    Center = 3,
}

impl SiblingRole {
    /// All roles in child order.
    pub const ALL: [SiblingRole; 4] = [
        SiblingRole::Top,
        SiblingRole::Left,
        SiblingRole::Right,
        SiblingRole::Center,
    ];

    /// Offset of this child from the first child of the group.
    #[must_use]
    pub fn offset(self) -> u32 {
        self as u32
    }
}

/// One vertex of the skeleton buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkeletonVertex {
    /// Position on the sphere surface.
    pub position: [f32; 3],
    /// Unit outward normal.
    pub normal: [f32; 3],
}

static_assertions::assert_eq_size!(SkeletonVertex, [f32; 6]);

impl SkeletonVertex {
    /// Build a vertex on a sphere of `radius` along `normal`.
    #[must_use]
    pub fn on_sphere(normal: Vec3, radius: f32) -> Self {
        Self {
            position: (normal * radius).to_array(),
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

/// A triangle node of the skeleton.
///
/// Corners are ordered top, left, right. Side `i` is opposite corner `i` and
/// runs from corner `i + 1` to corner `i + 2` (mod 3); sides are bottom,
/// right, left. Neighbour `i` is the triangle across side `i`, which is never
/// deeper than this one.
#[derive(Clone, Debug, PartialEq)]
pub struct SubTriangle {
    /// Parent triangle, `INVALID_TRI` for the 20 roots.
    pub parent: TriId,
    /// Role within the sibling group.
    pub sibling: SiblingRole,
    /// Triangles across each side.
    pub neighbours: [TriId; 3],
    /// Which side of each neighbour faces back towards this triangle.
    pub neighbour_sides: [u8; 3],
    /// Top, left, right corner vertices.
    pub corners: [VrtxId; 3],
    /// Average of the three corner positions.
    pub center: Vec3,
    /// Subdivision depth, 0 for roots.
    pub depth: u8,
    pub subdivided: bool,
    pub deleted: bool,
    /// First of the 4 children, valid iff `subdivided`.
    pub children: TriId,
    /// Midpoints of sides bottom, right, left, valid iff `subdivided`.
    pub mid_vrtxs: [VrtxId; 3],
    /// Number of chunks that depend on this triangle or a descendant.
    pub use_count: u32,
}

impl Default for SubTriangle {
    fn default() -> Self {
        Self {
            parent: INVALID_TRI,
            sibling: SiblingRole::Top,
            neighbours: [INVALID_TRI; 3],
            neighbour_sides: [0; 3],
            corners: [INVALID_VRTX; 3],
            center: Vec3::ZERO,
            depth: 0,
            subdivided: false,
            deleted: false,
            children: INVALID_TRI,
            mid_vrtxs: [INVALID_VRTX; 3],
            use_count: 0,
        }
    }
}

impl SubTriangle {
    /// Child with the given role. Only meaningful when subdivided.
    #[must_use]
    pub fn child(&self, role: SiblingRole) -> TriId {
        self.children + role.offset()
    }

    /// The two children lying along `side`, ordered along the edge direction.
    #[must_use]
    pub fn children_along(&self, side: u8) -> [TriId; 2] {
        let side = u32::from(side);
        [
            self.children + (side + 1) % 3,
            self.children + (side + 2) % 3,
        ]
    }

    /// Corner vertices at the start and end of `side`.
    #[must_use]
    pub fn side_endpoints(&self, side: u8) -> [VrtxId; 2] {
        let side = usize::from(side);
        [self.corners[(side + 1) % 3], self.corners[(side + 2) % 3]]
    }

    /// Whether this triangle is a live leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.deleted && !self.subdivided
    }
}

/// 1-D affine map `u' = scale * u + translation` between edge parameters.
///
/// Edge parameters run from 0 at the start corner of a side to 1 at its end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideTransform {
    pub scale: f32,
    pub translation: f32,
}

impl Default for SideTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SideTransform {
    pub const IDENTITY: SideTransform = SideTransform {
        scale: 1.0,
        translation: 0.0,
    };

    /// Maps a side onto the same edge traversed by the neighbour across it,
    /// which runs in the opposite direction.
    pub const REVERSE: SideTransform = SideTransform {
        scale: -1.0,
        translation: 1.0,
    };

    #[must_use]
    pub fn apply(&self, u: f32) -> f32 {
        self.scale * u + self.translation
    }

    /// Compose: apply `self`, then `next`.
    #[must_use]
    pub fn then(self, next: SideTransform) -> SideTransform {
        SideTransform {
            scale: next.scale * self.scale,
            translation: next.scale * self.translation + next.translation,
        }
    }
}
