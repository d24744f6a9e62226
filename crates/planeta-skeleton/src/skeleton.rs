//! The triangle skeleton: pooled vertex and triangle storage with
//! subdivision, merging, and neighbour maintenance.

use glam::Vec3;
use tracing::{debug, trace, warn};

use crate::icosahedron::{
    ICO_TEMPLATE_NEIGHBOURS, ICO_TEMPLATE_TRIS, ICOSAHEDRON_FACE_COUNT, ICOSAHEDRON_VERTEX_COUNT,
    icosahedron_vertices,
};
use crate::listener::{ListenerId, SkeletonChanges, SkeletonListener};
use crate::{
    INVALID_TRI, INVALID_VRTX, Pool, SideTransform, SiblingRole, SkeletonError, SkeletonVertex,
    SubTriangle, TriId, VrtxId,
};

/// Pool sizes and geometry for a [`TriangleSkeleton`].
#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonConfig {
    /// Sphere radius every vertex is projected onto.
    pub radius: f32,
    /// Capacity of the vertex buffer.
    pub max_vertices: u32,
    /// Capacity of the triangle array, including the 20 roots.
    pub max_triangles: u32,
    /// Triangles at this depth refuse to subdivide.
    pub max_depth: u8,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            max_vertices: 512,
            max_triangles: 256,
            max_depth: 5,
        }
    }
}

impl SkeletonConfig {
    /// Default pool sizes on a sphere of `radius`.
    #[must_use]
    pub fn with_radius(radius: f32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), SkeletonError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SkeletonError::InvalidConfig(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if (self.max_vertices as usize) < ICOSAHEDRON_VERTEX_COUNT {
            return Err(SkeletonError::InvalidConfig(format!(
                "max_vertices {} cannot hold the {ICOSAHEDRON_VERTEX_COUNT} base vertices",
                self.max_vertices
            )));
        }
        if (self.max_triangles as usize) < ICOSAHEDRON_FACE_COUNT {
            return Err(SkeletonError::InvalidConfig(format!(
                "max_triangles {} cannot hold the {ICOSAHEDRON_FACE_COUNT} base faces",
                self.max_triangles
            )));
        }
        Ok(())
    }
}

/// An icosahedron whose faces can be recursively split into 4 and merged.
///
/// Vertices and triangles live in fixed-capacity pools sized at
/// construction. Freed triangles are recycled as whole groups of 4 and freed
/// midpoints are recycled individually; running out of either pool is
/// reported as [`SkeletonError::CapacityExceeded`], never by growing.
///
/// References returned by accessors must not be held across mutating calls;
/// re-fetch by id instead.
pub struct TriangleSkeleton {
    config: SkeletonConfig,
    vertices: Vec<SkeletonVertex>,
    /// Number of vertex slots handed out so far (bump pointer).
    vertex_count: u32,
    vertex_free: Vec<VrtxId>,
    triangles: Vec<SubTriangle>,
    /// First ids of deleted 4-groups.
    triangle_free: Vec<TriId>,
    pending: SkeletonChanges,
    listeners: Vec<(ListenerId, Box<dyn SkeletonListener>)>,
    next_listener: u32,
}

impl TriangleSkeleton {
    /// Build the base icosahedron on a sphere of `radius` with default pool
    /// sizes.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        Self::build(SkeletonConfig::with_radius(radius))
    }

    /// Build the base icosahedron with explicit pool sizes.
    pub fn with_config(config: SkeletonConfig) -> Result<Self, SkeletonError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SkeletonConfig) -> Self {
        let mut vertices = vec![SkeletonVertex::default(); config.max_vertices as usize];
        vertices[..ICOSAHEDRON_VERTEX_COUNT].copy_from_slice(&icosahedron_vertices(config.radius));

        let mut triangles = Vec::with_capacity(config.max_triangles as usize);
        for face in 0..ICOSAHEDRON_FACE_COUNT {
            triangles.push(SubTriangle {
                corners: ICO_TEMPLATE_TRIS[face].map(VrtxId::from),
                neighbours: ICO_TEMPLATE_NEIGHBOURS[face].map(TriId::from),
                ..SubTriangle::default()
            });
        }

        let mut skeleton = Self {
            config,
            vertices,
            vertex_count: ICOSAHEDRON_VERTEX_COUNT as u32,
            vertex_free: Vec::new(),
            triangles,
            triangle_free: Vec::new(),
            pending: SkeletonChanges::default(),
            listeners: Vec::new(),
            next_listener: 0,
        };

        for t in 0..ICOSAHEDRON_FACE_COUNT {
            for side in 0..3 {
                let nb = &skeleton.triangles[skeleton.triangles[t].neighbours[side] as usize];
                // The template is symmetric, so the lookup always succeeds.
                let back = Self::neighbour_side(nb, t as TriId).unwrap_or(0);
                skeleton.triangles[t].neighbour_sides[side] = back;
            }
            skeleton.triangles[t].center = skeleton.compute_center(&skeleton.triangles[t]);
        }

        debug!(
            "Skeleton initialized: radius {}, {} vertices, {} triangles",
            skeleton.config.radius, skeleton.vertex_count, ICOSAHEDRON_FACE_COUNT
        );
        skeleton
    }

    // --- Accessors ---

    #[must_use]
    pub fn config(&self) -> &SkeletonConfig {
        &self.config
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.config.radius
    }

    /// Triangle by id.
    ///
    /// # Panics
    ///
    /// Panics if `t` is outside the allocated triangle range.
    #[must_use]
    pub fn triangle(&self, t: TriId) -> &SubTriangle {
        &self.triangles[t as usize]
    }

    /// Triangle by id, or `None` if out of range or deleted.
    #[must_use]
    pub fn get_triangle(&self, t: TriId) -> Option<&SubTriangle> {
        self.triangles.get(t as usize).filter(|tri| !tri.deleted)
    }

    /// Every triangle slot, deleted ones included.
    #[must_use]
    pub fn triangles(&self) -> &[SubTriangle] {
        &self.triangles
    }

    /// Number of triangle slots handed out so far.
    #[must_use]
    pub fn triangle_slots(&self) -> u32 {
        self.triangles.len() as u32
    }

    /// Number of triangles not deleted.
    #[must_use]
    pub fn live_triangle_count(&self) -> u32 {
        (self.triangles.len() - self.triangle_free.len() * 4) as u32
    }

    #[must_use]
    pub fn vertex(&self, v: VrtxId) -> &SkeletonVertex {
        &self.vertices[v as usize]
    }

    #[must_use]
    pub fn vertex_position(&self, v: VrtxId) -> Vec3 {
        self.vertices[v as usize].position()
    }

    #[must_use]
    pub fn vertex_normal(&self, v: VrtxId) -> Vec3 {
        self.vertices[v as usize].normal()
    }

    /// The allocated prefix of the vertex buffer, freed slots included.
    #[must_use]
    pub fn vertices(&self) -> &[SkeletonVertex] {
        &self.vertices[..self.vertex_count as usize]
    }

    /// Number of vertex slots handed out so far.
    #[must_use]
    pub fn vertex_slots(&self) -> u32 {
        self.vertex_count
    }

    /// Number of vertices currently referenced.
    #[must_use]
    pub fn live_vertex_count(&self) -> u32 {
        self.vertex_count - self.vertex_free.len() as u32
    }

    /// Changes recorded since the last [`TriangleSkeleton::notify`].
    #[must_use]
    pub fn pending_changes(&self) -> &SkeletonChanges {
        &self.pending
    }

    /// Which side of `tri` has `looking_for` as its neighbour.
    #[must_use]
    pub fn neighbour_side(tri: &SubTriangle, looking_for: TriId) -> Option<u8> {
        tri.neighbours
            .iter()
            .position(|&n| n == looking_for)
            .map(|side| side as u8)
    }

    /// Walk up the parent chain from `t` to its ancestor at `depth`.
    ///
    /// Returns `t` itself when it is already at or above `depth`.
    #[must_use]
    pub fn ancestor_at_depth(&self, t: TriId, depth: u8) -> TriId {
        let mut cur = t;
        loop {
            let tri = &self.triangles[cur as usize];
            if tri.depth <= depth || tri.parent == INVALID_TRI {
                return cur;
            }
            cur = tri.parent;
        }
    }

    /// Express a position along `side` of `t` in the frame of the same side
    /// of its ancestor at `target_depth`.
    ///
    /// Each step up halves the scale; the child in the second half of the
    /// parent's side also shifts by half. `t` must lie along `side` of every
    /// ancestor on the way up, which holds for triangles whose neighbour on
    /// `side` is shallower than themselves.
    #[must_use]
    pub fn transform_to_ancestor(&self, t: TriId, side: u8, target_depth: u8) -> SideTransform {
        let mut out = SideTransform::IDENTITY;
        let mut cur = t;
        loop {
            let tri = &self.triangles[cur as usize];
            if tri.depth <= target_depth || tri.parent == INVALID_TRI {
                return out;
            }
            // Children (side + 1) and (side + 2) cover the first and second
            // halves of the parent's side.
            let second_half = (tri.sibling.offset() + 1) % 3 == u32::from(side);
            out.scale *= 0.5;
            out.translation = out.translation * 0.5 + if second_half { 0.5 } else { 0.0 };
            cur = tri.parent;
        }
    }

    // --- Use counts ---

    /// Record one more chunk depending on `t`.
    pub fn increment_use_count(&mut self, t: TriId) -> Result<(), SkeletonError> {
        let tri = self.live_triangle_mut(t)?;
        tri.use_count += 1;
        Ok(())
    }

    /// Record one fewer chunk depending on `t`.
    pub fn decrement_use_count(&mut self, t: TriId) -> Result<(), SkeletonError> {
        let tri = self.live_triangle_mut(t)?;
        if tri.use_count == 0 {
            warn!("Use count underflow on triangle {t}");
        }
        tri.use_count = tri.use_count.saturating_sub(1);
        Ok(())
    }

    // --- Subdivision ---

    /// Split `t` into Top, Left, Right and Center children.
    ///
    /// Midpoints of sides whose same-depth neighbour is already subdivided
    /// are borrowed from that neighbour, and the children on both sides of
    /// the edge are linked to each other (down into deeper descendants of the
    /// neighbour). Other midpoints are allocated and projected onto the
    /// sphere. Pools are checked before anything is modified.
    pub fn subdivide_add(&mut self, t: TriId) -> Result<(), SkeletonError> {
        let tri = self.live_triangle(t)?.clone();
        if tri.subdivided {
            return Err(SkeletonError::AlreadySubdivided(t));
        }
        if tri.depth >= self.config.max_depth {
            return Err(SkeletonError::DepthLimit {
                tri: t,
                max_depth: self.config.max_depth,
            });
        }

        let mut borrowed = [None; 3];
        for side in 0..3 {
            let nb = &self.triangles[tri.neighbours[side] as usize];
            if nb.subdivided && nb.depth == tri.depth {
                borrowed[side] = Some(nb.mid_vrtxs[tri.neighbour_sides[side] as usize]);
            }
        }

        let needed = borrowed.iter().filter(|b| b.is_none()).count() as u32;
        let available =
            self.vertex_free.len() as u32 + (self.config.max_vertices - self.vertex_count);
        if needed > available {
            return Err(SkeletonError::CapacityExceeded {
                pool: Pool::Vertices,
                capacity: self.config.max_vertices,
            });
        }
        if self.triangle_free.is_empty()
            && self.triangles.len() + 4 > self.config.max_triangles as usize
        {
            return Err(SkeletonError::CapacityExceeded {
                pool: Pool::Triangles,
                capacity: self.config.max_triangles,
            });
        }

        let children = match self.triangle_free.pop() {
            Some(first) => first,
            None => {
                let first = self.triangles.len() as TriId;
                self.triangles
                    .extend(std::iter::repeat_n(SubTriangle::default(), 4));
                first
            }
        };

        let mut mids = [INVALID_VRTX; 3];
        for side in 0..3 {
            mids[side] = match borrowed[side] {
                Some(mid) => mid,
                None => {
                    let [a, b] = tri.side_endpoints(side as u8);
                    let dir = (self.vertex_position(a) + self.vertex_position(b)).normalize();
                    let mid = self.alloc_vertex();
                    self.vertices[mid as usize] = SkeletonVertex::on_sphere(dir, self.config.radius);
                    mid
                }
            };
        }

        let n = tri.neighbours;
        let ns = tri.neighbour_sides;
        let [c0, c1, c2] = tri.corners;
        let [m0, m1, m2] = mids;
        let center = children + SiblingRole::Center.offset();
        let layout = [
            ([center, n[1], n[2]], [0, ns[1], ns[2]], [c0, m2, m1]),
            ([n[0], center, n[2]], [ns[0], 1, ns[2]], [m2, c1, m0]),
            ([n[0], n[1], center], [ns[0], ns[1], 2], [m1, m0, c2]),
            ([children, children + 1, children + 2], [0, 1, 2], [m0, m1, m2]),
        ];

        for (role, (neighbours, neighbour_sides, corners)) in SiblingRole::ALL.into_iter().zip(layout) {
            let mut child = SubTriangle {
                parent: t,
                sibling: role,
                neighbours,
                neighbour_sides,
                corners,
                depth: tri.depth + 1,
                ..SubTriangle::default()
            };
            child.center = self.compute_center(&child);
            self.triangles[(children + role.offset()) as usize] = child;
        }

        for side in 0..3u8 {
            if borrowed[side as usize].is_none() {
                continue;
            }
            let nb_id = n[side as usize];
            let nb_side = ns[side as usize];
            let [x, y] = [
                children + (u32::from(side) + 1) % 3,
                children + (u32::from(side) + 2) % 3,
            ];
            let [bx, by] = self.triangles[nb_id as usize].children_along(nb_side);

            // Shared edges run in opposite directions: our first child meets
            // the neighbour's second child.
            self.link_side(x, side, by, nb_side);
            self.link_side(y, side, bx, nb_side);
            self.set_side_recurse(bx, nb_side, y, side);
            self.set_side_recurse(by, nb_side, x, side);
        }

        let parent = &mut self.triangles[t as usize];
        parent.subdivided = true;
        parent.children = children;
        parent.mid_vrtxs = mids;

        self.pending
            .triangles_added
            .extend(children..children + 4);
        trace!("Subdivided triangle {t} into {children}..{}", children + 4);
        Ok(())
    }

    /// Merge the 4 children of `t` back into it.
    ///
    /// Refuses while any child is subdivided or in use; callers merge leaves
    /// first. A chunk on `t` itself does not block the merge. Midpoints no longer shared with a subdivided neighbour
    /// are freed, and the neighbour's children are pointed back at `t`.
    pub fn subdivide_remove(&mut self, t: TriId) -> Result<(), SkeletonError> {
        let tri = self.live_triangle(t)?.clone();
        if !tri.subdivided {
            return Err(SkeletonError::NotSubdivided(t));
        }
        if SiblingRole::ALL
            .iter()
            .any(|role| !self.triangles[tri.child(*role) as usize].is_leaf())
        {
            return Err(SkeletonError::ChildSubdivided(t));
        }
        for role in SiblingRole::ALL {
            let child = tri.child(role);
            let use_count = self.triangles[child as usize].use_count;
            if use_count > 0 {
                return Err(SkeletonError::InUse {
                    tri: child,
                    use_count,
                });
            }
        }

        for side in 0..3u8 {
            let nb_id = tri.neighbours[side as usize];
            let nb = &self.triangles[nb_id as usize];
            if nb.subdivided && nb.depth == tri.depth {
                let nb_side = tri.neighbour_sides[side as usize];
                let [bx, by] = nb.children_along(nb_side);
                self.set_side_recurse(bx, nb_side, t, side);
                self.set_side_recurse(by, nb_side, t, side);
            } else {
                let mid = tri.mid_vrtxs[side as usize];
                self.vertex_free.push(mid);
                self.pending.vertices_removed.push(mid);
            }
        }

        for role in SiblingRole::ALL {
            self.triangles[tri.child(role) as usize] = SubTriangle {
                deleted: true,
                ..SubTriangle::default()
            };
        }
        self.triangle_free.push(tri.children);

        let parent = &mut self.triangles[t as usize];
        parent.subdivided = false;
        parent.children = INVALID_TRI;
        parent.mid_vrtxs = [INVALID_VRTX; 3];

        self.pending
            .triangles_removed
            .extend(tri.children..tri.children + 4);
        trace!("Merged triangle {t}");
        Ok(())
    }

    // --- Listeners ---

    /// Register a listener for batched change notifications.
    pub fn add_listener(&mut self, listener: Box<dyn SkeletonListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a listener. Returns `false` if the handle was unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver pending changes to every listener and clear them.
    pub fn notify(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let changes = std::mem::take(&mut self.pending);
        for (_, listener) in &mut self.listeners {
            if !changes.triangles_added.is_empty() {
                listener.on_triangles_added(&changes.triangles_added);
            }
            if !changes.triangles_removed.is_empty() {
                listener.on_triangles_removed(&changes.triangles_removed);
            }
            if !changes.vertices_removed.is_empty() {
                listener.on_vertices_removed(&changes.vertices_removed);
            }
        }
        debug!(
            "Skeleton notify: +{} triangles, -{} triangles, -{} vertices",
            changes.triangles_added.len(),
            changes.triangles_removed.len(),
            changes.vertices_removed.len()
        );
    }

    // --- Internals ---

    pub(crate) fn live_triangle(&self, t: TriId) -> Result<&SubTriangle, SkeletonError> {
        self.get_triangle(t)
            .ok_or(SkeletonError::InvalidTriangle(t))
    }

    fn live_triangle_mut(&mut self, t: TriId) -> Result<&mut SubTriangle, SkeletonError> {
        self.triangles
            .get_mut(t as usize)
            .filter(|tri| !tri.deleted)
            .ok_or(SkeletonError::InvalidTriangle(t))
    }

    fn alloc_vertex(&mut self) -> VrtxId {
        self.vertex_free.pop().unwrap_or_else(|| {
            let v = self.vertex_count;
            self.vertex_count += 1;
            v
        })
    }

    fn link_side(&mut self, tri: TriId, side: u8, to: TriId, to_side: u8) {
        let tri = &mut self.triangles[tri as usize];
        tri.neighbours[side as usize] = to;
        tri.neighbour_sides[side as usize] = to_side;
    }

    /// Point `side` of `tri`, and of every descendant along that side, at `to`.
    fn set_side_recurse(&mut self, tri: TriId, side: u8, to: TriId, to_side: u8) {
        let mut stack = vec![tri];
        while let Some(cur) = stack.pop() {
            self.link_side(cur, side, to, to_side);
            let node = &self.triangles[cur as usize];
            if node.subdivided {
                stack.extend(node.children_along(side));
            }
        }
    }

    fn compute_center(&self, tri: &SubTriangle) -> Vec3 {
        let [a, b, c] = tri.corners.map(|v| self.vertex_position(v));
        (a + b + c) / 3.0
    }
}
