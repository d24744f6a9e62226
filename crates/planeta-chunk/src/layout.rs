//! Triangular grid layout shared by every chunk.
//!
//! A chunk with subdivision exponent `n` has `B = 2^n` segments per edge and
//! `W = B + 1` vertices per edge. Local coordinates `(x, y)` satisfy
//! `0 <= x <= y <= B`; row `y` holds `y + 1` vertices.
//!
//! ```text
//!            (0,0)            corner 0 (top)
//!           /     \
//!        (0,1)---(1,1)
//!         /         \
//!     (0,B) ------- (B,B)     corner 1 (left), corner 2 (right)
//! ```
//!
//! Side `s` runs from corner `s + 1` to corner `s + 2` like skeleton sides:
//! side 0 is the bottom row, side 1 the diagonal `x == y` walked upwards,
//! side 2 the column `x == 0` walked downwards.
//!
//! Border vertices are numbered around the ring: side `s` position `p` has
//! ring number `(s·B + p) mod 3B`. Interior vertices follow at `3B` onwards.

/// Derived sizes and lookup tables for one chunk resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    subdivision: u8,
    edge: u32,
    vertex_count: u32,
    shared_count: u32,
    interior_count: u32,
    index_count: u32,
    /// Local vertex (flat index) referenced by each index position.
    pattern: Vec<u32>,
    /// For each ring number, an index position referencing that vertex.
    ind_to_shared: Vec<u32>,
}

impl ChunkLayout {
    /// Layout for chunks with `2^subdivision` segments per edge.
    #[must_use]
    pub fn new(subdivision: u8) -> Self {
        let edge = 1u32 << subdivision;
        let width = edge + 1;
        let vertex_count = width * (width + 1) / 2;
        let shared_count = edge * 3;

        let mut layout = Self {
            subdivision,
            edge,
            vertex_count,
            shared_count,
            interior_count: vertex_count - shared_count,
            index_count: edge * edge * 3,
            pattern: Vec::new(),
            ind_to_shared: Vec::new(),
        };
        layout.pattern = layout.build_pattern();
        layout.ind_to_shared = layout.build_ind_to_shared();
        layout
    }

    fn build_pattern(&self) -> Vec<u32> {
        let mut pattern = Vec::with_capacity(self.index_count as usize);
        for y in 0..self.edge {
            for x in 0..(y * 2 + 1) {
                let i = x / 2;
                let tri = if x % 2 == 0 {
                    [(i, y), (i, y + 1), (i + 1, y + 1)]
                } else {
                    [(i + 1, y + 1), (i + 1, y), (i, y)]
                };
                pattern.extend(tri.map(|(x, y)| Self::get_index(x, y)));
            }
        }
        pattern
    }

    fn build_ind_to_shared(&self) -> Vec<u32> {
        let mut table = vec![u32::MAX; self.shared_count as usize];
        let mut flat_to_ring = vec![u32::MAX; self.vertex_count as usize];
        for y in 0..=self.edge {
            for x in 0..=y {
                let ring = self.ringed_index(x, y);
                if ring < self.shared_count {
                    flat_to_ring[Self::get_index(x, y) as usize] = ring;
                }
            }
        }
        for (position, &flat) in self.pattern.iter().enumerate() {
            let ring = flat_to_ring[flat as usize];
            if ring != u32::MAX && table[ring as usize] == u32::MAX {
                table[ring as usize] = position as u32;
            }
        }
        table
    }

    #[must_use]
    pub fn subdivision(&self) -> u8 {
        self.subdivision
    }

    /// Segments per chunk edge (`B`).
    #[must_use]
    pub fn edge(&self) -> u32 {
        self.edge
    }

    /// Vertices per chunk edge (`B + 1`).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.edge + 1
    }

    /// Total vertices in one chunk.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Border vertices in one chunk.
    #[must_use]
    pub fn shared_count(&self) -> u32 {
        self.shared_count
    }

    /// Strictly interior vertices in one chunk.
    #[must_use]
    pub fn interior_count(&self) -> u32 {
        self.interior_count
    }

    /// Indices written per chunk.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Local flat vertex index referenced by every index position.
    #[must_use]
    pub fn pattern(&self) -> &[u32] {
        &self.pattern
    }

    /// Index position within a chunk's index data that references the border
    /// vertex with ring number `ring`.
    #[must_use]
    pub fn ind_to_shared(&self, ring: u32) -> u32 {
        self.ind_to_shared[ring as usize]
    }

    /// Row-major flat index of `(x, y)`.
    #[must_use]
    pub fn get_index(x: u32, y: u32) -> u32 {
        y * (y + 1) / 2 + x
    }

    /// Ring number for border vertices, `3B + interior index` otherwise.
    #[must_use]
    pub fn ringed_index(&self, x: u32, y: u32) -> u32 {
        let b = self.edge;
        if y == b {
            x
        } else if x == 0 {
            b * 2 + y
        } else if x == y {
            b * 2 - y
        } else {
            self.shared_count + Self::get_index(x - 1, y - 2)
        }
    }

    /// Ring number of position `p` along side `side`.
    #[must_use]
    pub fn ring_position(&self, side: u8, p: u32) -> u32 {
        (u32::from(side) * self.edge + p) % self.shared_count
    }

    /// Local coordinates of position `p` along side `side`.
    #[must_use]
    pub fn side_xy(&self, side: u8, p: u32) -> (u32, u32) {
        let b = self.edge;
        match side {
            0 => (p, b),
            1 => (b - p, b - p),
            _ => (0, p),
        }
    }

    /// Local coordinates of corner `corner` (top, left, right).
    #[must_use]
    pub fn corner_xy(&self, corner: usize) -> (u32, u32) {
        let b = self.edge;
        match corner {
            0 => (0, 0),
            1 => (0, b),
            _ => (b, b),
        }
    }

    /// Which side a local coordinate lies on and its position along it, or
    /// `None` for interior vertices.
    #[must_use]
    pub fn border_position(&self, x: u32, y: u32) -> Option<(u8, u32)> {
        let b = self.edge;
        if y == b {
            Some((0, x))
        } else if x == y {
            Some((1, b - x))
        } else if x == 0 {
            Some((2, y))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_sizes_for_subdivision_3() {
        let layout = ChunkLayout::new(3);
        assert_eq!(layout.edge(), 8);
        assert_eq!(layout.width(), 9);
        assert_eq!(layout.vertex_count(), 45);
        assert_eq!(layout.shared_count(), 24);
        assert_eq!(layout.interior_count(), 21);
        assert_eq!(layout.index_count(), 192);
    }

    #[test]
    fn test_ringed_index_is_a_permutation() {
        for n in 1..=4 {
            let layout = ChunkLayout::new(n);
            let b = layout.edge();
            let mut seen = HashSet::new();
            for y in 0..=b {
                for x in 0..=y {
                    assert!(seen.insert(layout.ringed_index(x, y)));
                }
            }
            assert_eq!(seen.len() as u32, layout.vertex_count());
            assert!(seen.iter().all(|&r| r < layout.vertex_count()));
        }
    }

    #[test]
    fn test_ring_positions_walk_the_border() {
        let layout = ChunkLayout::new(2);
        let b = layout.edge();
        for side in 0..3u8 {
            for p in 0..=b {
                let (x, y) = layout.side_xy(side, p);
                assert_eq!(layout.ringed_index(x, y), layout.ring_position(side, p));
            }
            // A side ends where the next one starts.
            assert_eq!(
                layout.side_xy(side, b),
                layout.side_xy((side + 1) % 3, 0)
            );
        }
        assert_eq!(layout.side_xy(0, 0), layout.corner_xy(1));
        assert_eq!(layout.side_xy(1, 0), layout.corner_xy(2));
        assert_eq!(layout.side_xy(2, 0), layout.corner_xy(0));
    }

    #[test]
    fn test_border_position_agrees_with_ring() {
        let layout = ChunkLayout::new(3);
        let b = layout.edge();
        for y in 0..=b {
            for x in 0..=y {
                let ring = layout.ringed_index(x, y);
                match layout.border_position(x, y) {
                    Some((side, p)) => assert_eq!(layout.ring_position(side, p), ring),
                    None => assert!(ring >= layout.shared_count()),
                }
            }
        }
    }

    #[test]
    fn test_pattern_covers_every_vertex() {
        let layout = ChunkLayout::new(3);
        let used: HashSet<_> = layout.pattern().iter().copied().collect();
        assert_eq!(used.len() as u32, layout.vertex_count());
        assert_eq!(layout.pattern().len() as u32, layout.index_count());
    }

    #[test]
    fn test_ind_to_shared_points_at_ring_vertex() {
        let layout = ChunkLayout::new(3);
        let b = layout.edge();
        for y in 0..=b {
            for x in 0..=y {
                let ring = layout.ringed_index(x, y);
                if ring < layout.shared_count() {
                    let position = layout.ind_to_shared(ring);
                    assert_eq!(layout.pattern()[position as usize], ChunkLayout::get_index(x, y));
                }
            }
        }
    }
}
