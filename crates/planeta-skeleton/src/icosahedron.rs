//! Base icosahedron: 12 vertices, 20 faces, and their adjacency.
//!
//! The icosahedron stands on a vertex: one point straight up, one straight
//! down, and two pentagons rotated 180° apart at heights ±1/√5. Viewed from
//! above, the upper pentagon is numbered 1..=5 counter-clockwise starting on
//! +X; the lower pentagon is 6..=10 starting on -X.
//!
//! The pentagon circumradius is scaled by `2/5·√5` so every vertex sits at
//! distance 1 from the origin. With `m = 2/5·√5` and the regular pentagon
//! constants `c1, c2, s1, s2`:
//!
//! ```text
//! cxA = m·c1 = 1/2 - √5/10      syA = m·s1 = √(10·(5 + √5)) / 10
//! cxB = m·c2 = 1/2 + √5/10      syB = m·s2 = √(10·(5 - √5)) / 10
//! ```

use glam::Vec3;

use crate::SkeletonVertex;

pub const ICOSAHEDRON_FACE_COUNT: usize = 20;
pub const ICOSAHEDRON_VERTEX_COUNT: usize = 12;

/// Corner vertices (top, left, right) of each face.
pub const ICO_TEMPLATE_TRIS: [[u8; 3]; ICOSAHEDRON_FACE_COUNT] = [
    [0, 2, 1],
    [0, 3, 2],
    [0, 4, 3],
    [0, 5, 4],
    [0, 1, 5],
    [8, 1, 2],
    [2, 7, 8],
    [7, 2, 3],
    [3, 6, 7],
    [6, 3, 4],
    [4, 10, 6],
    [10, 4, 5],
    [5, 9, 10],
    [9, 5, 1],
    [1, 8, 9],
    [11, 7, 6],
    [11, 8, 7],
    [11, 9, 8],
    [11, 10, 9],
    [11, 6, 10],
];

/// Neighbouring faces (bottom, right, left) of each face.
pub const ICO_TEMPLATE_NEIGHBOURS: [[u8; 3]; ICOSAHEDRON_FACE_COUNT] = [
    [5, 4, 1],
    [7, 0, 2],
    [9, 1, 3],
    [11, 2, 4],
    [13, 3, 0],
    [0, 6, 14],
    [16, 5, 7],
    [1, 8, 6],
    [15, 7, 9],
    [2, 10, 8],
    [19, 9, 11],
    [3, 12, 10],
    [18, 11, 13],
    [4, 14, 12],
    [17, 13, 5],
    [8, 19, 16],
    [6, 15, 17],
    [14, 16, 18],
    [12, 17, 19],
    [10, 18, 15],
];

/// Unit-sphere icosahedron directions.
fn unit_directions() -> [Vec3; ICOSAHEDRON_VERTEX_COUNT] {
    let sqrt5 = 5.0_f32.sqrt();
    let pnt = 2.0 / 5.0 * sqrt5;
    let hei = 1.0 / sqrt5;
    let cx_a = 0.5 - sqrt5 / 10.0;
    let cx_b = 0.5 + sqrt5 / 10.0;
    let sy_a = (10.0 * (5.0 + sqrt5)).sqrt() / 10.0;
    let sy_b = (10.0 * (5.0 - sqrt5)).sqrt() / 10.0;

    [
        Vec3::new(0.0, 0.0, 1.0),
        // upper pentagon
        Vec3::new(pnt, 0.0, hei),
        Vec3::new(cx_a, -sy_a, hei),
        Vec3::new(-cx_b, -sy_b, hei),
        Vec3::new(-cx_b, sy_b, hei),
        Vec3::new(cx_a, sy_a, hei),
        // lower pentagon
        Vec3::new(-pnt, 0.0, -hei),
        Vec3::new(-cx_a, -sy_a, -hei),
        Vec3::new(cx_b, -sy_b, -hei),
        Vec3::new(cx_b, sy_b, -hei),
        Vec3::new(-cx_a, sy_a, -hei),
        Vec3::new(0.0, 0.0, -1.0),
    ]
}

/// The 12 icosahedron vertices on a sphere of `radius`, with unit normals.
#[must_use]
pub fn icosahedron_vertices(radius: f32) -> [SkeletonVertex; ICOSAHEDRON_VERTEX_COUNT] {
    // Renormalize to absorb rounding in the closed-form constants.
    unit_directions().map(|dir| SkeletonVertex::on_sphere(dir.normalize(), radius))
}

/// Edge length of the icosahedron inscribed in a sphere of `radius`.
#[must_use]
pub fn icosahedron_edge_length(radius: f32) -> f32 {
    let sqrt5 = 5.0_f32.sqrt();
    radius * 4.0 / (10.0 + 2.0 * sqrt5).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_form_directions_are_unit() {
        for dir in unit_directions() {
            assert!((dir.length() - 1.0).abs() < 1e-5, "{dir:?}");
        }
    }

    #[test]
    fn test_vertices_at_radius() {
        for v in icosahedron_vertices(250.0) {
            assert!((v.position().length() - 250.0).abs() < 1e-3);
            assert!((v.normal().length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_edges_match_edge_length() {
        let verts = icosahedron_vertices(3.0);
        let expected = icosahedron_edge_length(3.0);
        for tri in ICO_TEMPLATE_TRIS {
            for i in 0..3 {
                let a = verts[tri[i] as usize].position();
                let b = verts[tri[(i + 1) % 3] as usize].position();
                assert!((a.distance(b) - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_faces_wound_outward() {
        let verts = icosahedron_vertices(1.0);
        for (i, tri) in ICO_TEMPLATE_TRIS.iter().enumerate() {
            let [t, l, r] = tri.map(|c| verts[c as usize].position());
            let center = (t + l + r) / 3.0;
            assert!((l - t).cross(r - t).dot(center) > 0.0, "face {i} wound inward");
        }
    }

    #[test]
    fn test_template_neighbours_share_opposite_edge() {
        for (t, tri) in ICO_TEMPLATE_TRIS.iter().enumerate() {
            for side in 0..3 {
                let nb = ICO_TEMPLATE_NEIGHBOURS[t][side] as usize;
                let back = ICO_TEMPLATE_NEIGHBOURS[nb]
                    .iter()
                    .position(|&n| n as usize == t)
                    .expect("neighbour must list triangle back");
                // Shared edges run in opposite directions.
                assert_eq!(tri[(side + 1) % 3], ICO_TEMPLATE_TRIS[nb][(back + 2) % 3]);
                assert_eq!(tri[(side + 2) % 3], ICO_TEMPLATE_TRIS[nb][(back + 1) % 3]);
            }
        }
    }
}
