//! Structural self-check over every live triangle.

use tracing::warn;

use crate::{TriId, TriangleSkeleton};

/// A broken structural invariant found by [`TriangleSkeleton::verify`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("triangle {tri}: parent {parent} is deleted or not subdivided")]
    OrphanedChild { tri: TriId, parent: TriId },

    #[error("triangle {tri}: parent {parent} does not list it as a child")]
    ChildMismatch { tri: TriId, parent: TriId },

    #[error("triangle {tri}: side {side} points at deleted triangle {neighbour}")]
    DeletedNeighbour { tri: TriId, side: u8, neighbour: TriId },

    #[error("triangle {tri}: side {side} points at deeper triangle {neighbour}")]
    DeeperNeighbour { tri: TriId, side: u8, neighbour: TriId },

    #[error("triangle {tri}: side {side} is not reciprocated by {neighbour}")]
    AsymmetricNeighbour { tri: TriId, side: u8, neighbour: TriId },

    #[error("triangle {tri}: side {side} does not share its midpoint with {neighbour}")]
    MidpointNotShared { tri: TriId, side: u8, neighbour: TriId },
}

impl TriangleSkeleton {
    /// Check parent links and neighbour relations of every live triangle.
    ///
    /// Each violation is also logged. An empty result means the skeleton is
    /// consistent.
    #[must_use]
    pub fn verify(&self) -> Vec<InvariantViolation> {
        let mut found = Vec::new();

        for (t, tri) in self.triangles().iter().enumerate() {
            if tri.deleted {
                continue;
            }
            let t = t as TriId;

            if let Some(parent) = self.get_triangle(tri.parent) {
                if !parent.subdivided {
                    found.push(InvariantViolation::OrphanedChild {
                        tri: t,
                        parent: tri.parent,
                    });
                } else if parent.child(tri.sibling) != t {
                    found.push(InvariantViolation::ChildMismatch {
                        tri: t,
                        parent: tri.parent,
                    });
                }
            } else if tri.depth > 0 {
                found.push(InvariantViolation::OrphanedChild {
                    tri: t,
                    parent: tri.parent,
                });
            }

            for side in 0..3u8 {
                let neighbour = tri.neighbours[side as usize];
                let Some(nb) = self.get_triangle(neighbour) else {
                    found.push(InvariantViolation::DeletedNeighbour { tri: t, side, neighbour });
                    continue;
                };
                if nb.depth > tri.depth {
                    found.push(InvariantViolation::DeeperNeighbour { tri: t, side, neighbour });
                    continue;
                }

                let nb_side = tri.neighbour_sides[side as usize] as usize;
                // A shallower neighbour points back at our ancestor at its depth.
                let expected = self.ancestor_at_depth(t, nb.depth);
                let reciprocated = nb.neighbours[nb_side] == expected
                    && (nb.depth < tri.depth || nb.neighbour_sides[nb_side] == side);
                if !reciprocated {
                    found.push(InvariantViolation::AsymmetricNeighbour { tri: t, side, neighbour });
                    continue;
                }

                if nb.depth == tri.depth
                    && tri.subdivided
                    && nb.subdivided
                    && tri.mid_vrtxs[side as usize] != nb.mid_vrtxs[nb_side]
                {
                    found.push(InvariantViolation::MidpointNotShared { tri: t, side, neighbour });
                }
            }
        }

        for violation in &found {
            warn!("Skeleton invariant violated: {violation}");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use crate::{SiblingRole, TriangleSkeleton};

    use super::*;

    #[test]
    fn test_fresh_skeleton_is_consistent() {
        assert!(TriangleSkeleton::new(1.0).verify().is_empty());
    }

    #[test]
    fn test_consistent_through_mixed_edits() {
        let mut skeleton = TriangleSkeleton::new(5.0);
        for t in [0, 5, 4, 1] {
            skeleton.subdivide_add(t).unwrap();
        }
        let first = skeleton.triangle(0).child(SiblingRole::Left);
        skeleton.subdivide_add(first).unwrap();
        let across = skeleton.triangle(first).neighbours[0];
        skeleton.subdivide_add(across).unwrap();
        assert!(skeleton.verify().is_empty(), "{:?}", skeleton.verify());

        skeleton.subdivide_remove(first).unwrap();
        skeleton.subdivide_remove(5).unwrap_err();
        skeleton.subdivide_remove(4).unwrap();
        assert!(skeleton.verify().is_empty(), "{:?}", skeleton.verify());
    }
}
