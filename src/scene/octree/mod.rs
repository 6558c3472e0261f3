//! Arena-backed octree over a bounded cubic volume.

pub use crate::{error::Error, preset::TREE_DEPTH_MAX};

/// An unoccupied child link.
pub const LINK_EMPTY: u32 = u32::MAX;

/// Tag bit marking a child link as a leaf reference.
pub const LINK_LEAF_FLAG: u32 = 1 << 31;

/// Returns the child link referring to the leaf at `leaf_index`.
#[inline]
pub const fn leaf_link(leaf_index: u32) -> u32 {
    leaf_index | LINK_LEAF_FLAG
}

/// A fixed-branching spatial tree of depth no more than [`TREE_DEPTH_MAX`].
///
/// Nodes live in an index-based arena. A child link is either
/// [`LINK_EMPTY`], an internal node index, or a leaf index tagged with
/// [`LINK_LEAF_FLAG`]. Every occupied point of the root volume maps to
/// exactly one leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Octree {
    /// `[N, 8]`
    ///
    /// Child links of each internal node, ordered by octant code.
    /// The code packs the sign of each axis offset against the cell
    /// center as `x | y << 1 | z << 2`.
    pub nodes: Vec<[u32; 8]>,
    /// Link to the topmost cell. It may refer to a leaf directly.
    pub root: u32,
    /// Center of the root cell in world space.
    pub center: [f32; 3],
    /// Half side length of the root cell.
    pub extent: f32,
}

impl Octree {
    /// An octree whose root cell is the single leaf `0`.
    pub fn single_leaf(
        center: [f32; 3],
        extent: f32,
    ) -> Self {
        Self {
            nodes: vec![],
            root: leaf_link(0),
            center,
            extent,
        }
    }

    /// Returns the leaf whose cell contains `point`, or `None` for points
    /// outside the root volume, in empty space, or below the depth cap.
    ///
    /// The descent is iterative and carries an explicit depth counter,
    /// so it is bounded by [`TREE_DEPTH_MAX`] regardless of the arena
    /// contents.
    pub fn find_leaf(
        &self,
        point: [f32; 3],
    ) -> Option<u32> {
        let mut center = self.center;
        let mut extent = self.extent;

        if (point[0] - center[0]).abs() > extent
            || (point[1] - center[1]).abs() > extent
            || (point[2] - center[2]).abs() > extent
        {
            return None;
        }

        let mut link = self.root;
        for _ in 0..TREE_DEPTH_MAX {
            if link == LINK_EMPTY {
                return None;
            }
            if link & LINK_LEAF_FLAG != 0 {
                return Some(link & !LINK_LEAF_FLAG);
            }

            let children = &self.nodes[link as usize];
            extent /= 2.0;

            let mut octant = 0;
            for axis in 0..3 {
                if point[axis] >= center[axis] {
                    octant |= 1 << axis;
                    center[axis] += extent;
                } else {
                    center[axis] -= extent;
                }
            }

            link = children[octant];
        }

        if link != LINK_EMPTY && link & LINK_LEAF_FLAG != 0 {
            Some(link & !LINK_LEAF_FLAG)
        } else {
            None
        }
    }

    /// Checks the structural preconditions once, before a pass starts.
    pub fn validate(
        &self,
        leaf_count: usize,
    ) -> Result<(), Error> {
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return Err(Error::Validation(
                "octree.extent".into(),
                "finite and positive".into(),
            ));
        }

        let links = std::iter::once(self.root)
            .chain(self.nodes.iter().flatten().copied());
        for link in links {
            if link == LINK_EMPTY {
                continue;
            }
            if link & LINK_LEAF_FLAG != 0 {
                let leaf_index = (link & !LINK_LEAF_FLAG) as usize;
                if leaf_index >= leaf_count {
                    return Err(Error::Validation(
                        format!("octree leaf link {leaf_index}"),
                        format!("less than the leaf count {leaf_count}"),
                    ));
                }
            } else if link as usize >= self.nodes.len() {
                return Err(Error::Validation(
                    format!("octree node link {link}"),
                    format!("less than the node count {}", self.nodes.len()),
                ));
            }
        }

        Ok(())
    }
}

impl Default for Octree {
    #[inline]
    fn default() -> Self {
        Self::single_leaf([0.0; 3], 1.0)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn find_leaf_outside_volume() {
        use super::*;

        let octree = Octree::single_leaf([0.0; 3], 1.0);

        assert_eq!(octree.find_leaf([1.5, 0.0, 0.0]), None);
        assert_eq!(octree.find_leaf([0.0, -1.01, 0.0]), None);
        assert_eq!(octree.find_leaf([0.0, 0.0, 100.0]), None);
        assert_eq!(octree.find_leaf([0.5, -0.5, 0.25]), Some(0));
    }

    #[test]
    fn find_leaf_by_octant() {
        use super::*;

        // One internal node: leaf 0 fills the -x -y -z octant,
        // leaf 1 fills the +x +y +z octant, the rest is empty.
        let mut children = [LINK_EMPTY; 8];
        children[0b000] = leaf_link(0);
        children[0b111] = leaf_link(1);
        let octree = Octree {
            nodes: vec![children],
            root: 0,
            center: [0.0; 3],
            extent: 2.0,
        };

        assert_eq!(octree.find_leaf([-1.0, -1.0, -1.0]), Some(0));
        assert_eq!(octree.find_leaf([1.0, 1.0, 1.0]), Some(1));
        assert_eq!(octree.find_leaf([1.0, -1.0, 1.0]), None);
        octree.validate(2).unwrap();
    }

    #[test]
    fn find_leaf_depth_cap() {
        use super::*;

        // A chain of internal nodes along the -x -y -z octant, deeper
        // than the depth cap. The corner point stays in that octant at
        // every level, so the descent must terminate empty at the cap.
        let depth = TREE_DEPTH_MAX as usize + 5;
        let nodes = (0..depth)
            .map(|index| {
                let mut children = [LINK_EMPTY; 8];
                children[0b000] = if index + 1 < depth {
                    index as u32 + 1
                } else {
                    leaf_link(0)
                };
                children
            })
            .collect::<Vec<_>>();
        let octree = Octree {
            nodes,
            root: 0,
            center: [0.0; 3],
            extent: 1.0,
        };

        assert_eq!(octree.find_leaf([-1.0, -1.0, -1.0]), None);
    }

    #[test]
    fn validate_out_of_range_links() {
        use super::*;

        let octree = Octree {
            nodes: vec![[LINK_EMPTY; 8]],
            root: 3,
            center: [0.0; 3],
            extent: 1.0,
        };
        assert!(octree.validate(1).is_err());

        let octree = Octree::single_leaf([0.0; 3], 1.0);
        assert!(octree.validate(0).is_err());
        assert!(octree.validate(1).is_ok());
    }
}
