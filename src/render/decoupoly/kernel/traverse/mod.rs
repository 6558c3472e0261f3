//! Per-ray octree traversal.

pub use super::*;

/// One sample point of a ray that landed in an occupied leaf cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleHit {
    /// Ray parameter of the sample.
    pub t: f32,
    /// Sample position in world space.
    pub position: [f32; 3],
    pub leaf_index: u32,
}

/// Collects the ray's sample hits into `hits`, front to back.
///
/// `sample_count` points are taken at the midpoints of equal segments
/// between the ray's entry into and exit from the root volume. Samples
/// outside the volume or in empty space are skipped; a ray missing the
/// volume yields no hits. Each descent is bounded by the tree depth cap,
/// so the cost per sample is `O(D_max)`.
pub fn sample_hits(
    octree: &Octree,
    ray: &Ray,
    sample_count: u32,
    hits: &mut Vec<SampleHit>,
) {
    hits.clear();

    let Some((t_entry, t_exit)) =
        ray.intersect_cube(octree.center, octree.extent)
    else {
        return;
    };

    let step = (t_exit - t_entry) / sample_count as f32;
    for index in 0..sample_count {
        let t = t_entry + (index as f32 + 0.5) * step;
        let position = ray.point_at(t);
        if let Some(leaf_index) = octree.find_leaf(position) {
            hits.push(SampleHit {
                t,
                position,
                leaf_index,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn miss_yields_no_hits() {
        use super::*;

        let octree = Octree::single_leaf([0.0; 3], 1.0);
        let ray = Ray {
            origin: [0.0, 4.0, -4.0],
            direction: [0.0, 0.0, 1.0],
        };

        let mut hits = vec![SampleHit {
            t: 0.0,
            position: [0.0; 3],
            leaf_index: 0,
        }];
        sample_hits(&octree, &ray, SAMPLE_COUNT, &mut hits);
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_are_front_to_back() {
        use super::*;

        let octree = Octree::single_leaf([0.0; 3], 1.0);
        let ray = Ray {
            origin: [0.0, 0.0, -4.0],
            direction: [0.0, 0.0, 1.0],
        };

        let mut hits = Vec::new();
        sample_hits(&octree, &ray, SAMPLE_COUNT, &mut hits);

        assert_eq!(hits.len(), SAMPLE_COUNT as usize);
        for window in hits.windows(2) {
            assert!(window[0].t < window[1].t);
        }
        assert!(hits.iter().all(|hit| hit.leaf_index == 0));

        // The segment midpoints span (3, 5) symmetrically.
        assert!((hits[0].t - 3.125).abs() < 1e-5);
        assert!((hits.last().unwrap().t - 4.875).abs() < 1e-5);
    }

    #[test]
    fn empty_octants_are_skipped() {
        use super::*;
        use crate::scene::octree::{leaf_link, LINK_EMPTY};

        // Only the -z half holds leaves.
        let mut children = [LINK_EMPTY; 8];
        children[0b000] = leaf_link(0);
        children[0b001] = leaf_link(0);
        children[0b010] = leaf_link(0);
        children[0b011] = leaf_link(0);
        let octree = Octree {
            nodes: vec![children],
            root: 0,
            center: [0.0; 3],
            extent: 1.0,
        };

        let ray = Ray {
            origin: [-0.5, -0.5, -4.0],
            direction: [0.0, 0.0, 1.0],
        };

        let mut hits = Vec::new();
        sample_hits(&octree, &ray, SAMPLE_COUNT, &mut hits);

        assert!(!hits.is_empty());
        assert!(hits.len() < SAMPLE_COUNT as usize);
        assert!(hits.iter().all(|hit| hit.position[2] < 0.0));
    }
}
