pub use super::*;

/// The configuration allocating a [`DecoupolyScene`].
///
/// Octree construction itself belongs to the host; the scene only takes
/// the finished topology and reserves a zeroed parameter buffer for its
/// leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct DecoupolySceneConfig {
    pub octree: Octree,
    /// `L`
    pub leaf_count: usize,
}

impl Default for DecoupolySceneConfig {
    fn default() -> Self {
        Self {
            octree: Octree::default(),
            leaf_count: 1,
        }
    }
}

impl From<DecoupolySceneConfig> for DecoupolyScene {
    fn from(config: DecoupolySceneConfig) -> Self {
        // [L, R * 3 + R * K + C]
        let params = vec![0.0; config.leaf_count * LEAF_RECORD_SIZE];

        let scene = Self {
            octree: config.octree,
            params,
        };

        log::info!(
            target: "decoupoly::renderer::scene",
            "DecoupolyScene > leaf_count {} > params {}",
            scene.leaf_count(),
            humansize::format_size(scene.size(), humansize::BINARY),
        );

        scene
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn default_scene() {
        use super::*;

        let scene = DecoupolyScene::default();

        assert_eq!(scene.leaf_count(), 1);
        assert_eq!(scene.params().len(), LEAF_RECORD_SIZE);
        assert!(scene.params().iter().all(|value| *value == 0.0));
        scene.octree.validate(scene.leaf_count()).unwrap();
    }
}
